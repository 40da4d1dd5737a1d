mod consts;
pub mod agent;
pub mod capture;
pub mod config;
pub mod credential;
pub mod decoder;
pub mod error;
pub mod session;
pub mod tools;
pub mod transcript;
pub mod transport;
#[cfg(feature = "utils")]
pub mod native;

pub use sulten_voice_types as types;
pub use config::{Config, ConfigBuilder};
pub use error::{FailureCause, Result, SessionError};
pub use session::{
    AppContext, CallPhase, InterruptionPolicy, SessionBuilder, SessionEvent, SessionHandle, SessionStatus,
};
pub use transcript::{Role, Transcript, TranscriptLine, TranscriptMode};

#[cfg(feature = "utils")]
pub use sulten_voice_utils as utils;
