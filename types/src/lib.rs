//! Wire types for the realtime control channel.
pub mod session;
pub mod tools;
pub mod audio;
pub mod events;
mod content;

pub use session::Session;
pub use content::items::{FunctionCallItem, FunctionCallOutputItem, Item};
pub use events::{ClientEvent, ServerEvent};
