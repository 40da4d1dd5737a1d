//! Native audio plumbing for the voice client: device lookup, microphone
//! capture into Opus frames and speaker playback of received Opus frames.
pub mod audio;
pub mod capture;
pub mod device;
pub mod playback;
