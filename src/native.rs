//! cpal-backed microphone and speaker for running a call from a desktop.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::capture::{CaptureDevice, MediaStream, MicrophoneSource};
use crate::error::{Result, SessionError};
use crate::transport::{AudioOutput, AudioSink};
use crate::utils::capture::MicCapture;
use crate::utils::playback::{PlaybackSink, SpeakerPlayback};

/// About one second of 20 ms frames.
const FRAME_QUEUE: usize = 50;

pub struct NativeMicrophone {
    device: Option<String>,
}

impl NativeMicrophone {
    pub fn new(device: Option<String>) -> Self {
        Self { device }
    }
}

struct MicDevice(MicCapture);

impl CaptureDevice for MicDevice {
    fn stop(&mut self) {
        self.0.stop();
    }
}

#[async_trait]
impl MicrophoneSource for NativeMicrophone {
    async fn acquire(&self) -> Result<MediaStream> {
        let device = self.device.clone();
        let (tx, rx) = mpsc::channel::<Bytes>(FRAME_QUEUE);
        let started = tokio::task::spawn_blocking(move || {
            MicCapture::start(device, move |packet| {
                if tx.try_send(Bytes::from(packet)).is_err() {
                    tracing::trace!("frame queue full or closed, dropping packet");
                }
            })
        })
        .await;

        match started {
            Ok(Ok(capture)) => Ok(MediaStream::new(Box::new(MicDevice(capture)), rx)),
            Ok(Err(e)) => {
                tracing::error!("failed to open microphone: {:#}", e);
                Err(SessionError::PermissionDenied)
            }
            Err(e) => {
                tracing::error!("microphone task failed: {}", e);
                Err(SessionError::PermissionDenied)
            }
        }
    }
}

pub struct NativeSpeaker {
    device: Option<String>,
}

impl NativeSpeaker {
    pub fn new(device: Option<String>) -> Self {
        Self { device }
    }
}

/// Keeps the output stream running for as long as the sink lives.
struct SpeakerSink {
    _playback: SpeakerPlayback,
    sink: PlaybackSink,
}

impl AudioSink for SpeakerSink {
    fn play(&mut self, packet: &[u8]) {
        self.sink.play(packet);
    }
}

impl AudioOutput for NativeSpeaker {
    fn open_sink(&self) -> anyhow::Result<Box<dyn AudioSink>> {
        let (playback, sink) = SpeakerPlayback::start(self.device.clone())?;
        tracing::info!("speaker playback at {} Hz", playback.sample_rate());
        Ok(Box::new(SpeakerSink {
            _playback: playback,
            sink,
        }))
    }
}
