//! Media capture guard: owns microphone acquisition and the lifetime of the
//! local audio tracks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;

use crate::error::{Result, SessionError};

/// Platform handle behind a stream, stopped when the stream is released.
pub trait CaptureDevice: Send {
    fn stop(&mut self);
}

#[derive(Debug)]
pub struct AudioTrack {
    id: String,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl AudioTrack {
    fn new(id: String) -> Self {
        Self {
            id,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// A stopped track never reports enabled again.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire) && !self.is_stopped()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

struct StreamInner {
    tracks: Vec<AudioTrack>,
    frames: Mutex<Option<mpsc::Receiver<Bytes>>>,
    device: Mutex<Option<Box<dyn CaptureDevice>>>,
}

/// Local microphone stream shared by the capture guard and the transport.
/// Cloning shares the same tracks.
#[derive(Clone)]
pub struct MediaStream {
    inner: Arc<StreamInner>,
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream").field("tracks", &self.inner.tracks).finish()
    }
}

impl MediaStream {
    /// A single-track stream whose encoded audio frames arrive on `frames`.
    pub fn new(device: Box<dyn CaptureDevice>, frames: mpsc::Receiver<Bytes>) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                tracks: vec![AudioTrack::new("mic-0".to_string())],
                frames: Mutex::new(Some(frames)),
                device: Mutex::new(Some(device)),
            }),
        }
    }

    pub fn tracks(&self) -> &[AudioTrack] {
        &self.inner.tracks
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.tracks.iter().any(AudioTrack::is_enabled)
    }

    pub fn is_released(&self) -> bool {
        self.inner.tracks.iter().all(AudioTrack::is_stopped)
    }

    /// Hands the encoded frame queue to the transport. Only the first call
    /// gets it.
    pub fn take_frames(&self) -> Option<mpsc::Receiver<Bytes>> {
        match self.inner.frames.lock() {
            Ok(mut frames) => frames.take(),
            Err(_) => {
                tracing::error!("media stream frame queue lock poisoned");
                None
            }
        }
    }

    pub fn same_stream(&self, other: &MediaStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait MicrophoneSource: Send + Sync {
    /// Requests microphone access and starts capturing.
    async fn acquire(&self) -> Result<MediaStream>;
}

/// Acquisition, muting and release of the local stream. No retries: a failed
/// acquisition is reported once as `PermissionDenied`.
#[derive(Clone)]
pub struct CaptureGuard {
    source: Arc<dyn MicrophoneSource>,
}

impl CaptureGuard {
    pub fn new(source: Arc<dyn MicrophoneSource>) -> Self {
        Self { source }
    }

    pub async fn acquire(&self) -> Result<MediaStream> {
        match self.source.acquire().await {
            Ok(stream) => {
                tracing::info!("microphone acquired ({} track)", stream.tracks().len());
                Ok(stream)
            }
            Err(e) => {
                tracing::warn!("microphone acquisition failed: {}", e);
                Err(SessionError::PermissionDenied)
            }
        }
    }

    /// Mutes or unmutes the existing tracks without touching the transport.
    pub fn set_enabled(stream: &MediaStream, enabled: bool) {
        for track in stream.tracks() {
            if !track.is_stopped() {
                track.enabled.store(enabled, Ordering::Release);
            }
        }
        tracing::debug!("microphone tracks enabled={}", enabled);
    }

    /// Stops every track and the capture device. Idempotent.
    pub fn release(stream: &MediaStream) {
        let mut stopped_any = false;
        for track in stream.tracks() {
            track.enabled.store(false, Ordering::Release);
            if !track.stopped.swap(true, Ordering::AcqRel) {
                stopped_any = true;
            }
        }
        if let Ok(mut device) = stream.inner.device.lock() {
            if let Some(mut device) = device.take() {
                device.stop();
            }
        }
        if stopped_any {
            tracing::info!("microphone released");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    pub(crate) struct CountingDevice(pub Arc<AtomicUsize>);

    impl CaptureDevice for CountingDevice {
        fn stop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn test_stream() -> (MediaStream, mpsc::Sender<Bytes>, Arc<AtomicUsize>) {
        let stops = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel(8);
        (MediaStream::new(Box::new(CountingDevice(stops.clone())), rx), tx, stops)
    }

    #[test]
    fn set_enabled_mutes_without_stopping() {
        let (stream, _tx, stops) = test_stream();
        assert!(stream.is_enabled());
        CaptureGuard::set_enabled(&stream, false);
        assert!(!stream.is_enabled());
        assert!(!stream.is_released());
        CaptureGuard::set_enabled(&stream, true);
        assert!(stream.is_enabled());
        assert_eq!(stops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn release_is_idempotent() {
        let (stream, _tx, stops) = test_stream();
        let shared = stream.clone();
        CaptureGuard::release(&stream);
        CaptureGuard::release(&shared);
        assert!(stream.is_released());
        assert!(!shared.is_enabled());
        assert_eq!(stops.load(Ordering::SeqCst), 1);

        // a released track stays off
        CaptureGuard::set_enabled(&stream, true);
        assert!(!stream.is_enabled());
    }

    #[test]
    fn frames_are_handed_out_once() {
        let (stream, _tx, _) = test_stream();
        assert!(stream.take_frames().is_some());
        assert!(stream.clone().take_frames().is_none());
    }

    #[tokio::test]
    async fn acquisition_failure_is_permission_denied() {
        let mut source = MockMicrophoneSource::new();
        source
            .expect_acquire()
            .times(1)
            .returning(|| Err(SessionError::Negotiation("NotAllowedError".to_string())));
        let guard = CaptureGuard::new(Arc::new(source));
        assert_eq!(guard.acquire().await.unwrap_err(), SessionError::PermissionDenied);
    }
}
