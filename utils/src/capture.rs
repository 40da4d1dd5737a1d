use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FrameCount, StreamConfig};

use crate::audio::{downmix, FrameEncoder};

const INPUT_CHUNK_SIZE: usize = 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Microphone capture running on its own thread. The cpal stream is not
/// `Send`, so it is built and dropped on that thread; only Opus packets
/// leave it, through `on_packet`.
pub struct MicCapture {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MicCapture {
    /// Opens the device and starts streaming. Returns once the stream is
    /// playing, or with the error that kept it from starting.
    pub fn start<F>(device_name: Option<String>, mut on_packet: F) -> anyhow::Result<Self>
    where
        F: FnMut(Vec<u8>) + Send + 'static,
    {
        let (ready_tx, ready_rx) = mpsc::channel::<anyhow::Result<()>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                let (samples_tx, samples_rx) = mpsc::sync_channel::<Vec<f32>>(64);
                let (stream, channels, mut encoder) = match open_input(device_name.as_deref(), samples_tx) {
                    Ok(opened) => opened,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                loop {
                    match stop_rx.try_recv() {
                        Err(TryRecvError::Empty) => {}
                        _ => break,
                    }
                    match samples_rx.recv_timeout(POLL_INTERVAL) {
                        Ok(interleaved) => {
                            for packet in encoder.push(&downmix(&interleaved, channels)) {
                                on_packet(packet);
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                if let Err(e) = stream.pause() {
                    tracing::warn!("Failed to pause input stream: {}", e);
                }
                tracing::debug!("mic capture thread finished");
            })
            .context("Failed to spawn capture thread")?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                stop: Some(stop_tx),
                handle: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(anyhow::anyhow!("Capture thread exited before the stream started"))
            }
        }
    }

    /// Stops the stream and joins the capture thread. Safe to call twice.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("mic capture thread panicked");
            }
        }
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_input(
    device_name: Option<&str>,
    samples_tx: mpsc::SyncSender<Vec<f32>>,
) -> anyhow::Result<(cpal::Stream, usize, FrameEncoder)> {
    let input = crate::device::get_or_default_input(device_name)?;
    let default_config = input
        .default_input_config()
        .context("Failed to get default input config")?;
    let input_config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(INPUT_CHUNK_SIZE as u32)),
    };
    tracing::info!("input: device={:?}, config={:?}", input.name().ok(), &input_config);

    let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
        if let Err(e) = samples_tx.try_send(data.to_vec()) {
            tracing::warn!("Dropping captured audio: {:?}", e);
        }
    };
    let stream = input
        .build_input_stream(
            &input_config,
            input_data_fn,
            move |err| tracing::error!("an error occurred on input stream: {}", err),
            None,
        )
        .context("Failed to build input stream")?;
    stream.play().context("Failed to start input stream")?;

    let encoder = FrameEncoder::new(input_config.sample_rate.0 as f64, INPUT_CHUNK_SIZE)?;
    Ok((stream, input_config.channels as usize, encoder))
}
