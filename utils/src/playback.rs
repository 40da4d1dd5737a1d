use std::sync::mpsc;
use std::thread::JoinHandle;

use anyhow::Context;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FrameCount, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd};

use crate::audio::{convert_i16_to_f32, shared_buffer, OpusDecoder, StreamResampler, OPUS_FRAME_SAMPLES, OPUS_SAMPLE_RATE};

const OUTPUT_CHUNK_SIZE: usize = 1024;
const OUTPUT_LATENCY_MS: usize = 1000;

/// Speaker output running on its own thread, fed through a ring buffer.
pub struct SpeakerPlayback {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    sample_rate: f64,
}

/// Decodes received Opus packets and queues them for the speaker.
pub struct PlaybackSink {
    decoder: OpusDecoder,
    resampler: StreamResampler,
    producer: HeapProd<f32>,
}

impl PlaybackSink {
    pub fn play(&mut self, packet: &[u8]) {
        let pcm = match self.decoder.decode(packet) {
            Ok(pcm) => pcm,
            Err(e) => {
                tracing::warn!("Failed to decode opus packet: {:?}", e);
                return;
            }
        };
        let samples = self.resampler.process(&convert_i16_to_f32(&pcm));
        let pushed = self.producer.push_slice(&samples);
        if pushed < samples.len() {
            tracing::warn!("Playback buffer full, dropped {} samples", samples.len() - pushed);
        }
    }
}

impl SpeakerPlayback {
    /// Opens the output device and returns the running playback together with
    /// the sink that feeds it.
    pub fn start(device_name: Option<String>) -> anyhow::Result<(Self, PlaybackSink)> {
        let (ready_tx, ready_rx) = mpsc::channel::<anyhow::Result<(f64, HeapProd<f32>)>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = std::thread::Builder::new()
            .name("speaker-playback".to_string())
            .spawn(move || {
                let stream = match open_output(device_name.as_deref()) {
                    Ok((stream, sample_rate, producer)) => {
                        let _ = ready_tx.send(Ok((sample_rate, producer)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // parked until stop is sent or the sender is dropped
                let _ = stop_rx.recv();
                if let Err(e) = stream.pause() {
                    tracing::warn!("Failed to pause output stream: {}", e);
                }
            })
            .context("Failed to spawn playback thread")?;

        let (sample_rate, producer) = match ready_rx.recv() {
            Ok(Ok(ready)) => ready,
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(anyhow::anyhow!("Playback thread exited before the stream started"));
            }
        };

        let sink = PlaybackSink {
            decoder: OpusDecoder::new()?,
            resampler: StreamResampler::new(OPUS_SAMPLE_RATE, sample_rate, OPUS_FRAME_SAMPLES)?,
            producer,
        };
        let playback = Self {
            stop: Some(stop_tx),
            handle: Some(handle),
            sample_rate,
        };
        Ok((playback, sink))
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("speaker playback thread panicked");
            }
        }
    }
}

impl Drop for SpeakerPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_output(device_name: Option<&str>) -> anyhow::Result<(cpal::Stream, f64, HeapProd<f32>)> {
    let output = crate::device::get_or_default_output(device_name)?;
    let default_config = output
        .default_output_config()
        .context("Failed to get default output config")?;
    let output_config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(OUTPUT_CHUNK_SIZE as u32)),
    };
    let output_channel_count = output_config.channels as usize;
    let output_sample_rate = output_config.sample_rate.0 as usize;
    tracing::info!("output: device={:?}, config={:?}", output.name().ok(), &output_config);

    let buffer = shared_buffer(output_sample_rate * OUTPUT_LATENCY_MS / 1000);
    let (producer, mut consumer): (HeapProd<f32>, HeapCons<f32>) = buffer.split();

    let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        // the same mono sample goes to every channel of a frame
        for frame in data.chunks_mut(output_channel_count) {
            let sample = consumer.try_pop().unwrap_or(0.0);
            frame.fill(sample);
        }
    };
    let stream = output
        .build_output_stream(
            &output_config,
            output_data_fn,
            move |err| tracing::error!("an error occurred on output stream: {}", err),
            None,
        )
        .context("Failed to build output stream")?;
    stream.play().context("Failed to start output stream")?;
    Ok((stream, output_sample_rate as f64, producer))
}
