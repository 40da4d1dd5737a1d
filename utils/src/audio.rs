use std::collections::VecDeque;

use audiopus::coder::{Decoder, Encoder};
use audiopus::packet::Packet;
use audiopus::{Application, Channels, MutSignals, SampleRate};
use ringbuf::HeapRb;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Opus over WebRTC always runs at a 48 kHz clock.
pub const OPUS_SAMPLE_RATE: f64 = 48000.0;
/// 20 ms of mono audio at 48 kHz.
pub const OPUS_FRAME_SAMPLES: usize = 960;

const MAX_OPUS_FRAME_BYTES: usize = 4000;
// 120 ms at 48 kHz, the longest frame Opus produces
const MAX_DECODED_SAMPLES: usize = 5760;

pub fn create_resampler(in_sampling_rate: f64, out_sampling_rate: f64, chunk_size: usize) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

pub fn shared_buffer(size: usize) -> HeapRb<f32> {
    HeapRb::new(size)
}

/// Averages interleaved frames down to a single channel.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

pub fn convert_f32_to_i16(pcm32: &[f32]) -> Vec<i16> {
    pcm32
        .iter()
        .map(|&sample| (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

pub fn convert_i16_to_f32(pcm16: &[i16]) -> Vec<f32> {
    pcm16.iter().map(|&sample| sample as f32 / 32768.0).collect()
}

/// Streaming fixed-chunk resampler. Accepts arbitrary-sized input and keeps
/// the remainder until a full chunk is available.
pub struct StreamResampler {
    resampler: Option<FastFixedIn<f32>>,
    pending: VecDeque<f32>,
}

impl StreamResampler {
    pub fn new(in_sampling_rate: f64, out_sampling_rate: f64, chunk_size: usize) -> anyhow::Result<Self> {
        let resampler = if (in_sampling_rate - out_sampling_rate).abs() < f64::EPSILON {
            None
        } else {
            Some(create_resampler(in_sampling_rate, out_sampling_rate, chunk_size)?)
        };
        Ok(Self {
            resampler,
            pending: VecDeque::with_capacity(chunk_size * 2),
        })
    }

    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(resampler) = self.resampler.as_mut() else {
            return samples.to_vec();
        };
        self.pending.extend(samples);

        let mut out = Vec::new();
        loop {
            let chunk_size = resampler.input_frames_next();
            if self.pending.len() < chunk_size {
                break;
            }
            let chunk: Vec<f32> = self.pending.drain(..chunk_size).collect();
            match resampler.process(&[chunk.as_slice()], None) {
                Ok(resampled) => {
                    if let Some(channel) = resampled.first() {
                        out.extend_from_slice(channel);
                    }
                }
                Err(e) => tracing::error!("Failed to resample audio chunk: {:?}", e),
            }
        }
        out
    }
}

pub struct OpusEncoder {
    encoder: Encoder,
}

impl OpusEncoder {
    pub fn new() -> anyhow::Result<Self> {
        let encoder = Encoder::new(SampleRate::Hz48000, Channels::Mono, Application::Voip)?;
        Ok(Self { encoder })
    }

    /// Encodes exactly one frame of `OPUS_FRAME_SAMPLES` samples.
    pub fn encode(&mut self, frame: &[i16]) -> anyhow::Result<Vec<u8>> {
        let mut output = vec![0u8; MAX_OPUS_FRAME_BYTES];
        let len = self.encoder.encode(frame, &mut output)?;
        output.truncate(len);
        Ok(output)
    }
}

pub struct OpusDecoder {
    decoder: Decoder,
}

impl OpusDecoder {
    pub fn new() -> anyhow::Result<Self> {
        let decoder = Decoder::new(SampleRate::Hz48000, Channels::Mono)?;
        Ok(Self { decoder })
    }

    pub fn decode(&mut self, packet: &[u8]) -> anyhow::Result<Vec<i16>> {
        let mut output = vec![0i16; MAX_DECODED_SAMPLES];
        let packet = Packet::try_from(packet)?;
        let signals = MutSignals::try_from(output.as_mut_slice())?;
        let decoded = self.decoder.decode(Some(packet), signals, false)?;
        output.truncate(decoded);
        Ok(output)
    }
}

/// Turns a device-rate mono sample stream into 20 ms Opus frames.
pub struct FrameEncoder {
    resampler: StreamResampler,
    frame: Vec<f32>,
    encoder: OpusEncoder,
}

impl FrameEncoder {
    pub fn new(input_sample_rate: f64, chunk_size: usize) -> anyhow::Result<Self> {
        Ok(Self {
            resampler: StreamResampler::new(input_sample_rate, OPUS_SAMPLE_RATE, chunk_size)?,
            frame: Vec::with_capacity(OPUS_FRAME_SAMPLES * 2),
            encoder: OpusEncoder::new()?,
        })
    }

    pub fn push(&mut self, mono: &[f32]) -> Vec<Vec<u8>> {
        self.frame.extend(self.resampler.process(mono));
        let mut packets = Vec::new();
        while self.frame.len() >= OPUS_FRAME_SAMPLES {
            let samples: Vec<f32> = self.frame.drain(..OPUS_FRAME_SAMPLES).collect();
            match self.encoder.encode(&convert_f32_to_i16(&samples)) {
                Ok(packet) => packets.push(packet),
                Err(e) => tracing::error!("Failed to encode opus frame: {:?}", e),
            }
        }
        packets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_channels() {
        assert_eq!(downmix(&[0.5, -0.5, 1.0, 0.0], 2), vec![0.0, 0.5]);
        assert_eq!(downmix(&[0.25, 0.75], 1), vec![0.25, 0.75]);
    }

    #[test]
    fn pcm_conversion_clamps() {
        assert_eq!(convert_f32_to_i16(&[2.0, -2.0, 0.0]), vec![i16::MAX, i16::MIN, 0]);
        assert_eq!(convert_i16_to_f32(&[-32768]), vec![-1.0]);
    }

    #[test]
    fn same_rate_passes_through() {
        let mut resampler = StreamResampler::new(48000.0, 48000.0, 480).unwrap();
        assert_eq!(resampler.process(&[0.1, 0.2]), vec![0.1, 0.2]);
    }

    #[test]
    fn frame_encoder_emits_one_packet_per_twenty_ms() {
        let mut encoder = FrameEncoder::new(OPUS_SAMPLE_RATE, 480).unwrap();
        assert!(encoder.push(&vec![0.0; OPUS_FRAME_SAMPLES - 1]).is_empty());
        assert_eq!(encoder.push(&vec![0.0; OPUS_FRAME_SAMPLES + 1]).len(), 2);
    }

    #[test]
    fn opus_round_trip_keeps_frame_length() {
        let mut encoder = OpusEncoder::new().unwrap();
        let mut decoder = OpusDecoder::new().unwrap();
        let packet = encoder.encode(&[0i16; OPUS_FRAME_SAMPLES]).unwrap();
        assert_eq!(decoder.decode(&packet).unwrap().len(), OPUS_FRAME_SAMPLES);
    }
}
