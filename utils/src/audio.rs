use base64::Engine;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Frames handed to the resampler per call.
pub const RESAMPLER_CHUNK_SIZE: usize = 1024;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> Result<FastFixedIn<f32>, rubato::ResamplerConstructionError> {
    FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )
}

/// Mono resampler that accepts arbitrarily sized input.
///
/// Samples are buffered until a full chunk is available, so short inputs
/// produce no output until enough audio has arrived.
pub struct ChunkedResampler {
    resampler: Option<FastFixedIn<f32>>,
    chunk_size: usize,
    pending: Vec<f32>,
}

impl ChunkedResampler {
    pub fn new(
        in_rate: u32,
        out_rate: u32,
        chunk_size: usize,
    ) -> Result<Self, rubato::ResamplerConstructionError> {
        let resampler = if in_rate == out_rate {
            None
        } else {
            Some(create_resampler(in_rate as f64, out_rate as f64, chunk_size)?)
        };
        Ok(Self {
            resampler,
            chunk_size,
            pending: Vec::with_capacity(chunk_size * 2),
        })
    }

    pub fn push(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(resampler) = self.resampler.as_mut() else {
            return samples.to_vec();
        };
        self.pending.extend_from_slice(samples);
        let mut out = Vec::new();
        while self.pending.len() >= self.chunk_size {
            let chunk: Vec<f32> = self.pending.drain(..self.chunk_size).collect();
            match resampler.process(&[chunk.as_slice()], None) {
                Ok(mut resampled) => out.append(&mut resampled[0]),
                Err(e) => tracing::error!("failed to resample audio: {}", e),
            }
        }
        out
    }

    /// Discards buffered input that has not been resampled yet.
    pub fn reset(&mut self) {
        self.pending.clear();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Averages interleaved frames down to one channel.
pub fn mix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Decodes a base64 string representing PCM16 audio into f32 samples in [-1.0, 1.0].
pub fn decode_f32(base64_fragment: &str) -> Vec<f32> {
    convert_i16_to_f32(&decode_i16(base64_fragment))
}

/// Decodes a base64 string into a vector of i16 PCM values.
pub fn decode_i16(base64_fragment: &str) -> Vec<i16> {
    if let Ok(pcm16) = base64::engine::general_purpose::STANDARD.decode(base64_fragment) {
        pcm16
            .chunks_exact(2)
            .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
            .collect()
    } else {
        tracing::error!("Failed to decode base64 fragment");
        Vec::new()
    }
}

/// Encodes a slice of i16 samples into a base64 string.
pub fn encode_i16(pcm16: &[i16]) -> String {
    let pcm16: Vec<u8> = pcm16.to_binary();
    base64::engine::general_purpose::STANDARD.encode(&pcm16)
}

pub fn convert_f32_to_i16(pcm32: &[f32]) -> Vec<i16> {
    pcm32
        .iter()
        .map(|&sample| (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

pub fn convert_i16_to_f32(pcm16: &[i16]) -> Vec<f32> {
    pcm16
        .iter()
        .map(|&sample| sample as f32 / 32768.0)
        .collect()
}

/// A trait for converting audio sample types to a binary representation (Vec<u8>).
pub trait ToBinary {
    fn to_binary(&self) -> Vec<u8>;
}

impl ToBinary for [i16] {
    fn to_binary(&self) -> Vec<u8> {
        self.iter().flat_map(|&sample| sample.to_le_bytes()).collect()
    }
}
