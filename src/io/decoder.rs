use std::io::Cursor;

use thiserror::Error;

/// Decoded PCM audio: interleaved f32 samples plus rate and channel count.
#[derive(Clone, Debug, Default)]
pub struct PcmBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl PcmBuffer {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Loop length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read audio container: {0}")]
    Container(#[from] hound::Error),
    #[error("unsupported sample format: {0} bits per sample")]
    UnsupportedFormat(u16),
    #[error("decoded stream is empty")]
    Empty,
}

/// Turns raw encoded bytes into PCM the backend can loop.
pub trait Decoder {
    fn decode(&self, bytes: &[u8]) -> Result<PcmBuffer, DecodeError>;
}

/// WAV decoder over hound. Integer formats are normalized to [-1, 1].
#[derive(Clone, Copy, Debug, Default)]
pub struct WavDecoder;

impl Decoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<PcmBuffer, DecodeError> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()?,
            hound::SampleFormat::Int => {
                if spec.bits_per_sample > 32 {
                    return Err(DecodeError::UnsupportedFormat(spec.bits_per_sample));
                }
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()?
            }
        };

        if samples.is_empty() {
            return Err(DecodeError::Empty);
        }

        Ok(PcmBuffer {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }
}
