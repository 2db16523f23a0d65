// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Audio stream shape descriptors.

use serde::{Deserialize, Serialize};

use crate::core::{Result, StreamError};

/// Sample encoding of one channel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    /// Signed 16-bit little-endian linear PCM.
    S16Le,
    /// 32-bit float little-endian linear PCM.
    F32Le,
    /// 8-bit G.711 mu-law.
    MuLaw,
    /// 8-bit G.711 A-law.
    ALaw,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::S16Le => 2,
            SampleFormat::F32Le => 4,
            SampleFormat::MuLaw | SampleFormat::ALaw => 1,
        }
    }

    pub fn is_linear_pcm(self) -> bool {
        matches!(self, SampleFormat::S16Le | SampleFormat::F32Le)
    }
}

/// Interleaved audio stream shape. One packet is one frame (one sample per
/// channel), as for any linear PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioStreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

impl AudioStreamFormat {
    pub fn new(sample_rate: u32, channels: u16, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            sample_format,
        }
    }

    /// Mono signed 16-bit PCM, the usual microphone capture shape.
    pub fn mono_s16(sample_rate: u32) -> Self {
        Self::new(sample_rate, 1, SampleFormat::S16Le)
    }

    pub fn bits_per_channel(&self) -> u32 {
        self.sample_format.bytes_per_sample() as u32 * 8
    }

    pub fn bytes_per_packet(&self) -> usize {
        self.channels as usize * self.sample_format.bytes_per_sample()
    }

    /// Same shape at a different rate.
    pub fn with_sample_rate(&self, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..*self
        }
    }

    pub fn with_sample_format(&self, sample_format: SampleFormat) -> Self {
        Self {
            sample_format,
            ..*self
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(StreamError::Configuration(
                "Audio sample rate must be non-zero".into(),
            ));
        }
        if self.channels == 0 || self.channels > 8 {
            return Err(StreamError::Configuration(format!(
                "Unsupported channel count: {} (supported: 1-8)",
                self.channels
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_size_follows_channels_and_format() {
        assert_eq!(AudioStreamFormat::mono_s16(16_000).bytes_per_packet(), 2);
        assert_eq!(
            AudioStreamFormat::new(48_000, 2, SampleFormat::F32Le).bytes_per_packet(),
            8
        );
        assert_eq!(
            AudioStreamFormat::new(8_000, 1, SampleFormat::MuLaw).bits_per_channel(),
            8
        );
    }

    #[test]
    fn test_with_sample_rate_keeps_shape() {
        let src = AudioStreamFormat::new(44_100, 2, SampleFormat::S16Le);
        let dst = src.with_sample_rate(8_000);
        assert_eq!(dst.channels, 2);
        assert_eq!(dst.sample_format, SampleFormat::S16Le);
        assert_eq!(dst.sample_rate, 8_000);
    }

    #[test]
    fn test_validate_rejects_degenerate_shapes() {
        assert!(AudioStreamFormat::mono_s16(0).validate().is_err());
        assert!(AudioStreamFormat::new(8_000, 0, SampleFormat::S16Le)
            .validate()
            .is_err());
        assert!(AudioStreamFormat::new(8_000, 9, SampleFormat::S16Le)
            .validate()
            .is_err());
        assert!(AudioStreamFormat::mono_s16(8_000).validate().is_ok());
    }
}
