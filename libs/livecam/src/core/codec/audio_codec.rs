// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Audio output codecs: linear PCM passthrough and G.711 companding.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::core::frames::{AudioStreamFormat, SampleFormat};

/// Audio codec applied to resampled output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    /// Resampled linear PCM as produced by the converter.
    #[default]
    Pcm,
    /// G.711 mu-law, 8 bits per sample.
    MuLaw,
    /// G.711 A-law, 8 bits per sample.
    ALaw,
}

impl AudioCodec {
    /// Shape of the stream after this codec is applied to `pcm`.
    pub fn output_format(&self, pcm: &AudioStreamFormat) -> AudioStreamFormat {
        match self {
            AudioCodec::Pcm => *pcm,
            AudioCodec::MuLaw => pcm.with_sample_format(SampleFormat::MuLaw),
            AudioCodec::ALaw => pcm.with_sample_format(SampleFormat::ALaw),
        }
    }

    /// Encode interleaved S16LE bytes. A trailing odd byte is ignored.
    pub fn encode_s16le(&self, pcm: &[u8]) -> Bytes {
        let compand: fn(i16) -> u8 = match self {
            AudioCodec::Pcm => return Bytes::copy_from_slice(pcm),
            AudioCodec::MuLaw => linear_to_mulaw,
            AudioCodec::ALaw => linear_to_alaw,
        };
        pcm.chunks_exact(2)
            .map(|b| compand(i16::from_le_bytes([b[0], b[1]])))
            .collect::<Vec<u8>>()
            .into()
    }
}

const MULAW_BIAS: i32 = 0x84;
const MULAW_CLIP: i32 = 32635;

/// Upper bound of each A-law segment, on 13-bit magnitudes.
const ALAW_SEGMENT_END: [i32; 8] = [0x1f, 0x3f, 0x7f, 0xff, 0x1ff, 0x3ff, 0x7ff, 0xfff];

pub fn linear_to_mulaw(sample: i16) -> u8 {
    let mut pcm = sample as i32;
    let sign = if pcm < 0 {
        pcm = -pcm;
        0x80
    } else {
        0
    };
    pcm = pcm.min(MULAW_CLIP) + MULAW_BIAS;

    let mut exponent = 7;
    let mut mask = 0x4000;
    while exponent > 0 && pcm & mask == 0 {
        exponent -= 1;
        mask >>= 1;
    }
    let mantissa = (pcm >> (exponent + 3)) & 0x0f;

    !((sign | (exponent << 4) | mantissa) as u8)
}

pub fn mulaw_to_linear(code: u8) -> i16 {
    let code = !code as i32;
    let exponent = (code >> 4) & 0x07;
    let mantissa = code & 0x0f;
    let magnitude = (((mantissa << 3) + MULAW_BIAS) << exponent) - MULAW_BIAS;

    if code & 0x80 != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

pub fn linear_to_alaw(sample: i16) -> u8 {
    let mut pcm = (sample as i32) >> 3;
    let mask = if pcm >= 0 {
        0xd5
    } else {
        pcm = -pcm - 1;
        0x55
    };

    let segment = ALAW_SEGMENT_END
        .iter()
        .position(|&end| pcm <= end)
        .unwrap_or(ALAW_SEGMENT_END.len());
    if segment >= ALAW_SEGMENT_END.len() {
        return (0x7f ^ mask) as u8;
    }

    let shift = if segment < 2 { 1 } else { segment };
    let code = ((segment as i32) << 4) | ((pcm >> shift) & 0x0f);
    (code ^ mask) as u8
}

pub fn alaw_to_linear(code: u8) -> i16 {
    let code = (code ^ 0x55) as i32;
    let segment = (code & 0x70) >> 4;
    let mut magnitude = (code & 0x0f) << 4;
    match segment {
        0 => magnitude += 8,
        1 => magnitude += 0x108,
        _ => magnitude = (magnitude + 0x108) << (segment - 1),
    }

    if code & 0x80 != 0 {
        magnitude as i16
    } else {
        -magnitude as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mulaw_reference_codes() {
        assert_eq!(linear_to_mulaw(0), 0xff);
        assert_eq!(linear_to_mulaw(i16::MAX), 0x80);
        assert_eq!(linear_to_mulaw(i16::MIN), 0x00);
        assert_eq!(mulaw_to_linear(0xff), 0);
    }

    #[test]
    fn test_alaw_reference_codes() {
        assert_eq!(linear_to_alaw(0), 0xd5);
        assert_eq!(linear_to_alaw(1000), 0xfa);
        assert_eq!(alaw_to_linear(0xfa), 1008);
    }

    #[test]
    fn test_companding_error_stays_within_segment_step() {
        for sample in [-4000i16, -1000, -100, 100, 1000, 4000] {
            let mu = mulaw_to_linear(linear_to_mulaw(sample));
            let a = alaw_to_linear(linear_to_alaw(sample));
            assert!((mu as i32 - sample as i32).abs() <= 128, "mu-law {sample} -> {mu}");
            assert!((a as i32 - sample as i32).abs() <= 128, "A-law {sample} -> {a}");
            assert_eq!(mu.signum(), sample.signum());
            assert_eq!(a.signum(), sample.signum());
        }
    }

    #[test]
    fn test_encode_s16le_halves_byte_count() {
        let pcm: Vec<u8> = [0i16, 1000, -1000]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .chain([0x7f])
            .collect();

        let mu = AudioCodec::MuLaw.encode_s16le(&pcm);
        assert_eq!(mu.len(), 3);
        assert_eq!(mu[0], 0xff);

        let pass = AudioCodec::Pcm.encode_s16le(&pcm);
        assert_eq!(pass.as_ref(), pcm.as_slice());
    }

    #[test]
    fn test_output_format_is_one_byte_per_sample() {
        let pcm = AudioStreamFormat::mono_s16(8_000);
        let out = AudioCodec::ALaw.output_format(&pcm);
        assert_eq!(out.sample_format, SampleFormat::ALaw);
        assert_eq!(out.bytes_per_packet(), 1);
        assert_eq!(out.sample_rate, 8_000);
    }
}
