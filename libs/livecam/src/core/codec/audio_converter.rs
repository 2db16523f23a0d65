// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Pull-style audio format converters.
//!
//! A converter consumes a fixed number of source packets per pull and returns
//! whatever destination bytes that produced. [`ResampleEngine`] decides when
//! input is available; converters never see the ring buffer.
//!
//! [`ResampleEngine`]: super::ResampleEngine

use dasp::Sample;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use serde::{Deserialize, Serialize};

use crate::core::frames::{AudioStreamFormat, SampleFormat};
use crate::core::{Result, StreamError};

/// Quality presets for audio resampling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResamplingQuality {
    High,
    #[default]
    Medium,
    Low,
}

impl ResamplingQuality {
    /// Convert quality preset to rubato interpolation parameters
    pub fn to_parameters(&self) -> SincInterpolationParameters {
        match self {
            ResamplingQuality::High => SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Cubic,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            },
            ResamplingQuality::Medium => SincInterpolationParameters {
                sinc_len: 128,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 128,
                window: WindowFunction::BlackmanHarris2,
            },
            ResamplingQuality::Low => SincInterpolationParameters {
                sinc_len: 64,
                f_cutoff: 0.90,
                interpolation: SincInterpolationType::Nearest,
                oversampling_factor: 64,
                window: WindowFunction::Blackman,
            },
        }
    }
}

/// Everything needed to build one converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConverterSpec {
    pub source: AudioStreamFormat,
    pub destination: AudioStreamFormat,
    pub packets_per_pull: usize,
    pub quality: ResamplingQuality,
}

pub trait AudioConverter: Send {
    fn source_format(&self) -> &AudioStreamFormat;

    fn destination_format(&self) -> &AudioStreamFormat;

    /// Source packets one [`convert`](Self::convert) call consumes.
    fn input_packets_per_pull(&self) -> usize;

    /// Convert exactly `input_packets_per_pull()` source packets.
    fn convert(&mut self, input: &[u8]) -> Result<Vec<u8>>;

    /// Drop filter history, as after a discontinuity.
    fn reset(&mut self);
}

/// Builds converters for a session once its source format is known.
pub trait AudioConverterFactory: Send + Sync {
    fn create(&self, spec: &ConverterSpec) -> Result<Box<dyn AudioConverter>>;
}

/// Default factory: rubato sinc resampling, or a plain sample format
/// conversion when the rates already match.
#[derive(Debug, Clone, Copy, Default)]
pub struct SincConverterFactory;

impl AudioConverterFactory for SincConverterFactory {
    fn create(&self, spec: &ConverterSpec) -> Result<Box<dyn AudioConverter>> {
        validate_spec(spec)?;

        if spec.source.sample_rate == spec.destination.sample_rate {
            tracing::debug!(
                "[AudioConverter] {} Hz in and out, using passthrough",
                spec.source.sample_rate
            );
            return Ok(Box::new(PassthroughConverter { spec: *spec }));
        }

        Ok(Box::new(SincConverter::new(*spec)?))
    }
}

fn validate_spec(spec: &ConverterSpec) -> Result<()> {
    spec.source.validate()?;
    spec.destination.validate()?;

    if spec.source.channels != spec.destination.channels {
        return Err(StreamError::Configuration(format!(
            "Channel conversion not supported: {} -> {}",
            spec.source.channels, spec.destination.channels
        )));
    }
    for format in [&spec.source, &spec.destination] {
        if !format.sample_format.is_linear_pcm() {
            return Err(StreamError::Configuration(format!(
                "Converter needs linear PCM, got {:?}",
                format.sample_format
            )));
        }
    }
    if spec.packets_per_pull == 0 {
        return Err(StreamError::Configuration(
            "Packets per pull must be at least 1".into(),
        ));
    }
    Ok(())
}

/// Decode interleaved linear PCM bytes into normalized samples.
pub fn decode_samples(bytes: &[u8], format: SampleFormat) -> Result<Vec<f32>> {
    match format {
        SampleFormat::S16Le => Ok(bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]).to_sample::<f32>())
            .collect()),
        SampleFormat::F32Le => Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()),
        other => Err(StreamError::NotSupported(format!(
            "Cannot decode {:?} as linear PCM",
            other
        ))),
    }
}

/// Encode normalized samples as interleaved linear PCM bytes.
pub fn encode_samples(samples: &[f32], format: SampleFormat) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(samples.len() * format.bytes_per_sample());
    match format {
        SampleFormat::S16Le => {
            for s in samples {
                out.extend_from_slice(&s.clamp(-1.0, 1.0).to_sample::<i16>().to_le_bytes());
            }
        }
        SampleFormat::F32Le => {
            for s in samples {
                out.extend_from_slice(&s.to_le_bytes());
            }
        }
        other => {
            return Err(StreamError::NotSupported(format!(
                "Cannot encode {:?} as linear PCM",
                other
            )));
        }
    }
    Ok(out)
}

fn check_pull_size(spec: &ConverterSpec, input: &[u8]) -> Result<()> {
    let expected = spec.packets_per_pull * spec.source.bytes_per_packet();
    if input.len() != expected {
        return Err(StreamError::TransientEncode(format!(
            "Converter expects {} bytes per pull, got {}",
            expected,
            input.len()
        )));
    }
    Ok(())
}

/// Same rate in and out: only the sample encoding may change.
struct PassthroughConverter {
    spec: ConverterSpec,
}

impl AudioConverter for PassthroughConverter {
    fn source_format(&self) -> &AudioStreamFormat {
        &self.spec.source
    }

    fn destination_format(&self) -> &AudioStreamFormat {
        &self.spec.destination
    }

    fn input_packets_per_pull(&self) -> usize {
        self.spec.packets_per_pull
    }

    fn convert(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        check_pull_size(&self.spec, input)?;
        if self.spec.source.sample_format == self.spec.destination.sample_format {
            return Ok(input.to_vec());
        }
        let samples = decode_samples(input, self.spec.source.sample_format)?;
        encode_samples(&samples, self.spec.destination.sample_format)
    }

    fn reset(&mut self) {}
}

/// Interleaved multi-channel sinc resampler over rubato.
struct SincConverter {
    spec: ConverterSpec,
    resampler: SincFixedIn<f32>,
    channels: usize,
    planar_input: Vec<Vec<f32>>,
}

impl SincConverter {
    fn new(spec: ConverterSpec) -> Result<Self> {
        let channels = spec.source.channels as usize;
        let ratio = spec.destination.sample_rate as f64 / spec.source.sample_rate as f64;

        let resampler = SincFixedIn::<f32>::new(
            ratio,
            2.0,
            spec.quality.to_parameters(),
            spec.packets_per_pull,
            channels,
        )
        .map_err(|e| {
            StreamError::Configuration(format!(
                "Failed to create {}-channel resampler {} -> {} Hz: {:?}",
                channels, spec.source.sample_rate, spec.destination.sample_rate, e
            ))
        })?;

        tracing::info!(
            "[AudioConverter] Sinc resampler {} -> {} Hz, {} channel(s), {} packets per pull, {:?} quality",
            spec.source.sample_rate,
            spec.destination.sample_rate,
            channels,
            spec.packets_per_pull,
            spec.quality
        );

        Ok(Self {
            spec,
            resampler,
            channels,
            planar_input: vec![Vec::with_capacity(spec.packets_per_pull); channels],
        })
    }
}

impl AudioConverter for SincConverter {
    fn source_format(&self) -> &AudioStreamFormat {
        &self.spec.source
    }

    fn destination_format(&self) -> &AudioStreamFormat {
        &self.spec.destination
    }

    fn input_packets_per_pull(&self) -> usize {
        self.resampler.input_frames_next()
    }

    fn convert(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        check_pull_size(&self.spec, input)?;
        let interleaved = decode_samples(input, self.spec.source.sample_format)?;

        for channel in &mut self.planar_input {
            channel.clear();
        }
        for frame in interleaved.chunks_exact(self.channels) {
            for (ch_idx, &sample) in frame.iter().enumerate() {
                self.planar_input[ch_idx].push(sample);
            }
        }

        let planar_output = self
            .resampler
            .process(&self.planar_input, None)
            .map_err(|e| StreamError::TransientEncode(format!("Resampling failed: {:?}", e)))?;

        let frames_out = planar_output.first().map_or(0, |ch| ch.len());
        let mut interleaved_output = Vec::with_capacity(frames_out * self.channels);
        for i in 0..frames_out {
            for channel in planar_output.iter().take(self.channels) {
                interleaved_output.push(channel[i]);
            }
        }

        encode_samples(&interleaved_output, self.spec.destination.sample_format)
    }

    fn reset(&mut self) {
        self.resampler.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(src_rate: u32, dst_rate: u32, packets: usize) -> ConverterSpec {
        ConverterSpec {
            source: AudioStreamFormat::mono_s16(src_rate),
            destination: AudioStreamFormat::mono_s16(dst_rate),
            packets_per_pull: packets,
            quality: ResamplingQuality::Low,
        }
    }

    fn sine_s16(frames: usize, rate: f32) -> Vec<u8> {
        (0..frames)
            .map(|i| ((i as f32 * 440.0 * std::f32::consts::TAU / rate).sin() * 8000.0) as i16)
            .flat_map(|s| s.to_le_bytes())
            .collect()
    }

    #[test]
    fn test_downsample_halves_output() {
        let mut converter = SincConverterFactory.create(&spec(16_000, 8_000, 256)).unwrap();
        assert_eq!(converter.input_packets_per_pull(), 256);

        let input = sine_s16(256, 16_000.0);
        let mut total = 0;
        for _ in 0..4 {
            total += converter.convert(&input).unwrap().len();
        }
        // 4 pulls of 256 frames at ratio 0.5, 2 bytes per frame.
        let expected = 4 * 128 * 2;
        assert!(
            total.abs_diff(expected) <= 32,
            "expected about {} bytes, got {}",
            expected,
            total
        );
    }

    #[test]
    fn test_equal_rates_pass_through() {
        let mut converter = SincConverterFactory.create(&spec(8_000, 8_000, 4)).unwrap();
        let input = [1u8, 0, 2, 0, 3, 0, 4, 0];
        assert_eq!(converter.convert(&input).unwrap(), input.to_vec());
    }

    #[test]
    fn test_equal_rates_change_sample_format() {
        let mut s = spec(8_000, 8_000, 2);
        s.destination = s.destination.with_sample_format(SampleFormat::F32Le);
        let mut converter = SincConverterFactory.create(&s).unwrap();

        let input: Vec<u8> = [0i16, i16::MIN].iter().flat_map(|v| v.to_le_bytes()).collect();
        let out = converter.convert(&input).unwrap();
        let samples = decode_samples(&out, SampleFormat::F32Le).unwrap();
        assert_eq!(samples, vec![0.0, -1.0]);
    }

    #[test]
    fn test_wrong_pull_size_is_transient() {
        let mut converter = SincConverterFactory.create(&spec(48_000, 8_000, 64)).unwrap();
        assert!(matches!(
            converter.convert(&[0u8; 10]),
            Err(StreamError::TransientEncode(_))
        ));
    }

    #[test]
    fn test_unsupported_specs_are_configuration_errors() {
        let mut companded = spec(16_000, 8_000, 256);
        companded.source = companded.source.with_sample_format(SampleFormat::MuLaw);
        assert!(matches!(
            SincConverterFactory.create(&companded),
            Err(StreamError::Configuration(_))
        ));

        let mut remix = spec(16_000, 8_000, 256);
        remix.destination.channels = 2;
        assert!(SincConverterFactory.create(&remix).is_err());

        assert!(SincConverterFactory.create(&spec(0, 8_000, 256)).is_err());
        assert!(SincConverterFactory.create(&spec(16_000, 8_000, 0)).is_err());
    }
}
