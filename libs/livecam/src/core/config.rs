// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Pipeline configuration via `livecam.yaml`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::codec::{AudioCodec, H264Profile, ResamplingQuality};
use crate::core::frames::SampleFormat;
use crate::core::{Result, StreamError};

/// What a bounded queue does when a submit finds it full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Reject the new item.
    DropNewest,
    /// Evict the oldest queued item to make room.
    DropOldest,
    /// Wait up to `timeout_ms` for room, then reject.
    Block { timeout_ms: u64 },
}

/// Serial task queue sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// `None` is unbounded.
    #[serde(default)]
    pub capacity: Option<usize>,
    pub overflow: OverflowPolicy,
}

impl QueueConfig {
    pub fn bounded(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            capacity: Some(capacity),
            overflow,
        }
    }

    pub fn unbounded() -> Self {
        Self {
            capacity: None,
            overflow: OverflowPolicy::DropNewest,
        }
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        if self.capacity == Some(0) {
            return Err(StreamError::Configuration(format!(
                "Queue '{}' capacity must be non-zero",
                name
            )));
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::bounded(64, OverflowPolicy::DropOldest)
    }
}

/// Video encode session configuration. Frame dimensions are not part of it:
/// they come from the first frame a session sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoEncoderConfig {
    pub profile: H264Profile,
    /// Ask the encoder to favour latency over throughput.
    pub real_time: bool,
    /// Maximum distance between keyframes, in access units.
    pub max_keyframe_interval: u32,
    /// Target average bitrate in bits per second.
    pub average_bitrate_bps: u32,
    pub expected_frame_rate: Option<f64>,
    /// Prefix every NAL unit with a start code, not only the parameter sets.
    pub insert_unit_start_codes: bool,
    pub queue: QueueConfig,
}

impl Default for VideoEncoderConfig {
    fn default() -> Self {
        Self {
            profile: H264Profile::Baseline,
            real_time: true,
            max_keyframe_interval: 10,
            average_bitrate_bps: 512 * 1024,
            expected_frame_rate: None,
            insert_unit_start_codes: false,
            queue: QueueConfig::bounded(32, OverflowPolicy::DropOldest),
        }
    }
}

impl VideoEncoderConfig {
    pub fn with_profile(mut self, profile: H264Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_real_time(mut self, enabled: bool) -> Self {
        self.real_time = enabled;
        self
    }

    pub fn with_keyframe_interval(mut self, access_units: u32) -> Self {
        self.max_keyframe_interval = access_units;
        self
    }

    pub fn with_bitrate(mut self, bitrate_bps: u32) -> Self {
        self.average_bitrate_bps = bitrate_bps;
        self
    }

    pub fn with_expected_frame_rate(mut self, fps: f64) -> Self {
        self.expected_frame_rate = Some(fps);
        self
    }

    pub fn with_unit_start_codes(mut self, enabled: bool) -> Self {
        self.insert_unit_start_codes = enabled;
        self
    }

    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_keyframe_interval == 0 {
            return Err(StreamError::Configuration(
                "Max keyframe interval must be at least 1".into(),
            ));
        }
        if self.average_bitrate_bps == 0 {
            return Err(StreamError::Configuration(
                "Average bitrate must be non-zero".into(),
            ));
        }
        if let Some(fps) = self.expected_frame_rate {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(StreamError::Configuration(format!(
                    "Expected frame rate must be positive, got {}",
                    fps
                )));
            }
        }
        self.queue.validate("video-encode")
    }
}

/// What happens to source bytes a resample pass could not consume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeftoverPolicy {
    /// Drop them; the ring buffer is empty after every pass.
    #[default]
    Discard,
    /// Keep them at the front of the ring for the next pass.
    CarryOver,
}

/// What happens when a frame arrives in a different format than the one the
/// session was configured from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatChangePolicy {
    /// Drop the frame.
    #[default]
    Reject,
    /// Rebuild the converter from the new frame's format.
    Recreate,
}

/// Audio resample session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioResamplerConfig {
    pub destination_sample_rate: u32,
    /// Sample encoding the converter produces. Companding to G.711 happens
    /// afterwards, see `output_codec`.
    pub destination_sample_format: SampleFormat,
    /// Ring buffer size in bytes. Must hold one capture callback's worth of
    /// input.
    pub ring_capacity_bytes: usize,
    /// Source packets requested per converter pull.
    pub packets_per_pull: usize,
    pub quality: ResamplingQuality,
    pub leftover: LeftoverPolicy,
    pub format_change: FormatChangePolicy,
    pub output_codec: AudioCodec,
    pub queue: QueueConfig,
}

impl Default for AudioResamplerConfig {
    fn default() -> Self {
        Self {
            destination_sample_rate: 8_000,
            destination_sample_format: SampleFormat::S16Le,
            ring_capacity_bytes: 2048 * 10,
            packets_per_pull: 256,
            quality: ResamplingQuality::Medium,
            leftover: LeftoverPolicy::Discard,
            format_change: FormatChangePolicy::Reject,
            output_codec: AudioCodec::Pcm,
            queue: QueueConfig::bounded(64, OverflowPolicy::DropOldest),
        }
    }
}

impl AudioResamplerConfig {
    pub fn new(destination_sample_rate: u32) -> Self {
        Self {
            destination_sample_rate,
            ..Default::default()
        }
    }

    pub fn with_ring_capacity(mut self, bytes: usize) -> Self {
        self.ring_capacity_bytes = bytes;
        self
    }

    pub fn with_packets_per_pull(mut self, packets: usize) -> Self {
        self.packets_per_pull = packets;
        self
    }

    pub fn with_quality(mut self, quality: ResamplingQuality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_leftover(mut self, policy: LeftoverPolicy) -> Self {
        self.leftover = policy;
        self
    }

    pub fn with_format_change(mut self, policy: FormatChangePolicy) -> Self {
        self.format_change = policy;
        self
    }

    pub fn with_output_codec(mut self, codec: AudioCodec) -> Self {
        self.output_codec = codec;
        self
    }

    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.destination_sample_rate == 0 {
            return Err(StreamError::Configuration(
                "Destination sample rate must be non-zero".into(),
            ));
        }
        if !self.destination_sample_format.is_linear_pcm() {
            return Err(StreamError::Configuration(format!(
                "Converter output must be linear PCM, got {:?}",
                self.destination_sample_format
            )));
        }
        if self.ring_capacity_bytes == 0 {
            return Err(StreamError::Configuration(
                "Ring buffer capacity must be non-zero".into(),
            ));
        }
        if self.packets_per_pull == 0 {
            return Err(StreamError::Configuration(
                "Packets per pull must be at least 1".into(),
            ));
        }
        if self.output_codec != AudioCodec::Pcm
            && self.destination_sample_format != SampleFormat::S16Le
        {
            return Err(StreamError::Configuration(format!(
                "{:?} output requires s16_le converter output, got {:?}",
                self.output_codec, self.destination_sample_format
            )));
        }
        self.queue.validate("audio-resample")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub level: String,
    pub with_thread_names: bool,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            with_thread_names: true,
            ansi: true,
        }
    }
}

/// Top-level configuration from `livecam.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub video: VideoEncoderConfig,
    pub audio: AudioResamplerConfig,
    /// Queue between the capture callbacks and the per-session workers.
    pub demux_queue: QueueConfig,
    pub logging: LoggingConfig,
    /// Emit sample containers alongside byte payloads.
    pub emit_sample_containers: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            video: VideoEncoderConfig::default(),
            audio: AudioResamplerConfig::default(),
            demux_queue: QueueConfig::bounded(128, OverflowPolicy::DropOldest),
            logging: LoggingConfig::default(),
            emit_sample_containers: true,
        }
    }
}

impl PipelineConfig {
    /// Configuration file name.
    pub const FILE_NAME: &'static str = "livecam.yaml";

    /// Load configuration from a directory. Fails if the file is missing,
    /// unparseable or invalid.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            StreamError::Configuration(format!("Failed to read {}: {}", config_path.display(), e))
        })?;

        let config = Self::from_yaml_str(&content).map_err(|e| {
            StreamError::Configuration(format!("{}: {}", config_path.display(), e))
        })?;

        tracing::info!("Loaded pipeline config from {}", config_path.display());
        Ok(config)
    }

    /// Load configuration from a directory, returning defaults if the file is
    /// missing or unusable.
    pub fn load_or_default(dir: &Path) -> Self {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            tracing::debug!(
                "No {} found in {}, using defaults",
                Self::FILE_NAME,
                dir.display()
            );
            return Self::default();
        }

        match Self::load(dir) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Parse and validate inline YAML. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| StreamError::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| StreamError::Configuration(format!("Failed to serialize config: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        self.video.validate()?;
        self.audio.validate()?;
        self.demux_queue.validate("demux")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_defaults_match_live_policy() {
        let video = VideoEncoderConfig::default();
        assert_eq!(video.profile, H264Profile::Baseline);
        assert!(video.real_time);
        assert_eq!(video.max_keyframe_interval, 10);
        assert_eq!(video.average_bitrate_bps, 524_288);
        assert!(!video.insert_unit_start_codes);
        assert_eq!(video.queue.capacity, Some(32));
    }

    #[test]
    fn test_audio_defaults() {
        let audio = AudioResamplerConfig::default();
        assert_eq!(audio.destination_sample_rate, 8_000);
        assert_eq!(audio.ring_capacity_bytes, 20_480);
        assert_eq!(audio.leftover, LeftoverPolicy::Discard);
        assert_eq!(audio.format_change, FormatChangePolicy::Reject);
        assert_eq!(audio.output_codec, AudioCodec::Pcm);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
video:
  average_bitrate_bps: 1000000
  queue:
    capacity: 4
    overflow:
      policy: block
      timeout_ms: 20
audio:
  destination_sample_rate: 16000
  leftover: carry_over
  output_codec: mu_law
emit_sample_containers: false
"#;
        let config = PipelineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.video.average_bitrate_bps, 1_000_000);
        assert_eq!(config.video.max_keyframe_interval, 10);
        assert_eq!(
            config.video.queue,
            QueueConfig::bounded(4, OverflowPolicy::Block { timeout_ms: 20 })
        );
        assert_eq!(config.audio.destination_sample_rate, 16_000);
        assert_eq!(config.audio.leftover, LeftoverPolicy::CarryOver);
        assert_eq!(config.audio.output_codec, AudioCodec::MuLaw);
        assert_eq!(config.audio.packets_per_pull, 256);
        assert!(!config.emit_sample_containers);
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        let err = PipelineConfig::from_yaml_str("audio:\n  destination_sample_rate: 0\n")
            .unwrap_err();
        assert!(matches!(err, StreamError::Configuration(_)));

        let err = PipelineConfig::from_yaml_str("video:\n  max_keyframe_interval: 0\n")
            .unwrap_err();
        assert!(err.is_fatal());

        let companded_float = AudioResamplerConfig::default()
            .with_output_codec(AudioCodec::ALaw);
        let companded_float = AudioResamplerConfig {
            destination_sample_format: SampleFormat::F32Le,
            ..companded_float
        };
        assert!(companded_float.validate().is_err());
    }

    #[test]
    fn test_yaml_round_trip_preserves_config() {
        let config = PipelineConfig {
            video: VideoEncoderConfig::default().with_expected_frame_rate(30.0),
            ..Default::default()
        };
        let yaml = config.to_yaml_string().unwrap();
        assert_eq!(PipelineConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}
