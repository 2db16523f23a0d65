// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod buffers;
pub mod codec;
pub mod config;
pub mod error;
pub mod frames;
pub mod logging;
pub mod pipeline;
pub mod sample;
pub mod sinks;
pub mod stats;
pub mod time;
pub mod worker;

pub use buffers::*;
pub use codec::*;
pub use config::{
    AudioResamplerConfig, FormatChangePolicy, LeftoverPolicy, LoggingConfig, OverflowPolicy,
    PipelineConfig, QueueConfig, VideoEncoderConfig,
};
pub use error::*;
pub use frames::*;
pub use logging::init_logging;
pub use pipeline::LiveStreamPipeline;
pub use sample::*;
pub use sinks::*;
pub use stats::{PipelineStats, SessionStats, StatsSnapshot};
pub use time::MediaTime;
pub use worker::SerialQueue;
