// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Output handlers - consumers of pipeline output
//!
//! - **ChannelSink**: forwards everything over a crossbeam channel
//! - **FileDumpSink**: appends byte payloads to files
//! - **NullSink**: drops everything

mod file_dump;
mod media_sink;

pub use file_dump::FileDumpSink;
pub use media_sink::{ChannelSink, MediaKind, MediaOutput, MediaSink, NullSink, PipelineEvent};
