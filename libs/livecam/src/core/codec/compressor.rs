// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Interface of the external H.264 encoder.
//!
//! The encoder itself (hardware or software) lives outside this crate. A
//! [`VideoEncodeSession`](super::VideoEncodeSession) drives it through these
//! traits and receives compressed access units through the output handler it
//! registers at creation time. The handler is a closure owning whatever it
//! needs, so the encoder may call it from any thread.

use bytes::Bytes;
use std::sync::Arc;

use super::H264Profile;
use crate::core::frames::RawVideoFrame;
use crate::core::{MediaTime, Result};

/// Out-of-band decoder configuration for one encoded stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct H264FormatDescription {
    pub width: u32,
    pub height: u32,
    /// Parameter set slots in encoder order: SPS first, PPS second. Further
    /// slots are ignored.
    pub parameter_sets: Vec<Bytes>,
}

impl H264FormatDescription {
    pub fn new(width: u32, height: u32, parameter_sets: Vec<Bytes>) -> Self {
        Self {
            width,
            height,
            parameter_sets,
        }
    }

    pub fn sps(&self) -> Option<&Bytes> {
        self.parameter_sets.first()
    }

    pub fn pps(&self) -> Option<&Bytes> {
        self.parameter_sets.get(1)
    }
}

/// One encoder output event.
#[derive(Debug, Clone)]
pub struct CompressedAccessUnit {
    /// AVCC payload: 4-byte big-endian length prefix before each NAL unit.
    pub data: Bytes,
    pub pts: MediaTime,
    /// The per-sample "depends on others" attachment. `None` when the encoder
    /// attached nothing.
    pub depends_on_others: Option<bool>,
    pub format: Option<H264FormatDescription>,
}

impl CompressedAccessUnit {
    /// A sample is a sync sample unless it explicitly depends on others.
    pub fn is_keyframe(&self) -> bool {
        !self.depends_on_others.unwrap_or(false)
    }
}

/// Encoder session properties applied before the first frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompressionProperty {
    RealTime(bool),
    ProfileLevel(H264Profile),
    MaxKeyFrameInterval(u32),
    AverageBitRate(u32),
    ExpectedFrameRate(f64),
}

impl CompressionProperty {
    pub fn key(&self) -> &'static str {
        match self {
            CompressionProperty::RealTime(_) => "RealTime",
            CompressionProperty::ProfileLevel(_) => "ProfileLevel",
            CompressionProperty::MaxKeyFrameInterval(_) => "MaxKeyFrameInterval",
            CompressionProperty::AverageBitRate(_) => "AverageBitRate",
            CompressionProperty::ExpectedFrameRate(_) => "ExpectedFrameRate",
        }
    }
}

/// Called by the encoder, possibly on its own thread, once per access unit
/// or per failed frame.
pub type CompressionOutputHandler = Arc<dyn Fn(Result<CompressedAccessUnit>) + Send + Sync>;

/// A live encoder instance with fixed frame dimensions.
pub trait CompressionSession: Send {
    fn set_property(&mut self, property: CompressionProperty) -> Result<()>;

    /// Allocate encoder resources once all properties are set.
    fn prepare_to_encode(&mut self) -> Result<()>;

    /// Submit one frame. Output arrives later through the handler.
    fn encode_frame(&mut self, frame: &RawVideoFrame) -> Result<()>;

    /// Block until every submitted frame has produced its output.
    fn complete_frames(&mut self) -> Result<()>;

    /// Release the encoder. No output is delivered afterwards.
    fn invalidate(&mut self);
}

/// Factory for encoder instances.
pub trait H264Compressor: Send + Sync {
    fn create_session(
        &self,
        width: u32,
        height: u32,
        output: CompressionOutputHandler,
    ) -> Result<Box<dyn CompressionSession>>;
}
