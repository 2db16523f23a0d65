// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Self-describing timestamped media samples.

use bytes::Bytes;
use std::sync::Arc;

use crate::core::MediaTime;
use crate::core::frames::{AudioStreamFormat, ImageBuffer, PixelFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormatDescription {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatDescription {
    Video(VideoFormatDescription),
    Audio(AudioStreamFormat),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleTimingInfo {
    pub duration: MediaTime,
    pub presentation_time_stamp: MediaTime,
    pub decode_time_stamp: MediaTime,
}

impl SampleTimingInfo {
    /// Presentation time only; duration and decode time left invalid.
    pub fn presentation(pts: MediaTime) -> Self {
        Self {
            presentation_time_stamp: pts,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub enum SampleData {
    /// Reference to the captured image, not a copy.
    ImageBuffer(Arc<ImageBuffer>),
    /// Owned memory block.
    Block(Bytes),
}

/// Media sample bundling data, its format descriptor and timing, so a
/// consumer needs nothing else to interpret it.
#[derive(Debug, Clone)]
pub struct SampleContainer {
    pub format: FormatDescription,
    pub data: SampleData,
    pub timing: SampleTimingInfo,
    pub sample_count: usize,
}

impl SampleContainer {
    pub fn pts(&self) -> MediaTime {
        self.timing.presentation_time_stamp
    }

    pub fn is_video(&self) -> bool {
        matches!(self.format, FormatDescription::Video(_))
    }

    pub fn is_audio(&self) -> bool {
        matches!(self.format, FormatDescription::Audio(_))
    }

    /// Backing bytes for either variant.
    pub fn bytes(&self) -> &[u8] {
        match &self.data {
            SampleData::ImageBuffer(image) => &image.data,
            SampleData::Block(block) => block,
        }
    }

    pub fn audio_format(&self) -> Option<&AudioStreamFormat> {
        match &self.format {
            FormatDescription::Audio(format) => Some(format),
            FormatDescription::Video(_) => None,
        }
    }
}
