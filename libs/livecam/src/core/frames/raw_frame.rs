// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Raw frames handed over by the capture collaborator.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AudioStreamFormat;
use crate::core::MediaTime;

/// Pixel layout of a captured image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Packed 8-bit BGRA.
    Bgra32,
    /// Bi-planar 4:2:0 (Y plane followed by interleaved CbCr).
    Nv12,
    /// Tri-planar 4:2:0.
    I420,
}

impl PixelFormat {
    /// Minimum byte size of a tightly packed image of this format.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        match self {
            PixelFormat::Bgra32 => w * h * 4,
            PixelFormat::Nv12 | PixelFormat::I420 => w * h + 2 * (w.div_ceil(2) * h.div_ceil(2)),
        }
    }
}

/// One captured image. Shared by reference between the encoder and any
/// sample container built from it.
#[derive(Debug, Clone)]
pub struct ImageBuffer {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

impl ImageBuffer {
    pub fn new(pixel_format: PixelFormat, width: u32, height: u32, data: impl Into<Bytes>) -> Self {
        Self {
            pixel_format,
            width,
            height,
            data: data.into(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// One captured video image with its presentation timestamp.
#[derive(Debug, Clone)]
pub struct RawVideoFrame {
    pub image: Arc<ImageBuffer>,
    pub pts: MediaTime,
}

impl RawVideoFrame {
    pub fn new(image: ImageBuffer, pts: MediaTime) -> Self {
        Self {
            image: Arc::new(image),
            pts,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// One block of interleaved raw audio samples with its presentation
/// timestamp and the shape it was captured in.
#[derive(Debug, Clone)]
pub struct RawAudioFrame {
    pub data: Bytes,
    pub format: AudioStreamFormat,
    pub pts: MediaTime,
}

impl RawAudioFrame {
    pub fn new(data: impl Into<Bytes>, format: AudioStreamFormat, pts: MediaTime) -> Self {
        Self {
            data: data.into(),
            format,
            pts,
        }
    }

    /// Whole packets contained in this frame.
    pub fn packet_count(&self) -> usize {
        match self.format.bytes_per_packet() {
            0 => 0,
            bpp => self.data.len() / bpp,
        }
    }
}
