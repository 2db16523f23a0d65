// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod audio_format;
mod payload;
mod raw_frame;

pub use audio_format::{AudioStreamFormat, SampleFormat};
pub use payload::{EncodedVideoPayload, ResampledAudioPayload};
pub use raw_frame::{ImageBuffer, PixelFormat, RawAudioFrame, RawVideoFrame};
