// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Byte payloads produced for downstream senders and recorders.

use bytes::Bytes;

use crate::core::MediaTime;

/// One reframed access unit: start-code delimited H.264 bytes.
///
/// Immutable once produced and consumed by exactly one output handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedVideoPayload {
    /// Keyframe header (if any) followed by the unit payloads.
    pub data: Bytes,

    pub pts: MediaTime,

    /// Whether this is a keyframe (sync sample, parameter header prepended).
    pub is_keyframe: bool,

    /// Sequential access unit number within the session.
    pub frame_number: u64,
}

impl EncodedVideoPayload {
    pub fn new(data: Bytes, pts: MediaTime, is_keyframe: bool, frame_number: u64) -> Self {
        Self {
            data,
            pts,
            is_keyframe,
            frame_number,
        }
    }

    /// Returns the size of the encoded data in bytes.
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Output of one resample pass, timestamped in the destination sample rate's
/// timescale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResampledAudioPayload {
    pub data: Bytes,
    pub pts: MediaTime,
}

impl ResampledAudioPayload {
    pub fn new(data: Bytes, pts: MediaTime) -> Self {
        Self { data, pts }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
