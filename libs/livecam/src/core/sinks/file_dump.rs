// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Raw byte dumps of the produced streams.
//!
//! Video lands as a playable Annex B `.h264` elementary stream, audio as
//! headerless samples in the destination format.

use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::MediaSink;
use crate::core::frames::{EncodedVideoPayload, ResampledAudioPayload};
use crate::core::{Result, StreamError};

struct DumpFile {
    writer: Mutex<BufWriter<File>>,
    label: &'static str,
}

impl DumpFile {
    fn create(path: &Path, label: &'static str) -> Result<Self> {
        let file = File::create(path).map_err(|e| {
            StreamError::Runtime(format!(
                "Failed to create {} dump {}: {}",
                label,
                path.display(),
                e
            ))
        })?;
        tracing::info!("[FileDumpSink] Writing {} to {}", label, path.display());
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            label,
        })
    }

    fn append(&self, bytes: &[u8]) {
        if let Err(e) = self.writer.lock().write_all(bytes) {
            tracing::warn!("[FileDumpSink] Failed to append {}: {}", self.label, e);
        }
    }

    fn flush(&self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }
}

/// Appends encoded video and resampled audio bytes to files.
pub struct FileDumpSink {
    video: Option<DumpFile>,
    audio: Option<DumpFile>,
}

impl FileDumpSink {
    /// Each path is optional; a stream without a path is ignored.
    pub fn create(video_path: Option<&Path>, audio_path: Option<&Path>) -> Result<Self> {
        Ok(Self {
            video: video_path
                .map(|p| DumpFile::create(p, "video"))
                .transpose()?,
            audio: audio_path
                .map(|p| DumpFile::create(p, "audio"))
                .transpose()?,
        })
    }

    pub fn flush(&self) -> Result<()> {
        for dump in [&self.video, &self.audio].into_iter().flatten() {
            dump.flush()?;
        }
        Ok(())
    }
}

impl MediaSink for FileDumpSink {
    fn on_encoded_video_payload(&self, payload: EncodedVideoPayload) {
        if let Some(video) = &self.video {
            video.append(&payload.data);
        }
    }

    fn on_resampled_audio_payload(&self, payload: ResampledAudioPayload) {
        if let Some(audio) = &self.audio {
            audio.append(&payload.data);
        }
    }
}

impl Drop for FileDumpSink {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!("[FileDumpSink] Flush on drop failed: {}", e);
        }
    }
}
