// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use crossbeam_channel::{Receiver, Sender};

use crate::core::frames::{EncodedVideoPayload, ResampledAudioPayload};
use crate::core::sample::SampleContainer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// Pipeline-level notifications for the embedding application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A session failed to configure and will drop everything it is given.
    /// Raised once per failed session; callers should stop feeding that kind.
    Unavailable { kind: MediaKind, reason: String },
}

/// Downstream consumer of everything the pipeline produces (network sender,
/// recorder).
///
/// Methods are called from session worker threads and encoder callback
/// threads, never from the capture thread. Implementations must not block
/// for long.
pub trait MediaSink: Send + Sync {
    fn on_encoded_video_payload(&self, _payload: EncodedVideoPayload) {}

    fn on_resampled_audio_payload(&self, _payload: ResampledAudioPayload) {}

    fn on_sample_container(&self, _container: SampleContainer) {}

    fn on_pipeline_event(&self, _event: PipelineEvent) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MediaSink for NullSink {}

/// One pipeline output, as delivered by [`ChannelSink`].
#[derive(Debug, Clone)]
pub enum MediaOutput {
    Video(EncodedVideoPayload),
    Audio(ResampledAudioPayload),
    Sample(SampleContainer),
    Event(PipelineEvent),
}

/// Forwards every output over a crossbeam channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<MediaOutput>,
}

impl ChannelSink {
    pub fn unbounded() -> (Self, Receiver<MediaOutput>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }

    fn forward(&self, output: MediaOutput) {
        if self.tx.send(output).is_err() {
            tracing::trace!("[ChannelSink] Receiver gone, output dropped");
        }
    }
}

impl MediaSink for ChannelSink {
    fn on_encoded_video_payload(&self, payload: EncodedVideoPayload) {
        self.forward(MediaOutput::Video(payload));
    }

    fn on_resampled_audio_payload(&self, payload: ResampledAudioPayload) {
        self.forward(MediaOutput::Audio(payload));
    }

    fn on_sample_container(&self, container: SampleContainer) {
        self.forward(MediaOutput::Sample(container));
    }

    fn on_pipeline_event(&self, event: PipelineEvent) {
        self.forward(MediaOutput::Event(event));
    }
}
