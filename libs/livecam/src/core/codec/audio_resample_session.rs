// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Audio resample session.
//!
//! Configures itself from the first frame it processes: that frame's format
//! becomes the source format and the converter is built once. Every frame is
//! one [`ResampleEngine`] pass on the session's worker thread.

use bytes::Bytes;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::audio_converter::{AudioConverterFactory, ConverterSpec};
use super::resample_engine::ResampleEngine;
use super::session_state::{SessionState, StateCell};
use super::AudioCodec;
use crate::core::config::{AudioResamplerConfig, FormatChangePolicy};
use crate::core::frames::{AudioStreamFormat, RawAudioFrame, ResampledAudioPayload};
use crate::core::sample::{SampleContainerBuilder, SampleTimingInfo};
use crate::core::sinks::{MediaKind, MediaSink, PipelineEvent};
use crate::core::stats::{SessionStats, StatsSnapshot};
use crate::core::worker::SerialQueue;
use crate::core::{MediaTime, Result, StreamError};

enum AudioTask {
    Frame(RawAudioFrame),
    Flush(Sender<()>),
}

/// Formats established by the first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSessionFormats {
    pub source: AudioStreamFormat,
    /// Converter output (linear PCM at the destination rate).
    pub destination: AudioStreamFormat,
    /// What the sink actually receives, after the output codec.
    pub output: AudioStreamFormat,
}

struct AudioShared {
    state: StateCell,
    stats: SessionStats,
    formats: Mutex<Option<AudioSessionFormats>>,
    /// Ring buffer fill level after the last pass.
    buffered_bytes: AtomicUsize,
}

struct ResampleWorker {
    config: AudioResamplerConfig,
    factory: Arc<dyn AudioConverterFactory>,
    sink: Arc<dyn MediaSink>,
    shared: Arc<AudioShared>,
    emit_sample_containers: bool,
    engine: Option<ResampleEngine>,
}

impl ResampleWorker {
    fn handle(&mut self, task: AudioTask) {
        match task {
            AudioTask::Frame(frame) => self.resample(frame),
            AudioTask::Flush(done) => {
                done.send(()).ok();
            }
        }
    }

    fn resample(&mut self, frame: RawAudioFrame) {
        let shared = Arc::clone(&self.shared);

        if shared.state.get().is_failed() {
            shared.stats.record_dropped();
            return;
        }
        if !self.ensure_engine(&frame.format) {
            shared.stats.record_dropped();
            return;
        }
        let Some(engine) = self.engine.as_mut() else {
            shared.stats.record_dropped();
            return;
        };

        shared
            .state
            .transition(SessionState::Ready, SessionState::Encoding);
        let result = engine.process(&frame.data, frame.pts);
        shared
            .buffered_bytes
            .store(engine.ring().len(), Ordering::Relaxed);
        shared
            .state
            .transition(SessionState::Encoding, SessionState::Ready);

        match result {
            Ok(pass) => {
                shared.stats.record_processed();
                tracing::trace!(
                    "[AudioResampleSession] {} bytes in, {} pull(s), {} bytes out, {} left over",
                    frame.data.len(),
                    pass.pulls,
                    pass.bytes.len(),
                    pass.leftover_bytes
                );
                self.emit(pass.bytes, pass.pts);
            }
            Err(e) => {
                shared.stats.record_transient_error();
                shared.stats.record_dropped();
                tracing::warn!(
                    "[AudioResampleSession] Frame at {} dropped: {}",
                    frame.pts,
                    e
                );
            }
        }
    }

    fn emit(&self, pcm: Vec<u8>, pts: MediaTime) {
        let data = match self.config.output_codec {
            AudioCodec::Pcm => Bytes::from(pcm),
            codec => codec.encode_s16le(&pcm),
        };

        let formats = *self.shared.formats.lock();
        if self.emit_sample_containers && !data.is_empty() {
            if let Some(formats) = formats {
                let timing = SampleTimingInfo {
                    duration: MediaTime::new(1, formats.output.sample_rate as i32),
                    presentation_time_stamp: pts,
                    decode_time_stamp: MediaTime::invalid(),
                };
                match SampleContainerBuilder::build_audio_container(
                    &data,
                    &formats.output,
                    timing,
                ) {
                    Ok(container) => self.sink.on_sample_container(container),
                    Err(e) => tracing::warn!("[AudioResampleSession] No sample container: {}", e),
                }
            }
        }

        self.sink
            .on_resampled_audio_payload(ResampledAudioPayload::new(data, pts));
        self.shared.stats.record_emitted();
    }

    /// Make sure an engine exists for `format`. Returns false if the frame
    /// must be dropped.
    fn ensure_engine(&mut self, format: &AudioStreamFormat) -> bool {
        let current = self.engine.as_ref().map(|e| *e.source_format());
        match current {
            Some(source) if source == *format => true,
            Some(source) => match self.config.format_change {
                FormatChangePolicy::Reject => {
                    tracing::warn!(
                        "[AudioResampleSession] Format changed {:?} -> {:?}, frame rejected",
                        source,
                        format
                    );
                    false
                }
                FormatChangePolicy::Recreate => {
                    tracing::info!(
                        "[AudioResampleSession] Format changed {:?} -> {:?}, recreating converter",
                        source,
                        format
                    );
                    self.engine = None;
                    self.shared.state.set(SessionState::Uninitialized);
                    self.configure(format)
                }
            },
            None => self.configure(format),
        }
    }

    fn configure(&mut self, source: &AudioStreamFormat) -> bool {
        self.shared.state.set(SessionState::Configuring);

        match self.build_engine(source) {
            Ok((engine, formats)) => {
                tracing::info!(
                    "[AudioResampleSession] Ready: {} Hz x{} {:?} -> {} Hz, output {:?}",
                    formats.source.sample_rate,
                    formats.source.channels,
                    formats.source.sample_format,
                    formats.destination.sample_rate,
                    self.config.output_codec
                );
                *self.shared.formats.lock() = Some(formats);
                self.engine = Some(engine);
                self.shared.state.set(SessionState::Ready);
                true
            }
            Err(e) => {
                tracing::error!("[AudioResampleSession] Configuration failed: {}", e);
                self.shared.state.set(SessionState::Failed);
                self.sink.on_pipeline_event(PipelineEvent::Unavailable {
                    kind: MediaKind::Audio,
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    fn build_engine(
        &self,
        source: &AudioStreamFormat,
    ) -> Result<(ResampleEngine, AudioSessionFormats)> {
        self.config.validate()?;
        let destination = source
            .with_sample_rate(self.config.destination_sample_rate)
            .with_sample_format(self.config.destination_sample_format);

        let converter = self
            .factory
            .create(&ConverterSpec {
                source: *source,
                destination,
                packets_per_pull: self.config.packets_per_pull,
                quality: self.config.quality,
            })
            .map_err(|e| match e {
                StreamError::Configuration(_) => e,
                other => StreamError::Configuration(other.to_string()),
            })?;

        let engine = ResampleEngine::new(
            converter,
            self.config.ring_capacity_bytes,
            self.config.leftover,
        )?;

        let formats = AudioSessionFormats {
            source: *source,
            destination,
            output: self.config.output_codec.output_format(&destination),
        };
        Ok((engine, formats))
    }
}

pub struct AudioResampleSession {
    config: AudioResamplerConfig,
    shared: Arc<AudioShared>,
    queue: Mutex<Option<SerialQueue<AudioTask>>>,
}

impl AudioResampleSession {
    /// Spawn the session's worker. The converter is built later, from the
    /// first frame.
    pub fn new(
        config: AudioResamplerConfig,
        factory: Arc<dyn AudioConverterFactory>,
        sink: Arc<dyn MediaSink>,
        emit_sample_containers: bool,
    ) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(AudioShared {
            state: StateCell::new("AudioResampleSession"),
            stats: SessionStats::default(),
            formats: Mutex::new(None),
            buffered_bytes: AtomicUsize::new(0),
        });

        let mut worker = ResampleWorker {
            config: config.clone(),
            factory,
            sink,
            shared: Arc::clone(&shared),
            emit_sample_containers,
            engine: None,
        };
        let queue = SerialQueue::spawn_with_control(
            "audio-resample",
            config.queue,
            |task: &AudioTask| matches!(task, AudioTask::Flush(_)),
            move |task: AudioTask| worker.handle(task),
        )?;

        Ok(Self {
            config,
            shared,
            queue: Mutex::new(Some(queue)),
        })
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.get()
    }

    pub fn config(&self) -> &AudioResamplerConfig {
        &self.config
    }

    /// Formats fixed by the first processed frame.
    pub fn formats(&self) -> Option<AudioSessionFormats> {
        *self.shared.formats.lock()
    }

    /// Bytes left in the ring buffer after the last pass. Always zero under
    /// the discard policy.
    pub fn buffered_bytes(&self) -> usize {
        self.shared.buffered_bytes.load(Ordering::Relaxed)
    }

    /// Queue one frame. Never waits for the converter.
    pub fn resample(&self, frame: RawAudioFrame) -> Result<()> {
        let queue = self.queue.lock();
        let state = self.shared.state.get();
        let Some(queue) = queue.as_ref().filter(|_| !state.is_failed()) else {
            self.shared.stats.record_dropped();
            return Err(StreamError::SessionUnavailable(format!(
                "Audio resample session is {:?}",
                state
            )));
        };

        self.shared.stats.record_submitted();
        queue.submit(AudioTask::Frame(frame))
    }

    /// Wait until every queued frame has been processed.
    pub fn flush(&self) {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let submitted = match self.queue.lock().as_ref() {
            Some(queue) => queue.submit(AudioTask::Flush(done_tx)).is_ok(),
            None => false,
        };
        if submitted {
            done_rx.recv().ok();
        }
    }

    /// Drain queued frames and stop the worker.
    pub fn shutdown(&self) {
        let queue = self.queue.lock().take();
        if let Some(mut queue) = queue {
            queue.shutdown();
            self.shared.stats.add_dropped(queue.dropped());
            tracing::debug!("[AudioResampleSession] Shut down");
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        let mut snapshot = self.shared.stats.snapshot();
        if let Some(queue) = self.queue.lock().as_ref() {
            snapshot.dropped += queue.dropped();
        }
        snapshot
    }
}

impl Drop for AudioResampleSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
