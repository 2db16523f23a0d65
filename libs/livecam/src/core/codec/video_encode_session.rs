// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! H.264 encode session.
//!
//! `configure` creates the encoder on the caller's thread. Frames then go
//! through a dedicated serial queue whose worker owns the encoder; encoder
//! output comes back on whatever thread the encoder uses and is reframed
//! there before reaching the sink.

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::compressor::{
    CompressedAccessUnit, CompressionOutputHandler, CompressionProperty, CompressionSession,
    H264Compressor,
};
use super::h264_format::{ReframeOptions, reframe_access_unit};
use super::session_state::{SessionState, StateCell};
use crate::core::config::VideoEncoderConfig;
use crate::core::frames::RawVideoFrame;
use crate::core::sample::{SampleContainerBuilder, SampleTimingInfo};
use crate::core::sinks::{MediaKind, MediaSink, PipelineEvent};
use crate::core::stats::{SessionStats, StatsSnapshot};
use crate::core::worker::SerialQueue;
use crate::core::{Result, StreamError};

enum VideoTask {
    Frame(RawVideoFrame),
    Flush(Sender<()>),
}

/// State reachable from the encoder's output thread.
struct VideoShared {
    state: StateCell,
    stats: SessionStats,
    sink: Arc<dyn MediaSink>,
    frame_counter: AtomicU64,
    unavailable_reported: AtomicBool,
}

impl VideoShared {
    fn handle_output(&self, result: Result<CompressedAccessUnit>, options: ReframeOptions) {
        let unit = match result {
            Ok(unit) => unit,
            Err(e) => {
                self.stats.record_transient_error();
                self.stats.record_dropped();
                tracing::warn!("[VideoEncodeSession] Encoder reported failure: {}", e);
                return;
            }
        };

        match reframe_access_unit(&unit, options) {
            Ok(mut payload) => {
                payload.frame_number = self.frame_counter.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(
                    "[VideoEncodeSession] Access unit #{} ({}{} bytes, pts {})",
                    payload.frame_number,
                    if payload.is_keyframe { "keyframe, " } else { "" },
                    payload.data_len(),
                    payload.pts
                );
                self.sink.on_encoded_video_payload(payload);
                self.stats.record_emitted();
            }
            Err(e) => {
                self.stats.record_dropped();
                tracing::warn!("[Reframer] Dropping access unit at {}: {}", unit.pts, e);
            }
        }
    }

    fn report_unavailable(&self, reason: String) {
        if !self.unavailable_reported.swap(true, Ordering::AcqRel) {
            self.sink.on_pipeline_event(PipelineEvent::Unavailable {
                kind: MediaKind::Video,
                reason,
            });
        }
    }
}

/// Owns the encoder on the worker thread. Dropping it drains and releases the
/// encoder.
struct EncoderWorker {
    session: Box<dyn CompressionSession>,
    shared: Arc<VideoShared>,
    emit_sample_containers: bool,
}

impl EncoderWorker {
    fn handle(&mut self, task: VideoTask) {
        match task {
            VideoTask::Frame(frame) => self.encode(frame),
            VideoTask::Flush(done) => {
                if let Err(e) = self.session.complete_frames() {
                    tracing::warn!("[VideoEncodeSession] Complete frames failed: {}", e);
                }
                done.send(()).ok();
            }
        }
    }

    fn encode(&mut self, frame: RawVideoFrame) {
        let shared = &self.shared;
        shared
            .state
            .transition(SessionState::Ready, SessionState::Encoding);

        if self.emit_sample_containers {
            let timing = SampleTimingInfo::presentation(frame.pts);
            match SampleContainerBuilder::build_video_container(Arc::clone(&frame.image), timing) {
                Ok(container) => shared.sink.on_sample_container(container),
                Err(e) => tracing::warn!("[VideoEncodeSession] No sample container: {}", e),
            }
        }

        match self.session.encode_frame(&frame) {
            Ok(()) => shared.stats.record_processed(),
            Err(e) => {
                shared.stats.record_transient_error();
                shared.stats.record_dropped();
                tracing::warn!(
                    "[VideoEncodeSession] Frame at {} failed to encode: {}",
                    frame.pts,
                    e
                );
            }
        }

        shared
            .state
            .transition(SessionState::Encoding, SessionState::Ready);
    }
}

impl Drop for EncoderWorker {
    fn drop(&mut self) {
        if let Err(e) = self.session.complete_frames() {
            tracing::warn!("[VideoEncodeSession] Complete frames on shutdown failed: {}", e);
        }
        self.session.invalidate();
        tracing::debug!("[VideoEncodeSession] Encoder invalidated");
    }
}

pub struct VideoEncodeSession {
    config: VideoEncoderConfig,
    compressor: Arc<dyn H264Compressor>,
    shared: Arc<VideoShared>,
    emit_sample_containers: bool,
    dimensions: Mutex<Option<(u32, u32)>>,
    queue: Mutex<Option<SerialQueue<VideoTask>>>,
}

impl VideoEncodeSession {
    pub fn new(
        config: VideoEncoderConfig,
        compressor: Arc<dyn H264Compressor>,
        sink: Arc<dyn MediaSink>,
        emit_sample_containers: bool,
    ) -> Self {
        Self {
            config,
            compressor,
            shared: Arc::new(VideoShared {
                state: StateCell::new("VideoEncodeSession"),
                stats: SessionStats::default(),
                sink,
                frame_counter: AtomicU64::new(0),
                unavailable_reported: AtomicBool::new(false),
            }),
            emit_sample_containers,
            dimensions: Mutex::new(None),
            queue: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.get()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        *self.dimensions.lock()
    }

    pub fn config(&self) -> &VideoEncoderConfig {
        &self.config
    }

    /// Create the encoder for fixed `width` x `height` and apply the session
    /// properties.
    ///
    /// Calling it again on a ready session with the same dimensions does
    /// nothing. Any failure leaves the session `Failed` for good.
    pub fn configure(&self, width: u32, height: u32) -> Result<()> {
        let mut queue_slot = self.queue.lock();

        match self.shared.state.get() {
            SessionState::Failed => {
                return Err(StreamError::SessionUnavailable(
                    "Video encode session failed to configure earlier".into(),
                ));
            }
            state if state.is_ready() => {
                let current = *self.dimensions.lock();
                if current == Some((width, height)) {
                    tracing::debug!(
                        "[VideoEncodeSession] Already configured for {}x{}",
                        width,
                        height
                    );
                    return Ok(());
                }
                return Err(StreamError::NotSupported(format!(
                    "Session is fixed at {:?}, {}x{} needs a new session",
                    current, width, height
                )));
            }
            _ => {}
        }

        self.shared.state.set(SessionState::Configuring);
        match self.create_worker(width, height) {
            Ok(queue) => {
                *queue_slot = Some(queue);
                *self.dimensions.lock() = Some((width, height));
                self.shared.state.set(SessionState::Ready);
                tracing::info!(
                    "[VideoEncodeSession] Ready: {}x{}, {:?}, {} bps, keyframe every {} AU",
                    width,
                    height,
                    self.config.profile,
                    self.config.average_bitrate_bps,
                    self.config.max_keyframe_interval
                );
                Ok(())
            }
            Err(e) => {
                self.shared.state.set(SessionState::Failed);
                tracing::error!(
                    "[VideoEncodeSession] Configuration for {}x{} failed: {}",
                    width,
                    height,
                    e
                );
                self.shared.report_unavailable(e.to_string());
                Err(match e {
                    StreamError::Configuration(_) => e,
                    other => StreamError::Configuration(other.to_string()),
                })
            }
        }
    }

    fn create_worker(&self, width: u32, height: u32) -> Result<SerialQueue<VideoTask>> {
        if width == 0 || height == 0 {
            return Err(StreamError::Configuration(format!(
                "Invalid frame dimensions {}x{}",
                width, height
            )));
        }
        self.config.validate()?;

        let options = ReframeOptions {
            insert_unit_start_codes: self.config.insert_unit_start_codes,
        };
        let output_shared = Arc::clone(&self.shared);
        let output: CompressionOutputHandler =
            Arc::new(move |result| output_shared.handle_output(result, options));

        let mut session = self.compressor.create_session(width, height, output)?;
        if let Err(e) = self.apply_properties(session.as_mut()) {
            session.invalidate();
            return Err(e);
        }

        let mut worker = EncoderWorker {
            session,
            shared: Arc::clone(&self.shared),
            emit_sample_containers: self.emit_sample_containers,
        };
        SerialQueue::spawn_with_control(
            "video-encode",
            self.config.queue,
            |task: &VideoTask| matches!(task, VideoTask::Flush(_)),
            move |task: VideoTask| worker.handle(task),
        )
    }

    fn apply_properties(&self, session: &mut dyn CompressionSession) -> Result<()> {
        let mut properties = vec![
            CompressionProperty::RealTime(self.config.real_time),
            CompressionProperty::ProfileLevel(self.config.profile),
            CompressionProperty::MaxKeyFrameInterval(self.config.max_keyframe_interval),
            CompressionProperty::AverageBitRate(self.config.average_bitrate_bps),
        ];
        if let Some(fps) = self.config.expected_frame_rate {
            properties.push(CompressionProperty::ExpectedFrameRate(fps));
        }

        for property in properties {
            session.set_property(property).map_err(|e| {
                StreamError::Configuration(format!("Failed to set {}: {}", property.key(), e))
            })?;
        }
        session
            .prepare_to_encode()
            .map_err(|e| StreamError::Configuration(format!("Prepare to encode failed: {}", e)))
    }

    /// Queue one frame. Never waits for the encoder.
    ///
    /// Fails with `SessionUnavailable` unless the session is ready, and with
    /// `NotSupported` for a frame of other dimensions.
    pub fn encode(&self, frame: RawVideoFrame) -> Result<()> {
        let queue = self.queue.lock();
        let state = self.shared.state.get();
        let Some(queue) = queue.as_ref().filter(|_| state.is_ready()) else {
            self.shared.stats.record_dropped();
            return Err(StreamError::SessionUnavailable(format!(
                "Video encode session is {:?}",
                state
            )));
        };

        let dimensions = frame.dimensions();
        if *self.dimensions.lock() != Some(dimensions) {
            self.shared.stats.record_dropped();
            return Err(StreamError::NotSupported(format!(
                "Frame is {}x{}, session is fixed at {:?}",
                dimensions.0,
                dimensions.1,
                self.dimensions()
            )));
        }

        self.shared.stats.record_submitted();
        queue.submit(VideoTask::Frame(frame))
    }

    /// Wait until every queued frame went through the encoder and its output
    /// reached the sink.
    pub fn flush(&self) {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let submitted = match self.queue.lock().as_ref() {
            Some(queue) => queue.submit(VideoTask::Flush(done_tx)).is_ok(),
            None => false,
        };
        if submitted {
            // Errors only if the worker went away first.
            done_rx.recv().ok();
        }
    }

    /// Drain queued frames, then release the encoder.
    pub fn shutdown(&self) {
        let queue = self.queue.lock().take();
        if let Some(mut queue) = queue {
            queue.shutdown();
            self.shared.stats.add_dropped(queue.dropped());
            if !self.shared.state.get().is_failed() {
                self.shared.state.set(SessionState::Uninitialized);
            }
            *self.dimensions.lock() = None;
            tracing::debug!("[VideoEncodeSession] Shut down");
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

impl Drop for VideoEncodeSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
