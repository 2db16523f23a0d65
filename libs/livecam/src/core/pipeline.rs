// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Live stream pipeline: capture callbacks in, sink out.
//!
//! An explicitly owned object with a `start`/`stop` lifecycle. Capture
//! callbacks only enqueue onto the demux queue; its worker creates sessions
//! lazily and forwards each frame to the session for its kind.

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

use crate::core::codec::{
    AudioConverterFactory, AudioResampleSession, H264Compressor, SessionState, VideoEncodeSession,
};
use crate::core::config::PipelineConfig;
use crate::core::frames::{RawAudioFrame, RawVideoFrame};
use crate::core::sinks::{MediaKind, MediaSink, PipelineEvent};
use crate::core::stats::{PipelineStats, SessionStats, StatsSnapshot};
use crate::core::worker::SerialQueue;
use crate::core::{Result, StreamError};

enum DemuxTask {
    Video(RawVideoFrame),
    Audio(RawAudioFrame),
    Flush(Sender<()>),
}

/// Sessions currently in use, readable from the caller's thread.
#[derive(Default)]
struct ActiveSessions {
    video: Mutex<Option<Arc<VideoEncodeSession>>>,
    audio: Mutex<Option<Arc<AudioResampleSession>>>,
    /// Set when the audio session could not even be created.
    audio_failed: Mutex<bool>,
    /// Counters of sessions already shut down.
    retired_video: Mutex<StatsSnapshot>,
    retired_audio: Mutex<StatsSnapshot>,
    /// Video frames of a size the encoder already refused, dropped before
    /// reaching any session.
    unsupported_video: SessionStats,
}

impl ActiveSessions {
    fn retire_video(&self) {
        let session = self.video.lock().take();
        if let Some(session) = session {
            session.shutdown();
            let mut retired = self.retired_video.lock();
            *retired = *retired + session.stats();
        }
    }

    fn retire_audio(&self) {
        let session = self.audio.lock().take();
        if let Some(session) = session {
            session.shutdown();
            let mut retired = self.retired_audio.lock();
            *retired = *retired + session.stats();
        }
    }
}

/// Runs on the demux worker.
struct Demuxer {
    config: PipelineConfig,
    compressor: Arc<dyn H264Compressor>,
    converters: Arc<dyn AudioConverterFactory>,
    sink: Arc<dyn MediaSink>,
    sessions: Arc<ActiveSessions>,
    failed_dimensions: HashSet<(u32, u32)>,
}

impl Demuxer {
    fn handle(&mut self, task: DemuxTask) {
        match task {
            DemuxTask::Video(frame) => self.route_video(frame),
            DemuxTask::Audio(frame) => self.route_audio(frame),
            DemuxTask::Flush(done) => {
                let video = self.sessions.video.lock().clone();
                if let Some(video) = video {
                    video.flush();
                }
                let audio = self.sessions.audio.lock().clone();
                if let Some(audio) = audio {
                    audio.flush();
                }
                done.send(()).ok();
            }
        }
    }

    fn route_video(&mut self, frame: RawVideoFrame) {
        let dimensions = frame.dimensions();

        // Sizes the encoder refused once are not retried per frame.
        if self.failed_dimensions.contains(&dimensions) {
            self.sessions.unsupported_video.record_submitted();
            self.sessions.unsupported_video.record_dropped();
            return;
        }

        let current = self.sessions.video.lock().clone();
        let session = match current {
            Some(session) if session.dimensions() == Some(dimensions) => session,
            _ => self.replace_video_session(dimensions, current.is_some()),
        };

        if let Err(e) = session.encode(frame) {
            tracing::trace!("[LiveStreamPipeline] Video frame not encoded: {}", e);
        }
    }

    fn replace_video_session(
        &mut self,
        (width, height): (u32, u32),
        had_session: bool,
    ) -> Arc<VideoEncodeSession> {
        if had_session {
            tracing::info!(
                "[LiveStreamPipeline] Frame size changed to {}x{}, recreating video session",
                width,
                height
            );
            self.sessions.retire_video();
        }

        let session = Arc::new(VideoEncodeSession::new(
            self.config.video.clone(),
            Arc::clone(&self.compressor),
            Arc::clone(&self.sink),
            self.config.emit_sample_containers,
        ));
        if let Err(e) = session.configure(width, height) {
            tracing::error!("[LiveStreamPipeline] Video unavailable: {}", e);
            self.failed_dimensions.insert((width, height));
        }
        *self.sessions.video.lock() = Some(Arc::clone(&session));
        session
    }

    fn route_audio(&mut self, frame: RawAudioFrame) {
        if *self.sessions.audio_failed.lock() {
            return;
        }

        let current = self.sessions.audio.lock().clone();
        let session = match current {
            Some(session) => session,
            None => match AudioResampleSession::new(
                self.config.audio.clone(),
                Arc::clone(&self.converters),
                Arc::clone(&self.sink),
                self.config.emit_sample_containers,
            ) {
                Ok(session) => {
                    let session = Arc::new(session);
                    *self.sessions.audio.lock() = Some(Arc::clone(&session));
                    session
                }
                Err(e) => {
                    tracing::error!("[LiveStreamPipeline] Audio unavailable: {}", e);
                    *self.sessions.audio_failed.lock() = true;
                    self.sink.on_pipeline_event(PipelineEvent::Unavailable {
                        kind: MediaKind::Audio,
                        reason: e.to_string(),
                    });
                    return;
                }
            },
        };

        if let Err(e) = session.resample(frame) {
            tracing::trace!("[LiveStreamPipeline] Audio frame not resampled: {}", e);
        }
    }
}

pub struct LiveStreamPipeline {
    config: PipelineConfig,
    compressor: Arc<dyn H264Compressor>,
    converters: Arc<dyn AudioConverterFactory>,
    sink: Arc<dyn MediaSink>,
    sessions: Arc<ActiveSessions>,
    demux: Mutex<Option<SerialQueue<DemuxTask>>>,
    demux_dropped: Mutex<u64>,
}

impl LiveStreamPipeline {
    pub fn new(
        config: PipelineConfig,
        compressor: Arc<dyn H264Compressor>,
        converters: Arc<dyn AudioConverterFactory>,
        sink: Arc<dyn MediaSink>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            compressor,
            converters,
            sink,
            sessions: Arc::new(ActiveSessions::default()),
            demux: Mutex::new(None),
            demux_dropped: Mutex::new(0),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Spawn the demux worker. Starting a running pipeline does nothing.
    pub fn start(&self) -> Result<()> {
        let mut demux = self.demux.lock();
        if demux.is_some() {
            return Ok(());
        }

        let mut demuxer = Demuxer {
            config: self.config.clone(),
            compressor: Arc::clone(&self.compressor),
            converters: Arc::clone(&self.converters),
            sink: Arc::clone(&self.sink),
            sessions: Arc::clone(&self.sessions),
            failed_dimensions: HashSet::new(),
        };
        *self.sessions.audio_failed.lock() = false;
        *demux = Some(SerialQueue::spawn_with_control(
            "demux",
            self.config.demux_queue,
            |task: &DemuxTask| matches!(task, DemuxTask::Flush(_)),
            move |task: DemuxTask| demuxer.handle(task),
        )?);

        tracing::info!("[LiveStreamPipeline] Started");
        Ok(())
    }

    /// Drain everything queued, then release all sessions. The pipeline can
    /// be started again afterwards.
    pub fn stop(&self) {
        let demux = self.demux.lock().take();
        let Some(mut demux) = demux else {
            return;
        };

        demux.shutdown();
        *self.demux_dropped.lock() += demux.dropped();
        self.sessions.retire_video();
        self.sessions.retire_audio();
        tracing::info!("[LiveStreamPipeline] Stopped");
    }

    pub fn is_running(&self) -> bool {
        self.demux.lock().is_some()
    }

    /// Capture callback for one video image.
    pub fn on_video_frame(&self, frame: RawVideoFrame) -> Result<()> {
        self.submit(DemuxTask::Video(frame))
    }

    /// Capture callback for one block of audio samples.
    pub fn on_audio_frame(&self, frame: RawAudioFrame) -> Result<()> {
        self.submit(DemuxTask::Audio(frame))
    }

    fn submit(&self, task: DemuxTask) -> Result<()> {
        match self.demux.lock().as_ref() {
            Some(demux) => demux.submit(task),
            None => Err(StreamError::SessionUnavailable(
                "Pipeline is not running".into(),
            )),
        }
    }

    /// Wait until every frame handed in so far has produced its output.
    pub fn flush(&self) {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        if self.submit(DemuxTask::Flush(done_tx)).is_ok() {
            done_rx.recv().ok();
        }
    }

    /// False once the session for `kind` has failed to configure. A kind that
    /// has not seen a frame yet counts as available.
    pub fn is_available(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Video => self
                .sessions
                .video
                .lock()
                .as_ref()
                .is_none_or(|s| !s.state().is_failed()),
            MediaKind::Audio => {
                !*self.sessions.audio_failed.lock()
                    && self
                        .sessions
                        .audio
                        .lock()
                        .as_ref()
                        .is_none_or(|s| !s.state().is_failed())
            }
        }
    }

    pub fn session_state(&self, kind: MediaKind) -> Option<SessionState> {
        match kind {
            MediaKind::Video => self.sessions.video.lock().as_ref().map(|s| s.state()),
            MediaKind::Audio => self.sessions.audio.lock().as_ref().map(|s| s.state()),
        }
    }

    pub fn stats(&self) -> PipelineStats {
        let video = self.sessions.video.lock().as_ref().map(|s| s.stats());
        let audio = self.sessions.audio.lock().as_ref().map(|s| s.stats());
        let demux_live = self.demux.lock().as_ref().map_or(0, |d| d.dropped());

        PipelineStats {
            video: *self.sessions.retired_video.lock()
                + self.sessions.unsupported_video.snapshot()
                + video.unwrap_or_default(),
            audio: *self.sessions.retired_audio.lock() + audio.unwrap_or_default(),
            demux_dropped: *self.demux_dropped.lock() + demux_live,
        }
    }
}

impl Drop for LiveStreamPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
