// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! End-to-end behavior of LiveStreamPipeline.

mod common;

use std::sync::Arc;

use bytes::Bytes;
use common::{FailureMode, FakeCompressor, KEYFRAME_PAYLOAD, avcc, drain, pcm_s16, video_frame};
use livecam::core::{
    AudioConverter, AudioConverterFactory, AudioStreamFormat, ChannelSink, CompressedAccessUnit,
    ConverterSpec, H264FormatDescription, LiveStreamPipeline, MediaKind, MediaTime,
    PipelineConfig, PipelineEvent, RawAudioFrame, ReframeOptions, Result, SincConverterFactory,
    StreamError, VideoEncodeSession, VideoEncoderConfig, reframe_access_unit,
};

fn pipeline(
    config: PipelineConfig,
    compressor: &Arc<FakeCompressor>,
    converters: Arc<dyn AudioConverterFactory>,
) -> (
    LiveStreamPipeline,
    crossbeam_channel::Receiver<livecam::core::MediaOutput>,
) {
    let (sink, rx) = ChannelSink::unbounded();
    let pipeline =
        LiveStreamPipeline::new(config, compressor.clone(), converters, Arc::new(sink)).unwrap();
    (pipeline, rx)
}

fn audio_frame(sample_rate: u32, samples: usize, pts: MediaTime) -> RawAudioFrame {
    RawAudioFrame::new(pcm_s16(samples), AudioStreamFormat::mono_s16(sample_rate), pts)
}

struct RefusingFactory;

impl AudioConverterFactory for RefusingFactory {
    fn create(&self, _spec: &ConverterSpec) -> Result<Box<dyn AudioConverter>> {
        Err(StreamError::NotSupported("No converter".into()))
    }
}

#[test]
fn test_keyframe_access_unit_gets_parameter_set_header() {
    let mut unit = vec![0x65];
    unit.extend(std::iter::repeat_n(0x11, 95));
    let access_unit = CompressedAccessUnit {
        data: avcc(&[unit.as_slice()]),
        pts: MediaTime::new(1, 30),
        depends_on_others: None,
        format: Some(H264FormatDescription::new(
            640,
            480,
            vec![Bytes::from_static(&[0xAA]), Bytes::from_static(&[0xBB])],
        )),
    };
    assert_eq!(access_unit.data.len(), 100);

    let payload = reframe_access_unit(&access_unit, ReframeOptions::default()).unwrap();
    assert!(payload.is_keyframe);
    assert!(
        payload
            .data
            .starts_with(&[0, 0, 0, 1, 0xAA, 0, 0, 0, 1, 0xBB])
    );
    assert_eq!(payload.data.len(), 10 + 96);
}

#[test]
fn test_audio_through_pipeline_is_rescaled() {
    let compressor = Arc::new(FakeCompressor::new(10));
    let (pipeline, rx) = pipeline(
        PipelineConfig::default(),
        &compressor,
        Arc::new(SincConverterFactory),
    );
    pipeline.start().unwrap();

    pipeline
        .on_audio_frame(audio_frame(16_000, 2_000, MediaTime::new(16_000, 16_000)))
        .unwrap();
    pipeline.flush();

    let out = drain(&rx);
    assert_eq!(out.audio.len(), 1);
    assert!(!out.audio[0].data.is_empty());
    assert_eq!(out.audio[0].pts, MediaTime::new(8_000, 8_000));
    assert_eq!(pipeline.stats().audio.emitted, 1);
}

#[test]
fn test_repeated_configure_does_not_leak_encoders() {
    let compressor = Arc::new(FakeCompressor::new(10));
    let (sink, _rx) = ChannelSink::unbounded();
    let session = VideoEncodeSession::new(
        VideoEncoderConfig::default(),
        compressor.clone(),
        Arc::new(sink),
        false,
    );

    session.configure(640, 480).unwrap();
    session.configure(640, 480).unwrap();
    assert_eq!(compressor.created(), 1);

    drop(session);
    assert_eq!(compressor.invalidated(), 1);
}

#[test]
fn test_video_frames_encoded_lazily() {
    let compressor = Arc::new(FakeCompressor::new(10));
    let (pipeline, rx) = pipeline(
        PipelineConfig::default(),
        &compressor,
        Arc::new(SincConverterFactory),
    );
    pipeline.start().unwrap();
    assert_eq!(compressor.created(), 0);
    assert_eq!(pipeline.session_state(MediaKind::Video), None);

    for pts in 0..3 {
        pipeline.on_video_frame(video_frame(64, 48, pts)).unwrap();
    }
    pipeline.flush();

    let out = drain(&rx);
    assert_eq!(out.video.len(), 3);
    assert_eq!(&out.video[0].data[..], KEYFRAME_PAYLOAD);
    // Default config emits a sample container per raw frame.
    assert_eq!(out.samples.len(), 3);
    assert_eq!(compressor.created(), 1);
    assert!(pipeline.is_available(MediaKind::Video));
}

#[test]
fn test_flush_covers_asynchronous_encoder_output() {
    let compressor = Arc::new(FakeCompressor::asynchronous(2));
    let (pipeline, rx) = pipeline(
        PipelineConfig::default(),
        &compressor,
        Arc::new(SincConverterFactory),
    );
    pipeline.start().unwrap();

    for pts in 0..5 {
        pipeline.on_video_frame(video_frame(32, 32, pts)).unwrap();
    }
    pipeline.flush();

    assert_eq!(compressor.delivered(), 5);
    let out = drain(&rx);
    let frame_numbers: Vec<_> = out.video.iter().map(|p| p.frame_number).collect();
    assert_eq!(frame_numbers, vec![0, 1, 2, 3, 4]);
    assert_eq!(&out.video[4].data[..], KEYFRAME_PAYLOAD);
}

#[test]
fn test_alternating_unsupported_sizes_are_not_retried() {
    let compressor = Arc::new(FakeCompressor::failing(10, FailureMode::CreateSession));
    let (pipeline, rx) = pipeline(
        PipelineConfig::default(),
        &compressor,
        Arc::new(SincConverterFactory),
    );
    pipeline.start().unwrap();

    for pts in 0..6 {
        let (width, height) = if pts % 2 == 0 { (64, 48) } else { (32, 32) };
        pipeline
            .on_video_frame(video_frame(width, height, pts))
            .unwrap();
    }
    pipeline.flush();

    // One attempt and one event per size.
    assert_eq!(compressor.attempts(), 2);
    assert_eq!(drain(&rx).events.len(), 2);
    assert_eq!(pipeline.stats().video.dropped, 6);
    assert!(!pipeline.is_available(MediaKind::Video));
}

#[test]
fn test_dimension_change_recreates_video_session() {
    let compressor = Arc::new(FakeCompressor::new(10));
    let (pipeline, rx) = pipeline(
        PipelineConfig::default(),
        &compressor,
        Arc::new(SincConverterFactory),
    );
    pipeline.start().unwrap();

    for pts in 0..3 {
        pipeline.on_video_frame(video_frame(64, 48, pts)).unwrap();
    }
    for pts in 3..5 {
        pipeline.on_video_frame(video_frame(32, 32, pts)).unwrap();
    }
    pipeline.flush();

    assert_eq!(compressor.created(), 2);
    assert_eq!(compressor.invalidated(), 1);

    let out = drain(&rx);
    assert_eq!(out.video.len(), 5);
    // The new encoder starts over with a keyframe and its own frame numbers.
    assert!(out.video[3].is_keyframe);
    assert_eq!(out.video[3].frame_number, 0);

    let stats = pipeline.stats();
    assert_eq!(stats.video.emitted, 5);

    pipeline.stop();
    assert_eq!(compressor.invalidated(), 2);
    assert_eq!(pipeline.stats().video.emitted, 5);
}

#[test]
fn test_failed_video_does_not_stop_audio() {
    let compressor = Arc::new(FakeCompressor::failing(10, FailureMode::CreateSession));
    let (pipeline, rx) = pipeline(
        PipelineConfig::default(),
        &compressor,
        Arc::new(SincConverterFactory),
    );
    pipeline.start().unwrap();

    for pts in 0..3 {
        pipeline.on_video_frame(video_frame(64, 48, pts)).unwrap();
    }
    pipeline
        .on_audio_frame(audio_frame(8_000, 512, MediaTime::new(0, 8_000)))
        .unwrap();
    pipeline.flush();

    assert!(!pipeline.is_available(MediaKind::Video));
    assert!(pipeline.is_available(MediaKind::Audio));

    let out = drain(&rx);
    assert!(out.video.is_empty());
    assert_eq!(out.audio.len(), 1);
    // Reported once, not once per frame.
    assert_eq!(
        out.events,
        vec![PipelineEvent::Unavailable {
            kind: MediaKind::Video,
            reason: "Invalid configuration: No encoder for this size".into(),
        }]
    );
    assert_eq!(pipeline.stats().video.dropped, 3);
}

#[test]
fn test_failed_audio_reports_unavailable() {
    let compressor = Arc::new(FakeCompressor::new(10));
    let (pipeline, rx) = pipeline(
        PipelineConfig::default(),
        &compressor,
        Arc::new(RefusingFactory),
    );
    pipeline.start().unwrap();

    pipeline
        .on_audio_frame(audio_frame(16_000, 512, MediaTime::new(0, 16_000)))
        .unwrap();
    pipeline.on_video_frame(video_frame(16, 16, 0)).unwrap();
    pipeline.flush();

    assert!(!pipeline.is_available(MediaKind::Audio));
    assert!(pipeline.is_available(MediaKind::Video));

    let out = drain(&rx);
    assert_eq!(out.video.len(), 1);
    assert!(matches!(
        out.events.as_slice(),
        [PipelineEvent::Unavailable { kind: MediaKind::Audio, .. }]
    ));
}

#[test]
fn test_frames_rejected_unless_running() {
    let compressor = Arc::new(FakeCompressor::new(10));
    let (pipeline, rx) = pipeline(
        PipelineConfig::default(),
        &compressor,
        Arc::new(SincConverterFactory),
    );

    let err = pipeline.on_video_frame(video_frame(16, 16, 0)).unwrap_err();
    assert!(matches!(err, StreamError::SessionUnavailable(_)));

    pipeline.start().unwrap();
    pipeline.start().unwrap();
    assert!(pipeline.is_running());
    pipeline.on_video_frame(video_frame(16, 16, 1)).unwrap();
    pipeline.stop();
    assert!(!pipeline.is_running());

    // Stop drains what was already queued.
    assert_eq!(drain(&rx).video.len(), 1);
    assert!(matches!(
        pipeline.on_video_frame(video_frame(16, 16, 2)),
        Err(StreamError::SessionUnavailable(_))
    ));

    pipeline.start().unwrap();
    pipeline.on_video_frame(video_frame(16, 16, 3)).unwrap();
    pipeline.flush();
    assert_eq!(drain(&rx).video.len(), 1);
    assert_eq!(compressor.created(), 2);
}

#[test]
fn test_invalid_config_rejected_at_construction() {
    let compressor = Arc::new(FakeCompressor::new(10));
    let (sink, _rx) = ChannelSink::unbounded();
    let mut config = PipelineConfig::default();
    config.video.max_keyframe_interval = 0;

    let result = LiveStreamPipeline::new(
        config,
        compressor,
        Arc::new(SincConverterFactory),
        Arc::new(sink),
    );
    assert!(matches!(result, Err(StreamError::Configuration(_))));
}
