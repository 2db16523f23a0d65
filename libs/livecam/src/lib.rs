// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Media transform core for live camera and microphone capture.
//!
//! Raw video frames are H.264 encoded and reframed into Annex B payloads,
//! raw audio is resampled through a pull-based converter, and both can be
//! wrapped into timestamped sample containers. Platform encoders and
//! converters plug in through [`H264Compressor`] and
//! [`AudioConverterFactory`].

// Re-export crossbeam_channel so ChannelSink receivers can be named downstream
pub use crossbeam_channel;

pub mod core;

pub use core::{
    AudioCodec, AudioConverter, AudioConverterFactory, AudioResampleSession,
    AudioResamplerConfig, AudioStreamFormat, ChannelSink, CompressedAccessUnit,
    CompressionOutputHandler, CompressionProperty, CompressionSession, EncodedVideoPayload,
    FileDumpSink, FormatDescription, H264Compressor, H264FormatDescription, H264Profile,
    ImageBuffer, LiveStreamPipeline, MediaKind, MediaOutput, MediaSink, MediaTime, NullSink,
    PipelineConfig, PipelineEvent, PipelineStats, PixelFormat, RawAudioFrame, RawVideoFrame,
    ResampledAudioPayload, Result, RingBuffer, SampleContainer, SampleContainerBuilder,
    SampleFormat, SampleTimingInfo, SessionState, SincConverterFactory, StreamError,
    VideoEncodeSession, VideoEncoderConfig, init_logging,
};
