// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Encode and resample sessions, the H.264 reframer and the codec seams.

mod audio_codec;
mod audio_converter;
mod audio_resample_session;
mod compressor;
pub mod h264_format;
mod resample_engine;
mod session_state;
mod video_codec;
mod video_encode_session;

pub use audio_codec::{
    AudioCodec, alaw_to_linear, linear_to_alaw, linear_to_mulaw, mulaw_to_linear,
};
pub use audio_converter::{
    AudioConverter, AudioConverterFactory, ConverterSpec, ResamplingQuality,
    SincConverterFactory, decode_samples, encode_samples,
};
pub use audio_resample_session::{AudioResampleSession, AudioSessionFormats};
pub use compressor::{
    CompressedAccessUnit, CompressionOutputHandler, CompressionProperty, CompressionSession,
    H264Compressor, H264FormatDescription,
};
pub use h264_format::{ReframeOptions, avcc_to_annex_b, keyframe_header, reframe_access_unit};
pub use resample_engine::{ResampleEngine, ResamplePass};
pub use session_state::SessionState;
pub use video_codec::H264Profile;
pub use video_encode_session::VideoEncodeSession;
