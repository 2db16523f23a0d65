// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    /// Encoder/converter creation or property application failed. The owning
    /// session is permanently `Failed`.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// One frame failed to encode/convert. The session stays `Ready`.
    #[error("Transient encode error: {0}")]
    TransientEncode(String),

    /// Truncated length prefix, missing format description or parameter sets.
    #[error("Malformed bitstream: {0}")]
    MalformedBitstream(String),

    #[error("Buffer overflow: {requested} bytes requested, {remaining} bytes of capacity left")]
    BufferOverflow { requested: usize, remaining: usize },

    #[error("Buffer underflow: {requested} bytes requested, {available} bytes readable")]
    BufferUnderflow { requested: usize, available: usize },

    #[error("Session unavailable: {0}")]
    SessionUnavailable(String),

    #[error("Queue '{0}' is full")]
    QueueFull(String),

    #[error("Sample container construction failed: {0}")]
    SampleContainer(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StreamError {
    /// Configuration failures leave a session permanently unusable; everything
    /// else only costs the current frame.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StreamError::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
