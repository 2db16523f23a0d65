// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Offline resampling: replays a PCM file as capture callbacks through an
//! [`AudioResampleSession`] writing to a file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use livecam::core::{
    AudioCodec, AudioResampleSession, AudioStreamFormat, FileDumpSink, MediaTime,
    PipelineConfig, QueueConfig, RawAudioFrame, SincConverterFactory, StatsSnapshot,
};

pub struct ResampleArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    pub source: AudioStreamFormat,
    pub destination_rate: Option<u32>,
    pub codec: Option<AudioCodec>,
    pub chunk_ms: u32,
}

#[derive(Debug)]
pub struct ResampleReport {
    pub stats: StatsSnapshot,
    pub bytes_written: u64,
    /// Input bytes at the end of the file too short for one converter pull.
    pub tail_bytes: usize,
}

/// Capture chunk in packets: `chunk_ms` worth, rounded up to whole pulls so
/// only the end of the file can leave bytes unconverted.
fn chunk_packets(sample_rate: u32, chunk_ms: u32, packets_per_pull: usize) -> usize {
    let packets = (sample_rate as usize * chunk_ms as usize / 1000).max(1);
    packets.div_ceil(packets_per_pull) * packets_per_pull
}

pub fn run(config: &PipelineConfig, args: ResampleArgs) -> Result<ResampleReport> {
    args.source.validate()?;
    let input = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let mut audio = config.audio.clone().with_queue(QueueConfig::unbounded());
    if let Some(rate) = args.destination_rate {
        audio.destination_sample_rate = rate;
    }
    if let Some(codec) = args.codec {
        audio.output_codec = codec;
    }

    let bytes_per_packet = args.source.bytes_per_packet();
    let pull_bytes = audio.packets_per_pull * bytes_per_packet;
    let chunk_bytes =
        chunk_packets(args.source.sample_rate, args.chunk_ms, audio.packets_per_pull)
            * bytes_per_packet;
    if chunk_bytes > audio.ring_capacity_bytes {
        tracing::debug!(
            "[resample] Growing ring buffer to {} bytes for {} ms chunks",
            chunk_bytes,
            args.chunk_ms
        );
        audio.ring_capacity_bytes = chunk_bytes;
    }

    let sink = Arc::new(FileDumpSink::create(None, Some(&args.output))?);
    let session = AudioResampleSession::new(
        audio,
        Arc::new(SincConverterFactory),
        sink.clone(),
        false,
    )?;

    let mut packet_offset = 0i64;
    for chunk in input.chunks(chunk_bytes) {
        let pts = MediaTime::new(packet_offset, args.source.sample_rate as i32);
        session.resample(RawAudioFrame::new(
            Bytes::copy_from_slice(chunk),
            args.source,
            pts,
        ))?;
        packet_offset += (chunk.len() / bytes_per_packet) as i64;
    }
    session.flush();

    if session.state().is_failed() {
        bail!("Resampler could not be configured for {:?}", args.source);
    }
    let stats = session.stats();
    session.shutdown();
    sink.flush()?;

    let bytes_written = std::fs::metadata(&args.output)
        .with_context(|| format!("Failed to stat {}", args.output.display()))?
        .len();
    let tail_bytes = match input.len() % chunk_bytes {
        0 => 0,
        rest => rest % pull_bytes,
    };

    tracing::info!(
        "[resample] {} -> {}: {} bytes in, {} bytes out",
        args.input.display(),
        args.output.display(),
        input.len(),
        bytes_written
    );
    Ok(ResampleReport {
        stats,
        bytes_written,
        tail_bytes,
    })
}
