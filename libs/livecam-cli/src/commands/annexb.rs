// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use livecam::core::{H264FormatDescription, avcc_to_annex_b, keyframe_header};

/// Convert an AVCC dump to Annex B, optionally headed by SPS/PPS. Returns the
/// number of bytes written.
pub fn run(input: &Path, output: &Path, sps: Option<&Path>, pps: Option<&Path>) -> Result<usize> {
    let avcc = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;

    let mut annex_b = match (sps, pps) {
        (Some(sps), Some(pps)) => {
            let parameter_sets = vec![read_bytes(sps)?, read_bytes(pps)?];
            let format = H264FormatDescription::new(0, 0, parameter_sets);
            keyframe_header(&format)?.to_vec()
        }
        _ => Vec::new(),
    };
    annex_b.extend(avcc_to_annex_b(&avcc)?);

    std::fs::write(output, &annex_b)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!(
        "[annexb] {} AVCC bytes -> {} Annex B bytes",
        avcc.len(),
        annex_b.len()
    );
    Ok(annex_b.len())
}

fn read_bytes(path: &Path) -> Result<Bytes> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Bytes::from(data))
}
