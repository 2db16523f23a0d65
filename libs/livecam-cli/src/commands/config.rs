// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use livecam::core::PipelineConfig;

pub fn show(config: &PipelineConfig) -> Result<String> {
    Ok(config.to_yaml_string()?)
}

/// Write the default configuration to `dir`. Returns the file written.
pub fn init(dir: &Path, force: bool) -> Result<PathBuf> {
    let path = dir.join(PipelineConfig::FILE_NAME);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let yaml = PipelineConfig::default().to_yaml_string()?;
    std::fs::write(&path, yaml).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Wrote default config to {}", path.display());
    Ok(path)
}
