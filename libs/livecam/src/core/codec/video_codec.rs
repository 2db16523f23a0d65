// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! H.264 profile selection.

use serde::{Deserialize, Serialize};

/// H.264 encoding profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum H264Profile {
    /// Baseline profile - most compatible, no B-frames. Live default.
    #[default]
    Baseline,
    Main,
    High,
}
