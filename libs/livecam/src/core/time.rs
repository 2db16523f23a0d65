// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Rational media timestamps.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rational timestamp `value / timescale` seconds, in the capture device's
/// monotonic clock domain.
///
/// A timescale of zero marks the timestamp invalid (no duration / unknown
/// decode time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaTime {
    pub value: i64,
    pub timescale: i32,
}

impl MediaTime {
    pub const NANOS_TIMESCALE: i32 = 1_000_000_000;

    pub const fn new(value: i64, timescale: i32) -> Self {
        Self { value, timescale }
    }

    pub const fn invalid() -> Self {
        Self {
            value: 0,
            timescale: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.timescale > 0
    }

    pub fn seconds(&self) -> f64 {
        if !self.is_valid() {
            return f64::NAN;
        }
        self.value as f64 / self.timescale as f64
    }

    /// Re-express this timestamp in `new_timescale`, rounding half away from
    /// zero. Invalid timestamps stay invalid.
    pub fn convert_scale(&self, new_timescale: i32) -> Self {
        if !self.is_valid() || new_timescale <= 0 {
            return Self::invalid();
        }
        if new_timescale == self.timescale {
            return *self;
        }

        let numerator = self.value as i128 * new_timescale as i128;
        let denominator = self.timescale as i128;
        let half = denominator / 2;
        let scaled = if numerator >= 0 {
            (numerator + half) / denominator
        } else {
            (numerator - half) / denominator
        };

        Self::new(scaled.clamp(i64::MIN as i128, i64::MAX as i128) as i64, new_timescale)
    }

    pub fn as_nanos(&self) -> Option<i64> {
        self.is_valid()
            .then(|| self.convert_scale(Self::NANOS_TIMESCALE).value)
    }
}

impl Default for MediaTime {
    fn default() -> Self {
        Self::invalid()
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}/{}", self.value, self.timescale)
        } else {
            write!(f, "invalid")
        }
    }
}
