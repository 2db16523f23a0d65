// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-session counters, shared between the submitting thread, the session
/// worker and encoder callback threads.
#[derive(Debug, Default)]
pub struct SessionStats {
    submitted: AtomicU64,
    processed: AtomicU64,
    emitted: AtomicU64,
    dropped: AtomicU64,
    transient_errors: AtomicU64,
}

/// Point-in-time copy of [`SessionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames accepted by `encode` / `resample`.
    pub submitted: u64,
    /// Frames the worker handed to the encoder or converter.
    pub processed: u64,
    /// Payloads delivered to the output handler.
    pub emitted: u64,
    /// Frames or access units discarded (queue overflow, malformed output,
    /// rejected format, session not ready).
    pub dropped: u64,
    pub transient_errors: u64,
}

impl SessionStats {
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.add_dropped(1);
    }

    pub fn add_dropped(&self, count: u64) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_transient_error(&self) {
        self.transient_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            transient_errors: self.transient_errors.load(Ordering::Relaxed),
        }
    }
}

/// Stats for both streams of a pipeline. Counters of sessions replaced after
/// a dimension change are folded in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub video: StatsSnapshot,
    pub audio: StatsSnapshot,
    /// Frames the demux queue itself discarded.
    pub demux_dropped: u64,
}

impl std::ops::Add for StatsSnapshot {
    type Output = StatsSnapshot;

    fn add(self, rhs: StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted + rhs.submitted,
            processed: self.processed + rhs.processed,
            emitted: self.emitted + rhs.emitted,
            dropped: self.dropped + rhs.dropped,
            transient_errors: self.transient_errors + rhs.transient_errors,
        }
    }
}
