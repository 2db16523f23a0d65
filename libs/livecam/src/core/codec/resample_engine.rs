// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Push-to-pull bridge between capture callbacks and a pull-style converter.
//!
//! One [`process`](ResampleEngine::process) call is one pass: the frame's
//! bytes go into the ring buffer, then the engine pulls fixed-size chunks out
//! and through the converter until the ring cannot supply another full pull.
//! What happens to the unconsumed tail is the [`LeftoverPolicy`].

use crate::core::buffers::RingBuffer;
use crate::core::config::LeftoverPolicy;
use crate::core::frames::AudioStreamFormat;
use crate::core::{MediaTime, Result, StreamError};

use super::AudioConverter;

/// Output of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResamplePass {
    /// Destination-format bytes; empty when not even one pull was possible.
    pub bytes: Vec<u8>,
    /// Source pts in the destination rate's timescale.
    pub pts: MediaTime,
    pub pulls: usize,
    /// Source bytes the converter consumed.
    pub consumed_bytes: usize,
    /// Source bytes left unconsumed. Discarded or carried, per policy.
    pub leftover_bytes: usize,
}

impl ResamplePass {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub struct ResampleEngine {
    converter: Box<dyn AudioConverter>,
    ring: RingBuffer,
    leftover: LeftoverPolicy,
    source: AudioStreamFormat,
    destination: AudioStreamFormat,
}

impl ResampleEngine {
    pub fn new(
        converter: Box<dyn AudioConverter>,
        ring_capacity_bytes: usize,
        leftover: LeftoverPolicy,
    ) -> Result<Self> {
        let source = *converter.source_format();
        let destination = *converter.destination_format();

        let pull_bytes = converter.input_packets_per_pull() * source.bytes_per_packet();
        if pull_bytes == 0 || pull_bytes > ring_capacity_bytes {
            return Err(StreamError::Configuration(format!(
                "Ring buffer of {} bytes cannot hold one {}-byte pull",
                ring_capacity_bytes, pull_bytes
            )));
        }

        Ok(Self {
            converter,
            ring: RingBuffer::new(ring_capacity_bytes),
            leftover,
            source,
            destination,
        })
    }

    pub fn source_format(&self) -> &AudioStreamFormat {
        &self.source
    }

    pub fn destination_format(&self) -> &AudioStreamFormat {
        &self.destination
    }

    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    pub fn leftover_policy(&self) -> LeftoverPolicy {
        self.leftover
    }

    /// Run one pass over `input`.
    ///
    /// A converter failure drops the whole pass: nothing is returned for the
    /// frame and the ring is cleared, whatever the leftover policy.
    pub fn process(&mut self, input: &[u8], pts: MediaTime) -> Result<ResamplePass> {
        let carried_bytes = match self.leftover {
            LeftoverPolicy::Discard => {
                self.ring.reset();
                0
            }
            LeftoverPolicy::CarryOver => self.ring.compact(),
        };

        if let Err(e) = self.ring.write(input) {
            if carried_bytes > 0 {
                tracing::warn!(
                    "[ResampleEngine] {}-byte frame overflows the ring, dropping {} carried byte(s)",
                    input.len(),
                    carried_bytes
                );
            }
            self.ring.reset();
            return Err(e);
        }

        let mut output = Vec::new();
        let mut pulls = 0;
        let mut consumed_bytes = 0;

        loop {
            let needed = self.converter.input_packets_per_pull() * self.source.bytes_per_packet();
            let Some(chunk) = self.supply_input(needed) else {
                break;
            };

            match self.converter.convert(&chunk) {
                Ok(converted) => {
                    output.extend_from_slice(&converted);
                    pulls += 1;
                    consumed_bytes += chunk.len();
                }
                Err(e) => {
                    self.ring.reset();
                    self.converter.reset();
                    return Err(StreamError::TransientEncode(format!(
                        "Conversion failed after {} pull(s): {}",
                        pulls, e
                    )));
                }
            }
        }

        let leftover_bytes = self.ring.len();
        match self.leftover {
            LeftoverPolicy::Discard => {
                if leftover_bytes > 0 {
                    tracing::trace!(
                        "[ResampleEngine] Discarding {} unconsumed byte(s)",
                        leftover_bytes
                    );
                }
                self.ring.reset();
            }
            LeftoverPolicy::CarryOver => {
                self.ring.compact();
            }
        }

        Ok(ResamplePass {
            bytes: output,
            pts: self.output_pts(pts, carried_bytes),
            pulls,
            consumed_bytes,
            leftover_bytes,
        })
    }

    /// Hand the converter `needed` bytes, or `None` once the ring cannot
    /// supply a full pull.
    fn supply_input(&mut self, needed: usize) -> Option<Vec<u8>> {
        if needed == 0 || !self.ring.is_available(needed) {
            return None;
        }
        self.ring.read(needed).ok()
    }

    /// Rescale into the destination timescale. Carried bytes were captured
    /// before this frame, so the pass starts that many packets earlier.
    fn output_pts(&self, pts: MediaTime, carried_bytes: usize) -> MediaTime {
        let bytes_per_packet = self.source.bytes_per_packet();
        if carried_bytes == 0 || !pts.is_valid() || bytes_per_packet == 0 {
            return pts.convert_scale(self.destination.sample_rate as i32);
        }

        let carried_packets = (carried_bytes / bytes_per_packet) as i64;
        let source_pts = pts.convert_scale(self.source.sample_rate as i32);
        MediaTime::new(source_pts.value - carried_packets, source_pts.timescale)
            .convert_scale(self.destination.sample_rate as i32)
    }

    /// Drop buffered input and converter history.
    pub fn reset(&mut self) {
        self.ring.reset();
        self.converter.reset();
    }
}
