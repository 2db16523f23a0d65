// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Byte staging buffer feeding the pull-based audio converter.
//!
//! Not a steady-state circular queue: one resample pass writes a whole capture
//! callback's bytes, drains them through repeated pulls, then resets (or
//! compacts the unread tail when leftovers are carried over).
//!
//! Invariant after every operation: `read_index <= write_index <= capacity`.

use crate::core::{Result, StreamError};

#[derive(Debug)]
pub struct RingBuffer {
    storage: Vec<u8>,
    capacity: usize,
    read_index: usize,
    write_index: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: Vec::with_capacity(capacity),
            capacity,
            read_index: 0,
            write_index: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn read_index(&self) -> usize {
        self.read_index
    }

    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Bytes written but not yet read.
    pub fn len(&self) -> usize {
        self.write_index - self.read_index
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `bytes` at the write cursor. Rejects the whole write when it
    /// would run past capacity; nothing is stored in that case.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let remaining = self.capacity - self.write_index;
        if bytes.len() > remaining {
            return Err(StreamError::BufferOverflow {
                requested: bytes.len(),
                remaining,
            });
        }

        self.storage.extend_from_slice(bytes);
        self.write_index += bytes.len();
        Ok(())
    }

    /// True iff `n` bytes can be read: `read_index + n <= write_index` and
    /// `read_index + n <= capacity`.
    ///
    /// The capacity bound is inclusive, so a buffer filled exactly to capacity
    /// can be drained completely.
    pub fn is_available(&self, n: usize) -> bool {
        let end = self.read_index + n;
        end <= self.capacity && end <= self.write_index
    }

    /// Copy out `n` bytes from the read cursor and advance it. Callers check
    /// [`is_available`](Self::is_available) first.
    pub fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        if !self.is_available(n) {
            return Err(StreamError::BufferUnderflow {
                requested: n,
                available: self.len(),
            });
        }

        let out = self.storage[self.read_index..self.read_index + n].to_vec();
        self.read_index += n;
        Ok(out)
    }

    /// Clear the store and zero both cursors.
    pub fn reset(&mut self) {
        self.storage.clear();
        self.read_index = 0;
        self.write_index = 0;
    }

    /// Move the unread tail to the front so the next pass starts with it.
    /// Returns the number of bytes kept.
    pub fn compact(&mut self) -> usize {
        if self.read_index > 0 {
            self.storage.drain(..self.read_index);
            self.write_index -= self.read_index;
            self.read_index = 0;
        }
        self.write_index
    }
}
