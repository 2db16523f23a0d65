// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod ring_buffer;

pub use ring_buffer::RingBuffer;
