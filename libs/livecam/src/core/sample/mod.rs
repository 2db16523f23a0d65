// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod builder;
mod container;

pub use builder::SampleContainerBuilder;
pub use container::{
    FormatDescription, SampleContainer, SampleData, SampleTimingInfo, VideoFormatDescription,
};
