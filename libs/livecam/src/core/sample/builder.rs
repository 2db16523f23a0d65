// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Construction of [`SampleContainer`]s from raw images and resampled bytes.

use bytes::Bytes;
use std::sync::Arc;

use super::{FormatDescription, SampleContainer, SampleData, SampleTimingInfo, VideoFormatDescription};
use crate::core::frames::{AudioStreamFormat, ImageBuffer};
use crate::core::{Result, StreamError};

pub struct SampleContainerBuilder;

impl SampleContainerBuilder {
    /// Derive a format descriptor from the image's pixel layout and wrap the
    /// image reference with `timing`.
    pub fn build_video_container(
        image: Arc<ImageBuffer>,
        timing: SampleTimingInfo,
    ) -> Result<SampleContainer> {
        let format = Self::video_format_for(&image)?;

        Ok(SampleContainer {
            format: FormatDescription::Video(format),
            data: SampleData::ImageBuffer(image),
            timing,
            sample_count: 1,
        })
    }

    /// Copy `bytes` into a freshly allocated block of exactly `bytes.len()`
    /// and attach `format` and one timing entry. The container never shares
    /// memory with the caller's payload.
    pub fn build_audio_container(
        bytes: &[u8],
        format: &AudioStreamFormat,
        timing: SampleTimingInfo,
    ) -> Result<SampleContainer> {
        if bytes.is_empty() {
            return Err(StreamError::SampleContainer(
                "Cannot build an audio sample from an empty buffer".into(),
            ));
        }

        let mut block = Vec::new();
        block.try_reserve_exact(bytes.len()).map_err(|e| {
            StreamError::SampleContainer(format!(
                "Cannot allocate a {}-byte memory block: {}",
                bytes.len(),
                e
            ))
        })?;
        block.extend_from_slice(bytes);

        Ok(SampleContainer {
            format: FormatDescription::Audio(*format),
            data: SampleData::Block(Bytes::from(block)),
            timing,
            sample_count: 1,
        })
    }

    fn video_format_for(image: &ImageBuffer) -> Result<VideoFormatDescription> {
        if image.width == 0 || image.height == 0 {
            return Err(StreamError::SampleContainer(format!(
                "Cannot derive a video format for a {}x{} image",
                image.width, image.height
            )));
        }

        let expected = image.pixel_format.frame_size(image.width, image.height);
        if image.data.len() < expected {
            return Err(StreamError::SampleContainer(format!(
                "{:?} image {}x{} needs {} bytes, buffer has {}",
                image.pixel_format,
                image.width,
                image.height,
                expected,
                image.data.len()
            )));
        }

        Ok(VideoFormatDescription {
            pixel_format: image.pixel_format,
            width: image.width,
            height: image.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MediaTime;
    use crate::core::frames::PixelFormat;

    fn timing(value: i64, timescale: i32) -> SampleTimingInfo {
        SampleTimingInfo {
            duration: MediaTime::new(1, timescale),
            presentation_time_stamp: MediaTime::new(value, timescale),
            decode_time_stamp: MediaTime::invalid(),
        }
    }

    #[test]
    fn test_video_container_wraps_image_without_copy() {
        let image = Arc::new(ImageBuffer::new(PixelFormat::Bgra32, 2, 2, vec![0u8; 16]));
        let container =
            SampleContainerBuilder::build_video_container(Arc::clone(&image), timing(30, 600))
                .unwrap();

        assert!(container.is_video());
        assert_eq!(container.sample_count, 1);
        assert_eq!(container.pts(), MediaTime::new(30, 600));
        match &container.data {
            SampleData::ImageBuffer(shared) => assert!(Arc::ptr_eq(shared, &image)),
            SampleData::Block(_) => panic!("video sample must reference the image"),
        }
        assert_eq!(
            container.format,
            FormatDescription::Video(VideoFormatDescription {
                pixel_format: PixelFormat::Bgra32,
                width: 2,
                height: 2,
            })
        );
    }

    #[test]
    fn test_video_container_rejects_underivable_format() {
        let empty = Arc::new(ImageBuffer::new(PixelFormat::Nv12, 0, 480, Vec::new()));
        assert!(matches!(
            SampleContainerBuilder::build_video_container(empty, timing(0, 600)),
            Err(StreamError::SampleContainer(_))
        ));

        let short = Arc::new(ImageBuffer::new(PixelFormat::Nv12, 4, 4, vec![0u8; 10]));
        assert!(SampleContainerBuilder::build_video_container(short, timing(0, 600)).is_err());
    }

    #[test]
    fn test_audio_container_copies_bytes_and_format() {
        let format = AudioStreamFormat::mono_s16(8_000);
        let bytes = [1u8, 2, 3, 4];
        let container =
            SampleContainerBuilder::build_audio_container(&bytes, &format, timing(80, 8_000))
                .unwrap();

        assert!(container.is_audio());
        assert_eq!(container.bytes(), &bytes);
        assert_ne!(container.bytes().as_ptr(), bytes.as_ptr());
        assert_eq!(container.audio_format(), Some(&format));
        assert_eq!(container.sample_count, 1);
        assert_eq!(container.timing.duration, MediaTime::new(1, 8_000));
    }

    #[test]
    fn test_audio_container_rejects_empty_bytes() {
        let format = AudioStreamFormat::mono_s16(8_000);
        assert!(matches!(
            SampleContainerBuilder::build_audio_container(&[], &format, timing(0, 8_000)),
            Err(StreamError::SampleContainer(_))
        ));
    }
}
