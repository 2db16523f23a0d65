// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Shared fixtures: a scripted H.264 compressor and frame helpers.

#![allow(dead_code)]

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use livecam::core::{
    CompressedAccessUnit, CompressionOutputHandler, CompressionProperty, CompressionSession,
    EncodedVideoPayload, H264Compressor, H264FormatDescription, ImageBuffer, MediaOutput,
    MediaTime, PipelineEvent, PixelFormat, RawVideoFrame, ResampledAudioPayload, Result,
    SampleContainer, StreamError,
};

pub const SPS: &[u8] = &[0xAA];
pub const PPS: &[u8] = &[0xBB];
pub const IDR_UNIT: &[u8] = &[0x65, 0x01, 0x02];
pub const SLICE_UNIT: &[u8] = &[0x41, 0x03];

/// Keyframe payload with parameter set header, units not start-code prefixed.
pub const KEYFRAME_PAYLOAD: &[u8] = &[0, 0, 0, 1, 0xAA, 0, 0, 0, 1, 0xBB, 0x65, 0x01, 0x02];

/// Which step of the encoder lifecycle should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    #[default]
    None,
    CreateSession,
    SetProperty(&'static str),
    Prepare,
    /// `encode_frame` rejects the frame with this index.
    EncodeFrame(u64),
    /// The output handler gets an error for the frame with this index.
    OutputError(u64),
    /// Delta frames are reported without a format description.
    MissingFormat,
}

/// Encoder whose output is a fixed AVCC pattern: a keyframe every
/// `keyframe_every` frames, deltas between.
///
/// By default output is emitted synchronously from `encode_frame`. An
/// asynchronous compressor hands it to its own output thread instead, which
/// delivers it later; `complete_frames` waits for that thread to catch up.
pub struct FakeCompressor {
    pub keyframe_every: u64,
    pub failure: FailureMode,
    pub asynchronous: bool,
    /// Every `create_session` call, failed ones included.
    pub attempts: AtomicUsize,
    pub created: AtomicUsize,
    pub invalidated: Arc<AtomicUsize>,
    pub properties: Arc<Mutex<Vec<CompressionProperty>>>,
    /// Outputs handed to the session from the output thread.
    pub delivered: Arc<AtomicUsize>,
}

impl FakeCompressor {
    pub fn new(keyframe_every: u64) -> Self {
        Self {
            keyframe_every,
            failure: FailureMode::None,
            asynchronous: false,
            attempts: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
            invalidated: Arc::new(AtomicUsize::new(0)),
            properties: Arc::new(Mutex::new(Vec::new())),
            delivered: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn asynchronous(keyframe_every: u64) -> Self {
        Self {
            asynchronous: true,
            ..Self::new(keyframe_every)
        }
    }

    pub fn failing(keyframe_every: u64, failure: FailureMode) -> Self {
        Self {
            failure,
            ..Self::new(keyframe_every)
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn invalidated(&self) -> usize {
        self.invalidated.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

impl H264Compressor for FakeCompressor {
    fn create_session(
        &self,
        width: u32,
        height: u32,
        output: CompressionOutputHandler,
    ) -> Result<Box<dyn CompressionSession>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failure == FailureMode::CreateSession {
            return Err(StreamError::Configuration("No encoder for this size".into()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        let delivery = self
            .asynchronous
            .then(|| OutputThread::spawn(Arc::clone(&output), Arc::clone(&self.delivered)));
        Ok(Box::new(FakeSession {
            format: H264FormatDescription::new(
                width,
                height,
                vec![Bytes::from_static(SPS), Bytes::from_static(PPS)],
            ),
            output,
            keyframe_every: self.keyframe_every.max(1),
            failure: self.failure,
            frame_index: 0,
            invalidated: Arc::clone(&self.invalidated),
            properties: Arc::clone(&self.properties),
            delivery,
            live: true,
        }))
    }
}

enum Delivery {
    Output(Result<CompressedAccessUnit>),
    Barrier(Sender<()>),
}

/// Stand-in for an encoder's internal callback thread.
struct OutputThread {
    sender: Sender<Delivery>,
    thread: JoinHandle<()>,
}

impl OutputThread {
    fn spawn(output: CompressionOutputHandler, delivered: Arc<AtomicUsize>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded::<Delivery>();
        let thread = std::thread::Builder::new()
            .name("fake-encoder-output".into())
            .spawn(move || {
                for delivery in receiver.iter() {
                    match delivery {
                        Delivery::Output(result) => {
                            // Lag behind encode_frame so callers that do not
                            // wait would miss the output.
                            std::thread::sleep(Duration::from_millis(2));
                            output(result);
                            delivered.fetch_add(1, Ordering::SeqCst);
                        }
                        Delivery::Barrier(done) => {
                            done.send(()).ok();
                        }
                    }
                }
            })
            .unwrap();
        Self { sender, thread }
    }

    /// Block until everything sent so far has been delivered.
    fn wait(&self) {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        self.sender.send(Delivery::Barrier(done_tx)).unwrap();
        done_rx.recv().unwrap();
    }
}

struct FakeSession {
    format: H264FormatDescription,
    output: CompressionOutputHandler,
    keyframe_every: u64,
    failure: FailureMode,
    frame_index: u64,
    invalidated: Arc<AtomicUsize>,
    properties: Arc<Mutex<Vec<CompressionProperty>>>,
    delivery: Option<OutputThread>,
    live: bool,
}

impl FakeSession {
    fn emit(&self, result: Result<CompressedAccessUnit>) {
        match &self.delivery {
            Some(delivery) => delivery.sender.send(Delivery::Output(result)).unwrap(),
            None => (self.output)(result),
        }
    }
}

impl CompressionSession for FakeSession {
    fn set_property(&mut self, property: CompressionProperty) -> Result<()> {
        if self.failure == FailureMode::SetProperty(property.key()) {
            return Err(StreamError::NotSupported(format!("{} rejected", property.key())));
        }
        self.properties.lock().push(property);
        Ok(())
    }

    fn prepare_to_encode(&mut self) -> Result<()> {
        if self.failure == FailureMode::Prepare {
            return Err(StreamError::Runtime("Hardware busy".into()));
        }
        Ok(())
    }

    fn encode_frame(&mut self, frame: &RawVideoFrame) -> Result<()> {
        let index = self.frame_index;
        self.frame_index += 1;

        if self.failure == FailureMode::EncodeFrame(index) {
            return Err(StreamError::TransientEncode(format!("Frame {} rejected", index)));
        }
        if self.failure == FailureMode::OutputError(index) {
            self.emit(Err(StreamError::TransientEncode(format!(
                "Frame {} failed in encoder",
                index
            ))));
            return Ok(());
        }

        let keyframe = index % self.keyframe_every == 0;
        let unit = if keyframe { IDR_UNIT } else { SLICE_UNIT };
        let format = if !keyframe && self.failure == FailureMode::MissingFormat {
            None
        } else {
            Some(self.format.clone())
        };

        self.emit(Ok(CompressedAccessUnit {
            data: avcc(&[unit]),
            pts: frame.pts,
            depends_on_others: if keyframe { None } else { Some(true) },
            format,
        }));
        Ok(())
    }

    fn complete_frames(&mut self) -> Result<()> {
        if let Some(delivery) = &self.delivery {
            delivery.wait();
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        if let Some(delivery) = self.delivery.take() {
            drop(delivery.sender);
            delivery.thread.join().unwrap();
        }
        if self.live {
            self.live = false;
            self.invalidated.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Length-prefix each unit.
pub fn avcc(units: &[&[u8]]) -> Bytes {
    let mut buf = Vec::new();
    for unit in units {
        buf.extend_from_slice(&(unit.len() as u32).to_be_bytes());
        buf.extend_from_slice(unit);
    }
    Bytes::from(buf)
}

pub fn video_frame(width: u32, height: u32, pts_value: i64) -> RawVideoFrame {
    let format = PixelFormat::Bgra32;
    let image = ImageBuffer::new(
        format,
        width,
        height,
        vec![0x80; format.frame_size(width, height)],
    );
    RawVideoFrame::new(image, MediaTime::new(pts_value, 30))
}

/// `count` mono S16 samples of a slow ramp.
pub fn pcm_s16(count: usize) -> Vec<u8> {
    (0..count)
        .flat_map(|i| (((i % 200) as i16 - 100) * 100).to_le_bytes())
        .collect()
}

/// Everything received so far, split by kind.
#[derive(Debug, Default)]
pub struct Collected {
    pub video: Vec<EncodedVideoPayload>,
    pub audio: Vec<ResampledAudioPayload>,
    pub samples: Vec<SampleContainer>,
    pub events: Vec<PipelineEvent>,
}

pub fn drain(rx: &Receiver<MediaOutput>) -> Collected {
    let mut collected = Collected::default();
    for output in rx.try_iter() {
        match output {
            MediaOutput::Video(p) => collected.video.push(p),
            MediaOutput::Audio(p) => collected.audio.push(p),
            MediaOutput::Sample(s) => collected.samples.push(s),
            MediaOutput::Event(e) => collected.events.push(e),
        }
    }
    collected
}
