// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

// H.264 bitstream reframing
//
// Encoders hand out AVCC access units ([4-byte length][NAL unit]...) with the
// SPS/PPS kept out of band. Senders and recorders want Annex B: start codes,
// and parameter sets in front of every keyframe.

use bytes::{BufMut, Bytes, BytesMut};

use super::compressor::{CompressedAccessUnit, H264FormatDescription};
use crate::core::frames::EncodedVideoPayload;
use crate::core::{Result, StreamError};

pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Size of the big-endian length field in front of each AVCC unit.
pub const AVCC_LENGTH_SIZE: usize = 4;

/// `nal_unit_type` from the NAL header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalUnitType {
    NonIdrSlice,
    IdrSlice,
    Sei,
    Sps,
    Pps,
    AccessUnitDelimiter,
    Other(u8),
}

impl NalUnitType {
    pub fn from_header(header: u8) -> Self {
        match header & 0x1f {
            1 => NalUnitType::NonIdrSlice,
            5 => NalUnitType::IdrSlice,
            6 => NalUnitType::Sei,
            7 => NalUnitType::Sps,
            8 => NalUnitType::Pps,
            9 => NalUnitType::AccessUnitDelimiter,
            other => NalUnitType::Other(other),
        }
    }
}

/// Iterator over the NAL units of an AVCC buffer.
///
/// Stops once fewer than [`AVCC_LENGTH_SIZE`] bytes remain. A length prefix
/// pointing past the end yields one error and ends iteration.
pub struct AvccUnits<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> AvccUnits<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for AvccUnits<'a> {
    type Item = Result<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.data.len() - self.pos < AVCC_LENGTH_SIZE {
            return None;
        }

        let prefix = &self.data[self.pos..self.pos + AVCC_LENGTH_SIZE];
        let nal_length = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        let start = self.pos + AVCC_LENGTH_SIZE;
        let remaining = self.data.len() - start;

        if nal_length > remaining {
            self.failed = true;
            return Some(Err(StreamError::MalformedBitstream(format!(
                "NAL length {} exceeds remaining {} bytes at offset {}",
                nal_length, remaining, self.pos
            ))));
        }

        self.pos = start + nal_length;
        Some(Ok(&self.data[start..start + nal_length]))
    }
}

/// Split an AVCC buffer into its NAL units, failing on a truncated unit.
pub fn parse_nal_units_avcc(data: &[u8]) -> Result<Vec<&[u8]>> {
    AvccUnits::new(data).collect()
}

/// `00 00 00 01 SPS 00 00 00 01 PPS`, from the first two parameter set slots.
pub fn keyframe_header(format: &H264FormatDescription) -> Result<Bytes> {
    let (sps, pps) = match (format.sps(), format.pps()) {
        (Some(sps), Some(pps)) if !sps.is_empty() && !pps.is_empty() => (sps, pps),
        _ => {
            return Err(StreamError::MalformedBitstream(format!(
                "Keyframe needs SPS and PPS, format has {} parameter set(s)",
                format.parameter_sets.len()
            )));
        }
    };

    let mut header = BytesMut::with_capacity(2 * START_CODE.len() + sps.len() + pps.len());
    header.put_slice(&START_CODE);
    header.put_slice(sps);
    header.put_slice(&START_CODE);
    header.put_slice(pps);
    Ok(header.freeze())
}

/// Convert AVCC to Annex B with a start code before every unit.
pub fn avcc_to_annex_b(avcc_data: &[u8]) -> Result<Vec<u8>> {
    let mut annex_b = Vec::with_capacity(avcc_data.len() + 64);
    for unit in AvccUnits::new(avcc_data) {
        annex_b.extend_from_slice(&START_CODE);
        annex_b.extend_from_slice(unit?);
    }
    Ok(annex_b)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReframeOptions {
    /// Put a start code before each unit. Off by default: units are
    /// concatenated as-is after the keyframe header.
    pub insert_unit_start_codes: bool,
}

/// Turn one encoder output event into a start-code delimited payload.
///
/// Keyframes get the parameter set header first. Any failure drops the whole
/// access unit: nothing partial is ever returned. The frame number is left at
/// zero for the caller to assign.
pub fn reframe_access_unit(
    unit: &CompressedAccessUnit,
    options: ReframeOptions,
) -> Result<EncodedVideoPayload> {
    let format = unit.format.as_ref().ok_or_else(|| {
        StreamError::MalformedBitstream("Access unit has no format description".into())
    })?;

    let is_keyframe = unit.is_keyframe();
    let units = parse_nal_units_avcc(&unit.data)?;
    if units.iter().all(|nal| nal.is_empty()) {
        return Err(StreamError::MalformedBitstream(format!(
            "Access unit of {} bytes carries no NAL data",
            unit.data.len()
        )));
    }

    let header = if is_keyframe {
        Some(keyframe_header(format)?)
    } else {
        None
    };

    let body_len: usize = units.iter().map(|nal| nal.len()).sum();
    let start_codes_len = if options.insert_unit_start_codes {
        units.len() * START_CODE.len()
    } else {
        0
    };
    let header_len = header.as_ref().map_or(0, |h| h.len());

    let mut out = BytesMut::with_capacity(header_len + start_codes_len + body_len);
    if let Some(header) = &header {
        out.put_slice(header);
    }
    for nal in &units {
        if nal.is_empty() {
            continue;
        }
        if options.insert_unit_start_codes {
            out.put_slice(&START_CODE);
        }
        tracing::trace!(
            "[Reframer] {:?} unit, {} bytes",
            NalUnitType::from_header(nal[0]),
            nal.len()
        );
        out.put_slice(nal);
    }

    Ok(EncodedVideoPayload::new(out.freeze(), unit.pts, is_keyframe, 0))
}
