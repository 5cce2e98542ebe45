// Copyright (c) 2023 Huawei Device Co., Ltd.
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Frames carrying one compressed header set.
//!
//! # Frame layout
//! ```text
//! +-------------------------------+
//! |          Length (16)          |
//! +---------------+---------------+
//! |   Flags (8)   |
//! +-+-------------+---------------+-------------------------------+
//! |C|                      Stream Identifier (31)                 |
//! +-+-------------+---------------+-------------------------------+
//! |   Type (8)    |  Group (8)    |
//! +---------------+---------------+-------------------------------+
//! |                          Payload (*)                        ...
//! +---------------------------------------------------------------+
//! ```
//!
//! `C` is the control-frame marker and is always set. The type byte is
//! optional and fixed per codec instance. A payload that does not fit in one
//! frame continues in the next frame of the same group; only the last frame
//! carries `END_OF_MESSAGE`.

use crate::delta::group::GroupId;
use crate::error::{FramingError, Result};

/// Type StreamId. Stream identifiers are unsigned 31-bit integers.
pub type StreamId = u32;

/// Mask for the END_OF_MESSAGE flag.
/// When set, the frame is the last frame of a header set.
pub(crate) const END_OF_MESSAGE_MASK: u8 = 0x01;

/// Control-frame marker in the stream id field.
pub(crate) const CONTROL_BIT: u32 = 0x8000_0000;

/// Type byte of a header-delta frame.
pub(crate) const HEADER_DELTA_FRAME_TYPE: u8 = 0x08;

/// A frame, header plus payload, may not exceed this many bytes.
pub(crate) const MAX_FRAME_BYTES: usize = 1 << 16;

/// Flags octet of a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags(u8);

impl FrameFlags {
    pub fn new(flags: u8) -> Self {
        FrameFlags(flags)
    }

    pub fn empty() -> Self {
        FrameFlags(0)
    }

    /// Judges the END_OF_MESSAGE flag is true.
    pub fn is_end_of_message(&self) -> bool {
        self.0 & END_OF_MESSAGE_MASK == END_OF_MESSAGE_MASK
    }

    /// Sets the END_OF_MESSAGE flag.
    pub fn set_end_of_message(&mut self, end_of_message: bool) {
        if end_of_message {
            self.0 |= END_OF_MESSAGE_MASK;
        } else {
            self.0 &= !END_OF_MESSAGE_MASK;
        }
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

/// One frame on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub flags: FrameFlags,
    /// Stream id without the control bit.
    pub stream_id: StreamId,
    pub frame_type: Option<u8>,
    pub group_id: GroupId,
    pub payload: Vec<u8>,
}

/// A reassembled message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedMessage {
    pub stream_id: StreamId,
    pub group_id: GroupId,
    pub payload: Vec<u8>,
}

/// Splits payloads into frames and joins them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    frame_type_byte: bool,
}

impl FrameCodec {
    pub fn new(frame_type_byte: bool) -> Self {
        Self { frame_type_byte }
    }

    /// Bytes of a frame header.
    pub fn header_len(&self) -> usize {
        match self.frame_type_byte {
            true => 9,
            false => 8,
        }
    }

    /// Largest payload of one frame.
    pub fn max_payload(&self) -> usize {
        MAX_FRAME_BYTES - self.header_len()
    }

    /// Splits `payload` into frames. An empty payload still produces one
    /// frame.
    pub fn split(&self, payload: &[u8], stream_id: StreamId, group_id: GroupId) -> Vec<Frame> {
        let chunks = payload.chunks(self.max_payload()).collect::<Vec<_>>();
        let count = chunks.len().max(1);
        let frame_type = self.frame_type_byte.then_some(HEADER_DELTA_FRAME_TYPE);

        let frames = (0..count)
            .map(|i| {
                let mut flags = FrameFlags::empty();
                flags.set_end_of_message(i + 1 == count);
                Frame {
                    flags,
                    stream_id: stream_id & !CONTROL_BIT,
                    frame_type,
                    group_id,
                    payload: chunks.get(i).map(|c| c.to_vec()).unwrap_or_default(),
                }
            })
            .collect::<Vec<_>>();
        if count > 1 {
            log::debug!(
                "split {} payload bytes of group {} into {} frames",
                payload.len(),
                group_id,
                count
            );
        }
        frames
    }

    /// Appends the wire form of `frame` to `dst`.
    pub fn write_frame(&self, frame: &Frame, dst: &mut Vec<u8>) {
        dst.extend_from_slice(&(frame.payload.len() as u16).to_be_bytes());
        dst.push(frame.flags.bits());
        dst.extend_from_slice(&(frame.stream_id | CONTROL_BIT).to_be_bytes());
        if self.frame_type_byte {
            dst.push(frame.frame_type.unwrap_or(HEADER_DELTA_FRAME_TYPE));
        }
        dst.push(frame.group_id);
        dst.extend_from_slice(&frame.payload);
    }

    /// Frames `payload` and returns the bytes of every frame.
    pub fn encode(&self, payload: &[u8], stream_id: StreamId, group_id: GroupId) -> Vec<u8> {
        let frames = self.split(payload, stream_id, group_id);
        let mut dst = Vec::with_capacity(payload.len() + frames.len() * self.header_len());
        for frame in frames.iter() {
            self.write_frame(frame, &mut dst);
        }
        dst
    }

    /// Reads one frame from the front of `src`. Returns the frame and the
    /// number of bytes it took.
    pub fn read_frame(&self, src: &[u8]) -> Result<(Frame, usize)> {
        let header_len = self.header_len();
        let header = src.get(..header_len).ok_or(FramingError::Truncated {
            needed: header_len * 8,
            available: src.len() * 8,
        })?;

        let length = usize::from(u16::from_be_bytes([header[0], header[1]]));
        let flags = FrameFlags::new(header[2]);
        let stream_id = u32::from_be_bytes([header[3], header[4], header[5], header[6]]);
        if stream_id & CONTROL_BIT == 0 {
            return Err(FramingError::MissingControlBit(stream_id).into());
        }
        let frame_type = match self.frame_type_byte {
            true if header[7] != HEADER_DELTA_FRAME_TYPE => {
                return Err(FramingError::UnknownFrameType(header[7]).into())
            }
            true => Some(header[7]),
            false => None,
        };
        let group_id = header[header_len - 1];

        let payload = src
            .get(header_len..header_len + length)
            .ok_or(FramingError::Truncated {
                needed: length * 8,
                available: (src.len() - header_len) * 8,
            })?;
        let frame = Frame {
            flags,
            stream_id: stream_id & !CONTROL_BIT,
            frame_type,
            group_id,
            payload: payload.to_vec(),
        };
        Ok((frame, header_len + length))
    }

    /// Reads frames up to the one flagged `END_OF_MESSAGE` and joins their
    /// payloads. `src` must hold exactly one message.
    pub fn decode(&self, src: &[u8]) -> Result<FramedMessage> {
        let mut pos = 0;
        let mut message: Option<FramedMessage> = None;
        loop {
            let (frame, used) = self.read_frame(&src[pos..])?;
            pos += used;
            let end = frame.flags.is_end_of_message();
            match message.as_mut() {
                None => {
                    message = Some(FramedMessage {
                        stream_id: frame.stream_id,
                        group_id: frame.group_id,
                        payload: frame.payload,
                    })
                }
                Some(current) if current.group_id != frame.group_id => {
                    return Err(FramingError::GroupMismatch {
                        expected: current.group_id,
                        found: frame.group_id,
                    }
                    .into())
                }
                Some(current) => current.payload.extend_from_slice(&frame.payload),
            }
            if end {
                break;
            }
        }
        if pos != src.len() {
            return Err(FramingError::TrailingBytes(src.len() - pos).into());
        }
        message.ok_or_else(|| {
            FramingError::Truncated {
                needed: self.header_len() * 8,
                available: 0,
            }
            .into()
        })
    }
}
