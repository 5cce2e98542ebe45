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

//! Errors that may occur in this crate.
//!
//! Every failure of the codec is reported as a [`CodecError`]. Nothing is
//! retried or swallowed internally; a failed `compress` leaves the encoder
//! state untouched, a failed `decompress` leaves the decoder state untouched.

use thiserror::Error;

pub use crate::huffman::HuffmanDecodeError;
use crate::util::bits::OutOfBits;

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors of the header-delta codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// An entry cannot be stored in the dynamic table even after evicting
    /// every other entry.
    #[error("entry of {size} bytes cannot fit in a table of {max_bytes} bytes and {max_entries} entries")]
    CapacityExceeded {
        /// Size of the rejected entry, `len(key) + len(value)`.
        size: usize,
        /// Byte budget of the dynamic table.
        max_bytes: usize,
        /// Entry budget of the dynamic table.
        max_entries: usize,
    },

    /// Received bytes do not form a valid sequence of frames and operations.
    #[error("framing error: {0}")]
    DecodeFraming(#[from] FramingError),

    /// A Huffman coded string could not be decoded.
    #[error("huffman decode error: {0}")]
    HuffmanDecode(#[from] HuffmanDecodeError),

    /// An operation refers to a sequence number that is not in the table.
    /// Encoder and decoder state have diverged.
    #[error("sequence number {index} is not present in the header table")]
    StateDesync {
        /// The unresolvable sequence number.
        index: u32,
    },

    /// A value does not fit in the configured width of its wire field.
    #[error("{field} value {value} does not fit in {bits} bits")]
    FieldOverflow {
        /// Name of the wire field.
        field: &'static str,
        /// The value that should have been written.
        value: u64,
        /// Width of the field.
        bits: u32,
    },

    /// A raw string contains the NUL byte used as its terminator.
    #[error("raw string contains its terminator at byte {position}")]
    EmbeddedTerminator {
        /// Offset of the first NUL byte.
        position: usize,
    },

    /// Configuration parameters are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CodecError {
    /// Creates an `InvalidConfig` error.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Returns a short category name, suitable for counters in a harness.
    pub fn category(&self) -> &'static str {
        match self {
            Self::CapacityExceeded { .. } => "capacity",
            Self::DecodeFraming(_) => "framing",
            Self::HuffmanDecode(_) => "huffman",
            Self::StateDesync { .. } => "desync",
            Self::FieldOverflow { .. } | Self::EmbeddedTerminator { .. } => "encoding",
            Self::InvalidConfig(_) => "config",
        }
    }

    /// Returns `true` if this error was produced while parsing received
    /// bytes.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::DecodeFraming(_) | Self::HuffmanDecode(_) | Self::StateDesync { .. }
        )
    }
}

impl From<OutOfBits> for CodecError {
    fn from(err: OutOfBits) -> Self {
        CodecError::DecodeFraming(FramingError::from(err))
    }
}

/// Reasons a received message is malformed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// The input ended before a frame or field was complete.
    #[error("input truncated: needed {needed} more bits, {available} available")]
    Truncated {
        /// Bits the parser needed.
        needed: usize,
        /// Bits that were left.
        available: usize,
    },

    /// The payload holds bits that do not form a complete block.
    #[error("payload length mismatch: {leftover} unparsed bits")]
    LengthMismatch {
        /// Bits left after the last complete block.
        leftover: usize,
    },

    /// A block carries an opcode outside the operation set.
    #[error("unknown opcode {0:#x}")]
    UnknownOpcode(u8),

    /// A frame header carries an unexpected frame type.
    #[error("unknown frame type {0:#x}")]
    UnknownFrameType(u8),

    /// A frame's stream id lacks the control-frame marker.
    #[error("stream id {0:#x} lacks the control bit")]
    MissingControlBit(u32),

    /// Frames of one message carry different group ids.
    #[error("group id changed from {expected} to {found} inside one message")]
    GroupMismatch {
        /// Group id of the first frame.
        expected: u8,
        /// Group id of the offending frame.
        found: u8,
    },

    /// Bytes follow the frame that ended the message.
    #[error("{0} bytes after the end of the message")]
    TrailingBytes(usize),

    /// A toggle range whose start is after its end.
    #[error("toggle range {start}..={end} is empty")]
    InvalidRange {
        /// First index of the range.
        start: u32,
        /// Last index of the range.
        end: u32,
    },

    /// A length-prefixed raw string is not followed by its terminator.
    #[error("string terminator missing")]
    MissingTerminator,

    /// A string field is not valid UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,
}

impl From<OutOfBits> for FramingError {
    fn from(err: OutOfBits) -> Self {
        FramingError::Truncated {
            needed: err.requested,
            available: err.available,
        }
    }
}
