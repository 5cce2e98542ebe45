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

//! Bit-granular buffer used by every wire component.
//!
//! Bits are stored most-significant-bit first. A `BitBuffer` keeps a single
//! write cursor (the end of the stored bits) and a single read cursor, so the
//! same type is used to build a payload and to parse one.
//!
//! ```text
//! write_bits(0b101, 3); write_bits(0b1, 1);
//!
//!  bit: 7 6 5 4 3 2 1 0
//!      +-+-+-+-+-+-+-+-+
//!      |1|0|1|1|0|0|0|0|   <- unused bits stay zero
//!      +-+-+-+-+-+-+-+-+
//! ```

use core::fmt;

/// Error returned when a read asks for more bits than are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBits {
    /// Number of bits the caller asked for.
    pub requested: usize,
    /// Number of unread bits left in the buffer.
    pub available: usize,
}

impl fmt::Display for OutOfBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "requested {} bits but only {} remain",
            self.requested, self.available
        )
    }
}

impl std::error::Error for OutOfBits {}

/// An append-only bit string with a read cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitBuffer {
    bytes: Vec<u8>,
    // Number of valid bits in `bytes`.
    bit_len: usize,
    // Read cursor, in bits.
    read_pos: usize,
}

impl BitBuffer {
    /// Creates an empty `BitBuffer`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty `BitBuffer` able to hold `bytes` bytes without
    /// reallocating.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            bit_len: 0,
            read_pos: 0,
        }
    }

    /// Wraps existing bytes for reading. Every bit of `bytes` is readable.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let bit_len = bytes.len() * 8;
        Self {
            bytes,
            bit_len,
            read_pos: 0,
        }
    }

    /// Appends the `width` low-order bits of `value`, most-significant bit
    /// first. `width` must be within `1..=32`.
    pub fn write_bits(&mut self, value: u32, width: u32) {
        debug_assert!((1..=32).contains(&width), "invalid bit width {width}");
        let mut remaining = width.min(32);
        while remaining > 0 {
            let offset = (self.bit_len % 8) as u32;
            if offset == 0 {
                self.bytes.push(0);
            }
            let free = 8 - offset;
            let take = free.min(remaining);
            let shift = remaining - take;
            let chunk = ((u64::from(value) >> shift) & ((1u64 << take) - 1)) as u8;
            if let Some(last) = self.bytes.last_mut() {
                *last |= chunk << (free - take);
            }
            self.bit_len += take as usize;
            remaining -= take;
        }
    }

    /// Appends whole bytes. Works at any bit offset.
    pub fn write_bytes(&mut self, src: &[u8]) {
        if self.bit_len % 8 == 0 {
            self.bytes.extend_from_slice(src);
            self.bit_len += src.len() * 8;
            return;
        }
        for byte in src {
            self.write_bits(u32::from(*byte), 8);
        }
    }

    /// Pads the write cursor with zero bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        self.bit_len = self.bytes.len() * 8;
    }

    /// Consumes and returns the next `width` bits. `width` must be within
    /// `1..=32`.
    pub fn read_bits(&mut self, width: u32) -> Result<u32, OutOfBits> {
        debug_assert!((1..=32).contains(&width), "invalid bit width {width}");
        let width = width.min(32) as usize;
        if width > self.remaining_bits() {
            return Err(OutOfBits {
                requested: width,
                available: self.remaining_bits(),
            });
        }

        let mut value = 0u64;
        let mut remaining = width;
        while remaining > 0 {
            let byte = self.bytes[self.read_pos / 8];
            let offset = self.read_pos % 8;
            let avail = 8 - offset;
            let take = avail.min(remaining);
            let chunk = (byte >> (avail - take)) & (((1u16 << take) - 1) as u8);
            value = (value << take) | u64::from(chunk);
            self.read_pos += take;
            remaining -= take;
        }
        Ok(value as u32)
    }

    /// Consumes a single bit.
    pub fn read_bit(&mut self) -> Result<bool, OutOfBits> {
        self.read_bits(1).map(|bit| bit == 1)
    }

    /// Consumes the next 8 bits.
    pub fn read_byte(&mut self) -> Result<u8, OutOfBits> {
        self.read_bits(8).map(|byte| byte as u8)
    }

    /// Consumes `len` whole bytes at any bit offset.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, OutOfBits> {
        if len * 8 > self.remaining_bits() {
            return Err(OutOfBits {
                requested: len * 8,
                available: self.remaining_bits(),
            });
        }
        if self.read_pos % 8 == 0 {
            let start = self.read_pos / 8;
            self.read_pos += len * 8;
            return Ok(self.bytes[start..start + len].to_vec());
        }
        (0..len).map(|_| self.read_byte()).collect()
    }

    /// Skips `bits` unread bits.
    pub fn skip_bits(&mut self, bits: usize) -> Result<(), OutOfBits> {
        if bits > self.remaining_bits() {
            return Err(OutOfBits {
                requested: bits,
                available: self.remaining_bits(),
            });
        }
        self.read_pos += bits;
        Ok(())
    }

    /// Advances the read cursor to the next byte boundary. Never moves past
    /// the stored bits.
    pub fn align_read_to_byte(&mut self) {
        let aligned = (self.read_pos + 7) / 8 * 8;
        self.read_pos = aligned.min(self.bit_len);
    }

    /// Bytes currently stored, counting a partially filled last byte.
    pub fn byte_length(&self) -> usize {
        self.bytes.len()
    }

    /// Bits currently stored.
    pub fn bit_length(&self) -> usize {
        self.bit_len
    }

    /// Bits not consumed by reads yet.
    pub fn remaining_bits(&self) -> usize {
        self.bit_len - self.read_pos
    }

    /// Returns the stored bytes. The last byte is zero-padded.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the buffer and returns the stored bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
