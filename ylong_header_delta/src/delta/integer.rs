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

//! Prefix integers for variable-length index fields.
//!
//! # Introduction
//! The representation follows the [Integer Representation] of HPACK, except
//! that the prefix is a run of `N` bits anywhere in the bit stream instead of
//! the low bits of an octet. Continuation chunks are 8 bits wide.
//!
//! [Integer Representation]: https://httpwg.org/specs/rfc7541.html#integer.representation

use core::cmp::Ordering;

use crate::error::{CodecError, Result};
use crate::util::bits::BitBuffer;

/// Prefix width used for index fields.
pub(crate) const INDEX_PREFIX_BITS: u32 = 10;

/// `IntegerDecoder` implementation of the RFC7541 decoding pseudocode.
///
/// # Pseudocode
/// ```text
/// decode I from the next N bits
/// if I < 2^N - 1, return I
/// else
///     M = 0
///     repeat
///         B = next octet
///         I = I + (B & 127) * 2^M
///         M = M + 7
///     while B & 128 == 128
///     return I
/// ```
pub(crate) struct IntegerDecoder {
    index: u64,
    shift: u32,
}

impl IntegerDecoder {
    /// Calculates an integer from its prefix. If no continuation chunk
    /// follows, returns the result directly, otherwise returns the decoder
    /// itself.
    pub(crate) fn first_chunk(prefix: u32, mask: u32) -> core::result::Result<u32, Self> {
        let index = prefix & mask;
        match index.cmp(&mask) {
            Ordering::Less => Ok(index),
            _ => Err(Self {
                index: u64::from(index),
                shift: 0,
            }),
        }
    }

    /// Continues with the next continuation chunk. Returns `Ok(Some(index))`
    /// once the integer is complete, `Ok(None)` if more chunks follow, and
    /// `FieldOverflow` if the value leaves the `u32` range.
    pub(crate) fn next_byte(&mut self, byte: u8) -> Result<Option<u32>> {
        let overflow = || CodecError::FieldOverflow {
            field: "varint index",
            value: u64::MAX,
            bits: 32,
        };
        let addend = u64::from(byte & 0x7f)
            .checked_shl(self.shift)
            .filter(|_| self.shift < 35)
            .ok_or_else(overflow)?;
        self.index = self.index.checked_add(addend).ok_or_else(overflow)?;
        if self.index > u64::from(u32::MAX) {
            return Err(overflow());
        }
        self.shift += 7;
        match (byte & 0x80) == 0x00 {
            true => Ok(Some(self.index as u32)),
            false => Ok(None),
        }
    }
}

/// `IntegerEncoder` implementation of the RFC7541 encoding pseudocode.
///
/// # Pseudocode
/// ```text
/// if I < 2^N - 1, encode I on N bits
/// else
///     encode (2^N - 1) on N bits
///     I = I - (2^N - 1)
///     while I >= 128
///          encode (I % 128 + 128) on 8 bits
///          I = I / 128
///     encode I on 8 bits
/// ```
pub(crate) struct IntegerEncoder {
    i: u32,
    mask: u32,
    prefix_bits: u32,
    state: IntegerEncodeState,
}

enum IntegerEncodeState {
    First,
    Other,
    Finish,
}

impl IntegerEncoder {
    pub(crate) fn new(i: u32, prefix_bits: u32) -> Self {
        Self {
            i,
            mask: (1u32 << prefix_bits) - 1,
            prefix_bits,
            state: IntegerEncodeState::First,
        }
    }

    /// Gets the next chunk as `(value, width)`. Returns `None` once the
    /// integer is complete.
    pub(crate) fn next_chunk(&mut self) -> Option<(u32, u32)> {
        match self.state {
            IntegerEncodeState::First => {
                if self.i < self.mask {
                    self.state = IntegerEncodeState::Finish;
                    return Some((self.i, self.prefix_bits));
                }
                self.i -= self.mask;
                self.state = IntegerEncodeState::Other;
                Some((self.mask, self.prefix_bits))
            }
            IntegerEncodeState::Other => Some(if self.i >= 128 {
                let res = self.i & 0x7f;
                self.i >>= 7;
                (res | 0x80, 8)
            } else {
                self.state = IntegerEncodeState::Finish;
                (self.i & 0x7f, 8)
            }),
            IntegerEncodeState::Finish => None,
        }
    }
}

/// Writes `value` as a prefix integer.
pub(crate) fn write_varint(dst: &mut BitBuffer, value: u32, prefix_bits: u32) {
    let mut encoder = IntegerEncoder::new(value, prefix_bits);
    while let Some((chunk, width)) = encoder.next_chunk() {
        dst.write_bits(chunk, width);
    }
}

/// Reads a prefix integer.
pub(crate) fn read_varint(src: &mut BitBuffer, prefix_bits: u32) -> Result<u32> {
    let mask = (1u32 << prefix_bits) - 1;
    match IntegerDecoder::first_chunk(src.read_bits(prefix_bits)?, mask) {
        Ok(value) => Ok(value),
        Err(mut decoder) => loop {
            if let Some(value) = decoder.next_byte(src.read_byte()?)? {
                return Ok(value);
            }
        },
    }
}

#[cfg(test)]
mod ut_integer {
    use super::{read_varint, write_varint, IntegerDecoder, IntegerEncoder};
    use crate::error::CodecError;
    use crate::util::bits::BitBuffer;

    /// UT test cases for `IntegerEncoder`.
    ///
    /// # Brief
    /// 1. Creates an `IntegerEncoder` for values below and above the prefix.
    /// 2. Calls `IntegerEncoder::next_chunk()` until it is exhausted.
    /// 3. Checks the chunks against the RFC7541 examples.
    #[test]
    fn ut_integer_encode() {
        macro_rules! integer_test_case {
            ($int: expr, $prefix: expr $(, $chunk: expr)* $(,)?) => {
                let mut integer = IntegerEncoder::new($int, $prefix);
                $(
                    assert_eq!(integer.next_chunk(), Some($chunk));
                )*
                assert_eq!(integer.next_chunk(), None);
            }
        }

        // C.1.1. Example 1: Encoding 10 Using a 5-Bit Prefix
        integer_test_case!(10, 5, (10, 5));
        // C.1.2. Example 2: Encoding 1337 Using a 5-Bit Prefix
        integer_test_case!(1337, 5, (31, 5), (0x9a, 8), (0x0a, 8));
        // C.1.3. Example 3: Encoding 42 Starting at an Octet Boundary
        integer_test_case!(42, 8, (42, 8));
        integer_test_case!(1023, 10, (1023, 10), (0, 8));
    }

    /// UT test cases for `IntegerDecoder`.
    ///
    /// # Brief
    /// 1. Decodes the RFC7541 examples chunk by chunk.
    /// 2. Feeds continuation chunks past the `u32` range.
    /// 3. Checks the results.
    #[test]
    fn ut_integer_decode() {
        assert_eq!(IntegerDecoder::first_chunk(10, 0x1f).ok(), Some(10));

        let mut decoder = match IntegerDecoder::first_chunk(31, 0x1f) {
            Err(decoder) => decoder,
            Ok(_) => panic!("IntegerDecoder::first_chunk() failed!"),
        };
        assert_eq!(decoder.next_byte(0x9a), Ok(None));
        assert_eq!(decoder.next_byte(0x0a), Ok(Some(1337)));

        let mut decoder = match IntegerDecoder::first_chunk(31, 0x1f) {
            Err(decoder) => decoder,
            Ok(_) => panic!("IntegerDecoder::first_chunk() failed!"),
        };
        let mut result = Ok(None);
        for _ in 0..6 {
            result = decoder.next_byte(0xff);
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(CodecError::FieldOverflow { .. })));
    }

    /// UT test cases for `write_varint` and `read_varint`.
    ///
    /// # Brief
    /// 1. Writes several values at unaligned offsets.
    /// 2. Reads them back and checks truncated input.
    #[test]
    fn ut_varint_bits() {
        let values = [0, 1, 1022, 1023, 1024, 65535, u32::MAX];
        let mut buf = BitBuffer::new();
        buf.write_bits(1, 3);
        for value in values {
            write_varint(&mut buf, value, 10);
        }
        assert_eq!(buf.read_bits(3), Ok(1));
        for value in values {
            assert_eq!(read_varint(&mut buf, 10), Ok(value));
        }

        let mut buf = BitBuffer::new();
        write_varint(&mut buf, 5000, 10);
        let mut truncated = BitBuffer::from_bytes(buf.as_bytes()[..2].to_vec());
        assert!(matches!(
            read_varint(&mut truncated, 10),
            Err(CodecError::DecodeFraming(_))
        ));
    }
}
