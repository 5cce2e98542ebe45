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

//! Bit-level layout of an operation payload.
//!
//! # Introduction
//! A payload is a run of blocks. Each block holds one or more operations of
//! the same kind:
//!
//! ```text
//! +------------+-------------+-----------------------------+
//! | opcode (w) | count-1 (w) | operation bodies ...        |
//! +------------+-------------+-----------------------------+
//! ```
//!
//! `w` is 8 bits, or 4 bits with packed opcodes. Bodies are:
//!
//! ```text
//! Toggle        index
//! ToggleRange   start, end
//! Clone         key index, value string
//! Store         key string, value string
//! EphemeralRef  key string, value string
//! ```
//!
//! Indices are fixed 8 or 16 bit fields, or prefix integers. A string is an
//! optional length prefix, the Huffman coded or raw bytes, an optional
//! terminator, then optional padding to the next byte boundary.

use std::rc::Rc;

use crate::config::{CodecConfig, OpcodeWidth, StringCoding};
use crate::delta::integer::{read_varint, write_varint, INDEX_PREFIX_BITS};
use crate::delta::operation::{Opcode, Operation};
use crate::error::{CodecError, FramingError, Result};
use crate::huffman::HuffmanCoder;
use crate::util::bits::BitBuffer;

/// Serializer for operation payloads.
#[derive(Debug, Clone)]
pub struct WireFormat {
    coder: Rc<HuffmanCoder>,
    opcode_width: OpcodeWidth,
    index_bits: Option<u32>,
    string: StringCoding,
    max_block_ops: usize,
}

impl WireFormat {
    /// Creates the serializer described by `config`, coding strings with
    /// `coder`.
    pub fn new(config: &CodecConfig, coder: Rc<HuffmanCoder>) -> Self {
        Self {
            coder,
            opcode_width: config.opcode_width,
            index_bits: config.index_bits(),
            string: config.string,
            max_block_ops: config.max_block_ops(),
        }
    }

    pub fn coder(&self) -> &HuffmanCoder {
        &self.coder
    }

    fn header_field_bits(&self) -> u32 {
        match self.opcode_width {
            OpcodeWidth::Full => 8,
            OpcodeWidth::Packed => 4,
        }
    }

    /// Serializes `ops` into a byte payload.
    pub fn serialize(&self, ops: &[Operation]) -> Result<Vec<u8>> {
        let mut dst = BitBuffer::new();
        self.write_operations(ops, &mut dst)?;
        Ok(dst.into_bytes())
    }

    /// Parses a byte payload.
    pub fn deserialize(&self, payload: &[u8]) -> Result<Vec<Operation>> {
        let mut src = BitBuffer::from_bytes(payload.to_vec());
        self.read_operations(&mut src)
    }

    /// Appends `ops` to `dst`. Consecutive operations of the same kind share
    /// a block.
    pub fn write_operations(&self, ops: &[Operation], dst: &mut BitBuffer) -> Result<()> {
        let width = self.header_field_bits();
        let mut rest = ops;
        while let Some(first) = rest.first() {
            let opcode = first.opcode();
            let run = rest
                .iter()
                .take(self.max_block_ops)
                .take_while(|op| op.opcode() == opcode)
                .count();
            let (block, tail) = rest.split_at(run);

            dst.write_bits(u32::from(opcode.as_u8()), width);
            dst.write_bits((run - 1) as u32, width);
            for op in block {
                self.write_operation(op, dst)?;
            }
            log::trace!("wrote block {:?} of {} operations", opcode, run);
            rest = tail;
        }
        Ok(())
    }

    /// Parses blocks until fewer bits than a block header remain. Up to
    /// seven bits of padding may follow the last block.
    pub fn read_operations(&self, src: &mut BitBuffer) -> Result<Vec<Operation>> {
        let width = self.header_field_bits();
        let mut ops = Vec::new();
        while src.remaining_bits() >= (width * 2) as usize {
            let code = src.read_bits(width)? as u8;
            let opcode = Opcode::try_from(code)?;
            let count = src.read_bits(width)? as usize + 1;
            for _ in 0..count {
                ops.push(self.read_operation(opcode, src)?);
            }
        }
        match src.remaining_bits() {
            leftover if leftover >= 8 => {
                Err(FramingError::LengthMismatch { leftover }.into())
            }
            _ => Ok(ops),
        }
    }

    fn write_operation(&self, op: &Operation, dst: &mut BitBuffer) -> Result<()> {
        match op {
            Operation::Toggle { index } => self.write_index(*index, dst),
            Operation::ToggleRange { start, end } => {
                self.write_index(*start, dst)?;
                self.write_index(*end, dst)
            }
            Operation::Clone { key_index, value } => {
                self.write_index(*key_index, dst)?;
                self.write_string(value, dst)
            }
            Operation::Store { key, value } | Operation::EphemeralRef { key, value } => {
                self.write_string(key, dst)?;
                self.write_string(value, dst)
            }
        }
    }

    fn read_operation(&self, opcode: Opcode, src: &mut BitBuffer) -> Result<Operation> {
        let op = match opcode {
            Opcode::Toggle => Operation::Toggle {
                index: self.read_index(src)?,
            },
            Opcode::ToggleRange => {
                let start = self.read_index(src)?;
                let end = self.read_index(src)?;
                if start > end {
                    return Err(FramingError::InvalidRange { start, end }.into());
                }
                Operation::ToggleRange { start, end }
            }
            Opcode::Clone => Operation::Clone {
                key_index: self.read_index(src)?,
                value: self.read_string(src)?,
            },
            Opcode::Store => Operation::Store {
                key: self.read_string(src)?,
                value: self.read_string(src)?,
            },
            Opcode::EphemeralRef => Operation::EphemeralRef {
                key: self.read_string(src)?,
                value: self.read_string(src)?,
            },
        };
        Ok(op)
    }

    fn write_index(&self, index: u32, dst: &mut BitBuffer) -> Result<()> {
        match self.index_bits {
            Some(bits) => {
                check_width("index", u64::from(index), bits)?;
                dst.write_bits(index, bits);
            }
            None => write_varint(dst, index, INDEX_PREFIX_BITS),
        }
        Ok(())
    }

    fn read_index(&self, src: &mut BitBuffer) -> Result<u32> {
        match self.index_bits {
            Some(bits) => Ok(src.read_bits(bits)?),
            None => read_varint(src, INDEX_PREFIX_BITS),
        }
    }

    fn write_string(&self, s: &str, dst: &mut BitBuffer) -> Result<()> {
        let bytes = s.as_bytes();
        let coding = &self.string;
        if coding.huffman {
            if coding.length_bits > 0 {
                let bits = self.coder.encoded_bits(bytes, coding.eof);
                check_width("string bit length", bits as u64, coding.length_bits)?;
                dst.write_bits(bits as u32, coding.length_bits);
            }
            self.coder.encode_into(bytes, coding.eof, dst);
        } else {
            if coding.eof {
                if let Some(position) = bytes.iter().position(|b| *b == 0) {
                    return Err(CodecError::EmbeddedTerminator { position });
                }
            }
            if coding.length_bits > 0 {
                check_width("string length", bytes.len() as u64, coding.length_bits)?;
                dst.write_bits(bytes.len() as u32, coding.length_bits);
            }
            dst.write_bytes(bytes);
            if coding.eof {
                dst.write_bits(0, 8);
            }
        }
        if coding.pad {
            dst.align_to_byte();
        }
        Ok(())
    }

    fn read_string(&self, src: &mut BitBuffer) -> Result<String> {
        let coding = &self.string;
        let length = match coding.length_bits {
            0 => None,
            bits => Some(src.read_bits(bits)? as usize),
        };
        let bytes = match (coding.huffman, length) {
            (true, budget) => self.coder.decode(src, coding.eof, budget)?,
            (false, Some(len)) => {
                let bytes = src.read_bytes(len)?;
                if coding.eof && src.read_byte()? != 0 {
                    return Err(FramingError::MissingTerminator.into());
                }
                bytes
            }
            (false, None) => {
                let mut bytes = Vec::new();
                loop {
                    match src.read_byte()? {
                        0 => break bytes,
                        byte => bytes.push(byte),
                    }
                }
            }
        };
        if coding.pad {
            src.align_read_to_byte();
        }
        String::from_utf8(bytes).map_err(|_| FramingError::InvalidUtf8.into())
    }
}

fn check_width(field: &'static str, value: u64, bits: u32) -> Result<()> {
    match bits >= 64 || value < (1u64 << bits) {
        true => Ok(()),
        false => Err(CodecError::FieldOverflow { field, value, bits }),
    }
}

#[cfg(test)]
mod ut_wire {
    use std::rc::Rc;

    use super::WireFormat;
    use crate::config::{CodecConfig, OpcodeWidth, StringCoding};
    use crate::delta::operation::Operation;
    use crate::error::{CodecError, FramingError};
    use crate::huffman::HuffmanCoder;

    fn wire(config: &CodecConfig) -> WireFormat {
        WireFormat::new(config, Rc::new(HuffmanCoder::request()))
    }

    fn sample() -> Vec<Operation> {
        vec![
            Operation::Toggle { index: 2 },
            Operation::Toggle { index: 66 },
            Operation::ToggleRange { start: 70, end: 75 },
            Operation::Clone {
                key_index: 38,
                value: "b.example.com".to_string(),
            },
            Operation::Store {
                key: "x-trace".to_string(),
                value: "0af7651916cd43dd".to_string(),
            },
            Operation::EphemeralRef {
                key: ":path".to_string(),
                value: "/".to_string(),
            },
            Operation::EphemeralRef {
                key: ":path".to_string(),
                value: String::new(),
            },
        ]
    }

    /// UT test cases for the block header layout.
    ///
    /// # Brief
    /// 1. Serializes two toggles with full and packed opcodes.
    /// 2. Checks the exact bytes.
    #[test]
    fn ut_wire_block_header() {
        let ops = vec![
            Operation::Toggle { index: 2 },
            Operation::Toggle { index: 3 },
        ];

        let config = CodecConfig::default();
        assert_eq!(
            wire(&config).serialize(&ops).unwrap(),
            vec![0x01, 0x01, 0x00, 0x02, 0x00, 0x03]
        );

        let config = CodecConfig::compact();
        assert_eq!(
            wire(&config).serialize(&ops).unwrap(),
            vec![0x11, 0x02, 0x03]
        );
    }

    /// UT test cases for `WireFormat` across configurations.
    ///
    /// # Brief
    /// 1. Serializes a batch with every operation kind under several
    ///    configurations.
    /// 2. Parses the payload back and checks it.
    #[test]
    fn ut_wire_configurations() {
        let configs = vec![
            CodecConfig::default(),
            CodecConfig::compact(),
            CodecConfig::byte_aligned(),
            CodecConfig::builder().varint_indices(true).build().unwrap(),
            CodecConfig::builder()
                .string_coding(StringCoding {
                    length_bits: 16,
                    eof: false,
                    huffman: true,
                    pad: false,
                })
                .build()
                .unwrap(),
            CodecConfig::builder()
                .string_coding(StringCoding {
                    length_bits: 12,
                    eof: true,
                    huffman: false,
                    pad: false,
                })
                .opcode_width(OpcodeWidth::Packed)
                .build()
                .unwrap(),
            CodecConfig::builder()
                .string_coding(StringCoding {
                    length_bits: 0,
                    eof: true,
                    huffman: false,
                    pad: false,
                })
                .build()
                .unwrap(),
        ];
        for config in configs {
            let wire = wire(&config);
            let payload = wire.serialize(&sample()).unwrap();
            assert_eq!(wire.deserialize(&payload).unwrap(), sample(), "{config:?}");
        }
    }

    /// UT test cases for block splitting.
    ///
    /// # Brief
    /// 1. Serializes more toggles than one packed block holds.
    /// 2. Checks the payload size and parses it back.
    #[test]
    fn ut_wire_block_split() {
        let config = CodecConfig::compact();
        let wire = wire(&config);
        let ops = (100..140)
            .map(|index| Operation::Toggle { index })
            .collect::<Vec<_>>();
        let payload = wire.serialize(&ops).unwrap();
        // 16 + 16 + 8 operations, one header byte per block.
        assert_eq!(payload.len(), 3 + 40);
        assert_eq!(payload[0], 0x1f);
        assert_eq!(payload[17], 0x1f);
        assert_eq!(payload[34], 0x17);
        assert_eq!(wire.deserialize(&payload).unwrap(), ops);
        assert!(wire.deserialize(&[]).unwrap().is_empty());
    }

    /// UT test cases for values that do not fit their fields.
    ///
    /// # Brief
    /// 1. Serializes an index wider than 8 bits, a long string with a narrow
    ///    length prefix and a raw string containing NUL.
    /// 2. Checks the errors.
    #[test]
    fn ut_wire_field_overflow() {
        let config = CodecConfig::compact();
        assert!(matches!(
            wire(&config).serialize(&[Operation::Toggle { index: 256 }]),
            Err(CodecError::FieldOverflow { bits: 8, value: 256, .. })
        ));

        let config = CodecConfig::builder()
            .string_coding(StringCoding {
                length_bits: 4,
                eof: false,
                huffman: false,
                pad: true,
            })
            .build()
            .unwrap();
        let op = Operation::Store {
            key: "k".to_string(),
            value: "0123456789abcdef".to_string(),
        };
        assert!(matches!(
            wire(&config).serialize(&[op]),
            Err(CodecError::FieldOverflow { bits: 4, value: 16, .. })
        ));

        let config = CodecConfig::byte_aligned();
        let op = Operation::Store {
            key: "k".to_string(),
            value: "a\0b".to_string(),
        };
        assert_eq!(
            wire(&config).serialize(&[op]),
            Err(CodecError::EmbeddedTerminator { position: 1 })
        );
    }

    /// UT test cases for malformed payloads.
    ///
    /// # Brief
    /// 1. Parses payloads with an unknown opcode, a truncated body, trailing
    ///    bits, an empty range, a missing terminator and invalid UTF-8.
    /// 2. Checks the framing errors.
    #[test]
    fn ut_wire_malformed() {
        let config = CodecConfig::default();
        let wire_default = wire(&config);
        let framing = |wire: &WireFormat, payload: &[u8]| match wire.deserialize(payload) {
            Err(CodecError::DecodeFraming(err)) => err,
            other => panic!("unexpected result {other:?}"),
        };

        assert_eq!(
            framing(&wire_default, &[0x07, 0x00, 0x00, 0x01]),
            FramingError::UnknownOpcode(0x07)
        );
        assert!(matches!(
            framing(&wire_default, &[0x01, 0x01, 0x00, 0x02, 0x00]),
            FramingError::Truncated { .. }
        ));
        assert_eq!(
            framing(&wire_default, &[0x01, 0x00, 0x00, 0x02, 0xff]),
            FramingError::LengthMismatch { leftover: 8 }
        );
        assert_eq!(
            framing(&wire_default, &[0x02, 0x00, 0x00, 0x09, 0x00, 0x08]),
            FramingError::InvalidRange { start: 9, end: 8 }
        );

        let config = CodecConfig::builder()
            .string_coding(StringCoding {
                length_bits: 8,
                eof: true,
                huffman: false,
                pad: true,
            })
            .build()
            .unwrap();
        let wire_raw = wire(&config);
        assert_eq!(
            framing(&wire_raw, &[0x04, 0x00, 0x01, b'k', 0x00, 0x01, b'v', b'x']),
            FramingError::MissingTerminator
        );
        assert_eq!(
            framing(&wire_raw, &[0x04, 0x00, 0x01, b'k', 0x00, 0x01, 0xff, 0x00]),
            FramingError::InvalidUtf8
        );
    }

    /// UT test cases for corrupted Huffman strings.
    ///
    /// # Brief
    /// 1. Serializes a store and cuts the payload inside the value.
    /// 2. Checks the decode error.
    #[test]
    fn ut_wire_huffman_truncated() {
        let config = CodecConfig::default();
        let wire = wire(&config);
        let op = Operation::Store {
            key: "user-agent".to_string(),
            value: "a fairly long value".to_string(),
        };
        let payload = wire.serialize(&[op]).unwrap();
        let err = wire.deserialize(&payload[..payload.len() - 3]).unwrap_err();
        assert!(err.is_decode_error(), "{err:?}");
    }
}
