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

//! Codec configuration.
//!
//! A [`CodecConfig`] fixes the table bounds and the wire layout of one codec
//! instance. The encoder and the decoder of a connection must use identical
//! configurations: nothing on the wire identifies the layout, so a mismatch
//! only shows up as garbage further downstream.
//!
//! # Examples
//!
//! ```
//! use ylong_header_delta::{CodecConfig, OpcodeWidth};
//!
//! let config = CodecConfig::builder()
//!     .max_bytes(4096)
//!     .max_entries(256)
//!     .opcode_width(OpcodeWidth::Packed)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.max_block_ops(), 16);
//! ```

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::delta::table::STATIC_TABLE;
use crate::error::{CodecError, Result};

/// Environment variable prefix read by [`CodecConfig::from_env`].
pub const ENV_PREFIX: &str = "YLONG_DELTA_";

/// Layout of a block header on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpcodeWidth {
    /// 8-bit opcode followed by an 8-bit `count - 1`, up to 256 operations
    /// per block.
    Full,
    /// 4-bit opcode followed by a 4-bit `count - 1`, up to 16 operations per
    /// block.
    Packed,
}

/// Coding of string fields. Applies to every string of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StringCoding {
    /// Width of the length prefix in bits, `0` for none. The prefix counts
    /// code bits for Huffman strings and bytes for raw strings.
    pub length_bits: u32,
    /// Terminate every string, with the end-of-string code or a NUL byte.
    pub eof: bool,
    /// Huffman code string bytes.
    pub huffman: bool,
    /// Align the bit stream to a byte boundary after every string.
    pub pad: bool,
}

impl Default for StringCoding {
    fn default() -> Self {
        Self {
            length_bits: 0,
            eof: true,
            huffman: true,
            pad: true,
        }
    }
}

/// Configuration of one codec instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Byte budget of the dynamic table, counting `len(key) + len(value)`
    /// per entry.
    pub max_bytes: usize,
    /// Entry budget of the dynamic table.
    pub max_entries: usize,
    /// Modulus of the sequence numbers. Must exceed the static entry count
    /// plus `max_entries`.
    pub max_sequence_number: u32,
    /// Use 8-bit instead of 16-bit index fields.
    pub small_index: bool,
    /// Use prefix varints instead of fixed-width index fields.
    pub varint_indices: bool,
    /// Block header layout.
    pub opcode_width: OpcodeWidth,
    /// String field coding.
    pub string: StringCoding,
    /// Emit the frame type byte in every frame header.
    pub frame_type_byte: bool,
    /// Keys sent as ephemeral references, never stored in the table.
    pub ephemeral_keys: Vec<String>,
    /// Shortest run of consecutive toggles sent as a toggle range.
    pub min_toggle_run: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_bytes: 16 * 1024,
            max_entries: 1024,
            max_sequence_number: 1 << 16,
            small_index: false,
            varint_indices: false,
            opcode_width: OpcodeWidth::Full,
            string: StringCoding::default(),
            frame_type_byte: true,
            ephemeral_keys: vec![":path".to_string(), "referer".to_string()],
            min_toggle_run: 3,
        }
    }
}

impl CodecConfig {
    /// Creates a builder starting from the default configuration.
    pub fn builder() -> CodecConfigBuilder {
        CodecConfigBuilder::new()
    }

    /// A small table with 8-bit indices and packed opcodes.
    pub fn compact() -> Self {
        Self {
            max_bytes: 4096,
            max_entries: 128,
            max_sequence_number: 256,
            small_index: true,
            opcode_width: OpcodeWidth::Packed,
            ..Self::default()
        }
    }

    /// Raw NUL-terminated strings, every field starting on a byte boundary.
    pub fn byte_aligned() -> Self {
        Self {
            string: StringCoding {
                length_bits: 0,
                eof: true,
                huffman: false,
                pad: true,
            },
            ..Self::default()
        }
    }

    /// Reads the default configuration, overridden by `YLONG_DELTA_*`
    /// environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Reads the default configuration, overridden by environment variables
    /// named `{prefix}MAX_BYTES`, `{prefix}MAX_ENTRIES`,
    /// `{prefix}MAX_SEQUENCE_NUMBER`, `{prefix}SMALL_INDEX` and
    /// `{prefix}VARINT_INDICES`.
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self> {
        let mut config = Self::default();
        if let Some(value) = env_var(prefix, "MAX_BYTES")? {
            config.max_bytes = value;
        }
        if let Some(value) = env_var(prefix, "MAX_ENTRIES")? {
            config.max_entries = value;
        }
        if let Some(value) = env_var(prefix, "MAX_SEQUENCE_NUMBER")? {
            config.max_sequence_number = value;
        }
        if let Some(value) = env_var(prefix, "SMALL_INDEX")? {
            config.small_index = value;
        }
        if let Some(value) = env_var(prefix, "VARINT_INDICES")? {
            config.varint_indices = value;
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks that the parameters are consistent.
    pub fn validate(&self) -> Result<()> {
        if self.max_bytes == 0 {
            return Err(CodecError::invalid_config("max_bytes must be positive"));
        }
        let static_count = STATIC_TABLE.len() as u64;
        if u64::from(self.max_sequence_number) <= static_count + self.max_entries as u64 {
            return Err(CodecError::invalid_config(format!(
                "max_sequence_number {} must exceed {} static entries plus max_entries {}",
                self.max_sequence_number, static_count, self.max_entries
            )));
        }
        if let Some(bits) = self.index_bits() {
            if u64::from(self.max_sequence_number) > 1u64 << bits {
                return Err(CodecError::invalid_config(format!(
                    "max_sequence_number {} does not fit in {} bit index fields",
                    self.max_sequence_number, bits
                )));
            }
        }
        if self.string.length_bits > 32 {
            return Err(CodecError::invalid_config(
                "string length prefix is wider than 32 bits",
            ));
        }
        if self.string.length_bits == 0 && !self.string.eof {
            return Err(CodecError::invalid_config(
                "strings need a length prefix or a terminator",
            ));
        }
        if self.min_toggle_run == 0 {
            return Err(CodecError::invalid_config(
                "min_toggle_run must be at least 1",
            ));
        }
        if let Some(key) = self
            .ephemeral_keys
            .iter()
            .find(|key| key.bytes().any(|b| b.is_ascii_uppercase()))
        {
            return Err(CodecError::invalid_config(format!(
                "ephemeral key {key} is not lowercase"
            )));
        }
        Ok(())
    }

    /// Width of index fields, or `None` with varint indices.
    pub fn index_bits(&self) -> Option<u32> {
        match (self.varint_indices, self.small_index) {
            (true, _) => None,
            (false, true) => Some(8),
            (false, false) => Some(16),
        }
    }

    /// Largest number of operations in one block.
    pub fn max_block_ops(&self) -> usize {
        match self.opcode_width {
            OpcodeWidth::Full => 256,
            OpcodeWidth::Packed => 16,
        }
    }

    /// Whether `key` is sent as an ephemeral reference.
    pub fn is_ephemeral(&self, key: &str) -> bool {
        self.ephemeral_keys.iter().any(|k| k == key)
    }
}

fn env_var<T: FromStr>(prefix: &str, name: &str) -> Result<Option<T>> {
    let var = format!("{prefix}{name}");
    match env::var(&var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CodecError::invalid_config(format!("{var}={raw} cannot be parsed"))),
        Err(_) => Ok(None),
    }
}

/// Builder of [`CodecConfig`]. `build` validates the result.
#[derive(Debug, Clone, Default)]
pub struct CodecConfigBuilder {
    config: CodecConfig,
}

impl CodecConfigBuilder {
    /// Creates a builder starting from the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the byte budget of the dynamic table.
    pub fn max_bytes(mut self, max_bytes: usize) -> Self {
        self.config.max_bytes = max_bytes;
        self
    }

    /// Sets the entry budget of the dynamic table.
    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.config.max_entries = max_entries;
        self
    }

    /// Sets the sequence number modulus.
    pub fn max_sequence_number(mut self, max_sequence_number: u32) -> Self {
        self.config.max_sequence_number = max_sequence_number;
        self
    }

    /// Selects 8-bit index fields.
    pub fn small_index(mut self, small_index: bool) -> Self {
        self.config.small_index = small_index;
        self
    }

    /// Selects prefix varint index fields.
    pub fn varint_indices(mut self, varint_indices: bool) -> Self {
        self.config.varint_indices = varint_indices;
        self
    }

    /// Sets the block header layout.
    pub fn opcode_width(mut self, opcode_width: OpcodeWidth) -> Self {
        self.config.opcode_width = opcode_width;
        self
    }

    /// Sets the string coding.
    pub fn string_coding(mut self, string: StringCoding) -> Self {
        self.config.string = string;
        self
    }

    /// Enables or disables the frame type byte.
    pub fn frame_type_byte(mut self, frame_type_byte: bool) -> Self {
        self.config.frame_type_byte = frame_type_byte;
        self
    }

    /// Replaces the list of ephemeral keys.
    pub fn ephemeral_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.ephemeral_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the shortest toggle run sent as a range.
    pub fn min_toggle_run(mut self, min_toggle_run: usize) -> Self {
        self.config.min_toggle_run = min_toggle_run;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<CodecConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
