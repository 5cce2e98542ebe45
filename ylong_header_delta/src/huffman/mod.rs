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

//! [Canonical Huffman coding] of header strings.
//!
//! [Canonical Huffman coding]: https://en.wikipedia.org/wiki/Canonical_Huffman_code
//!
//! # Alphabet
//! The alphabet has 257 symbols: the 256 byte values and an end-of-string
//! symbol (`256`). A string may be terminated by the end-of-string code or
//! delimited by an explicit bit length, depending on the string coding.
//!
//! # Construction
//! Code lengths come from a two-queue Huffman merge over the symbol weights.
//! Leaves are taken in `(weight, symbol)` order and win ties against
//! internal nodes. If any code is longer than 32 bits, every frequency is
//! divided by a growing power of two and the tree is rebuilt.
//!
//! Codes are then assigned canonically in `(length, symbol)` order, so the
//! code lengths alone describe the whole table. Decoding walks the canonical
//! code bit by bit using the first code and symbol count of each length.

mod consts;

use std::collections::VecDeque;

use consts::{
    REQUEST_EOF_FREQUENCY, REQUEST_FREQUENCIES, RESPONSE_EOF_FREQUENCY, RESPONSE_FREQUENCIES,
};
use thiserror::Error;

use crate::util::bits::BitBuffer;

/// Number of symbols of the alphabet.
pub const SYMBOL_COUNT: usize = 257;

/// The end-of-string symbol.
pub const EOF_SYMBOL: u16 = 256;

/// Longest code a `HuffmanCoder` will assign.
pub const MAX_CODE_LENGTH: u32 = 32;

/// Failures of [`HuffmanCoder::decode`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuffmanDecodeError {
    /// The bit source ran dry in the middle of the string.
    #[error("bit stream exhausted before the string ended")]
    Exhausted,

    /// A code runs past the declared bit length of the string.
    #[error("code crosses the {budget} bit budget")]
    BudgetOverrun {
        /// Declared bit length of the string.
        budget: usize,
    },

    /// The string can never terminate: either no bound was given, or the
    /// bit budget was consumed without the expected end-of-string symbol.
    #[error("string has no end-of-string symbol within its bounds")]
    Unterminated,

    /// The bit pattern is not a code of this table, or the end-of-string
    /// symbol appeared where it is not allowed.
    #[error("invalid huffman code")]
    InvalidCode,
}

/// A code word: the `len` low-order bits of `bits`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Code {
    /// Code bits, right aligned.
    pub bits: u32,
    /// Code length in bits.
    pub len: u32,
}

/// A canonical Huffman code over bytes plus an end-of-string symbol.
#[derive(Debug, Clone)]
pub struct HuffmanCoder {
    codes: Vec<Code>,
    // Symbols ordered by (code length, symbol).
    sorted: Vec<u16>,
    // Indexed by code length.
    first_code: [u64; MAX_CODE_LENGTH as usize + 1],
    count: [u64; MAX_CODE_LENGTH as usize + 1],
    offset: [u64; MAX_CODE_LENGTH as usize + 1],
    max_len: u32,
}

impl HuffmanCoder {
    /// Builds the coder used for request headers.
    pub fn request() -> Self {
        Self::from_frequencies(&frequency_table(
            REQUEST_FREQUENCIES,
            REQUEST_EOF_FREQUENCY,
        ))
    }

    /// Builds the coder used for response headers.
    pub fn response() -> Self {
        Self::from_frequencies(&frequency_table(
            RESPONSE_FREQUENCIES,
            RESPONSE_EOF_FREQUENCY,
        ))
    }

    /// Builds a coder from one frequency per symbol. Zero frequencies are
    /// treated as one.
    pub fn from_frequencies(freqs: &[u64; SYMBOL_COUNT]) -> Self {
        let mut divisor = 1u64;
        let lengths = loop {
            let weights = freqs
                .iter()
                .map(|freq| (freq / divisor).max(1))
                .collect::<Vec<_>>();
            let lengths = code_lengths(&weights);
            if lengths.iter().all(|len| *len <= MAX_CODE_LENGTH) {
                break lengths;
            }
            divisor = divisor.saturating_mul(2);
        };
        Self::from_code_lengths(&lengths)
    }

    fn from_code_lengths(lengths: &[u32]) -> Self {
        const SLOTS: usize = MAX_CODE_LENGTH as usize + 1;
        let mut count = [0u64; SLOTS];
        for len in lengths {
            count[*len as usize] += 1;
        }

        let mut first_code = [0u64; SLOTS];
        let mut offset = [0u64; SLOTS];
        let mut code = 0u64;
        let mut position = 0u64;
        for len in 1..SLOTS {
            code = (code + count[len - 1]) << 1;
            first_code[len] = code;
            offset[len] = position;
            position += count[len];
        }

        let mut sorted = (0..lengths.len() as u16).collect::<Vec<_>>();
        sorted.sort_by_key(|symbol| (lengths[*symbol as usize], *symbol));

        let mut next_code = first_code;
        let codes = lengths
            .iter()
            .map(|len| {
                let bits = next_code[*len as usize];
                next_code[*len as usize] += 1;
                Code {
                    bits: bits as u32,
                    len: *len,
                }
            })
            .collect();

        Self {
            codes,
            sorted,
            first_code,
            count,
            offset,
            max_len: lengths.iter().copied().max().unwrap_or(0),
        }
    }

    /// Returns the code of `symbol`, if it belongs to the alphabet.
    pub fn code(&self, symbol: u16) -> Option<Code> {
        self.codes.get(symbol as usize).copied()
    }

    /// Length of the longest code.
    pub fn max_code_length(&self) -> u32 {
        self.max_len
    }

    /// Number of bits `encode_into` writes for `src`.
    pub fn encoded_bits(&self, src: &[u8], include_eof: bool) -> usize {
        let body = src
            .iter()
            .map(|byte| self.codes[*byte as usize].len as usize)
            .sum::<usize>();
        match include_eof {
            true => body + self.codes[EOF_SYMBOL as usize].len as usize,
            false => body,
        }
    }

    /// Appends the codes of `src` to `dst`, optionally followed by the
    /// end-of-string code. Returns the number of bits written.
    pub fn encode_into(&self, src: &[u8], include_eof: bool, dst: &mut BitBuffer) -> usize {
        let mut written = 0;
        for byte in src {
            let code = self.codes[*byte as usize];
            dst.write_bits(code.bits, code.len);
            written += code.len as usize;
        }
        if include_eof {
            let code = self.codes[EOF_SYMBOL as usize];
            dst.write_bits(code.bits, code.len);
            written += code.len as usize;
        }
        written
    }

    /// Encodes `src` into a fresh, unpadded `BitBuffer`.
    pub fn encode(&self, src: &[u8], include_eof: bool) -> BitBuffer {
        let mut dst = BitBuffer::with_capacity(src.len());
        self.encode_into(src, include_eof, &mut dst);
        dst
    }

    /// Decodes one string from `src`.
    ///
    /// With `includes_eof`, decoding stops at the end-of-string symbol. With
    /// `max_bits`, exactly that many bits belong to the string; bits left
    /// after an early end-of-string symbol are skipped. At least one of the
    /// two bounds must apply.
    pub fn decode(
        &self,
        src: &mut BitBuffer,
        includes_eof: bool,
        max_bits: Option<usize>,
    ) -> Result<Vec<u8>, HuffmanDecodeError> {
        if !includes_eof && max_bits.is_none() {
            return Err(HuffmanDecodeError::Unterminated);
        }

        let mut dst = Vec::new();
        let mut consumed = 0usize;
        loop {
            if max_bits == Some(consumed) {
                return match includes_eof {
                    true => Err(HuffmanDecodeError::Unterminated),
                    false => Ok(dst),
                };
            }
            let symbol = self.decode_symbol(src, max_bits, &mut consumed)?;
            if symbol == EOF_SYMBOL {
                if !includes_eof {
                    return Err(HuffmanDecodeError::InvalidCode);
                }
                if let Some(budget) = max_bits {
                    src.skip_bits(budget - consumed)
                        .map_err(|_| HuffmanDecodeError::Exhausted)?;
                }
                return Ok(dst);
            }
            dst.push(symbol as u8);
        }
    }

    fn decode_symbol(
        &self,
        src: &mut BitBuffer,
        budget: Option<usize>,
        consumed: &mut usize,
    ) -> Result<u16, HuffmanDecodeError> {
        let mut code = 0u64;
        for len in 1..=self.max_len as usize {
            if let Some(budget) = budget {
                if *consumed >= budget {
                    return Err(HuffmanDecodeError::BudgetOverrun { budget });
                }
            }
            let bit = src.read_bit().map_err(|_| HuffmanDecodeError::Exhausted)?;
            *consumed += 1;
            code = (code << 1) | u64::from(bit);

            let first = self.first_code[len];
            if code >= first && code - first < self.count[len] {
                let position = self.offset[len] + (code - first);
                return Ok(self.sorted[position as usize]);
            }
        }
        Err(HuffmanDecodeError::InvalidCode)
    }
}

/// Accumulates symbol frequencies of coded strings, so a table tuned to a
/// trace can be built with [`FrequencyCounter::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyCounter {
    counts: [u64; SYMBOL_COUNT],
}

impl Default for FrequencyCounter {
    fn default() -> Self {
        Self {
            counts: [0; SYMBOL_COUNT],
        }
    }
}

impl FrequencyCounter {
    /// Creates a counter with every frequency at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts every byte of `src` and one end-of-string symbol.
    pub fn record(&mut self, src: &[u8]) {
        for byte in src {
            self.counts[*byte as usize] += 1;
        }
        self.counts[EOF_SYMBOL as usize] += 1;
    }

    /// Frequency of `symbol`.
    pub fn count(&self, symbol: u16) -> u64 {
        self.counts.get(symbol as usize).copied().unwrap_or(0)
    }

    /// All frequencies, indexed by symbol.
    pub fn frequencies(&self) -> &[u64; SYMBOL_COUNT] {
        &self.counts
    }

    /// Builds a coder from the recorded frequencies.
    pub fn build(&self) -> HuffmanCoder {
        HuffmanCoder::from_frequencies(&self.counts)
    }
}

fn frequency_table(bytes: &[(u8, u64)], eof: u64) -> [u64; SYMBOL_COUNT] {
    let mut table = [0u64; SYMBOL_COUNT];
    for (byte, freq) in bytes {
        table[*byte as usize] = *freq;
    }
    table[EOF_SYMBOL as usize] = eof;
    table
}

/// Computes the Huffman code length of every symbol.
fn code_lengths(weights: &[u64]) -> Vec<u32> {
    let leaf_count = weights.len();
    let mut leaves = (0..leaf_count).collect::<Vec<_>>();
    leaves.sort_by_key(|symbol| (weights[*symbol], *symbol));

    let mut node_weight = weights.to_vec();
    let mut parent = vec![0usize; 2 * leaf_count - 1];
    let mut internal = VecDeque::new();
    let mut next_leaf = 0;

    for _ in 1..leaf_count {
        let lowest = take_lowest(&leaves, &mut next_leaf, &mut internal, &node_weight);
        let second = take_lowest(&leaves, &mut next_leaf, &mut internal, &node_weight);
        let (Some(a), Some(b)) = (lowest, second) else {
            break;
        };
        let id = node_weight.len();
        node_weight.push(node_weight[a].saturating_add(node_weight[b]));
        parent[a] = id;
        parent[b] = id;
        internal.push_back(id);
    }

    // Parents are always created after their children, so a reverse walk
    // sees every parent's depth first.
    let root = node_weight.len() - 1;
    let mut depth = vec![0u32; node_weight.len()];
    for id in (0..root).rev() {
        depth[id] = depth[parent[id]] + 1;
    }
    depth.truncate(leaf_count);
    depth
}

fn take_lowest(
    leaves: &[usize],
    next_leaf: &mut usize,
    internal: &mut VecDeque<usize>,
    weight: &[u64],
) -> Option<usize> {
    let leaf = leaves.get(*next_leaf).copied();
    match (leaf, internal.front().copied()) {
        (Some(leaf), Some(node)) if weight[node] < weight[leaf] => internal.pop_front(),
        (Some(leaf), _) => {
            *next_leaf += 1;
            Some(leaf)
        }
        (None, _) => internal.pop_front(),
    }
}
