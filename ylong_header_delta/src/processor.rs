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

//! Header processors: a compressor and a decompressor paired behind one
//! interface, as used by a trace harness comparing codecs.

use std::collections::HashMap;
use std::rc::Rc;

use crate::config::CodecConfig;
use crate::delta::{DeltaDecoder, DeltaEncoder, GroupId};
use crate::error::Result;
use crate::headers::HeaderSet;
use crate::huffman::{FrequencyCounter, HuffmanCoder};

/// A codec that compresses header sets of one direction and decompresses
/// its own output.
pub trait HeaderProcessor {
    /// Name of the codec.
    fn name(&self) -> &str;

    /// Compresses `headers`. `host` is the host of the request, or of the
    /// request a response answers.
    fn compress(&mut self, headers: &HeaderSet, host: &str) -> Result<Vec<u8>>;

    /// Decompresses bytes produced by [`HeaderProcessor::compress`].
    fn decompress(&mut self, bytes: &[u8]) -> Result<HeaderSet>;
}

/// Direction of the headers a processor handles. Selects the Huffman code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Request,
    Response,
}

impl Direction {
    /// Builds the Huffman code for this direction.
    pub fn coder(self) -> HuffmanCoder {
        match self {
            Direction::Request => HuffmanCoder::request(),
            Direction::Response => HuffmanCoder::response(),
        }
    }
}

/// [`HeaderProcessor`] backed by a [`DeltaEncoder`] and a [`DeltaDecoder`].
///
/// Every host domain gets its own header group, so header sets of unrelated
/// sites do not disturb each other's deltas.
///
/// # Examples
///
/// ```
/// use ylong_header_delta::{CodecConfig, DeltaProcessor, Direction, HeaderProcessor, HeaderSet};
///
/// let mut processor = DeltaProcessor::new(CodecConfig::default(), Direction::Request).unwrap();
/// let headers = [(":method", "get"), (":path", "/index.html"), ("host", "www.example.com")]
///     .into_iter()
///     .collect::<HeaderSet>();
///
/// let bytes = processor.compress(&headers, "www.example.com").unwrap();
/// assert_eq!(processor.decompress(&bytes).unwrap(), headers);
/// assert_eq!(processor.group_of("static.example.com"), Some(1));
/// ```
pub struct DeltaProcessor {
    direction: Direction,
    encoder: DeltaEncoder,
    decoder: DeltaDecoder,
    hosts: HashMap<String, GroupId>,
    last_group: GroupId,
    frequencies: FrequencyCounter,
}

impl DeltaProcessor {
    pub fn new(config: CodecConfig, direction: Direction) -> Result<Self> {
        let coder = Rc::new(direction.coder());
        Ok(Self {
            direction,
            encoder: DeltaEncoder::with_coder(config.clone(), coder.clone())?,
            decoder: DeltaDecoder::with_coder(config, coder)?,
            hosts: HashMap::new(),
            last_group: 0,
            frequencies: FrequencyCounter::new(),
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn encoder(&self) -> &DeltaEncoder {
        &self.encoder
    }

    pub fn decoder(&self) -> &DeltaDecoder {
        &self.decoder
    }

    /// Byte frequencies of every field compressed so far. Useful to build a
    /// better Huffman code for later runs.
    pub fn frequencies(&self) -> &FrequencyCounter {
        &self.frequencies
    }

    /// Group already assigned to the domain of `host`.
    pub fn group_of(&self, host: &str) -> Option<GroupId> {
        self.hosts.get(&normalize_host(host)).copied()
    }

    fn group_for(&mut self, host: &str) -> GroupId {
        let domain = normalize_host(host);
        if let Some(id) = self.hosts.get(&domain) {
            return *id;
        }
        // Ids run from 1 and wrap; a reused id leaves its former domain.
        let id = match self.last_group {
            GroupId::MAX => 1,
            last => last + 1,
        };
        self.last_group = id;
        self.hosts.retain(|_, group| *group != id);
        log::debug!("domain {} uses header group {}", domain, id);
        self.hosts.insert(domain, id);
        id
    }
}

impl HeaderProcessor for DeltaProcessor {
    fn name(&self) -> &str {
        "delta2"
    }

    fn compress(&mut self, headers: &HeaderSet, host: &str) -> Result<Vec<u8>> {
        let group = self.group_for(host);
        let bytes = self.encoder.encode(headers, group)?;
        for (name, value) in headers.iter() {
            self.frequencies.record(name.as_bytes());
            self.frequencies.record(value.as_bytes());
        }
        Ok(bytes)
    }

    fn decompress(&mut self, bytes: &[u8]) -> Result<HeaderSet> {
        self.decoder.decode(bytes)
    }
}

/// Keeps the last two labels of `host`, lowercased. `www.example.com` and
/// `img.example.com` both become `example.com`.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    let mut labels = host.rsplitn(3, '.');
    match (labels.next(), labels.next()) {
        (Some(last), Some(second)) => format!("{second}.{last}"),
        _ => host,
    }
}
