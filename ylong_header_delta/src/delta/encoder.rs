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

use std::rc::Rc;

use crate::config::CodecConfig;
use crate::delta::compiler::{DeltaState, OperationCompiler};
use crate::delta::frame::{FrameCodec, StreamId};
use crate::delta::group::GroupId;
use crate::delta::operation::Operation;
use crate::delta::wire::WireFormat;
use crate::error::Result;
use crate::headers::HeaderSet;
use crate::huffman::HuffmanCoder;

const MAX_STREAM_ID: StreamId = 0x7fff_ffff;

/// Encoder side of the codec.
///
/// Each call to [`DeltaEncoder::encode`] produces one framed message. The
/// encoder state only advances once the message is fully serialized, so a
/// failed call can be retried or skipped without desynchronizing the peer.
///
/// # Examples
///
/// ```
/// use ylong_header_delta::{CodecConfig, DeltaDecoder, DeltaEncoder, HeaderSet};
///
/// let config = CodecConfig::default();
/// let mut encoder = DeltaEncoder::new(config.clone()).unwrap();
/// let mut decoder = DeltaDecoder::new(config).unwrap();
///
/// let mut headers = HeaderSet::new();
/// headers.append(":method", "get");
/// headers.append("host", "example.com");
///
/// let bytes = encoder.encode(&headers, 0).unwrap();
/// assert_eq!(decoder.decode(&bytes).unwrap(), headers);
/// ```
pub struct DeltaEncoder {
    state: DeltaState,
    compiler: OperationCompiler,
    wire: WireFormat,
    frames: FrameCodec,
    next_stream_id: StreamId,
}

impl DeltaEncoder {
    /// Creates an encoder using the request Huffman code.
    pub fn new(config: CodecConfig) -> Result<Self> {
        Self::with_coder(config, Rc::new(HuffmanCoder::request()))
    }

    /// Creates an encoder with a specific Huffman code.
    pub fn with_coder(config: CodecConfig, coder: Rc<HuffmanCoder>) -> Result<Self> {
        config.validate()?;
        log::debug!("delta encoder created with {:?}", config);
        Ok(Self {
            state: DeltaState::new(&config),
            compiler: OperationCompiler::new(&config),
            wire: WireFormat::new(&config, coder),
            frames: FrameCodec::new(config.frame_type_byte),
            next_stream_id: 1,
        })
    }

    /// Gets the encoder state.
    pub fn state(&self) -> &DeltaState {
        &self.state
    }

    /// Computes the operations `encode` would send, without changing
    /// anything.
    pub fn plan(&self, headers: &HeaderSet, group: GroupId) -> Result<Vec<Operation>> {
        self.compiler.compute_operations(&self.state, headers, group)
    }

    /// Encodes `headers` as a delta against the last header set of `group`
    /// and returns the framed bytes.
    pub fn encode(&mut self, headers: &HeaderSet, group: GroupId) -> Result<Vec<u8>> {
        let ops = self.plan(headers, group)?;
        let payload = self.wire.serialize(&ops)?;
        self.compiler.apply_operations(&mut self.state, &ops, group)?;

        let stream_id = self.next_stream_id;
        self.next_stream_id = match stream_id {
            MAX_STREAM_ID => 1,
            id => id + 1,
        };
        Ok(self.frames.encode(&payload, stream_id, group))
    }
}
