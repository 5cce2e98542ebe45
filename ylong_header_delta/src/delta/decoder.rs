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
use crate::delta::frame::FrameCodec;
use crate::delta::group::GroupId;
use crate::delta::operation::Operation;
use crate::delta::wire::WireFormat;
use crate::error::Result;
use crate::headers::HeaderSet;
use crate::huffman::HuffmanCoder;

/// Decoder side of the codec.
///
/// A message that fails to decode leaves the decoder state untouched.
pub struct DeltaDecoder {
    state: DeltaState,
    compiler: OperationCompiler,
    wire: WireFormat,
    frames: FrameCodec,
}

impl DeltaDecoder {
    /// Creates a decoder using the request Huffman code.
    pub fn new(config: CodecConfig) -> Result<Self> {
        Self::with_coder(config, Rc::new(HuffmanCoder::request()))
    }

    /// Creates a decoder with a specific Huffman code.
    pub fn with_coder(config: CodecConfig, coder: Rc<HuffmanCoder>) -> Result<Self> {
        config.validate()?;
        log::debug!("delta decoder created with {:?}", config);
        Ok(Self {
            state: DeltaState::new(&config),
            compiler: OperationCompiler::new(&config),
            wire: WireFormat::new(&config, coder),
            frames: FrameCodec::new(config.frame_type_byte),
        })
    }

    /// Gets the decoder state.
    pub fn state(&self) -> &DeltaState {
        &self.state
    }

    /// Parses one framed message into its group id and operations without
    /// applying them.
    pub fn parse(&self, bytes: &[u8]) -> Result<(GroupId, Vec<Operation>)> {
        let message = self.frames.decode(bytes)?;
        let ops = self.wire.deserialize(&message.payload)?;
        Ok((message.group_id, ops))
    }

    /// Decodes one framed message and returns the header set it carries.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<HeaderSet> {
        let (group, ops) = self.parse(bytes)?;
        self.compiler.apply_operations(&mut self.state, &ops, group)
    }
}
