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

//! `ylong_header_delta` is a stateful, differential codec for HTTP header
//! sets.
//!
//! Instead of compressing every header set on its own, the encoder keeps a
//! table of recently sent fields and, per header group, remembers which of
//! them formed the previous header set. Each message then only describes
//! the difference: entries to switch on or off, new values for known names,
//! and new fields. The decoder mirrors the encoder state and rebuilds the
//! complete header set.
//!
//! # Components
//! - [`HuffmanCoder`]: canonical Huffman code for header strings.
//! - [`HeaderTable`]: static and dynamic entries with bounded size.
//! - [`OperationCompiler`]: computes and applies deltas.
//! - [`WireFormat`] and [`FrameCodec`]: the binary layout of messages.
//! - [`DeltaEncoder`], [`DeltaDecoder`] and [`DeltaProcessor`]: the entry
//!   points.
//!
//! # Examples
//!
//! ```
//! use ylong_header_delta::{CodecConfig, DeltaDecoder, DeltaEncoder, HeaderSet};
//!
//! let config = CodecConfig::compact();
//! let mut encoder = DeltaEncoder::new(config.clone()).unwrap();
//! let mut decoder = DeltaDecoder::new(config).unwrap();
//!
//! for path in ["/", "/style.css", "/app.js"] {
//!     let headers = [(":method", "get"), (":path", path), ("host", "example.com")]
//!         .into_iter()
//!         .collect::<HeaderSet>();
//!     let bytes = encoder.encode(&headers, 1).unwrap();
//!     assert_eq!(decoder.decode(&bytes).unwrap(), headers);
//! }
//! ```

pub(crate) mod config;
pub(crate) mod delta;
pub(crate) mod error;
pub(crate) mod headers;
pub(crate) mod processor;

pub mod huffman;

pub(crate) mod util;

pub use config::{CodecConfig, CodecConfigBuilder, OpcodeWidth, StringCoding, ENV_PREFIX};
pub use delta::{
    compact_toggles, toggled_indices, DeltaDecoder, DeltaEncoder, DeltaState, Entry,
    EvictionCallback, FindResult, Frame, FrameCodec, FrameFlags, FramedMessage, GroupId,
    GroupRegistry, HeaderGroup, HeaderTable, InsertionPlan, Opcode, Operation,
    OperationCompiler, StreamId, WireFormat, STATIC_TABLE,
};
pub use error::{CodecError, FramingError, HuffmanDecodeError, Result};
pub use headers::{
    field_separator, split_field, HeaderMismatch, HeaderSet, COOKIE, VALUE_SEPARATOR,
};
pub use huffman::{FrequencyCounter, HuffmanCoder};
pub use processor::{normalize_host, DeltaProcessor, Direction, HeaderProcessor};
pub use util::bits::{BitBuffer, OutOfBits};
