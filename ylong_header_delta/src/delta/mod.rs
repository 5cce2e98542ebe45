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

//! Differential header compression.
//!
//! # Introduction
//! Encoder and decoder each keep a [`HeaderTable`] of recently sent fields
//! and, per header group, the set of table entries that made up the group's
//! last header set. A message only carries the difference to that set:
//! entries switched on or off, new values for known keys, new fields, and
//! fields that are never stored.
//!
//! Both sides apply every message to their own state in the same way, so
//! the states stay identical as long as no message is lost.

pub(crate) mod compiler;
pub(crate) mod decoder;
pub(crate) mod encoder;
pub(crate) mod frame;
pub(crate) mod group;
pub(crate) mod integer;
pub(crate) mod operation;
pub(crate) mod table;
pub(crate) mod wire;

pub use compiler::{DeltaState, OperationCompiler};
pub use decoder::DeltaDecoder;
pub use encoder::DeltaEncoder;
pub use frame::{Frame, FrameCodec, FrameFlags, FramedMessage, StreamId};
pub use group::{GroupId, GroupRegistry, HeaderGroup};
pub use operation::{compact_toggles, toggled_indices, Opcode, Operation};
pub use table::{Entry, EvictionCallback, FindResult, HeaderTable, InsertionPlan, STATIC_TABLE};
pub use wire::WireFormat;
