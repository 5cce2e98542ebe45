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

//! Operations that move a header group from one header set to the next.

use core::convert::TryFrom;
use std::collections::BTreeSet;

use crate::error::FramingError;

/// Wire code of each operation kind. Blocks are emitted, and operations are
/// applied, in ascending opcode order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Opcode {
    Toggle = 0x1,
    ToggleRange = 0x2,
    Clone = 0x3,
    Store = 0x4,
    EphemeralRef = 0x5,
}

impl Opcode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = FramingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let opcode = match value {
            0x1 => Opcode::Toggle,
            0x2 => Opcode::ToggleRange,
            0x3 => Opcode::Clone,
            0x4 => Opcode::Store,
            0x5 => Opcode::EphemeralRef,
            other => return Err(FramingError::UnknownOpcode(other)),
        };
        Ok(opcode)
    }
}

/// One step of a header set update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Flips the membership of `index` in the active set.
    Toggle { index: u32 },
    /// Flips every index of `start..=end`.
    ToggleRange { start: u32, end: u32 },
    /// Stores `value` under the key of entry `key_index` and activates it.
    Clone { key_index: u32, value: String },
    /// Stores a new entry and activates it.
    Store { key: String, value: String },
    /// Adds a field to this message only.
    EphemeralRef { key: String, value: String },
}

impl Operation {
    pub fn opcode(&self) -> Opcode {
        match self {
            Operation::Toggle { .. } => Opcode::Toggle,
            Operation::ToggleRange { .. } => Opcode::ToggleRange,
            Operation::Clone { .. } => Opcode::Clone,
            Operation::Store { .. } => Opcode::Store,
            Operation::EphemeralRef { .. } => Opcode::EphemeralRef,
        }
    }

    /// Returns `true` for `Toggle` and `ToggleRange`.
    pub fn is_toggle(&self) -> bool {
        matches!(
            self,
            Operation::Toggle { .. } | Operation::ToggleRange { .. }
        )
    }
}

/// Collapses runs of at least `min_run` consecutive indices into
/// `ToggleRange`s and leaves the rest as single `Toggle`s. Toggles come
/// before ranges, each group in ascending index order.
pub fn compact_toggles(indices: &BTreeSet<u32>, min_run: usize) -> Vec<Operation> {
    let mut singles = Vec::new();
    let mut ranges = Vec::new();
    let mut flush = |start: u32, end: u32| {
        if (end - start) as usize + 1 >= min_run {
            ranges.push(Operation::ToggleRange { start, end });
        } else {
            singles.extend((start..=end).map(|index| Operation::Toggle { index }));
        }
    };

    let mut run: Option<(u32, u32)> = None;
    for index in indices.iter().copied() {
        run = match run {
            Some((start, end)) if end.checked_add(1) == Some(index) => Some((start, index)),
            Some((start, end)) => {
                flush(start, end);
                Some((index, index))
            }
            None => Some((index, index)),
        };
    }
    if let Some((start, end)) = run {
        flush(start, end);
    }

    singles.extend(ranges);
    singles
}

/// Every index flipped by the toggles of `ops`. An index flipped twice is
/// flipped back, so it is absent from the result.
pub fn toggled_indices(ops: &[Operation]) -> Result<BTreeSet<u32>, FramingError> {
    let mut indices = BTreeSet::new();
    let mut flip = |index: u32| {
        if !indices.remove(&index) {
            indices.insert(index);
        }
    };
    for op in ops {
        match op {
            Operation::Toggle { index } => flip(*index),
            Operation::ToggleRange { start, end } => {
                if start > end {
                    return Err(FramingError::InvalidRange {
                        start: *start,
                        end: *end,
                    });
                }
                (*start..=*end).for_each(&mut flip);
            }
            _ => {}
        }
    }
    Ok(indices)
}
