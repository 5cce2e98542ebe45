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

//! The diff engine.
//!
//! # Introduction
//! The encoder computes, for one header group, the operations that turn the
//! group's active set into the desired header multiset. Both the encoder and
//! the decoder then apply those operations to their own [`DeltaState`], in
//! the same fixed order:
//!
//! ```text
//! Toggle / ToggleRange -> Clone -> Store -> EphemeralRef
//! ```
//!
//! Clone keys are resolved before anything is inserted, so an insertion of
//! the same batch can never evict a key a clone still needs.
//!
//! Applying validates the whole batch first (known sequence numbers, table
//! capacity) and only then mutates, so a failed batch leaves the state as it
//! was.
//!
//! An insertion may evict an entry that the desired set still uses. The
//! encoder predicts these evictions and sends the affected fields again as
//! ephemeral references, so the reconstructed set is always complete.

use core::cell::{Ref, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::config::CodecConfig;
use crate::delta::group::{GroupId, GroupRegistry};
use crate::delta::operation::{compact_toggles, toggled_indices, Operation};
use crate::delta::table::{FindResult, HeaderTable};
use crate::error::{CodecError, Result};
use crate::headers::HeaderSet;

/// A header table and the header groups that refer to it.
#[derive(Debug)]
pub struct DeltaState {
    table: HeaderTable,
    groups: Rc<RefCell<GroupRegistry>>,
}

impl DeltaState {
    /// Creates an empty state with the table bounds of `config`.
    pub fn new(config: &CodecConfig) -> Self {
        let mut table = HeaderTable::new(config);
        let groups = GroupRegistry::attach(&mut table);
        Self { table, groups }
    }

    pub fn table(&self) -> &HeaderTable {
        &self.table
    }

    /// Borrows the header groups.
    pub fn groups(&self) -> Ref<'_, GroupRegistry> {
        self.groups.borrow()
    }

    /// Active sequence numbers of `group`.
    pub fn active(&self, group: GroupId) -> BTreeSet<u32> {
        self.groups.borrow().active(group)
    }
}

/// Computes and applies operations according to the configured policy.
#[derive(Debug, Clone)]
pub struct OperationCompiler {
    ephemeral_keys: BTreeSet<String>,
    min_toggle_run: usize,
}

impl OperationCompiler {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            ephemeral_keys: config.ephemeral_keys.iter().cloned().collect(),
            min_toggle_run: config.min_toggle_run,
        }
    }

    /// Computes the operations that make `group` represent `headers`.
    /// Nothing is mutated; pass the result to
    /// [`OperationCompiler::apply_operations`].
    pub fn compute_operations(
        &self,
        state: &DeltaState,
        headers: &HeaderSet,
        group: GroupId,
    ) -> Result<Vec<Operation>> {
        let table = &state.table;
        let active = state.active(group);

        let mut desired = BTreeMap::<(&str, &str), usize>::new();
        for field in headers.fields() {
            *desired.entry(field).or_default() += 1;
        }

        // Active entries still wanted are kept, the others are switched off.
        let mut toggles = BTreeSet::new();
        let mut claimed = BTreeSet::new();
        for seq in active.iter().copied() {
            let entry = table
                .lookup(seq)
                .ok_or(CodecError::StateDesync { index: seq })?;
            match desired.get_mut(&(entry.key(), entry.value())) {
                Some(count) if *count > 0 => {
                    *count -= 1;
                    claimed.insert(seq);
                }
                _ => {
                    toggles.insert(seq);
                }
            }
        }

        let mut clones = Vec::new();
        let mut stores = Vec::new();
        let mut ephemerals = Vec::new();
        for ((key, value), count) in desired {
            for _ in 0..count {
                if self.ephemeral_keys.contains(key) {
                    ephemerals.push((key, value));
                    continue;
                }
                let found = table.find_with(key, value, |seq| {
                    !active.contains(&seq) && !claimed.contains(&seq)
                });
                match found {
                    FindResult {
                        exact_index: Some(seq),
                        ..
                    } => {
                        toggles.insert(seq);
                        claimed.insert(seq);
                    }
                    FindResult {
                        key_index: Some(key_index),
                        ..
                    } => clones.push((key_index, key, value)),
                    _ => stores.push((key, value)),
                }
            }
        }

        // Inserted pairs in application order.
        let inserted = clones
            .iter()
            .map(|(_, key, value)| (*key, *value))
            .chain(stores.iter().copied())
            .collect::<Vec<_>>();
        let sizes = inserted
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .collect::<Vec<_>>();
        let plan = table.plan_insertions(&sizes)?;

        for seq in plan.evicted.iter().filter(|seq| claimed.contains(seq)) {
            if let Some(entry) = table.lookup(*seq) {
                ephemerals.push((entry.key(), entry.value()));
            }
        }
        for position in plan.evicted_pending.iter() {
            if let Some(pair) = inserted.get(*position) {
                ephemerals.push(*pair);
            }
        }

        let mut ops = compact_toggles(&toggles, self.min_toggle_run);
        ops.extend(
            clones
                .into_iter()
                .map(|(key_index, _, value)| Operation::Clone {
                    key_index,
                    value: value.to_string(),
                }),
        );
        ops.extend(stores.into_iter().map(|(key, value)| Operation::Store {
            key: key.to_string(),
            value: value.to_string(),
        }));
        ops.extend(
            ephemerals
                .into_iter()
                .map(|(key, value)| Operation::EphemeralRef {
                    key: key.to_string(),
                    value: value.to_string(),
                }),
        );

        log::trace!(
            "group {}: {} toggled, {} inserted, {} evicted, {} operations",
            group,
            toggles.len(),
            inserted.len(),
            plan.evicted.len() + plan.evicted_pending.len(),
            ops.len()
        );
        Ok(ops)
    }

    /// Applies `ops` to `group` and returns the header set the group now
    /// represents, plus this message's ephemeral fields.
    pub fn apply_operations(
        &self,
        state: &mut DeltaState,
        ops: &[Operation],
        group: GroupId,
    ) -> Result<HeaderSet> {
        // A range can never be longer than the table.
        let capacity = (state.table.static_count() + state.table.max_entries()) as u64;
        for op in ops {
            if let Operation::ToggleRange { start, end } = op {
                if start <= end && u64::from(end - start) >= capacity {
                    return Err(CodecError::StateDesync { index: *end });
                }
            }
        }

        let toggles = toggled_indices(ops)?;
        if let Some(missing) = toggles.iter().find(|seq| !state.table.contains(**seq)) {
            return Err(CodecError::StateDesync { index: *missing });
        }

        let mut inserts = Vec::new();
        for op in ops {
            if let Operation::Clone { key_index, value } = op {
                let key = state
                    .table
                    .lookup(*key_index)
                    .ok_or(CodecError::StateDesync { index: *key_index })?
                    .shared_key();
                inserts.push((key, value.clone()));
            }
        }
        for op in ops {
            if let Operation::Store { key, value } = op {
                inserts.push((Rc::from(key.as_str()), value.clone()));
            }
        }
        let sizes = inserts
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .collect::<Vec<_>>();
        state.table.plan_insertions(&sizes)?;

        {
            let mut groups = state.groups.borrow_mut();
            let target = groups.get_or_create(group);
            for seq in toggles {
                target.toggle(seq);
            }
        }
        for (key, value) in inserts {
            // The eviction callback borrows the registry, so no borrow may be
            // held across `insert`.
            let seq = state.table.insert(key, value)?;
            state.groups.borrow_mut().get_or_create(group).activate(seq);
        }

        let mut headers = HeaderSet::new();
        let groups = state.groups.borrow();
        if let Some(target) = groups.get(group) {
            for seq in target.active().iter().copied() {
                let entry = state
                    .table
                    .lookup(seq)
                    .ok_or(CodecError::StateDesync { index: seq })?;
                headers.append(entry.key(), entry.value());
            }
        }
        for op in ops {
            if let Operation::EphemeralRef { key, value } = op {
                headers.append(key, value);
            }
        }
        Ok(headers)
    }
}
