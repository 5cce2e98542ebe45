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

use std::cell::RefCell;
use std::collections::{btree_map, BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::delta::table::HeaderTable;

/// Identifier of a header group on the wire.
pub type GroupId = u8;

/// Sequence numbers of the entries that make up the last header set of one
/// context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderGroup {
    id: GroupId,
    active: BTreeSet<u32>,
}

impl HeaderGroup {
    /// Creates an empty group.
    pub fn new(id: GroupId) -> Self {
        Self {
            id,
            active: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Flips the membership of `seq`. Returns `true` if `seq` is now active.
    pub fn toggle(&mut self, seq: u32) -> bool {
        match self.active.remove(&seq) {
            true => false,
            false => self.active.insert(seq),
        }
    }

    /// Makes `seq` active.
    pub fn activate(&mut self, seq: u32) {
        self.active.insert(seq);
    }

    /// Drops `seq` from the group. Returns `true` if it was active.
    pub fn deactivate(&mut self, seq: u32) -> bool {
        self.active.remove(&seq)
    }

    pub fn contains(&self, seq: u32) -> bool {
        self.active.contains(&seq)
    }

    /// Active sequence numbers in ascending order.
    pub fn active(&self) -> &BTreeSet<u32> {
        &self.active
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Every header group that refers to one table.
#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
    groups: BTreeMap<GroupId, HeaderGroup>,
}

impl GroupRegistry {
    /// Creates a registry shared with the eviction callback of `table`.
    pub fn attach(table: &mut HeaderTable) -> Rc<RefCell<Self>> {
        let registry = Rc::new(RefCell::new(Self::default()));
        let observer = registry.clone();
        table.subscribe_eviction(move |seq| observer.borrow_mut().on_evicted(seq));
        registry
    }

    pub fn get(&self, id: GroupId) -> Option<&HeaderGroup> {
        self.groups.get(&id)
    }

    /// Gets the group `id`, creating it empty if needed.
    pub fn get_or_create(&mut self, id: GroupId) -> &mut HeaderGroup {
        match self.groups.entry(id) {
            btree_map::Entry::Occupied(entry) => entry.into_mut(),
            btree_map::Entry::Vacant(entry) => entry.insert(HeaderGroup::new(id)),
        }
    }

    /// Active set of group `id`, empty if the group does not exist yet.
    pub fn active(&self, id: GroupId) -> BTreeSet<u32> {
        self.groups
            .get(&id)
            .map(|group| group.active.clone())
            .unwrap_or_default()
    }

    /// Iterates over groups ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &HeaderGroup> {
        self.groups.values()
    }

    /// Drops `seq` from every group.
    pub fn on_evicted(&mut self, seq: u32) {
        for group in self.groups.values_mut() {
            if group.deactivate(seq) {
                log::trace!("group {} lost evicted entry {}", group.id, seq);
            }
        }
    }
}
