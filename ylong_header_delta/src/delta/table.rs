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

use core::fmt;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::config::CodecConfig;
use crate::error::{CodecError, Result};

/// Callback invoked with the sequence number of every evicted entry.
pub type EvictionCallback = Box<dyn FnMut(u32)>;

/// A key/value pair stored in the [`HeaderTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    key: Rc<str>,
    value: String,
    sequence_number: u32,
}

impl Entry {
    /// Header name of the entry.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the key string, shared with every clone of this entry.
    pub fn shared_key(&self) -> Rc<str> {
        self.key.clone()
    }

    /// Header value of the entry.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Sequence number of the entry.
    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    /// Size accounted against the byte budget, `len(key) + len(value)`.
    pub fn size(&self) -> usize {
        self.key.len() + self.value.len()
    }
}

/// Result of [`HeaderTable::find`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindResult {
    /// Nearest entry with the same key.
    pub key_index: Option<u32>,
    /// Nearest entry with the same key and value.
    pub exact_index: Option<u32>,
}

/// Outcome of a batch of insertions, predicted by
/// [`HeaderTable::plan_insertions`] without touching the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertionPlan {
    /// Sequence number each insertion will receive.
    pub assigned: Vec<u32>,
    /// Existing entries the batch will evict, oldest first.
    pub evicted: Vec<u32>,
    /// Positions (within the batch) of inserted entries that a later
    /// insertion of the same batch will evict again.
    pub evicted_pending: Vec<usize>,
}

/// The header table: an immutable static segment followed by a bounded
/// dynamic segment.
///
/// # Introduction
/// Static entries own sequence numbers `0..S`. Dynamic entries are numbered
/// in insertion order starting at `S`; after `max_sequence_number - 1` the
/// numbering wraps back to `S`. Because the dynamic segment is a contiguous
/// run of numbers, the position of an entry is its modular distance from the
/// oldest entry, which makes lookups O(1) across the wrap.
///
/// The dynamic segment is bounded by a byte budget and an entry budget.
/// Insertions evict the oldest entries until the new entry fits, and report
/// every eviction to the subscribed callbacks. An entry that cannot fit even
/// into an empty table is rejected before anything is evicted.
///
/// ```text
///          static            dynamic (oldest .. newest)
/// +---+---+-----+----+    +------+------+-----+------+
/// | 0 | 1 | ... | 64 |    | 4093 | 4094 | ... | 4101 |
/// +---+---+-----+----+    +------+------+-----+------+
/// ```
pub struct HeaderTable {
    statics: Vec<Entry>,
    // Front is the oldest entry.
    dynamic: VecDeque<Entry>,
    curr_size: usize,
    max_bytes: usize,
    max_entries: usize,
    max_sequence_number: u32,
    next_sequence: u32,
    subscribers: Vec<EvictionCallback>,
}

impl HeaderTable {
    /// Creates a table with the bounds of `config`. The configuration is
    /// expected to be validated.
    pub fn new(config: &CodecConfig) -> Self {
        Self::build(config.max_bytes, config.max_entries, config.max_sequence_number)
    }

    /// Creates a table with explicit bounds.
    pub fn with_limits(
        max_bytes: usize,
        max_entries: usize,
        max_sequence_number: u32,
    ) -> Result<Self> {
        if u64::from(max_sequence_number) <= STATIC_TABLE.len() as u64 + max_entries as u64 {
            return Err(CodecError::invalid_config(format!(
                "max_sequence_number {max_sequence_number} leaves no room for {max_entries} entries"
            )));
        }
        Ok(Self::build(max_bytes, max_entries, max_sequence_number))
    }

    fn build(max_bytes: usize, max_entries: usize, max_sequence_number: u32) -> Self {
        let statics = STATIC_TABLE
            .iter()
            .enumerate()
            .map(|(seq, (key, value))| Entry {
                key: Rc::from(*key),
                value: value.to_string(),
                sequence_number: seq as u32,
            })
            .collect::<Vec<_>>();
        let next_sequence = statics.len() as u32;
        Self {
            statics,
            dynamic: VecDeque::new(),
            curr_size: 0,
            max_bytes,
            max_entries,
            max_sequence_number,
            next_sequence,
            subscribers: Vec::new(),
        }
    }

    /// Number of static entries.
    pub fn static_count(&self) -> usize {
        self.statics.len()
    }

    /// Number of dynamic entries.
    pub fn len(&self) -> usize {
        self.dynamic.len()
    }

    /// Returns `true` if the dynamic segment is empty.
    pub fn is_empty(&self) -> bool {
        self.dynamic.is_empty()
    }

    /// Bytes used by dynamic entries.
    pub fn current_size(&self) -> usize {
        self.curr_size
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn max_sequence_number(&self) -> u32 {
        self.max_sequence_number
    }

    /// Iterates over dynamic entries, oldest first.
    pub fn dynamic_entries(&self) -> impl Iterator<Item = &Entry> {
        self.dynamic.iter()
    }

    /// Registers a callback invoked synchronously for every eviction.
    pub fn subscribe_eviction<F>(&mut self, callback: F)
    where
        F: FnMut(u32) + 'static,
    {
        self.subscribers.push(Box::new(callback));
    }

    /// Gets the entry numbered `seq`, static or dynamic.
    pub fn lookup(&self, seq: u32) -> Option<&Entry> {
        if (seq as usize) < self.statics.len() {
            return self.statics.get(seq as usize);
        }
        if seq >= self.max_sequence_number {
            return None;
        }
        let oldest = self.dynamic.front()?.sequence_number;
        let entry = self.dynamic.get(self.distance(oldest, seq) as usize)?;
        debug_assert_eq!(entry.sequence_number, seq);
        Some(entry)
    }

    /// Returns `true` if `seq` resolves to an entry.
    pub fn contains(&self, seq: u32) -> bool {
        self.lookup(seq).is_some()
    }

    /// Finds the nearest entries matching `key` and `(key, value)`. Dynamic
    /// entries are searched newest first, then static entries.
    pub fn find(&self, key: &str, value: &str) -> FindResult {
        self.find_with(key, value, |_| true)
    }

    /// Like [`HeaderTable::find`], but exact matches are only reported for
    /// sequence numbers accepted by `usable`.
    pub fn find_with<F>(&self, key: &str, value: &str, usable: F) -> FindResult
    where
        F: Fn(u32) -> bool,
    {
        let mut result = FindResult::default();
        for entry in self.dynamic.iter().rev().chain(self.statics.iter()) {
            if &*entry.key != key {
                continue;
            }
            let seq = entry.sequence_number;
            if result.key_index.is_none() {
                result.key_index = Some(seq);
            }
            if result.exact_index.is_none() && entry.value == value && usable(seq) {
                result.exact_index = Some(seq);
                break;
            }
        }
        result
    }

    /// Fails with `CapacityExceeded` if an entry of `size` bytes could not
    /// fit even into an empty table.
    pub fn check_capacity(&self, size: usize) -> Result<()> {
        if size > self.max_bytes || self.max_entries == 0 {
            return Err(CodecError::CapacityExceeded {
                size,
                max_bytes: self.max_bytes,
                max_entries: self.max_entries,
            });
        }
        Ok(())
    }

    /// Predicts what inserting entries of the given sizes, in order, will
    /// do. Fails like `insert` would, without mutating anything.
    pub fn plan_insertions(&self, sizes: &[usize]) -> Result<InsertionPlan> {
        let mut plan = InsertionPlan::default();
        // Batch entries still alive, as (position in batch, size).
        let mut pending = VecDeque::new();
        let mut front = 0;
        let mut size = self.curr_size;
        let mut len = self.dynamic.len();
        let mut seq = self.next_sequence;

        for (position, new_size) in sizes.iter().enumerate() {
            self.check_capacity(*new_size)?;
            while size + new_size > self.max_bytes || len + 1 > self.max_entries {
                if let Some(entry) = self.dynamic.get(front) {
                    front += 1;
                    size -= entry.size();
                    plan.evicted.push(entry.sequence_number);
                } else if let Some((evicted, evicted_size)) = pending.pop_front() {
                    size -= evicted_size;
                    plan.evicted_pending.push(evicted);
                } else {
                    break;
                }
                len -= 1;
            }
            plan.assigned.push(seq);
            pending.push_back((position, *new_size));
            size += new_size;
            len += 1;
            seq = self.next_after(seq);
        }
        Ok(plan)
    }

    /// Inserts a new entry, evicting the oldest entries as needed, and
    /// returns its sequence number.
    pub fn insert<K, V>(&mut self, key: K, value: V) -> Result<u32>
    where
        K: Into<Rc<str>>,
        V: Into<String>,
    {
        let key = key.into();
        let value = value.into();
        let size = key.len() + value.len();
        self.check_capacity(size)?;

        while self.curr_size + size > self.max_bytes || self.dynamic.len() + 1 > self.max_entries {
            if self.evict_oldest().is_none() {
                break;
            }
        }

        let seq = self.next_sequence;
        self.next_sequence = self.next_after(seq);
        self.curr_size += size;
        self.dynamic.push_back(Entry {
            key,
            value,
            sequence_number: seq,
        });
        Ok(seq)
    }

    fn evict_oldest(&mut self) -> Option<u32> {
        let entry = self.dynamic.pop_front()?;
        self.curr_size -= entry.size();
        let seq = entry.sequence_number;
        log::debug!(
            "evict entry {} ({} bytes), table now {}/{} bytes",
            seq,
            entry.size(),
            self.curr_size,
            self.max_bytes
        );
        for callback in self.subscribers.iter_mut() {
            callback(seq);
        }
        Some(seq)
    }

    fn next_after(&self, seq: u32) -> u32 {
        match seq + 1 >= self.max_sequence_number {
            true => self.statics.len() as u32,
            false => seq + 1,
        }
    }

    // Number of insertions separating `from` and `to` on the wrapping
    // dynamic numbering.
    fn distance(&self, from: u32, to: u32) -> u64 {
        let base = self.statics.len() as u64;
        let span = u64::from(self.max_sequence_number) - base;
        (u64::from(to) + span - u64::from(from)) % span
    }
}

impl fmt::Debug for HeaderTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderTable")
            .field("dynamic", &self.dynamic)
            .field("curr_size", &self.curr_size)
            .field("max_bytes", &self.max_bytes)
            .field("max_entries", &self.max_entries)
            .field("max_sequence_number", &self.max_sequence_number)
            .field("next_sequence", &self.next_sequence)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Default entries, numbered from zero.
pub const STATIC_TABLE: &[(&str, &str)] = &[
    (":scheme", "http"),
    (":scheme", "https"),
    (":method", "get"),
    (":path", "/"),
    (":host", ""),
    ("cookie", ""),
    (":status", "200"),
    (":status-text", "OK"),
    (":version", "1.1"),
    ("accept", ""),
    ("accept-charset", ""),
    ("accept-encoding", ""),
    ("accept-language", ""),
    ("accept-ranges", ""),
    ("allow", ""),
    ("authorizations", ""),
    ("cache-control", ""),
    ("content-base", ""),
    ("content-encoding", ""),
    ("content-length", ""),
    ("content-location", ""),
    ("content-md5", ""),
    ("content-range", ""),
    ("content-type", ""),
    ("date", ""),
    ("etag", ""),
    ("expect", ""),
    ("expires", ""),
    ("from", ""),
    ("if-match", ""),
    ("if-modified-since", ""),
    ("if-none-match", ""),
    ("if-range", ""),
    ("if-unmodified-since", ""),
    ("last-modified", ""),
    ("location", ""),
    ("max-forwards", ""),
    ("origin", ""),
    ("pragma", ""),
    ("proxy-authenticate", ""),
    ("proxy-authorization", ""),
    ("range", ""),
    ("referer", ""),
    ("retry-after", ""),
    ("server", ""),
    ("set-cookie", ""),
    ("status", ""),
    ("te", ""),
    ("trailer", ""),
    ("transfer-encoding", ""),
    ("upgrade", ""),
    ("user-agent", ""),
    ("vary", ""),
    ("via", ""),
    ("warning", ""),
    ("www-authenticate", ""),
    ("access-control-allow-origin", ""),
    ("content-disposition", ""),
    ("get-dictionary", ""),
    ("p3p", ""),
    ("x-content-type-options", ""),
    ("x-frame-options", ""),
    ("x-powered-by", ""),
    ("x-xss-protection", ""),
    ("connection", "keep-alive"),
];
