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

//! Header multisets exchanged with the codec.
//!
//! A [`HeaderSet`] maps lowercase header names to values. A name that occurs
//! several times in a message keeps all of its values in one joined string:
//! `cookie` crumbs are joined with `"; "`, every other field with a NUL byte.
//! The codec works on the individual values, called fields here.
//!
//! # Examples
//!
//! ```
//! use ylong_header_delta::HeaderSet;
//!
//! let mut headers = HeaderSet::new();
//! headers.append("Cookie", "a=1");
//! headers.append("cookie", "b=2");
//! headers.append("accept", "text/html");
//! headers.append("accept", "*/*");
//!
//! assert_eq!(headers.get("cookie"), Some("a=1; b=2"));
//! assert_eq!(headers.get("accept"), Some("text/html\0*/*"));
//! assert_eq!(headers.fields().len(), 4);
//! ```

use core::fmt;
use std::collections::btree_map::{self, BTreeMap};
use std::collections::BTreeSet;

/// Name of the field whose values are separated by `;`.
pub const COOKIE: &str = "cookie";

/// Separator between the values of a multi-valued field other than `cookie`.
pub const VALUE_SEPARATOR: char = '\0';

/// Returns the separator used to join the values of `name`.
pub fn field_separator(name: &str) -> &'static str {
    match name {
        COOKIE => "; ",
        _ => "\0",
    }
}

/// Splits a joined value of `name` into its fields. `cookie` splits on `;`
/// with leading spaces of each crumb removed, other names split on NUL.
pub fn split_field<'a>(name: &str, value: &'a str) -> Vec<&'a str> {
    match name {
        COOKIE => value
            .split(';')
            .map(|crumb| crumb.trim_start_matches(' '))
            .collect(),
        _ => value.split(VALUE_SEPARATOR).collect(),
    }
}

/// A header multiset keyed by lowercase name.
#[derive(Debug, Clone, Default, Eq)]
pub struct HeaderSet {
    map: BTreeMap<String, String>,
}

impl HeaderSet {
    /// Creates an empty `HeaderSet`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the joined value of `name`, replacing any previous value.
    pub fn insert(&mut self, name: &str, value: &str) -> Option<String> {
        self.map.insert(name.to_ascii_lowercase(), value.to_string())
    }

    /// Adds one more value to `name`, joining it with the separator of that
    /// name.
    pub fn append(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let separator = field_separator(&name);
        match self.map.entry(name) {
            btree_map::Entry::Occupied(mut entry) => {
                let joined = entry.get_mut();
                joined.push_str(separator);
                joined.push_str(value);
            }
            btree_map::Entry::Vacant(entry) => {
                entry.insert(value.to_string());
            }
        }
    }

    /// Returns the joined value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Removes `name` and returns its joined value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.map.remove(&name.to_ascii_lowercase())
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the set holds no names.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over names and joined values, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns every individual `(name, value)` field, multi-valued names
    /// split with [`split_field`].
    pub fn fields(&self) -> Vec<(&str, &str)> {
        self.map
            .iter()
            .flat_map(|(name, value)| {
                split_field(name, value)
                    .into_iter()
                    .map(move |field| (name.as_str(), field))
            })
            .collect()
    }

    /// Compares two sets, ignoring the order of the values of a name.
    /// Returns the first name (in name order) whose values differ.
    pub fn mismatch(&self, other: &HeaderSet) -> Option<HeaderMismatch> {
        let names = self
            .map
            .keys()
            .chain(other.map.keys())
            .collect::<BTreeSet<_>>();
        names.into_iter().find_map(|name| {
            let expected = sorted_fields(name, self.map.get(name));
            let actual = sorted_fields(name, other.map.get(name));
            (expected != actual).then(|| HeaderMismatch {
                name: name.clone(),
                expected,
                actual,
            })
        })
    }
}

fn sorted_fields(name: &str, value: Option<&String>) -> Vec<String> {
    let mut fields = value
        .map(|value| {
            split_field(name, value)
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    fields.sort();
    fields
}

impl PartialEq for HeaderSet {
    fn eq(&self, other: &Self) -> bool {
        self.mismatch(other).is_none()
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for HeaderSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut headers = HeaderSet::new();
        headers.extend(iter);
        headers
    }
}

impl<K: AsRef<str>, V: AsRef<str>> Extend<(K, V)> for HeaderSet {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (name, value) in iter {
            self.append(name.as_ref(), value.as_ref());
        }
    }
}

/// Difference between an original and a reconstructed header set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMismatch {
    /// The differing name.
    pub name: String,
    /// Sorted fields of the original set, empty if the name was absent.
    pub expected: Vec<String>,
    /// Sorted fields of the reconstructed set, empty if the name was absent.
    pub actual: Vec<String>,
}

impl fmt::Display for HeaderMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "header {} differs: expected {:?}, got {:?}",
            self.name, self.expected, self.actual
        )
    }
}
