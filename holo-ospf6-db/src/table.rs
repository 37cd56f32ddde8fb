//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::ops::Bound;

use ipnetwork::Ipv6Network;
use serde::{Deserialize, Serialize};

// Maximum length of a table key, in bits.
pub const TRIE_KEY_MAX_LEN: u8 = 128;

// Variable-length bit-string used to index a prefix table.
//
// Bits are left-aligned and always masked to `len`. The derived ordering
// (bits first, then length) sorts every prefix right before all of the
// prefixes it covers, which is the pre-order traversal of a binary trie. As a
// consequence, the entries covered by any given prefix form a contiguous range.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct TrieKey {
    bits: u128,
    len: u8,
}

// Ordered key-value store indexed by bit-prefixes.
#[derive(Debug)]
pub struct PrefixTable<T> {
    tree: BTreeMap<TrieKey, T>,
}

// ===== impl TrieKey =====

impl TrieKey {
    pub fn new(bits: u128, len: u8) -> TrieKey {
        let len = std::cmp::min(len, TRIE_KEY_MAX_LEN);
        TrieKey {
            bits: bits & mask(len),
            len,
        }
    }

    pub fn bits(&self) -> u128 {
        self.bits
    }

    pub fn len(&self) -> u8 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // Returns a copy of this key shortened to `len` bits.
    pub fn truncate(&self, len: u8) -> TrieKey {
        TrieKey::new(self.bits, std::cmp::min(len, self.len))
    }

    // Returns whether `other` is equal to or more specific than this key.
    pub fn contains(&self, other: &TrieKey) -> bool {
        self.len <= other.len && (other.bits & mask(self.len)) == self.bits
    }
}

impl From<Ipv6Network> for TrieKey {
    fn from(prefix: Ipv6Network) -> TrieKey {
        TrieKey::new(u128::from(prefix.network()), prefix.prefix())
    }
}

impl std::fmt::Display for TrieKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}/{}", self.bits, self.len)
    }
}

// ===== impl PrefixTable =====

impl<T> PrefixTable<T> {
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn get(&self, key: &TrieKey) -> Option<&T> {
        self.tree.get(key)
    }

    pub fn insert(&mut self, key: TrieKey, value: T) -> Option<T> {
        self.tree.insert(key, value)
    }

    pub fn remove(&mut self, key: &TrieKey) -> Option<T> {
        self.tree.remove(key)
    }

    // Returns the first entry in table order.
    pub fn top(&self) -> Option<(&TrieKey, &T)> {
        self.tree.first_key_value()
    }

    // Returns the last entry in table order.
    pub fn last(&self) -> Option<(&TrieKey, &T)> {
        self.tree.last_key_value()
    }

    // Returns the first entry strictly after `key`, which doesn't need to be
    // present in the table.
    pub fn next(&self, key: &TrieKey) -> Option<(&TrieKey, &T)> {
        self.tree
            .range((Bound::Excluded(key), Bound::Unbounded))
            .next()
    }

    // Returns the last entry strictly before `key`, which doesn't need to be
    // present in the table.
    pub fn prev(&self, key: &TrieKey) -> Option<(&TrieKey, &T)> {
        self.tree.range(..key).next_back()
    }

    // Longest-prefix match.
    pub fn lookup_match(&self, key: &TrieKey) -> Option<(&TrieKey, &T)> {
        (0..=key.len())
            .rev()
            .map(|len| key.truncate(len))
            .find_map(|key| self.tree.get_key_value(&key))
    }

    // Returns all entries equal to or covered by `key`, in table order.
    pub fn subtree(
        &self,
        key: TrieKey,
    ) -> impl Iterator<Item = (&TrieKey, &T)> + '_ {
        self.tree
            .range(key..)
            .take_while(move |(entry_key, _)| key.contains(entry_key))
    }

    pub fn iter(&self) -> btree_map::Iter<'_, TrieKey, T> {
        self.tree.iter()
    }

    pub fn values(&self) -> btree_map::Values<'_, TrieKey, T> {
        self.tree.values()
    }
}

impl<T> Default for PrefixTable<T> {
    fn default() -> PrefixTable<T> {
        PrefixTable {
            tree: Default::default(),
        }
    }
}

// ===== helper functions =====

fn mask(len: u8) -> u128 {
    match len {
        0 => 0,
        len if len >= TRIE_KEY_MAX_LEN => u128::MAX,
        len => u128::MAX << (TRIE_KEY_MAX_LEN - len),
    }
}

// ===== unit tests =====
