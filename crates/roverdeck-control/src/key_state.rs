//! [`KeyState`] – per-source key ownership.
//!
//! Every logical [`Key`] maps to the set of [`KeySource`]s currently asserting
//! it.  A key is active iff that set is non-empty, so a key held on both the
//! keyboard and the gamepad stays active until *both* let go, and a source
//! can only ever retract its own assertion.

use std::collections::{BTreeMap, BTreeSet};

use roverdeck_types::{Key, KeySource};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyState {
    owners: BTreeMap<Key, BTreeSet<KeySource>>,
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `source` asserts (`active = true`) or retracts `key`.
    ///
    /// Returns `true` iff the aggregate membership of `key` changed.
    /// Redundant calls return `false`.
    pub fn set(&mut self, source: KeySource, key: Key, active: bool) -> bool {
        let was_active = self.is_active(key);

        if active {
            self.owners.entry(key).or_default().insert(source);
        } else if let Some(sources) = self.owners.get_mut(&key) {
            sources.remove(&source);
            if sources.is_empty() {
                self.owners.remove(&key);
            }
        }

        was_active != self.is_active(key)
    }

    pub fn is_active(&self, key: Key) -> bool {
        self.owners.contains_key(&key)
    }

    /// Sources currently asserting `key`.
    pub fn sources(&self, key: Key) -> impl Iterator<Item = KeySource> + '_ {
        self.owners.get(&key).into_iter().flatten().copied()
    }

    /// Keys `source` currently asserts, whether or not another source also
    /// holds them.
    pub fn asserted_by(&self, source: KeySource) -> Vec<Key> {
        self.owners
            .iter()
            .filter(|(_, sources)| sources.contains(&source))
            .map(|(key, _)| *key)
            .collect()
    }

    /// Aggregate membership: every key with at least one asserting source.
    pub fn active_keys(&self) -> BTreeSet<Key> {
        self.owners.keys().copied().collect()
    }

    /// Retract every assertion held by `source`.
    ///
    /// Returns the keys whose aggregate membership changed (i.e. keys no
    /// other source was holding).
    pub fn release_source(&mut self, source: KeySource) -> Vec<Key> {
        self.asserted_by(source)
            .into_iter()
            .filter(|key| self.set(source, *key, false))
            .collect()
    }
}
