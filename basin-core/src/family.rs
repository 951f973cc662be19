use std::collections::{BTreeMap, btree_map};

use crate::model::{ConstraintId, VarId};

/// A named, ordered family of model entries keyed by a composite index.
///
/// Families group the members of an indexed vector, for example a
/// concentration per `(time, component)`, so components can look members up
/// by key instead of by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Family<K: Ord, V> {
    name: String,
    members: BTreeMap<K, V>,
}

/// A family of variables.
pub type VarFamily<K> = Family<K, VarId>;

/// A family of constraints.
pub type ConstraintFamily<K> = Family<K, ConstraintId>;

impl<K: Ord, V> Family<K, V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts a member, returning the previous one under `key` if present.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.members.insert(key, value)
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.members.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.members.contains_key(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, K, V> {
        self.members.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, K, V> {
        self.members.keys()
    }

    pub fn values(&self) -> btree_map::Values<'_, K, V> {
        self.members.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<K: Ord + Copy, V: Copy> Family<(K, String), V> {
    /// Looks up a `(key, member)` pair without allocating the member name.
    #[must_use]
    pub fn member(&self, key: K, member: &str) -> Option<V> {
        self.members
            .iter()
            .find(|((k, m), _)| *k == key && m == member)
            .map(|(_, v)| *v)
    }
}

impl<'a, K: Ord, V> IntoIterator for &'a Family<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = btree_map::Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}
