//! Interning of values into dense entity indices.

use std::collections::HashMap;
use std::hash::Hash;
use std::ops::Index;

use super::arena::{EntityRef, PrimaryMap};

/// A map assigning each distinct value the next free index, in order of
/// first insertion.
pub struct Interned<K, V>
where
    K: EntityRef,
{
    primary: PrimaryMap<K, V>,
    index: HashMap<V, K>,
}

impl<K: EntityRef, V> Interned<K, V> {
    pub fn new() -> Self {
        Interned {
            primary: PrimaryMap::new(),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.primary.iter()
    }
}

impl<K, V> Interned<K, V>
where
    K: EntityRef,
    V: Clone + Eq + Hash,
{
    pub fn intern(&mut self, v: V) -> K {
        *self
            .index
            .entry(v)
            .or_insert_with_key(|v| self.primary.push(v.clone()))
    }

    pub fn get(&self, v: &V) -> Option<K> {
        self.index.get(v).copied()
    }
}

impl<K: EntityRef, V> Default for Interned<K, V> {
    fn default() -> Self {
        Interned::new()
    }
}

impl<K: EntityRef, V> Index<K> for Interned<K, V> {
    type Output = V;

    fn index(&self, index: K) -> &V {
        &self.primary[index]
    }
}
