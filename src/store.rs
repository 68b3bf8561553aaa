use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use crate::error::{Error, Result};
use crate::weight::Weight;

/// Sparse mapping from keys to weights
///
/// Missing keys read as zero. Reads never create entries; an entry springs
/// into existence with value zero on its first update.
#[derive(Debug, Clone)]
pub struct WeightMap<K, W> {
    entries: HashMap<K, W>,
}

impl<K: Hash + Eq, W: Weight> WeightMap<K, W> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Current weight for `key`, zero when it was never updated
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> f64
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map_or(0.0, W::get)
    }

    /// Add `delta` to the weight for `key` at logical time `time`
    #[inline]
    pub fn update(&mut self, key: K, delta: f64, time: u64) {
        self.entries.entry(key).or_default().update(delta, time);
    }

    /// Finalize every entry at `time`, then drop the entries that ended up
    /// exactly zero.
    ///
    /// Averaged weights at time zero are rejected before any entry changes.
    pub fn finalize(&mut self, time: u64) -> Result<()> {
        if W::AVERAGED && time == 0 {
            return Err(Error::DegenerateModel);
        }
        for weight in self.entries.values_mut() {
            weight.finalize(time)?;
        }
        self.entries.retain(|_, weight| weight.get() != 0.0);
        Ok(())
    }

    /// Store an already finalized value
    pub fn insert(&mut self, key: K, value: f64) {
        self.entries.insert(key, W::from_value(value));
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, current value)` pairs in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&K, f64)> + '_ {
        self.entries.iter().map(|(key, weight)| (key, weight.get()))
    }
}

impl<K: Hash + Eq, W: Weight> Default for WeightMap<K, W> {
    fn default() -> Self {
        Self::new()
    }
}

/// Weights keyed by `(feature, class id)`, grouped by feature
///
/// Grouping lets a scorer visit every class weight of a firing feature with
/// a single hash lookup.
#[derive(Debug, Clone)]
pub struct ClassWeights<F, W> {
    rows: HashMap<F, WeightMap<u32, W>>,
}

impl<F: Hash + Eq, W: Weight> ClassWeights<F, W> {
    pub fn new() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }

    /// Current weight of `feature` for class `class`
    pub fn get<Q>(&self, feature: &Q, class: u32) -> f64
    where
        F: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.rows.get(feature).map_or(0.0, |row| row.get(&class))
    }

    /// All class weights of `feature`, if it ever received an update
    #[inline]
    pub fn row<Q>(&self, feature: &Q) -> Option<&WeightMap<u32, W>>
    where
        F: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.rows.get(feature)
    }

    /// Mutable row of `feature`, created empty on first access
    pub fn row_mut(&mut self, feature: F) -> &mut WeightMap<u32, W> {
        self.rows.entry(feature).or_default()
    }

    pub fn update(&mut self, feature: F, class: u32, delta: f64, time: u64) {
        self.row_mut(feature).update(class, delta, time);
    }

    /// Finalize every row, pruning zero entries and rows left empty
    pub fn finalize(&mut self, time: u64) -> Result<()> {
        if W::AVERAGED && time == 0 {
            return Err(Error::DegenerateModel);
        }
        for row in self.rows.values_mut() {
            row.finalize(time)?;
        }
        self.rows.retain(|_, row| !row.is_empty());
        Ok(())
    }

    /// Number of stored `(feature, class)` entries
    pub fn len(&self) -> usize {
        self.rows.values().map(WeightMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.values().all(WeightMap::is_empty)
    }

    /// Iterate over `(feature, class id, value)` triples in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&F, u32, f64)> + '_ {
        self.rows.iter().flat_map(|(feature, row)| {
            row.iter().map(move |(&class, value)| (feature, class, value))
        })
    }
}

impl<F: Hash + Eq, W: Weight> Default for ClassWeights<F, W> {
    fn default() -> Self {
        Self::new()
    }
}
