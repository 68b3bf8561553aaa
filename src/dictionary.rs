use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// An append-only bidirectional mapping between values and dense integer IDs
///
/// IDs are handed out in insertion order starting from zero, so the ID of a
/// value doubles as its registration index.
#[derive(Debug, Clone)]
pub struct Dictionary<T> {
    /// Map from value to ID
    to_id: HashMap<T, u32>,
    /// Map from ID to value
    values: Vec<T>,
}

impl<T: Hash + Eq + Clone> Dictionary<T> {
    /// Create a new empty dictionary
    pub fn new() -> Self {
        Self {
            to_id: HashMap::new(),
            values: Vec::new(),
        }
    }

    /// Get the number of entries in the dictionary
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the dictionary contains no entries
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get or create an ID for a value
    pub fn get_or_insert(&mut self, value: &T) -> u32 {
        if let Some(&id) = self.to_id.get(value) {
            id
        } else {
            let id = self.values.len() as u32;
            self.to_id.insert(value.clone(), id);
            self.values.push(value.clone());
            id
        }
    }

    /// Look up the ID of a value without inserting it
    pub fn id<Q>(&self, value: &Q) -> Option<u32>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.to_id.get(value).copied()
    }

    /// Look up the value registered under `id`
    pub fn get(&self, id: u32) -> Option<&T> {
        self.values.get(id as usize)
    }

    /// All values, indexed by ID
    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    /// Iterate over all values in ID order
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.values.iter()
    }
}

impl<T: Hash + Eq + Clone> Default for Dictionary<T> {
    fn default() -> Self {
        Self::new()
    }
}
