//! Relation slots on parent models.
//!
//! A parent model that owns a to-many relation keeps a [`RelatedMany<T>`]
//! field. Loaders (single-parent or eager batch) write the resolved
//! collection into it; application code only reads it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A collection of related models that may or may not have been loaded yet.
///
/// `RelatedMany` distinguishes "not loaded" from "loaded and empty": a parent
/// whose id list is blank is loaded with an empty collection, never left
/// unloaded.
pub struct RelatedMany<T> {
    items: Option<Vec<T>>,
}

impl<T> RelatedMany<T> {
    /// Create an unloaded slot.
    pub const fn new() -> Self {
        Self { items: None }
    }

    /// Create a slot that is already loaded with `items`.
    pub fn loaded(items: Vec<T>) -> Self {
        Self { items: Some(items) }
    }

    /// Check if the relation has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.items.is_some()
    }

    /// Get the loaded items, or `None` if not loaded.
    pub fn get(&self) -> Option<&[T]> {
        self.items.as_deref()
    }

    /// Number of loaded items (0 if not loaded).
    pub fn len(&self) -> usize {
        self.items.as_ref().map_or(0, Vec::len)
    }

    /// True when not loaded or loaded with nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the slot contents with a freshly resolved collection.
    ///
    /// Returns the previous collection, if there was one.
    pub fn set_loaded(&mut self, items: Vec<T>) -> Option<Vec<T>> {
        self.items.replace(items)
    }

    /// Forget the loaded collection so the next access reloads it.
    pub fn reset(&mut self) {
        self.items = None;
    }

    /// Take the loaded items out, leaving the slot unloaded.
    pub fn take(&mut self) -> Option<Vec<T>> {
        self.items.take()
    }

    /// Iterate over loaded items.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter().flatten()
    }
}

impl<T> Default for RelatedMany<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for RelatedMany<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for RelatedMany<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.items {
            Some(items) => f.debug_tuple("RelatedMany::Loaded").field(items).finish(),
            None => f.write_str("RelatedMany::Unloaded"),
        }
    }
}

impl<T> Serialize for RelatedMany<T>
where
    T: Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.items {
            Some(items) => items.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de, T> Deserialize<'de> for RelatedMany<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Option::<Vec<T>>::deserialize(deserializer)?;
        Ok(Self { items })
    }
}

impl<'a, T> IntoIterator for &'a RelatedMany<T> {
    type Item = &'a T;
    type IntoIter = std::iter::Flatten<std::option::Iter<'a, Vec<T>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unloaded_vs_loaded_empty() {
        let unloaded = RelatedMany::<i64>::new();
        assert!(!unloaded.is_loaded());
        assert!(unloaded.get().is_none());

        let empty = RelatedMany::<i64>::loaded(Vec::new());
        assert!(empty.is_loaded());
        assert!(empty.is_empty());
        assert_eq!(empty.get(), Some(&[][..]));
    }

    #[test]
    fn set_loaded_replaces_previous() {
        let mut slot = RelatedMany::loaded(vec![1, 2]);
        let previous = slot.set_loaded(vec![3]);
        assert_eq!(previous, Some(vec![1, 2]));
        assert_eq!(slot.iter().copied().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn reset_and_take() {
        let mut slot = RelatedMany::loaded(vec![1]);
        assert_eq!(slot.take(), Some(vec![1]));
        assert!(!slot.is_loaded());
        slot.set_loaded(vec![2]);
        slot.reset();
        assert!(!slot.is_loaded());
    }

    #[test]
    fn serde_loaded_is_array_unloaded_is_null() {
        let loaded = RelatedMany::loaded(vec![4, 5]);
        assert_eq!(serde_json::to_string(&loaded).unwrap(), "[4,5]");
        let unloaded = RelatedMany::<i64>::new();
        assert_eq!(serde_json::to_string(&unloaded).unwrap(), "null");

        let back: RelatedMany<i64> = serde_json::from_str("[1,2]").unwrap();
        assert_eq!(back.get(), Some(&[1, 2][..]));
        let back: RelatedMany<i64> = serde_json::from_str("null").unwrap();
        assert!(!back.is_loaded());
    }

    #[test]
    fn iterates_by_reference() {
        let slot = RelatedMany::loaded(vec![7, 8]);
        let mut seen = Vec::new();
        for item in &slot {
            seen.push(*item);
        }
        assert_eq!(seen, vec![7, 8]);
        assert_eq!(format!("{slot:?}"), "RelatedMany::Loaded([7, 8])");
    }
}
