//! Matching fetched related rows back to parents.
//!
//! A [`Dictionary`] indexes one eager batch of related rows by their foreign
//! key value. It lives for a single match pass and is then dropped.

use colmany_core::Model;
use std::collections::{HashMap, HashSet};

/// Related rows grouped by foreign key value.
#[derive(Debug)]
pub struct Dictionary<R> {
    buckets: HashMap<i64, Vec<R>>,
}

impl<R: Model> Dictionary<R> {
    /// Index `results` by the integer value of `foreign_key`.
    ///
    /// Rows whose foreign key is NULL or not an integer cannot match any id
    /// and are left out.
    pub fn build(results: Vec<R>, foreign_key: &str) -> Self {
        let mut buckets: HashMap<i64, Vec<R>> = HashMap::new();
        let mut skipped = 0_usize;
        for row in results {
            match row.get_attribute(foreign_key).as_key() {
                Some(key) => buckets.entry(key).or_default().push(row),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::trace!(skipped, foreign_key, "Related rows without an integer key");
        }
        Self { buckets }
    }

    /// Rows carrying `id`.
    pub fn get(&self, id: i64) -> Option<&[R]> {
        self.buckets.get(&id).map(Vec::as_slice)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// True when no row was indexed.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// A parent's collection: rows for each id in first-occurrence order.
    ///
    /// Each row appears once even when its id repeats in `ids`; rows sharing
    /// a key keep fetch order.
    pub fn collect_ordered(&self, ids: &[i64]) -> Vec<R>
    where
        R: Clone,
    {
        unique_ids(ids)
            .into_iter()
            .filter_map(|id| self.buckets.get(&id))
            .flat_map(|bucket| bucket.iter().cloned())
            .collect()
    }
}

/// `ids` with repeats removed, first occurrence kept.
pub fn unique_ids(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Order `models` by the first position of their `key` column in `ids`.
///
/// Models whose key is absent from `ids` are dropped. The sort is stable.
pub fn sort_by_id_order<R: Model>(models: Vec<R>, ids: &[i64], key: &str) -> Vec<R> {
    let mut positions: HashMap<i64, usize> = HashMap::with_capacity(ids.len());
    for (position, id) in ids.iter().enumerate() {
        positions.entry(*id).or_insert(position);
    }

    let mut ranked: Vec<(usize, R)> = models
        .into_iter()
        .filter_map(|model| {
            let id = model.get_attribute(key).as_key()?;
            positions.get(&id).map(|position| (*position, model))
        })
        .collect();
    ranked.sort_by_key(|(position, _)| *position);
    ranked.into_iter().map(|(_, model)| model).collect()
}
