//! Append-only record storage with a separately maintained sort order.
//!
//! Records never move once stored, so a [`RecordId`] held by the name index or
//! by a query result stays valid across later inserts. The sorted permutation
//! is what gets binary-searched on merge and iterated on scan.

use std::ops::Index;

use crate::core::types::RecordId;

/// Sort key of a catalog record: `(name, variant_id)`
pub trait CatalogKey {
    fn name(&self) -> &str;
    fn variant_id(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct SortedArena<T> {
    records: Vec<T>,
    order: Vec<RecordId>,
}

impl<T> Default for SortedArena<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            order: Vec::new(),
        }
    }
}

impl<T: CatalogKey> SortedArena<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt records that are already in key order (snapshot restore).
    /// The order is trusted, not re-validated.
    #[must_use]
    pub fn from_sorted(records: Vec<T>) -> Self {
        let order = (0..records.len()).map(RecordId).collect();
        Self { records, order }
    }

    /// Position of the key in the sort order, or where it would be inserted
    fn search(&self, name: &str, variant_id: &str) -> Result<usize, usize> {
        self.order.binary_search_by(|id| {
            let record = &self.records[id.0];
            (record.name(), record.variant_id()).cmp(&(name, variant_id))
        })
    }

    #[must_use]
    pub fn find(&self, name: &str, variant_id: &str) -> Option<RecordId> {
        self.search(name, variant_id).ok().map(|pos| self.order[pos])
    }

    /// Id of the record with the given key, creating it with `make` at its
    /// sorted position when absent. Returns the id and whether it was created.
    pub fn find_or_insert_with(
        &mut self,
        name: &str,
        variant_id: &str,
        make: impl FnOnce() -> T,
    ) -> (RecordId, bool) {
        match self.search(name, variant_id) {
            Ok(pos) => (self.order[pos], false),
            Err(pos) => {
                let id = RecordId(self.records.len());
                self.records.push(make());
                self.order.insert(pos, id);
                (id, true)
            }
        }
    }

    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&T> {
        self.records.get(id.0)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut T> {
        self.records.get_mut(id.0)
    }

    /// Records in key order
    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &T)> + '_ {
        self.order.iter().map(|&id| (id, &self.records[id.0]))
    }

    /// Ids in key order
    #[must_use]
    pub fn ids(&self) -> &[RecordId] {
        &self.order
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Strictly increasing by `(name, variant_id)`
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.order.windows(2).all(|w| {
            let (a, b) = (&self.records[w[0].0], &self.records[w[1].0]);
            (a.name(), a.variant_id()) < (b.name(), b.variant_id())
        })
    }
}

impl<T> Index<RecordId> for SortedArena<T> {
    type Output = T;

    fn index(&self, id: RecordId) -> &T {
        &self.records[id.0]
    }
}
