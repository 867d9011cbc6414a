use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::types::{EmbeddingRecord, RecordKey};

/// Insertion-ordered embeddings keyed by (source, window).
///
/// All records share one dimensionality, fixed by the first insert.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingCollection {
    records: Vec<EmbeddingRecord>,
    positions: HashMap<RecordKey, usize>,
    dimension: Option<usize>,
}

impl EmbeddingCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = EmbeddingRecord>,
    {
        let mut collection = Self::new();
        collection.extend(records)?;
        Ok(collection)
    }

    pub fn insert(&mut self, record: EmbeddingRecord) -> Result<()> {
        if let Some(expected) = self.dimension {
            if record.dimension() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    found: record.dimension(),
                });
            }
        }
        let key = record.key();
        if self.positions.contains_key(&key) {
            return Err(Error::DuplicateRecord {
                source_id: key.source_id,
                window_index: key.window_index,
            });
        }
        self.dimension.get_or_insert(record.dimension());
        self.positions.insert(key, self.records.len());
        self.records.push(record);
        Ok(())
    }

    /// Inserts every record, stopping at the first rejected one.
    pub fn extend<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = EmbeddingRecord>,
    {
        for record in records {
            self.insert(record)?;
        }
        Ok(())
    }

    /// Appends `other` after the existing records.
    pub fn merge(&mut self, other: EmbeddingCollection) -> Result<()> {
        self.extend(other.records)
    }

    /// Checks that `records` could be appended without violating the key or
    /// dimension invariants.
    pub fn check_insertable(&self, records: &[EmbeddingRecord]) -> Result<()> {
        let mut dimension = self.dimension;
        let mut seen = HashSet::new();
        for record in records {
            let expected = *dimension.get_or_insert(record.dimension());
            if record.dimension() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    found: record.dimension(),
                });
            }
            let key = record.key();
            if self.positions.contains_key(&key) || !seen.insert(key.clone()) {
                return Err(Error::DuplicateRecord {
                    source_id: key.source_id,
                    window_index: key.window_index,
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Shared dimensionality, `None` while empty.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn get(&self, key: &RecordKey) -> Option<&EmbeddingRecord> {
        self.positions.get(key).map(|&idx| &self.records[idx])
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.positions.contains_key(key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EmbeddingRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[EmbeddingRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<EmbeddingRecord> {
        self.records
    }

    /// Distinct source ids in first-seen order.
    pub fn source_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|record| seen.insert(record.source_id.as_str()))
            .map(|record| record.source_id.as_str())
            .collect()
    }

    /// Splits into (records whose source matches, everything else), keeping
    /// relative order on both sides.
    pub fn partition_sources<F>(self, mut predicate: F) -> (Self, Self)
    where
        F: FnMut(&str) -> bool,
    {
        let mut matched = Self::new();
        let mut rest = Self::new();
        for record in self.records {
            let target = if predicate(&record.source_id) {
                &mut matched
            } else {
                &mut rest
            };
            target.push_unchecked(record);
        }
        (matched, rest)
    }

    /// Same keys and order with every vector replaced by `f(vector)`.
    ///
    /// `f` must keep the vector length.
    pub(crate) fn map_vectors<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&[f32]) -> Vec<f32>,
    {
        Self {
            records: self
                .records
                .iter()
                .map(|record| EmbeddingRecord {
                    source_id: record.source_id.clone(),
                    window_index: record.window_index,
                    window_start_time: record.window_start_time,
                    vector: f(&record.vector),
                })
                .collect(),
            positions: self.positions.clone(),
            dimension: self.dimension,
        }
    }

    // Only for records already validated by a collection with the same invariants.
    fn push_unchecked(&mut self, record: EmbeddingRecord) {
        self.dimension.get_or_insert(record.dimension());
        self.positions.insert(record.key(), self.records.len());
        self.records.push(record);
    }
}

impl PartialEq for EmbeddingCollection {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

impl<'a> IntoIterator for &'a EmbeddingCollection {
    type Item = &'a EmbeddingRecord;
    type IntoIter = std::slice::Iter<'a, EmbeddingRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Confirmed positive exemplars; never empty.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    collection: EmbeddingCollection,
}

impl TemplateSet {
    pub fn new(collection: EmbeddingCollection) -> Result<Self> {
        if collection.is_empty() {
            return Err(Error::EmptyTemplateSet);
        }
        Ok(Self { collection })
    }

    pub fn collection(&self) -> &EmbeddingCollection {
        &self.collection
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }
}

/// Records of unknown class to be scored against a [`TemplateSet`].
#[derive(Debug, Clone, Default)]
pub struct QuerySet {
    collection: EmbeddingCollection,
}

impl QuerySet {
    pub fn new(collection: EmbeddingCollection) -> Self {
        Self { collection }
    }

    pub fn collection(&self) -> &EmbeddingCollection {
        &self.collection
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: &str, window: usize, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord::new(source, window, window as f64, vector)
    }

    #[test]
    fn preserves_insertion_order() {
        let collection = EmbeddingCollection::from_records([
            record("b", 0, vec![1.0, 2.0]),
            record("a", 1, vec![3.0, 4.0]),
            record("a", 0, vec![5.0, 6.0]),
        ])
        .unwrap();
        let keys: Vec<String> = collection.iter().map(|r| r.key().to_string()).collect();
        assert_eq!(keys, ["b#0", "a#1", "a#0"]);
        assert_eq!(collection.source_ids(), ["b", "a"]);
        assert_eq!(collection.dimension(), Some(2));
    }

    #[test]
    fn rejects_duplicate_keys() {
        let mut collection = EmbeddingCollection::new();
        collection.insert(record("a", 0, vec![1.0])).unwrap();
        let err = collection.insert(record("a", 0, vec![2.0])).unwrap_err();
        assert!(matches!(err, Error::DuplicateRecord { window_index: 0, .. }));
        assert_eq!(collection.get(&record("a", 0, vec![]).key()).unwrap().vector, [1.0]);
    }

    #[test]
    fn rejects_mixed_dimensions() {
        let mut collection = EmbeddingCollection::new();
        collection.insert(record("a", 0, vec![1.0, 2.0])).unwrap();
        let err = collection.insert(record("a", 1, vec![1.0])).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                found: 1
            }
        ));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn check_insertable_catches_duplicates_within_batch() {
        let collection = EmbeddingCollection::new();
        let batch = [record("a", 0, vec![1.0]), record("a", 0, vec![1.0])];
        assert!(collection.check_insertable(&batch).is_err());
        assert!(collection.is_empty());
    }

    #[test]
    fn partitions_by_source() {
        let collection = EmbeddingCollection::from_records([
            record("pos", 0, vec![1.0]),
            record("unk", 0, vec![2.0]),
            record("pos", 1, vec![3.0]),
        ])
        .unwrap();
        let (templates, queries) = collection.partition_sources(|id| id == "pos");
        assert_eq!(templates.len(), 2);
        assert_eq!(queries.len(), 1);
        assert_eq!(templates.records()[1].window_index, 1);
    }

    #[test]
    fn template_set_requires_records() {
        let err = TemplateSet::new(EmbeddingCollection::new()).unwrap_err();
        assert!(matches!(err, Error::EmptyTemplateSet));
    }
}
