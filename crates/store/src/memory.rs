//! In-memory `Database`, used for tests and as the default metadata-store
//! backend when no persistent backend is configured.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::db::{Column, Database, StoreError};
use crate::slice::Slice;

#[derive(Default)]
pub struct InMemoryDB {
    columns: RwLock<[BTreeMap<Box<[u8]>, Box<[u8]>>; 2]>,
}

impl InMemoryDB {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    const fn index(column: Column) -> usize {
        match column {
            Column::Metadata => 0,
            Column::RateLimitBuckets => 1,
        }
    }
}

impl Database for InMemoryDB {
    fn get<'a>(&'a self, column: Column, key: Slice<'_>) -> Result<Option<Slice<'a>>, StoreError> {
        let columns = self.columns.read();
        Ok(columns[Self::index(column)]
            .get(key.as_ref())
            .map(|value| Slice::Owned(value.clone())))
    }

    fn put(&self, column: Column, key: Slice<'_>, value: Slice<'_>) -> Result<(), StoreError> {
        let mut columns = self.columns.write();
        columns[Self::index(column)].insert(key.into_boxed(), value.into_boxed());
        Ok(())
    }

    fn delete(&self, column: Column, key: Slice<'_>) -> Result<(), StoreError> {
        let mut columns = self.columns.write();
        columns[Self::index(column)].remove(key.as_ref());
        Ok(())
    }

    fn entries(&self, column: Column) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>, StoreError> {
        let columns = self.columns.read();
        Ok(columns[Self::index(column)]
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_has_delete_round_trip() {
        let db = InMemoryDB::new();
        let key = Slice::from(&b"k"[..]);
        let value = Slice::from(&b"v"[..]);

        assert!(!db.has(Column::Metadata, Slice::from(&b"k"[..])).unwrap());
        db.put(Column::Metadata, key, value).unwrap();
        assert!(db.has(Column::Metadata, Slice::from(&b"k"[..])).unwrap());
        assert_eq!(
            db.get(Column::Metadata, Slice::from(&b"k"[..]))
                .unwrap()
                .unwrap()
                .as_ref(),
            b"v"
        );

        db.delete(Column::Metadata, Slice::from(&b"k"[..])).unwrap();
        assert!(!db.has(Column::Metadata, Slice::from(&b"k"[..])).unwrap());
    }

    #[test]
    fn columns_are_independent() {
        let db = InMemoryDB::new();
        db.put(
            Column::Metadata,
            Slice::from(&b"k"[..]),
            Slice::from(&b"meta"[..]),
        )
        .unwrap();
        assert!(!db
            .has(Column::RateLimitBuckets, Slice::from(&b"k"[..]))
            .unwrap());
    }

    #[test]
    fn entries_are_sorted_by_key() {
        let db = InMemoryDB::new();
        for b in [3u8, 1, 2] {
            db.put(
                Column::Metadata,
                Slice::from(&[b][..]),
                Slice::from(&[b][..]),
            )
            .unwrap();
        }
        let entries = db.entries(Column::Metadata).unwrap();
        let keys: Vec<u8> = entries.iter().map(|(k, _)| k[0]).collect();
        assert_eq!(keys, vec![1, 2, 3]);
    }
}
