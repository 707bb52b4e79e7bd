//! The metadata store (spec §6 "Metadata store"): `{accessTimestampMs}` plus
//! MRU ArNS name lists, keyed by content hash. Backed by
//! [`gateway_store::Database`]'s `Metadata` column, mirroring the teacher's
//! thin KV-wrapper pattern in `crates/store`.

use std::sync::Arc;

use gateway_primitives::{ContentHash, GatewayError, MetadataRecord};
use gateway_store::{Column, Database, Slice};

pub struct MetadataStore {
    db: Arc<dyn Database>,
}

impl MetadataStore {
    #[must_use]
    pub const fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub fn get(&self, hash: ContentHash) -> Result<Option<MetadataRecord>, GatewayError> {
        let key = Slice::from(hash.as_bytes().as_slice());
        let Some(value) = self
            .db
            .get(Column::Metadata, key)
            .map_err(|err| GatewayError::Internal(format!("metadata store: {err}")))?
        else {
            return Ok(None);
        };
        let record = serde_json::from_slice(value.as_ref())
            .map_err(|err| GatewayError::Internal(format!("metadata store: corrupt record: {err}")))?;
        Ok(Some(record))
    }

    pub fn set(&self, hash: ContentHash, record: &MetadataRecord) -> Result<(), GatewayError> {
        let key = Slice::from(hash.as_bytes().to_vec());
        let value = serde_json::to_vec(record)
            .map_err(|err| GatewayError::Internal(format!("metadata store: {err}")))?;
        self.db
            .put(Column::Metadata, key, Slice::from(value))
            .map_err(|err| GatewayError::Internal(format!("metadata store: {err}")))
    }

    /// Bumps `accessTimestampMs` and pushes `arns_name`/`arns_base_name` (if
    /// present) to the front of their MRU lists, capped at `mru_cap`.
    pub fn touch(
        &self,
        hash: ContentHash,
        now_ms: u64,
        arns_name: Option<&str>,
        arns_base_name: Option<&str>,
        mru_cap: usize,
    ) -> Result<(), GatewayError> {
        let mut record = self.get(hash)?.unwrap_or_default();
        record.access_timestamp_ms = now_ms;
        if let Some(name) = arns_name {
            MetadataRecord::push_mru(&mut record.mru_arns_names, name.to_owned(), mru_cap);
        }
        if let Some(base_name) = arns_base_name {
            MetadataRecord::push_mru(&mut record.mru_arns_base_names, base_name.to_owned(), mru_cap);
        }
        self.set(hash, &record)
    }
}

#[cfg(test)]
mod tests {
    use gateway_store::InMemoryDB;

    use super::*;

    fn store() -> MetadataStore {
        MetadataStore::new(Arc::new(InMemoryDB::new()))
    }

    #[test]
    fn touch_creates_a_record_and_tracks_mru_names() {
        let store = store();
        let hash = ContentHash::of(b"blob");

        store.touch(hash, 1_000, Some("my-name"), None, 10).unwrap();
        let record = store.get(hash).unwrap().unwrap();
        assert_eq!(record.access_timestamp_ms, 1_000);
        assert_eq!(record.mru_arns_names, vec!["my-name".to_owned()]);
    }

    #[test]
    fn repeated_touches_move_the_name_to_the_front_without_duplicating() {
        let store = store();
        let hash = ContentHash::of(b"blob");

        store.touch(hash, 1, Some("a"), None, 10).unwrap();
        store.touch(hash, 2, Some("b"), None, 10).unwrap();
        store.touch(hash, 3, Some("a"), None, 10).unwrap();

        let record = store.get(hash).unwrap().unwrap();
        assert_eq!(record.mru_arns_names, vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(record.access_timestamp_ms, 3);
    }

    #[test]
    fn unknown_hash_returns_none() {
        let store = store();
        assert!(store.get(ContentHash::of(b"missing")).unwrap().is_none());
    }
}
