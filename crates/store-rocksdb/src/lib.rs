//! RocksDB-backed [`Database`]. Column families map 1:1 onto [`Column`]
//! variants, following the `crates/store/impl/rocksdb` layout of the
//! teacher's store stack.

use camino::Utf8PathBuf;
use gateway_store::{Column, Database, Slice, StoreError};
use rocksdb::{ColumnFamilyDescriptor, Options, DB};

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub path: Utf8PathBuf,
}

const COLUMN_NAMES: [&str; 2] = ["metadata", "rate_limit_buckets"];

fn column_name(column: Column) -> &'static str {
    match column {
        Column::Metadata => COLUMN_NAMES[0],
        Column::RateLimitBuckets => COLUMN_NAMES[1],
    }
}

pub struct RocksDB {
    db: DB,
}

impl RocksDB {
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut options = Options::default();
        options.create_if_missing(true);
        options.create_missing_column_families(true);

        let descriptors: Vec<_> = COLUMN_NAMES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&options, config.path.as_str(), descriptors)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { db })
    }

    fn cf(&self, column: Column) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(column_name(column))
            .ok_or_else(|| StoreError::Backend(format!("missing column family {column:?}")))
    }
}

impl Database for RocksDB {
    fn get<'a>(&'a self, column: Column, key: Slice<'_>) -> Result<Option<Slice<'a>>, StoreError> {
        let cf = self.cf(column)?;
        let value = self
            .db
            .get_cf(cf, key.as_ref())
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(value.map(|bytes| Slice::Owned(bytes.into_boxed_slice())))
    }

    fn put(&self, column: Column, key: Slice<'_>, value: Slice<'_>) -> Result<(), StoreError> {
        let cf = self.cf(column)?;
        self.db
            .put_cf(cf, key.as_ref(), value.as_ref())
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn delete(&self, column: Column, key: Slice<'_>) -> Result<(), StoreError> {
        let cf = self.cf(column)?;
        self.db
            .delete_cf(cf, key.as_ref())
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn entries(&self, column: Column) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>, StoreError> {
        let cf = self.cf(column)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (key, value) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
            out.push((key, value));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rocksdb_put_get_delete() {
        let dir = tempdir::TempDir::new("_gateway_store_rocks").unwrap();
        let config = StoreConfig {
            path: Utf8PathBuf::from_path_buf(dir.path().to_owned()).unwrap(),
        };
        let db = RocksDB::open(&config).unwrap();

        for b in 0u8..10 {
            let bytes = [b];
            db.put(
                Column::Metadata,
                Slice::from(&bytes[..]),
                Slice::from(&bytes[..]),
            )
            .unwrap();
        }

        for b in 0u8..10 {
            let bytes = [b];
            assert!(db.has(Column::Metadata, Slice::from(&bytes[..])).unwrap());
            assert_eq!(
                db.get(Column::Metadata, Slice::from(&bytes[..]))
                    .unwrap()
                    .unwrap()
                    .as_ref(),
                &bytes
            );
        }

        db.delete(Column::Metadata, Slice::from(&[0u8][..])).unwrap();
        assert!(!db.has(Column::Metadata, Slice::from(&[0u8][..])).unwrap());

        let entries = db.entries(Column::Metadata).unwrap();
        assert_eq!(entries.len(), 9);
    }

    #[test]
    fn columns_are_independent() {
        let dir = tempdir::TempDir::new("_gateway_store_rocks_cols").unwrap();
        let config = StoreConfig {
            path: Utf8PathBuf::from_path_buf(dir.path().to_owned()).unwrap(),
        };
        let db = RocksDB::open(&config).unwrap();

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
}
