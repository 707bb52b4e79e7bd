//! The content store: a content-addressed blob store keyed by [`ContentHash`]
//! (spec §6 "Content store"). Modeled on the teacher's filesystem blob store —
//! write to a temp file, hash incrementally, rename into place on finalize.

use async_trait::async_trait;
use bytes::Bytes;
use camino::Utf8PathBuf;
use futures::Stream;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};

use gateway_data_source::{ByteStream, LocalStore};
use gateway_primitives::{ContentHash, GatewayError, Region};

/// A write stream returned by [`ContentStore::create_write_stream`]. Owns a
/// temp file on disk until [`ContentStore::finalize`] or
/// [`ContentStore::cleanup`] consumes it.
pub struct WriteHandle {
    path: Utf8PathBuf,
    file: File,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// `None` if `hash` isn't in the store. `region`, if given, is relative
    /// to the start of the stored blob.
    async fn get(
        &self,
        hash: ContentHash,
        region: Option<Region>,
    ) -> Result<Option<(ByteStream, u64)>, GatewayError>;

    async fn create_write_stream(&self) -> Result<WriteHandle, GatewayError>;

    async fn write_chunk(&self, handle: &mut WriteHandle, chunk: &Bytes) -> Result<(), GatewayError>;

    /// Renames the temp file into place under `hash`. Idempotent: finalizing
    /// twice under the same hash just overwrites the existing blob.
    async fn finalize(&self, handle: WriteHandle, hash: ContentHash) -> Result<(), GatewayError>;

    /// Discards the temp file without publishing it under any hash.
    async fn cleanup(&self, handle: WriteHandle) -> Result<(), GatewayError>;
}

/// Filesystem-backed [`ContentStore`]: blobs live at `root/<hash>`, write
/// streams are staged at `root/.tmp/<random>`.
pub struct FsContentStore {
    root: Utf8PathBuf,
}

impl FsContentStore {
    pub async fn open(root: impl Into<Utf8PathBuf>) -> Result<Self, GatewayError> {
        let root = root.into();
        fs::create_dir_all(root.join(".tmp")).await?;
        Ok(Self { root })
    }

    fn blob_path(&self, hash: ContentHash) -> Utf8PathBuf {
        self.root.join(hash.to_string())
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn get(
        &self,
        hash: ContentHash,
        region: Option<Region>,
    ) -> Result<Option<(ByteStream, u64)>, GatewayError> {
        let path = self.blob_path(hash);
        let mut file = match File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let total_size = file.metadata().await?.len();
        let (start, len) = match region {
            Some(region) => {
                if region.offset >= total_size {
                    return Err(GatewayError::OutOfRange(format!(
                        "region offset {} beyond blob size {total_size}",
                        region.offset
                    )));
                }
                (region.offset, region.size.min(total_size - region.offset))
            }
            None => (0, total_size),
        };

        if start > 0 {
            file.seek(SeekFrom::Start(start)).await?;
        }

        let stream = read_n_bytes(file, len);
        Ok(Some((Box::pin(stream), len)))
    }

    async fn create_write_stream(&self) -> Result<WriteHandle, GatewayError> {
        let name: u128 = rand::random();
        let path = self.root.join(".tmp").join(format!("{name:032x}"));
        let file = File::create(&path).await?;
        Ok(WriteHandle { path, file })
    }

    async fn write_chunk(&self, handle: &mut WriteHandle, chunk: &Bytes) -> Result<(), GatewayError> {
        handle.file.write_all(chunk).await?;
        Ok(())
    }

    async fn finalize(&self, mut handle: WriteHandle, hash: ContentHash) -> Result<(), GatewayError> {
        handle.file.flush().await?;
        let dest = self.blob_path(hash);
        fs::rename(&handle.path, &dest).await?;
        Ok(())
    }

    async fn cleanup(&self, handle: WriteHandle) -> Result<(), GatewayError> {
        match fs::remove_file(&handle.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Lets `FsContentStore` stand in as the composite source's "local" backend
/// (spec §4.2), so the same on-disk blobs are reachable both from the
/// cache's direct `getCacheData` path and from the backend chain.
#[async_trait]
impl LocalStore for FsContentStore {
    async fn get(&self, hash: ContentHash, region: Option<Region>) -> Result<Option<(ByteStream, u64)>, GatewayError> {
        ContentStore::get(self, hash, region).await
    }
}

fn read_n_bytes(mut file: File, len: u64) -> impl Stream<Item = Result<Bytes, GatewayError>> + Send {
    async_stream::stream! {
        const CHUNK: usize = 64 * 1024;
        let mut remaining = len;
        let mut buf = vec![0u8; CHUNK];
        while remaining > 0 {
            let to_read = remaining.min(CHUNK as u64) as usize;
            match file.read(&mut buf[..to_read]).await {
                Ok(0) => break,
                Ok(n) => {
                    remaining -= n as u64;
                    yield Ok(Bytes::copy_from_slice(&buf[..n]));
                }
                Err(err) => {
                    yield Err(GatewayError::from(err));
                    break;
                }
            }
        }
    }
}
