use std::future::Future;

use crate::error::StoreError;

pub mod file;
pub mod memory;
pub mod snapshot;

/// An opaque key-value store of byte blobs.
pub trait BlobStore: Send + Sync + 'static {
    /// Returns `None` if nothing is stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send;

    /// Replaces the value under `key`. Readers observe either the old or the new value.
    fn set(&self, key: &str, value: Vec<u8>) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removes `key`, succeeds if it did not exist.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}
