//! Port traits.
//!
//! These traits define the interfaces between the cache controller and its
//! collaborators: the archiver that packs artifacts into a single file and
//! the object store that holds those files.

use crate::cache::{ArtifactSet, RecencyTag, StorageClass, StorageObjectName};
use crate::Result;
use async_trait::async_trait;
use std::path::Path;

/// Packs artifacts into one archive file and unpacks it again.
pub trait Archiver: Send + Sync {
    /// Pack the artifacts, in order, into the archive at `dest`.
    fn pack(&self, artifacts: &ArtifactSet, dest: &Path) -> Result<()>;

    /// Extract the archive at `archive` into the working directory.
    fn unpack(&self, archive: &Path) -> Result<()>;
}

/// Named blobs in a bucket, with per-object tags.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the local file `source` as `name`.
    async fn put(
        &self,
        bucket: &str,
        name: &StorageObjectName,
        source: &Path,
        storage_class: &StorageClass,
    ) -> Result<()>;

    /// Download `name` into the local file `dest`. Returns the byte count.
    async fn get(&self, bucket: &str, name: &StorageObjectName, dest: &Path) -> Result<u64>;

    /// Check if an object exists. A missing object is `Ok(false)`, not an error.
    async fn exists(&self, bucket: &str, name: &StorageObjectName) -> Result<bool>;

    /// Delete an object and its tags.
    async fn delete(&self, bucket: &str, name: &StorageObjectName) -> Result<()>;

    /// Set a tag on an object.
    async fn set_tag(
        &self,
        bucket: &str,
        name: &StorageObjectName,
        tag: &RecencyTag,
    ) -> Result<()>;

    /// Read a tag value. Fails with `TagNotFound` when the key is absent.
    async fn get_tag(
        &self,
        bucket: &str,
        name: &StorageObjectName,
        tag_key: &str,
    ) -> Result<String>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
