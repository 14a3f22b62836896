//! Filesystem-backed object store for local development.

use async_trait::async_trait;
use stash_core::{Error, ObjectStore, RecencyTag, Result, StorageClass, StorageObjectName};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const TAGS_DIR: &str = ".tags";

/// Stores each bucket as a directory under `root_dir`.
///
/// Objects live at `<root>/<bucket>/<name>`; tags at
/// `<root>/<bucket>/.tags/<name>.json`.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root_dir: PathBuf,
}

impl FilesystemStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    fn object_path(&self, bucket: &str, name: &StorageObjectName) -> PathBuf {
        self.root_dir.join(bucket).join(name)
    }

    fn tags_path(&self, bucket: &str, name: &StorageObjectName) -> PathBuf {
        self.root_dir
            .join(bucket)
            .join(TAGS_DIR)
            .join(format!("{}.json", name))
    }

    async fn ensure_object(&self, bucket: &str, name: &StorageObjectName) -> Result<PathBuf> {
        let path = self.object_path(bucket, name);
        if !tokio::fs::try_exists(&path).await? {
            return Err(Error::StoreFailure(format!(
                "Object {} not found in bucket {}",
                name, bucket
            )));
        }
        Ok(path)
    }

    async fn read_tags(
        &self,
        bucket: &str,
        name: &StorageObjectName,
    ) -> Result<BTreeMap<String, String>> {
        let path = self.tags_path(bucket, name);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(BTreeMap::new());
        }
        let contents = tokio::fs::read(&path).await?;
        Ok(serde_json::from_slice(&contents)?)
    }
}

async fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            Error::StoreFailure(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }
    Ok(())
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::StoreFailure(format!(
            "Failed to delete {}: {}",
            path.display(),
            e
        ))),
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn put(
        &self,
        bucket: &str,
        name: &StorageObjectName,
        source: &Path,
        storage_class: &StorageClass,
    ) -> Result<()> {
        let path = self.object_path(bucket, name);
        create_parent(&path).await?;

        tokio::fs::copy(source, &path)
            .await
            .map_err(|e| Error::StoreFailure(format!("Failed to write cache: {}", e)))?;

        // A rewrite replaces the object and drops its tags, as S3 does.
        remove_if_present(&self.tags_path(bucket, name)).await?;

        debug!(path = %path.display(), storage_class = %storage_class, "Object written");
        Ok(())
    }

    async fn get(&self, bucket: &str, name: &StorageObjectName, dest: &Path) -> Result<u64> {
        let path = self.ensure_object(bucket, name).await?;
        create_parent(dest).await?;

        tokio::fs::copy(&path, dest)
            .await
            .map_err(|e| Error::StoreFailure(format!("Failed to read cache: {}", e)))
    }

    async fn exists(&self, bucket: &str, name: &StorageObjectName) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.object_path(bucket, name)).await?)
    }

    async fn delete(&self, bucket: &str, name: &StorageObjectName) -> Result<()> {
        remove_if_present(&self.object_path(bucket, name)).await?;
        remove_if_present(&self.tags_path(bucket, name)).await
    }

    async fn set_tag(
        &self,
        bucket: &str,
        name: &StorageObjectName,
        tag: &RecencyTag,
    ) -> Result<()> {
        self.ensure_object(bucket, name).await?;

        // Replaces the whole tag set, matching PutObjectTagging.
        let tags = BTreeMap::from([(tag.key.clone(), tag.value.clone())]);
        let path = self.tags_path(bucket, name);
        create_parent(&path).await?;
        tokio::fs::write(&path, serde_json::to_vec_pretty(&tags)?)
            .await
            .map_err(|e| Error::StoreFailure(format!("Failed to write tags: {}", e)))?;

        Ok(())
    }

    async fn get_tag(
        &self,
        bucket: &str,
        name: &StorageObjectName,
        tag_key: &str,
    ) -> Result<String> {
        self.ensure_object(bucket, name).await?;

        self.read_tags(bucket, name)
            .await?
            .remove(tag_key)
            .ok_or_else(|| Error::TagNotFound {
                object: name.to_string(),
                tag: tag_key.to_string(),
            })
    }

    fn name(&self) -> &str {
        "filesystem"
    }
}
