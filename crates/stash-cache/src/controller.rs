//! Cache controller: key derivation, store/restore/delete, recency tagging.

use crate::types::Outcome;
use stash_core::{
    Action, Archiver, ArtifactSet, CacheConfig, CacheKey, Clock, Error, LAST_USED_TAG,
    ObjectStore, RecencyTag, Result, StorageClass, StorageObjectName,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Orchestrates the archiver and object store for one cache invocation.
///
/// Every call is a strictly ordered sequence: archive, then transfer, then
/// tag. Failures surface immediately; nothing is retried or rolled back.
pub struct CacheController {
    archiver: Arc<dyn Archiver>,
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    work_dir: PathBuf,
}

impl CacheController {
    pub fn new(
        archiver: Arc<dyn Archiver>,
        store: Arc<dyn ObjectStore>,
        clock: Arc<dyn Clock>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            archiver,
            store,
            clock,
            work_dir: work_dir.into(),
        }
    }

    /// Local path of the archive for `name`.
    pub fn archive_path(&self, name: &StorageObjectName) -> PathBuf {
        self.work_dir.join(name)
    }

    /// Dispatch a validated configuration to the matching operation.
    pub async fn run(&self, config: &CacheConfig) -> Result<Outcome> {
        match config.action {
            Action::Put => {
                let artifacts = config
                    .artifacts
                    .as_ref()
                    .ok_or_else(|| Error::invalid("No artifacts provided"))?;
                self.store(&config.key, &config.bucket, &config.storage_class, artifacts)
                    .await
            }
            Action::Get => self.restore(&config.key, &config.bucket).await,
            Action::Delete => self.delete(&config.key, &config.bucket).await,
        }
    }

    /// Archive `artifacts` and upload them under the key's object name.
    pub async fn store(
        &self,
        key: &CacheKey,
        bucket: &str,
        storage_class: &StorageClass,
        artifacts: &ArtifactSet,
    ) -> Result<Outcome> {
        require_bucket(bucket)?;
        let start = Instant::now();
        let name = key.object_name();
        let archive = self.archive_path(&name);

        info!(key = %key, artifacts = artifacts.iter().count(), "Packing artifacts");
        self.archiver.pack(artifacts, &archive)?;

        self.store.put(bucket, &name, &archive, storage_class).await?;
        info!(
            bucket,
            object = %name,
            storage_class = %storage_class,
            duration_ms = start.elapsed().as_millis() as u64,
            "Cache saved successfully"
        );

        // Only reached once the upload has succeeded.
        let tag = RecencyTag::last_used(self.clock.today());
        self.write_tag(bucket, &name, &tag).await?;

        Ok(Outcome::Stored {
            object: name.to_string(),
            last_used: tag.value,
        })
    }

    /// Download and extract the key's archive, refreshing its tag when stale.
    ///
    /// A missing object is a cache miss, reported as [`Outcome::Missed`].
    pub async fn restore(&self, key: &CacheKey, bucket: &str) -> Result<Outcome> {
        require_bucket(bucket)?;
        let start = Instant::now();
        let name = key.object_name();

        if !self.store.exists(bucket, &name).await? {
            info!(bucket, object = %name, "No caches found for key: {}", name);
            return Ok(Outcome::Missed {
                object: name.to_string(),
            });
        }

        let archive = self.archive_path(&name);
        let bytes = self.store.get(bucket, &name, &archive).await?;
        info!(
            bucket,
            object = %name,
            "Cache downloaded successfully, containing {} bytes",
            bytes
        );

        self.archiver.unpack(&archive)?;
        debug!(dest = %self.work_dir.display(), "Artifacts restored");

        let tag = RecencyTag::last_used(self.clock.today());
        let tag_refreshed = self.is_stale(bucket, &name, &tag).await;
        if tag_refreshed {
            self.write_tag(bucket, &name, &tag).await?;
        }

        info!(
            object = %name,
            tag_refreshed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Cache restored"
        );
        Ok(Outcome::Restored {
            object: name.to_string(),
            bytes,
            tag_refreshed,
        })
    }

    /// Delete the key's object. Issued whether or not it exists.
    pub async fn delete(&self, key: &CacheKey, bucket: &str) -> Result<Outcome> {
        require_bucket(bucket)?;
        let name = key.object_name();

        self.store.delete(bucket, &name).await?;
        info!(bucket, object = %name, "Cache purged successfully");

        Ok(Outcome::Deleted {
            object: name.to_string(),
        })
    }

    /// Whether the stored tag differs from `today`. Unreadable counts as stale.
    async fn is_stale(&self, bucket: &str, name: &StorageObjectName, today: &RecencyTag) -> bool {
        match self.store.get_tag(bucket, name, LAST_USED_TAG).await {
            Ok(current) if current == today.value => {
                debug!(object = %name, last_used = %current, "Tag is current");
                false
            }
            Ok(current) => {
                debug!(object = %name, last_used = %current, "Tag is stale");
                true
            }
            Err(e) if e.is_tag_not_found() => {
                debug!(object = %name, "Tag missing");
                true
            }
            Err(e) => {
                warn!(object = %name, error = %e, "Failed to read tag, refreshing");
                true
            }
        }
    }

    async fn write_tag(
        &self,
        bucket: &str,
        name: &StorageObjectName,
        tag: &RecencyTag,
    ) -> Result<()> {
        self.store.set_tag(bucket, name, tag).await?;
        info!(
            backend = self.store.name(),
            "Object {} tag {} updated to {}",
            name,
            tag.key,
            tag.value
        );
        Ok(())
    }
}

fn require_bucket(bucket: &str) -> Result<()> {
    if bucket.trim().is_empty() {
        return Err(Error::invalid("bucket must not be empty"));
    }
    Ok(())
}
