//! S3 (and S3-compatible) object store.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{StorageClass as S3StorageClass, Tag, Tagging};
use stash_core::{Error, ObjectStore, RecencyTag, Result, StorageClass, StorageObjectName};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Client settings for the S3 backend.
///
/// Credentials always come from the default AWS provider chain.
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    /// Region override. Falls back to the provider chain (`AWS_REGION`, profile).
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores (MinIO, R2, ...).
    pub endpoint_url: Option<String>,
    /// Use path-style addressing (`endpoint/bucket/key`).
    pub force_path_style: bool,
}

/// Object store backed by Amazon S3.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Build a client from the default AWS configuration plus `settings`.
    pub async fn connect(settings: &S3Settings) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(aws_sdk_s3::config::Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &settings.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        builder = builder.force_path_style(settings.force_path_style);

        debug!(
            region = ?settings.region,
            endpoint = ?settings.endpoint_url,
            path_style = settings.force_path_style,
            "S3 client configured"
        );

        Self::from_client(Client::from_conf(builder.build()))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn failure(operation: &str, name: &StorageObjectName, err: impl std::error::Error) -> Error {
    Error::StoreFailure(format!(
        "{} {} failed: {}",
        operation,
        name,
        DisplayErrorContext(err)
    ))
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(
        &self,
        bucket: &str,
        name: &StorageObjectName,
        source: &Path,
        storage_class: &StorageClass,
    ) -> Result<()> {
        let body = ByteStream::from_path(source).await.map_err(|e| {
            Error::StoreFailure(format!("Failed to read {}: {}", source.display(), e))
        })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(name.as_str())
            .storage_class(S3StorageClass::from(storage_class.as_str()))
            .body(body)
            .send()
            .await
            .map_err(|e| failure("PutObject", name, e))?;

        Ok(())
    }

    async fn get(&self, bucket: &str, name: &StorageObjectName, dest: &Path) -> Result<u64> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(name.as_str())
            .send()
            .await
            .map_err(|e| failure("GetObject", name, e))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let mut body = output.body;
        let mut bytes = 0u64;
        while let Some(chunk) = body.try_next().await.map_err(|e| {
            Error::StoreFailure(format!("Failed to download {}: {}", name, e))
        })? {
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(bytes)
    }

    async fn exists(&self, bucket: &str, name: &StorageObjectName) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(name.as_str())
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(err) => Err(failure("HeadObject", name, err)),
        }
    }

    async fn delete(&self, bucket: &str, name: &StorageObjectName) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(name.as_str())
            .send()
            .await
            .map_err(|e| failure("DeleteObject", name, e))?;

        Ok(())
    }

    async fn set_tag(
        &self,
        bucket: &str,
        name: &StorageObjectName,
        tag: &RecencyTag,
    ) -> Result<()> {
        let tag_set = Tag::builder()
            .key(&tag.key)
            .value(&tag.value)
            .build()
            .map_err(|e| failure("PutObjectTagging", name, e))?;
        let tagging = Tagging::builder()
            .tag_set(tag_set)
            .build()
            .map_err(|e| failure("PutObjectTagging", name, e))?;

        self.client
            .put_object_tagging()
            .bucket(bucket)
            .key(name.as_str())
            .tagging(tagging)
            .send()
            .await
            .map_err(|e| failure("PutObjectTagging", name, e))?;

        Ok(())
    }

    async fn get_tag(
        &self,
        bucket: &str,
        name: &StorageObjectName,
        tag_key: &str,
    ) -> Result<String> {
        let output = self
            .client
            .get_object_tagging()
            .bucket(bucket)
            .key(name.as_str())
            .send()
            .await
            .map_err(|e| failure("GetObjectTagging", name, e))?;

        output
            .tag_set()
            .iter()
            .find(|t| t.key() == tag_key)
            .map(|t| t.value().to_string())
            .ok_or_else(|| Error::TagNotFound {
                object: name.to_string(),
                tag: tag_key.to_string(),
            })
    }

    fn name(&self) -> &str {
        "s3"
    }
}
