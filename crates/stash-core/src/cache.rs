//! Cache domain types.

use crate::clock::format_tag_date;
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Extension appended to every cache key to form the object name.
///
/// Fixed regardless of the archive format actually used.
pub const OBJECT_EXTENSION: &str = ".zip";

/// The single tag key maintained on stored objects.
pub const LAST_USED_TAG: &str = "LastUsedDate";

/// Storage tier used when the caller does not pick one.
pub const DEFAULT_STORAGE_CLASS: &str = "STANDARD";

/// Caller-supplied cache key.
///
/// The key is used verbatim; it is never sanitized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(Error::invalid("cache key must not be empty"));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the name of the object that stores this key's archive.
    pub fn object_name(&self) -> StorageObjectName {
        StorageObjectName(format!("{}{}", self.0, OBJECT_EXTENSION))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CacheKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// Name of the object in the bucket, also used for the local archive file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StorageObjectName(String);

impl StorageObjectName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<std::path::Path> for StorageObjectName {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

/// Ordered, non-empty list of paths or glob patterns to archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ArtifactSet(Vec<String>);

impl ArtifactSet {
    /// Build from individual entries. Entries are trimmed and blanks dropped.
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries: Vec<String> = entries
            .into_iter()
            .map(|e| e.as_ref().trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();

        if entries.is_empty() {
            return Err(Error::invalid("No artifacts provided"));
        }
        Ok(Self(entries))
    }

    /// Parse a comma- or newline-separated list.
    pub fn parse(raw: &str) -> Result<Self> {
        Self::new(raw.split([',', '\n']))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl TryFrom<Vec<String>> for ArtifactSet {
    type Error = Error;

    fn try_from(value: Vec<String>) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ArtifactSet> for Vec<String> {
    fn from(set: ArtifactSet) -> Self {
        set.0
    }
}

/// Object storage tier (e.g. `STANDARD`, `STANDARD_IA`, `GLACIER_IR`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageClass(String);

impl StorageClass {
    /// Blank input falls back to [`DEFAULT_STORAGE_CLASS`].
    pub fn new(class: impl Into<String>) -> Self {
        let class = class.into();
        if class.trim().is_empty() {
            Self::default()
        } else {
            Self(class.trim().to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StorageClass {
    fn default() -> Self {
        Self(DEFAULT_STORAGE_CLASS.to_string())
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A key/value tag attached to a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecencyTag {
    pub key: String,
    pub value: String,
}

impl RecencyTag {
    /// The `LastUsedDate` tag for the given calendar day.
    pub fn last_used(date: NaiveDate) -> Self {
        Self {
            key: LAST_USED_TAG.to_string(),
            value: format_tag_date(date),
        }
    }
}

/// What the caller wants done with the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Put,
    Get,
    Delete,
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "put" => Ok(Action::Put),
            "get" => Ok(Action::Get),
            "delete" => Ok(Action::Delete),
            other => Err(Error::invalid(format!(
                "Invalid action: {}. Allowed: [put, get, delete]",
                other
            ))),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Put => "put",
            Action::Get => "get",
            Action::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Validated configuration for a single cache invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheConfig {
    pub action: Action,
    pub bucket: String,
    pub storage_class: StorageClass,
    pub key: CacheKey,
    /// Always present for [`Action::Put`]; ignored otherwise.
    pub artifacts: Option<ArtifactSet>,
}

/// Unvalidated inputs as collected by an invocation surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCacheConfig {
    pub action: Option<String>,
    pub bucket: Option<String>,
    pub storage_class: Option<String>,
    pub key: Option<String>,
    pub artifacts: Option<String>,
}

impl RawCacheConfig {
    /// Check required inputs and build a [`CacheConfig`].
    pub fn validate(self) -> Result<CacheConfig> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let (Some(action), Some(bucket), Some(key)) = (
            present(self.action),
            present(self.bucket),
            present(self.key),
        ) else {
            return Err(Error::invalid(
                "Missing required arguments: action, bucket and key are required",
            ));
        };

        let action: Action = action.trim().parse()?;
        let key = CacheKey::new(key)?;
        let storage_class = self
            .storage_class
            .map(StorageClass::new)
            .unwrap_or_default();

        let artifacts = match (action, self.artifacts) {
            (Action::Put, Some(raw)) => Some(ArtifactSet::parse(&raw)?),
            (Action::Put, None) => return Err(Error::invalid("No artifacts provided")),
            (_, Some(raw)) => ArtifactSet::parse(&raw).ok(),
            (_, None) => None,
        };

        Ok(CacheConfig {
            action,
            bucket: bucket.trim().to_string(),
            storage_class,
            key,
            artifacts,
        })
    }
}
