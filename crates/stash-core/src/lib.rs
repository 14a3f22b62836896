//! stash core
//!
//! Domain types, port traits, and error handling for the S3-backed build
//! cache. This crate has minimal dependencies and defines the shared
//! vocabulary used by the cache engine and the command-line adapters.

pub mod cache;
pub mod clock;
pub mod error;
pub mod ports;

pub use cache::{
    Action, ArtifactSet, CacheConfig, CacheKey, DEFAULT_STORAGE_CLASS, LAST_USED_TAG,
    OBJECT_EXTENSION, RawCacheConfig, RecencyTag, StorageClass, StorageObjectName,
};
pub use clock::{Clock, LocalClock, TAG_DATE_FORMAT, format_tag_date};
pub use error::{Error, Result};
pub use ports::{Archiver, ObjectStore};
