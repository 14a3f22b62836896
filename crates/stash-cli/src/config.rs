//! Invocation configuration shared by both adapters.

use clap::ValueEnum;
use stash_cache::{CompressionType, S3Settings};
use stash_core::RawCacheConfig;
use std::path::PathBuf;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Where objects are kept.
#[derive(Debug, Clone)]
pub enum Backend {
    S3(S3Settings),
    /// Local directory standing in for the bucket store.
    Filesystem(PathBuf),
}

impl Backend {
    /// A store directory selects the filesystem backend; otherwise S3.
    pub fn select(store_dir: Option<PathBuf>, s3: S3Settings) -> Self {
        match store_dir {
            Some(dir) => Backend::Filesystem(dir),
            None => Backend::S3(s3),
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        Backend::S3(S3Settings::default())
    }
}

/// Settings that shape the run but are not part of the cache request.
#[derive(Debug, Clone, Default)]
pub struct RuntimeSettings {
    /// Directory artifacts are packed from and restored into.
    /// Defaults to the process working directory.
    pub work_dir: Option<PathBuf>,
    pub compression: CompressionType,
    pub backend: Backend,
    pub log_format: LogFormat,
}

/// Everything an adapter collected for one run.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub cache: RawCacheConfig,
    pub runtime: RuntimeSettings,
}
