//! Command-line flag adapter.

use crate::config::{Backend, Invocation, LogFormat, RuntimeSettings};
use clap::Parser;
use stash_cache::{CompressionType, S3Settings};
use stash_core::{DEFAULT_STORAGE_CLASS, RawCacheConfig};
use std::path::PathBuf;

/// Required inputs are optional here so that a missing one is reported
/// through the same validation as the environment adapter.
#[derive(Debug, Parser)]
#[command(name = "stash")]
#[command(author, version, about = "Cache build artifacts in an S3 bucket", long_about = None)]
pub struct Cli {
    /// Action to perform: put, get, delete
    #[arg(long)]
    pub action: Option<String>,

    /// Bucket name
    #[arg(long)]
    pub bucket: Option<String>,

    /// Storage class for uploaded archives
    #[arg(long = "s3-class", default_value = DEFAULT_STORAGE_CLASS)]
    pub s3_class: String,

    /// Cache key (without .zip)
    #[arg(long)]
    pub key: Option<String>,

    /// Comma- or newline-separated artifact paths or glob patterns
    #[arg(long)]
    pub artifacts: Option<String>,

    /// Archive compression: gzip, zstd, none
    #[arg(long, default_value = "gzip")]
    pub compression: CompressionType,

    /// Directory to pack from and restore into [default: current directory]
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// AWS region override
    #[arg(long)]
    pub region: Option<String>,

    /// Endpoint for S3-compatible stores
    #[arg(long)]
    pub endpoint_url: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long)]
    pub force_path_style: bool,

    /// Keep objects in this local directory instead of S3
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl From<Cli> for Invocation {
    fn from(cli: Cli) -> Self {
        let s3 = S3Settings {
            region: cli.region,
            endpoint_url: cli.endpoint_url,
            force_path_style: cli.force_path_style,
        };

        Invocation {
            cache: RawCacheConfig {
                action: cli.action,
                bucket: cli.bucket,
                storage_class: Some(cli.s3_class),
                key: cli.key,
                artifacts: cli.artifacts,
            },
            runtime: RuntimeSettings {
                work_dir: cli.work_dir,
                compression: cli.compression,
                backend: Backend::select(cli.store_dir, s3),
                log_format: cli.log_format,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["stash", "--action", "get", "--bucket", "b", "--key", "k"])
            .unwrap();
        assert_eq!(cli.s3_class, "STANDARD");
        assert_eq!(cli.compression, CompressionType::Gzip);
        assert_eq!(cli.log_format, LogFormat::Text);
        assert!(!cli.force_path_style);
    }

    #[test]
    fn test_unknown_compression_rejected() {
        assert!(Cli::try_parse_from(["stash", "--compression", "lz4"]).is_err());
    }
}
