//! Cache engine types.

use serde::{Deserialize, Serialize};
use stash_core::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Compression applied around the tar stream.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    None,
    #[default]
    Gzip,
    Zstd,
}

impl FromStr for CompressionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "gzip" | "gz" => Ok(CompressionType::Gzip),
            "zstd" | "zst" => Ok(CompressionType::Zstd),
            "none" => Ok(CompressionType::None),
            other => Err(Error::invalid(format!(
                "Invalid compression: {}. Allowed: [gzip, zstd, none]",
                other
            ))),
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompressionType::None => "none",
            CompressionType::Gzip => "gzip",
            CompressionType::Zstd => "zstd",
        };
        f.write_str(s)
    }
}

/// Result of a single cache invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Archive uploaded and tagged.
    Stored { object: String, last_used: String },
    /// Archive downloaded and extracted.
    Restored {
        object: String,
        bytes: u64,
        /// Whether the `LastUsedDate` tag was rewritten.
        tag_refreshed: bool,
    },
    /// No object for the key. Not an error.
    Missed { object: String },
    /// Delete issued.
    Deleted { object: String },
}

impl Outcome {
    pub fn object(&self) -> &str {
        match self {
            Outcome::Stored { object, .. }
            | Outcome::Restored { object, .. }
            | Outcome::Missed { object }
            | Outcome::Deleted { object } => object,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Outcome::Restored { .. })
    }
}
