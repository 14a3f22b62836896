//! Environment variable adapter (`PLUGIN_*`).

use crate::config::{Backend, Invocation, LogFormat, RuntimeSettings};
use stash_cache::{CompressionType, S3Settings};
use stash_core::{Error, RawCacheConfig, Result};
use std::path::PathBuf;

/// Prefix CI systems put in front of plugin settings.
pub const PREFIX: &str = "PLUGIN_";

/// Load `.env` (real variables win) and read the process environment.
pub fn from_env() -> Result<Invocation> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }
    from_lookup(|name| std::env::var(name).ok())
}

/// Build an invocation from any variable source.
pub fn from_lookup<F>(lookup: F) -> Result<Invocation>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(&format!("{PREFIX}{name}")).filter(|v| !v.trim().is_empty());

    let compression = match var("COMPRESSION") {
        Some(raw) => raw.parse()?,
        None => CompressionType::default(),
    };

    let log_format = match var("LOG_FORMAT").as_deref().map(str::trim) {
        None | Some("text") => LogFormat::Text,
        Some("json") => LogFormat::Json,
        Some(other) => {
            return Err(Error::invalid(format!(
                "Invalid log format: {}. Allowed: [text, json]",
                other
            )));
        }
    };

    let force_path_style = match var("FORCE_PATH_STYLE") {
        Some(raw) => parse_bool("FORCE_PATH_STYLE", &raw)?,
        None => false,
    };

    let s3 = S3Settings {
        region: var("REGION"),
        endpoint_url: var("ENDPOINT_URL"),
        force_path_style,
    };

    Ok(Invocation {
        cache: RawCacheConfig {
            action: var("ACTION"),
            bucket: var("BUCKET"),
            storage_class: var("S3_CLASS"),
            key: var("KEY"),
            artifacts: var("ARTIFACTS"),
        },
        runtime: RuntimeSettings {
            work_dir: var("WORK_DIR").map(PathBuf::from),
            compression,
            backend: Backend::select(var("STORE_DIR").map(PathBuf::from), s3),
            log_format,
        },
    })
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::invalid(format!(
            "{PREFIX}{name} must be a boolean, got {raw}"
        ))),
    }
}
