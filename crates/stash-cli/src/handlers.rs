//! Run a collected invocation against the cache controller.

use crate::config::{Backend, Invocation, LogFormat};
use stash_cache::{CacheController, FilesystemStore, Outcome, S3Store, TarArchiver};
use stash_core::{LocalClock, ObjectStore, Result};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` overrides the default `info`.
pub fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Validate the invocation, wire up the collaborators and run it.
pub async fn execute(invocation: Invocation) -> Result<Outcome> {
    let config = invocation.cache.validate()?;
    let runtime = invocation.runtime;

    let work_dir = match runtime.work_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let store: Arc<dyn ObjectStore> = match runtime.backend {
        Backend::S3(settings) => Arc::new(S3Store::connect(&settings).await),
        Backend::Filesystem(root) => Arc::new(FilesystemStore::new(root)),
    };

    info!(
        action = %config.action,
        bucket = %config.bucket,
        key = %config.key,
        backend = store.name(),
        work_dir = %work_dir.display(),
        "Running cache action"
    );

    let controller = CacheController::new(
        Arc::new(TarArchiver::new(&work_dir, runtime.compression)),
        store,
        Arc::new(LocalClock),
        work_dir,
    );
    controller.run(&config).await
}

/// Shared entry point for both binaries: log, execute, map to an exit code.
pub async fn run(invocation: Invocation) -> ExitCode {
    init_logging(invocation.runtime.log_format);

    match execute(invocation).await {
        Ok(outcome) => {
            info!(object = outcome.object(), hit = outcome.is_hit(), "Done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Cache action failed");
            ExitCode::FAILURE
        }
    }
}
