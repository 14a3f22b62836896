//! stash entrypoint for CI plugin runners that pass settings as `PLUGIN_*`
//! environment variables.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match stash_cli::env::from_env() {
        Ok(invocation) => stash_cli::run(invocation).await,
        Err(e) => {
            stash_cli::init_logging(Default::default());
            tracing::error!(error = %e, "Invalid plugin settings");
            ExitCode::FAILURE
        }
    }
}
