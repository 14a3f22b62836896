//! Invocation surfaces for stash.
//!
//! Two adapters feed the same controller: command-line flags ([`flags`]) and
//! `PLUGIN_*` environment variables ([`env`]), the latter for CI systems that
//! pass plugin settings through the environment.

pub mod config;
pub mod env;
pub mod flags;
pub mod handlers;

pub use config::{Backend, Invocation, LogFormat, RuntimeSettings};
pub use handlers::{execute, init_logging, run};
