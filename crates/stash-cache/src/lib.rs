//! Build cache engine for stash (S3/R2 compatible).

pub mod archiver;
pub mod controller;
pub mod store;
pub mod types;

pub use archiver::TarArchiver;
pub use controller::CacheController;
pub use store::{FilesystemStore, S3Settings, S3Store};
pub use types::{CompressionType, Outcome};
