//! Object store backends.

mod filesystem;
mod s3;

pub use filesystem::FilesystemStore;
pub use s3::{S3Settings, S3Store};
