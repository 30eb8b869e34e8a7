//! S3-compatible object storage client
//!
//! Signs requests with AWS Signature Version 4 and talks to AWS S3,
//! Cloudflare R2, Google Cloud Storage, MinIO and other S3-compatible
//! endpoints over HTTPS. Callers supply a fully resolved
//! [`BucketEndpointConfig`] with every call.

pub mod commands;
pub mod download;
pub mod storage;
pub mod upload;
pub mod utils;

#[cfg(test)]
mod test_server;

pub use storage::{
    BucketEndpointConfig, ClientOptions, ErrorCategory, ObjectStore, ProgressCallback, S3Client,
    S3Object, StorageError, StorageManager, UploadResult, UrlTemplate,
};
pub use upload::{DateFormat, HashAlgorithm, RenamePolicy, ResolvedUrl, UploadSource};
