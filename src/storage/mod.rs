pub mod config;
pub mod manager;
pub mod s3;
pub mod s3_client;
pub mod traits;

pub use config::{BucketEndpointConfig, ClientOptions, UrlTemplate};
pub use manager::{configure_storage_manager, get_storage_manager, StorageManager};
pub use s3_client::S3Client;
pub use traits::{
    ErrorCategory, ObjectStore, ProgressCallback, S3Object, StorageError, UploadResult,
};
