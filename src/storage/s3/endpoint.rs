//! Bucket addressing
//!
//! Without a custom endpoint requests go to AWS in virtual-hosted style
//! (`https://{bucket}.s3.{region}.amazonaws.com/{key}`). With one, they go
//! path-style to `{endpoint}/{bucket}/{key}`, which is what R2, GCS, MinIO
//! and most other S3-compatible services expect.

use crate::storage::config::BucketEndpointConfig;
use crate::storage::traits::StorageError;

/// AWS URI encoding of a single component
///
/// Leaves `A-Za-z0-9-_.~` untouched and `%XX`-encodes every other byte,
/// slashes included.
pub fn aws_uri_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// AWS URI encoding of an object key, keeping `/` as the segment separator
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(aws_uri_encode)
        .collect::<Vec<_>>()
        .join("/")
}

/// Canonical query string: pairs encoded, then sorted by name and value
pub fn canonical_query(params: &[(&str, &str)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (aws_uri_encode(k), aws_uri_encode(v)))
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Resolved addressing for one bucket configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    base_url: String,
    /// Path the signing path starts with: empty, or `{endpoint path}/{bucket}`
    path_base: String,
    path_style: bool,
}

impl Endpoint {
    pub fn resolve(config: &BucketEndpointConfig) -> Result<Self, StorageError> {
        match config.endpoint_url()? {
            Some(url) => {
                let mut host = url.host_str().unwrap_or_default().to_string();
                // Url::port is None for the scheme's default port
                if let Some(port) = url.port() {
                    host = format!("{}:{}", host, port);
                }
                let endpoint_path = url.path().trim_end_matches('/');
                Ok(Self {
                    host,
                    base_url: format!("{}/{}", config.trimmed_endpoint(), config.bucket),
                    path_base: format!("{}/{}", endpoint_path, config.bucket),
                    path_style: true,
                })
            }
            None => {
                let host = format!("{}.s3.{}.amazonaws.com", config.bucket, config.region);
                Ok(Self {
                    base_url: format!("https://{}", host),
                    host,
                    path_base: String::new(),
                    path_style: false,
                })
            }
        }
    }

    /// Value of the signed `host` header
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Bucket root URL, no trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_path_style(&self) -> bool {
        self.path_style
    }

    /// Canonical path for an object, or for the bucket itself when `key` is `None`
    pub fn signing_path(&self, key: Option<&str>) -> String {
        match key {
            Some(key) => format!("{}/{}", self.path_base, encode_key(key)),
            None => format!("{}/", self.path_base),
        }
    }

    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, encode_key(key))
    }

    /// Bucket-level URL with an already-canonical query
    pub fn bucket_url(&self, query: &str) -> String {
        if query.is_empty() {
            format!("{}/", self.base_url)
        } else {
            format!("{}/?{}", self.base_url, query)
        }
    }
}
