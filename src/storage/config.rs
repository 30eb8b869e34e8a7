use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::storage::traits::StorageError;
use crate::upload::rename::RenamePolicy;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_URI_SCHEME: &str = "s3";
pub const DEFAULT_LIST_MAX_KEYS: u32 = 200;

/// A labelled public-URL template, e.g. `https://cdn.example.com/${PATH}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlTemplate {
    pub label: String,
    pub template: String,
}

impl UrlTemplate {
    pub fn new(label: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            template: template.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.template.trim().is_empty()
    }
}

/// Fully resolved bucket configuration, supplied by the caller on every call
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketEndpointConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub region: String,
    /// Custom endpoint URL; empty means AWS virtual-hosted addressing
    pub endpoint: String,
    pub key_prefix: String,
    /// Display label such as `s3`, `r2` or `gcs`
    pub uri_scheme: String,
    /// Ordered; the first non-blank one is the default
    pub url_templates: Vec<UrlTemplate>,
    pub rename_policy: RenamePolicy,
}

impl Default for BucketEndpointConfig {
    fn default() -> Self {
        Self {
            access_key_id: String::new(),
            secret_access_key: String::new(),
            bucket: String::new(),
            region: DEFAULT_REGION.to_string(),
            endpoint: String::new(),
            key_prefix: String::new(),
            uri_scheme: DEFAULT_URI_SCHEME.to_string(),
            url_templates: Vec::new(),
            rename_policy: RenamePolicy::default(),
        }
    }
}

impl fmt::Debug for BucketEndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketEndpointConfig")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("key_prefix", &self.key_prefix)
            .field("uri_scheme", &self.uri_scheme)
            .field("url_templates", &self.url_templates)
            .field("rename_policy", &self.rename_policy)
            .finish()
    }
}

impl BucketEndpointConfig {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        bucket: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            bucket: bucket.into(),
            region: region.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_uri_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.uri_scheme = scheme.into();
        self
    }

    pub fn with_url_template(mut self, template: UrlTemplate) -> Self {
        self.url_templates.push(template);
        self
    }

    pub fn with_rename_policy(mut self, policy: RenamePolicy) -> Self {
        self.rename_policy = policy;
        self
    }

    /// Credentials and bucket are all present
    pub fn is_configured(&self) -> bool {
        !self.access_key_id.trim().is_empty()
            && !self.secret_access_key.trim().is_empty()
            && !self.bucket.trim().is_empty()
    }

    pub(crate) fn ensure_configured(&self) -> Result<(), StorageError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(StorageError::not_configured())
        }
    }

    pub fn is_custom_endpoint(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }

    /// Custom endpoint without surrounding whitespace or trailing slashes,
    /// `https://` assumed when no scheme is given
    pub fn trimmed_endpoint(&self) -> String {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() || endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("https://{}", endpoint)
        }
    }

    /// Parsed custom endpoint, `None` for AWS addressing
    pub(crate) fn endpoint_url(&self) -> Result<Option<Url>, StorageError> {
        if !self.is_custom_endpoint() {
            return Ok(None);
        }
        let endpoint = self.trimmed_endpoint();
        let url = Url::parse(&endpoint).map_err(|e| {
            StorageError::Configuration(format!("invalid endpoint '{}': {}", endpoint, e))
        })?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(StorageError::Configuration(format!(
                "endpoint '{}' has no host",
                endpoint
            )));
        }
        Ok(Some(url))
    }

    /// Key prefix ending in exactly one `/`, or empty
    pub fn normalized_prefix(&self) -> String {
        let prefix = self.key_prefix.trim().trim_matches('/');
        if prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", prefix)
        }
    }

    /// Template used for auto-copy after upload
    pub fn default_template(&self) -> Option<&UrlTemplate> {
        self.url_templates.iter().find(|t| !t.is_blank())
    }
}

/// HTTP layer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Bound on list, delete and head requests. Uploads and downloads are
    /// not bounded once connected.
    pub timeout_seconds: Option<u64>,
    pub connect_timeout_seconds: Option<u64>,
    pub user_agent: String,
    pub list_max_keys: u32,
    /// Transfers admitted at once by the shared storage manager
    pub max_concurrent_transfers: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: Some(60),
            connect_timeout_seconds: Some(30),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            list_max_keys: DEFAULT_LIST_MAX_KEYS,
            max_concurrent_transfers: 4,
        }
    }
}
