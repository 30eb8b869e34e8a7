use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream;
use reqwest::{Client, Method, Response, StatusCode};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::download::progress::ProgressTracker;
use crate::storage::config::{BucketEndpointConfig, ClientOptions};
use crate::storage::s3::auth::aws_signer::{self, Payload, SignedRequestSpec, S3_SERVICE};
use crate::storage::s3::endpoint::{canonical_query, Endpoint};
use crate::storage::s3::parser::{parse_list_objects_response, parse_timestamp};
use crate::storage::traits::{ObjectStore, ProgressCallback, S3Object, StorageError};
use crate::utils::chunk_size::calculate_optimal_chunk_size;
use crate::utils::http_downloader::HttpDownloader;
use crate::utils::path_utils::PathUtils;

/// Source of "now" for signing and for defaulting timestamps
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Key checked by [`S3Client::verify`]; it does not need to exist
const CONNECTION_TEST_OBJECT: &str = "__connection_test__";

/// Stateless S3-compatible client
///
/// Holds only the HTTP connection pool, options and a clock, so one instance
/// can serve any number of bucket configurations concurrently.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    options: ClientOptions,
    clock: Clock,
}

impl std::fmt::Debug for S3Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Client")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl S3Client {
    pub fn new(options: ClientOptions) -> Result<Self, StorageError> {
        // no client-wide timeout: it would also cap transfers still streaming
        let mut builder = Client::builder().user_agent(options.user_agent.clone());
        if let Some(timeout) = options.connect_timeout_seconds {
            builder = builder.connect_timeout(Duration::from_secs(timeout));
        }
        let client = builder
            .build()
            .map_err(|e| StorageError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_http_client(client, options))
    }

    pub fn with_http_client(client: Client, options: ClientOptions) -> Self {
        Self {
            client,
            options,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replaces the wall clock, e.g. to pin signatures in tests
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Signs a request for `config`, returning every header to send
    fn build_auth_headers(
        &self,
        config: &BucketEndpointConfig,
        endpoint: &Endpoint,
        method: &Method,
        canonical_path: &str,
        query_string: &str,
        extra_headers: HashMap<String, String>,
        payload: Payload<'_>,
    ) -> HashMap<String, String> {
        let mut headers = extra_headers;
        headers.insert("host".to_string(), endpoint.host().to_string());

        let request = SignedRequestSpec {
            method: method.as_str(),
            canonical_path,
            canonical_query: query_string,
            headers,
            payload,
        };
        aws_signer::sign(
            &request,
            &config.access_key_id,
            &config.secret_access_key,
            &config.region,
            S3_SERVICE,
            self.now(),
        )
        .headers
    }

    fn request(&self, method: Method, url: &str, headers: HashMap<String, String>) -> reqwest::RequestBuilder {
        let mut req_builder = self.client.request(method, url);
        for (key, value) in headers {
            req_builder = req_builder.header(&key, &value);
        }
        req_builder
    }

    /// Like [`request`](Self::request), bounded by `timeout_seconds`
    ///
    /// Only for requests without a bulk body; uploads and downloads run for
    /// as long as bytes keep flowing.
    fn metadata_request(
        &self,
        method: Method,
        url: &str,
        headers: HashMap<String, String>,
    ) -> reqwest::RequestBuilder {
        let req_builder = self.request(method, url, headers);
        match self.options.timeout_seconds {
            Some(timeout) => req_builder.timeout(Duration::from_secs(timeout)),
            None => req_builder,
        }
    }

    async fn send(
        &self,
        req_builder: reqwest::RequestBuilder,
        operation: &str,
    ) -> Result<Response, StorageError> {
        req_builder.send().await.map_err(|e| {
            log::warn!("{} request failed: {}", operation, e);
            StorageError::Transport(format!("{} request failed: {}", operation, e))
        })
    }

    /// Passes `response` through when its status is one of `accepted`
    async fn check_status(
        response: Response,
        accepted: &[StatusCode],
        operation: &str,
    ) -> Result<Response, StorageError> {
        let status = response.status();
        if accepted.contains(&status) {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        log::warn!("{} failed with status {}", operation, status);
        Err(StorageError::Protocol {
            status: status.as_u16(),
            body,
        })
    }

    /// PUT `body` at `key`; success is HTTP 200
    pub async fn upload(
        &self,
        config: &BucketEndpointConfig,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<(), StorageError> {
        config.ensure_configured()?;
        let endpoint = Endpoint::resolve(config)?;
        let url = endpoint.object_url(key);
        let signing_path = endpoint.signing_path(Some(key));

        let mut extra_headers = HashMap::new();
        extra_headers.insert("content-type".to_string(), content_type.to_string());
        let headers = self.build_auth_headers(
            config,
            &endpoint,
            &Method::PUT,
            &signing_path,
            "",
            extra_headers,
            Payload::Bytes(&body),
        );

        log::debug!("PUT {} ({} bytes)", url, body.len());
        let content_length = body.len() as u64;
        let tracker = Arc::new(ProgressTracker::new(progress_callback, Some(content_length)));
        let req_builder = self
            .request(Method::PUT, &url, headers)
            .header(reqwest::header::CONTENT_LENGTH, content_length)
            .body(Self::progress_body(Bytes::from(body), tracker.clone()));

        let response = self.send(req_builder, "Upload").await?;
        Self::check_status(response, &[StatusCode::OK], "Upload").await?;

        tracker.finish();
        Ok(())
    }

    /// Splits `body` into chunks that report progress as they are pulled
    /// by the connection
    fn progress_body(body: Bytes, tracker: Arc<ProgressTracker>) -> reqwest::Body {
        let chunk_size = calculate_optimal_chunk_size(body.len() as u64);
        let chunks: Vec<Bytes> = (0..body.len())
            .step_by(chunk_size)
            .map(|start| body.slice(start..(start + chunk_size).min(body.len())))
            .collect();

        let chunk_stream = stream::iter(chunks.into_iter().map(move |chunk| {
            tracker.advance(chunk.len());
            Ok::<Bytes, std::io::Error>(chunk)
        }));
        reqwest::Body::wrap_stream(chunk_stream)
    }

    /// ListObjectsV2, scoped to the key prefix, newest first
    pub async fn list(
        &self,
        config: &BucketEndpointConfig,
        max_keys: Option<u32>,
    ) -> Result<Vec<S3Object>, StorageError> {
        config.ensure_configured()?;
        let endpoint = Endpoint::resolve(config)?;

        let max_keys = max_keys.unwrap_or(self.options.list_max_keys).to_string();
        let prefix = config.normalized_prefix();
        let mut params = vec![("list-type", "2"), ("max-keys", max_keys.as_str())];
        if !prefix.is_empty() {
            params.push(("prefix", prefix.as_str()));
        }
        let query_string = canonical_query(&params);
        let url = endpoint.bucket_url(&query_string);

        let headers = self.build_auth_headers(
            config,
            &endpoint,
            &Method::GET,
            &endpoint.signing_path(None),
            &query_string,
            HashMap::new(),
            Payload::Bytes(b""),
        );

        log::debug!("GET {}", url);
        let response = self.send(self.metadata_request(Method::GET, &url, headers), "List").await?;
        let response = Self::check_status(response, &[StatusCode::OK], "List").await?;

        let xml_content = response
            .text()
            .await
            .map_err(|e| StorageError::Transport(format!("Failed to read response body: {}", e)))?;

        let objects = parse_list_objects_response(&xml_content, self.now())?;
        log::debug!("Listed {} objects in {}", objects.len(), config.bucket);
        Ok(objects)
    }

    /// GET `key` into `destination`, returning the path actually written
    pub async fn download(
        &self,
        config: &BucketEndpointConfig,
        key: &str,
        destination: &Path,
        overwrite: bool,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<PathBuf, StorageError> {
        config.ensure_configured()?;
        let endpoint = Endpoint::resolve(config)?;
        let destination = PathUtils::expand_home_dir(destination)?;
        let url = endpoint.object_url(key);

        let headers = self.build_auth_headers(
            config,
            &endpoint,
            &Method::GET,
            &endpoint.signing_path(Some(key)),
            "",
            HashMap::new(),
            Payload::Bytes(b""),
        );

        log::debug!("GET {} -> {}", url, destination.display());
        let response = self.send(self.request(Method::GET, &url, headers), "Download").await?;
        let response = Self::check_status(response, &[StatusCode::OK], "Download").await?;

        HttpDownloader::download_to(response, &destination, overwrite, progress_callback).await
    }

    /// DELETE `key`; success is HTTP 200 or 204
    pub async fn delete(&self, config: &BucketEndpointConfig, key: &str) -> Result<(), StorageError> {
        config.ensure_configured()?;
        let endpoint = Endpoint::resolve(config)?;
        let url = endpoint.object_url(key);

        let headers = self.build_auth_headers(
            config,
            &endpoint,
            &Method::DELETE,
            &endpoint.signing_path(Some(key)),
            "",
            HashMap::new(),
            Payload::Bytes(b""),
        );

        log::debug!("DELETE {}", url);
        let response = self.send(self.metadata_request(Method::DELETE, &url, headers), "Delete").await?;
        Self::check_status(response, &[StatusCode::OK, StatusCode::NO_CONTENT], "Delete").await?;
        Ok(())
    }

    /// HEAD `key` for its size, modification time and ETag
    pub async fn head(&self, config: &BucketEndpointConfig, key: &str) -> Result<S3Object, StorageError> {
        config.ensure_configured()?;
        let endpoint = Endpoint::resolve(config)?;
        let response = self.head_request(config, &endpoint, key).await?;
        let response = Self::check_status(response, &[StatusCode::OK], "Head").await?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let size = header("content-length")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let last_modified = header("last-modified")
            .and_then(|s| {
                DateTime::parse_from_rfc2822(&s)
                    .map(|d| d.with_timezone(&Utc))
                    .ok()
                    .or_else(|| parse_timestamp(&s))
            })
            .unwrap_or_else(|| self.now());
        let etag = header("etag").map(|s| s.trim_matches('"').to_string());

        Ok(S3Object {
            key: key.to_string(),
            size,
            last_modified,
            etag,
        })
    }

    async fn head_request(
        &self,
        config: &BucketEndpointConfig,
        endpoint: &Endpoint,
        key: &str,
    ) -> Result<Response, StorageError> {
        let url = endpoint.object_url(key);
        let headers = self.build_auth_headers(
            config,
            endpoint,
            &Method::HEAD,
            &endpoint.signing_path(Some(key)),
            "",
            HashMap::new(),
            Payload::Bytes(b""),
        );
        log::debug!("HEAD {}", url);
        self.send(self.metadata_request(Method::HEAD, &url, headers), "Head").await
    }

    /// Checks that the endpoint accepts these credentials
    ///
    /// HEADs a key that normally does not exist, so only 200 and 404 count
    /// as success; this needs no ListBucket permission.
    pub async fn verify(&self, config: &BucketEndpointConfig) -> Result<(), StorageError> {
        config.ensure_configured()?;
        let endpoint = Endpoint::resolve(config)?;
        let test_object = format!("{}{}", config.normalized_prefix(), CONNECTION_TEST_OBJECT);

        let response = self.head_request(config, &endpoint, &test_object).await?;
        Self::check_status(
            response,
            &[StatusCode::OK, StatusCode::NOT_FOUND],
            "Connection test",
        )
        .await?;
        log::info!("Connection test succeeded for bucket {}", config.bucket);
        Ok(())
    }

    /// Query-signed GET URL for `key`, valid for `expires_in_seconds` (max 7 days)
    pub fn presign_url(
        &self,
        config: &BucketEndpointConfig,
        key: &str,
        expires_in_seconds: i64,
    ) -> Result<String, StorageError> {
        config.ensure_configured()?;
        let endpoint = Endpoint::resolve(config)?;
        Ok(aws_signer::generate_aws_presigned_url(
            &endpoint.object_url(key),
            endpoint.host(),
            &endpoint.signing_path(Some(key)),
            expires_in_seconds,
            &config.access_key_id,
            &config.secret_access_key,
            &config.region,
            self.now(),
        ))
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn put_object(
        &self,
        config: &BucketEndpointConfig,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<(), StorageError> {
        self.upload(config, key, body, content_type, progress_callback).await
    }

    async fn list_objects(
        &self,
        config: &BucketEndpointConfig,
        max_keys: Option<u32>,
    ) -> Result<Vec<S3Object>, StorageError> {
        self.list(config, max_keys).await
    }

    async fn download_object(
        &self,
        config: &BucketEndpointConfig,
        key: &str,
        destination: &Path,
        overwrite: bool,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<PathBuf, StorageError> {
        self.download(config, key, destination, overwrite, progress_callback)
            .await
    }

    async fn delete_object(
        &self,
        config: &BucketEndpointConfig,
        key: &str,
    ) -> Result<(), StorageError> {
        self.delete(config, key).await
    }

    async fn head_object(
        &self,
        config: &BucketEndpointConfig,
        key: &str,
    ) -> Result<S3Object, StorageError> {
        self.head(config, key).await
    }
}
