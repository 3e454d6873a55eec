//! HTTP client for the web3.storage API and its IPFS gateway

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, ClientBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use w3s_config::file::validate_config;
use w3s_config::ClientConfig;
use w3s_core::error::{StorageError, StorageResult};
use w3s_core::utils::{format_file_size, is_valid_cid};

use crate::api::{FileMetadata, UploadResult};
use crate::retry::{retry_if, RetryPolicy};

/// MIME type used when the content cannot be identified
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Client for one storage service
///
/// Holds the configuration and a pooled connection set. Tokens are passed per
/// call and never kept.
#[derive(Debug, Clone)]
pub struct StorageClient {
    /// Underlying HTTP client with connection pooling
    client: Client,
    /// Endpoints, timeout and retry settings
    config: ClientConfig,
}

impl StorageClient {
    /// Create a client for the public web3.storage service
    pub fn new() -> StorageResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: ClientConfig) -> StorageResult<Self> {
        validate_config(&config)?;

        let mut builder = ClientBuilder::new()
            // Connection pooling configuration
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .gzip(true)
            .user_agent(config.user_agent.clone());

        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(|e| {
            StorageError::network(format!("Failed to create HTTP client: {}", e), e)
        })?;

        Ok(Self { client, config })
    }

    /// Active configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Retry policy built from the configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.retry.max_attempts, self.config.base_delay())
    }

    /// Upload one file, reporting every failure inside the result
    pub async fn upload(&self, file_path: impl AsRef<Path>, token: &str) -> UploadResult {
        swallow("Upload", self.try_upload(file_path, token).await)
    }

    /// Upload one file
    ///
    /// Any status other than 200 is returned as [`StorageError::Status`]
    /// carrying the response body.
    pub async fn try_upload(
        &self,
        file_path: impl AsRef<Path>,
        token: &str,
    ) -> StorageResult<UploadResult> {
        let (file_name, part) = read_file_part(file_path.as_ref()).await?;
        let form = Form::new().part("file", part);

        let url = self.config.endpoint("upload");
        debug!(%url, file = %file_name, "Uploading file");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header("X-NAME", urlencoding::encode(&file_name).into_owned())
            .multipart(form)
            .send()
            .await
            .map_err(|e| StorageError::network(format!("Failed to upload file: {}", e), e))?;

        into_upload_result("Upload", response).await
    }

    /// Look up the status of a CID, reporting every failure inside the result
    pub async fn status(&self, cid: &str, token: &str) -> UploadResult {
        swallow("Status", self.try_status(cid, token).await)
    }

    /// Look up the status of a CID
    pub async fn try_status(&self, cid: &str, token: &str) -> StorageResult<UploadResult> {
        let url = self.config.endpoint(&format!("status/{}", cid));
        debug!(%url, "Fetching status");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| StorageError::network(format!("Failed to fetch status: {}", e), e))?;

        into_upload_result("Status", response).await
    }

    /// List the account's uploads as JSON text, or the error message on failure
    pub async fn user_uploads(&self, token: &str) -> String {
        match self.try_user_uploads(token).await {
            Ok(body) => body,
            Err(error) => {
                warn!(%error, "Listing uploads failed");
                error.to_string()
            }
        }
    }

    /// List the account's uploads as compact JSON text
    pub async fn try_user_uploads(&self, token: &str) -> StorageResult<String> {
        let url = self.config.endpoint("user/uploads");
        debug!(%url, "Listing uploads");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| StorageError::network(format!("Failed to list uploads: {}", e), e))?;

        let status = response.status();
        let body = read_text("List uploads", response).await?;
        if status.is_success() {
            Ok(compact_json(&body))
        } else {
            Err(StorageError::status("List uploads", status.as_u16(), compact_json(&body)))
        }
    }

    /// List the account's uploads as typed metadata
    pub async fn list_uploads(&self, token: &str) -> StorageResult<Vec<FileMetadata>> {
        let body = self.try_user_uploads(token).await?;
        serde_json::from_str(&body)
            .map_err(|e| StorageError::decode(format!("Failed to parse uploads list: {}", e), e))
    }

    /// Gateway URL of a CID, without validating it
    pub fn get_upload(&self, cid: &str) -> String {
        self.config.gateway_url(cid)
    }

    /// Gateway URL of a CID, rejecting identifiers that fail [`is_valid_cid`]
    pub fn get_file_url(&self, cid: &str) -> StorageResult<String> {
        if !is_valid_cid(cid) {
            return Err(StorageError::InvalidCid {
                cid: cid.to_string(),
            });
        }
        Ok(self.get_upload(cid))
    }

    /// Download raw content through the gateway
    pub async fn retrieve_file(&self, cid: &str) -> StorageResult<Vec<u8>> {
        let url = self.get_upload(cid);
        debug!(%url, "Retrieving file");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StorageError::network(format!("Failed to retrieve file: {}", e), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = read_text("Retrieve file", response).await?;
            return Err(StorageError::status("Retrieve file", status.as_u16(), body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::network(format!("Failed to read file: {}", e), e))?;

        Ok(bytes.to_vec())
    }

    /// Fetch the metadata of a stored CID
    pub async fn get_file_metadata(&self, cid: &str, token: &str) -> StorageResult<FileMetadata> {
        let url = self.config.endpoint(&format!("status/{}", cid));
        debug!(%url, "Fetching file metadata");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                StorageError::network(format!("Failed to get file metadata: {}", e), e)
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = read_text("Get file metadata", response).await?;
            return Err(StorageError::status("Get file metadata", status.as_u16(), body));
        }

        let body = response.bytes().await.map_err(|e| {
            StorageError::network(format!("Failed to read file metadata: {}", e), e)
        })?;

        serde_json::from_slice(&body)
            .map_err(|e| StorageError::decode(format!("Failed to parse file metadata: {}", e), e))
    }

    /// Ask the service to delete a CID, `Ok(true)` only on status 200
    ///
    /// The `delete/{cid}` endpoint is not part of the documented API.
    pub async fn delete_file(&self, cid: &str, token: &str) -> StorageResult<bool> {
        let url = self.config.endpoint(&format!("delete/{}", cid));
        debug!(%url, "Deleting file");

        let response = self
            .client
            .delete(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| StorageError::network(format!("Failed to delete file: {}", e), e))?;

        Ok(response.status() == StatusCode::OK)
    }

    /// Upload several files in one multipart request
    ///
    /// On success every path gets the same response body tagged with its own
    /// `fileName`. A non-200 status is an error. Any other failure yields one
    /// failed result per path carrying the error message.
    pub async fn upload_multiple<P: AsRef<Path>>(
        &self,
        file_paths: &[P],
        token: &str,
    ) -> StorageResult<Vec<UploadResult>> {
        if file_paths.is_empty() {
            return Ok(Vec::new());
        }

        let file_names: Vec<String> = file_paths
            .iter()
            .map(|path| display_name(path.as_ref()))
            .collect();

        match self.send_batch(file_paths, token).await {
            Ok(body) => Ok(file_names
                .iter()
                .map(|name| UploadResult::success(200, tag_with_file_name(&body, name)))
                .collect()),
            Err(error @ StorageError::Status { .. }) => Err(error),
            Err(error) => {
                warn!(%error, files = file_paths.len(), "Batch upload failed");
                let message = error.to_string();
                Ok(file_names
                    .iter()
                    .map(|_| UploadResult::failed(message.clone()))
                    .collect())
            }
        }
    }

    async fn send_batch<P: AsRef<Path>>(&self, file_paths: &[P], token: &str) -> StorageResult<String> {
        let mut form = Form::new();
        for path in file_paths {
            let (_, part) = read_file_part(path.as_ref()).await?;
            form = form.part("file", part);
        }

        let url = self.config.endpoint("upload");
        debug!(%url, files = file_paths.len(), "Uploading files");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| StorageError::network(format!("Failed to upload files: {}", e), e))?;

        let status = response.status();
        let body = compact_json(&read_text("Upload multiple", response).await?);
        if status == StatusCode::OK {
            Ok(body)
        } else {
            Err(StorageError::status("Upload multiple", status.as_u16(), body))
        }
    }

    /// Check whether the gateway serves a CID, `false` on any failure
    pub async fn file_exists(&self, cid: &str) -> bool {
        let url = self.get_upload(cid);
        debug!(%url, "Checking existence");

        match self.client.head(&url).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(error) => {
                debug!(%error, "Existence check failed");
                false
            }
        }
    }

    /// Sum of the sizes of all uploads, formatted as `"1.50 GB"`
    ///
    /// Entries without a numeric `size` count as zero. A listing that is not
    /// an array gives `"0 GB"`.
    pub async fn get_total_storage_used(&self, token: &str) -> StorageResult<String> {
        let body = self.try_user_uploads(token).await?;
        let uploads: Value = serde_json::from_str(&body).map_err(|e| {
            StorageError::decode(format!("Failed to get total storage used: {}", e), e)
        })?;

        let total = match uploads {
            Value::Array(items) => items
                .iter()
                .map(|item| item.get("size").and_then(Value::as_f64).unwrap_or(0.0))
                .sum::<f64>(),
            _ => return Ok("0 GB".to_string()),
        };

        // half away from zero, like format_file_size
        let gigabytes = (total / GIB * 100.0).round() / 100.0;
        Ok(format!("{:.2} GB", gigabytes))
    }

    /// Upload with exponential backoff between attempts
    ///
    /// Transport errors and 5xx or 429 responses are retried. An unreadable
    /// file fails immediately.
    pub async fn upload_with_retry(
        &self,
        file_path: impl AsRef<Path>,
        token: &str,
        max_retries: u32,
    ) -> StorageResult<UploadResult> {
        let file_path = file_path.as_ref();
        let policy = RetryPolicy {
            max_attempts: max_retries,
            ..self.retry_policy()
        };

        retry_if(
            &policy,
            || self.try_upload(file_path, token),
            StorageError::is_retryable,
        )
        .await
    }

    /// Size of a CID's content as reported by the gateway, e.g. `"2 KB"`
    ///
    /// A missing or unparseable `Content-Length` counts as zero.
    pub async fn get_file_size(&self, cid: &str) -> StorageResult<String> {
        let url = self.get_upload(cid);
        debug!(%url, "Probing file size");

        let response = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(|e| StorageError::network(format!("Failed to get file size: {}", e), e))?;

        Ok(format_file_size(content_length(response.headers())))
    }

    /// Check a token against the uploads listing, `false` on any failure
    pub async fn is_valid_token(&self, token: &str) -> bool {
        let url = self.config.endpoint("user/uploads");

        match self.client.head(&url).bearer_auth(token).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(error) => {
                debug!(%error, "Token check failed");
                false
            }
        }
    }
}

/// Identify content from its leading bytes
pub fn detect_content_type(bytes: &[u8]) -> &'static str {
    infer::get(bytes)
        .map(|kind| kind.mime_type())
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}

/// Read a file into a multipart part named after its base name
async fn read_file_part(path: &Path) -> StorageResult<(String, Part)> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            StorageError::io(
                format!("Not a file path: {}", path.display()),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| StorageError::io(format!("Failed to read file: {}", path.display()), e))?;

    let content_type = detect_content_type(&bytes);
    let part = file_part(file_name.clone(), bytes, content_type)?;

    Ok((file_name, part))
}

fn file_part(file_name: String, bytes: Vec<u8>, content_type: &str) -> StorageResult<Part> {
    Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(content_type)
        .map_err(|e| {
            StorageError::io(
                format!("Invalid content type {}", content_type),
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
}

/// `Content-Length` as a number, 0 when absent or unparseable
fn content_length(headers: &header::HeaderMap) -> u64 {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn read_text(operation: &str, response: Response) -> StorageResult<String> {
    response.text().await.map_err(|e| {
        StorageError::network(format!("Failed to read {} response: {}", operation, e), e)
    })
}

async fn into_upload_result(operation: &str, response: Response) -> StorageResult<UploadResult> {
    let status = response.status();
    let body = compact_json(&read_text(operation, response).await?);

    if status == StatusCode::OK {
        Ok(UploadResult::success(status.as_u16(), body))
    } else {
        Err(StorageError::status(operation, status.as_u16(), body))
    }
}

fn swallow(operation: &str, outcome: StorageResult<UploadResult>) -> UploadResult {
    if let Err(error) = &outcome {
        warn!(operation, %error, "Request failed");
    }
    UploadResult::from_outcome(outcome)
}

/// Re-serialize JSON bodies compactly, pass anything else through
fn compact_json(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .map(|value| value.to_string())
        .unwrap_or_else(|_| body.to_string())
}

fn tag_with_file_name(body: &str, file_name: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(mut fields)) => {
            fields.insert("fileName".to_string(), Value::String(file_name.to_string()));
            Value::Object(fields).to_string()
        }
        Ok(other) => serde_json::json!({ "fileName": file_name, "response": other }).to_string(),
        Err(_) => serde_json::json!({ "fileName": file_name, "response": body }).to_string(),
    }
}
