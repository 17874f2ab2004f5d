//! Azure Blob Storage adapter.
//!
//! Implements the [`BlobStore`] trait over plain HTTPS `Put Blob` requests
//! authenticated with a SAS token. Everything the core cares about —
//! transient vs. permanent classification — happens in [`classify_status`];
//! the rest is transport plumbing.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use reqwest::StatusCode;
use tokio_util::io::ReaderStream;
use tracing::debug;

use blobsync_types::BlobError;
use blobsync_uploader::BlobStore;

use crate::config::AzureSettings;

pub struct AzureBlobStore {
    client: reqwest::Client,
    container_url: String,
    sas_token: String,
}

impl AzureBlobStore {
    pub fn new(settings: &AzureSettings) -> Self {
        let sas = settings.sas_token.trim();
        let sas_token = if sas.is_empty() || sas.starts_with('?') {
            sas.to_string()
        } else {
            format!("?{sas}")
        };
        Self {
            client: reqwest::Client::new(),
            container_url: settings.container_url.trim_end_matches('/').to_string(),
            sas_token,
        }
    }

    fn blob_url(&self, blob_name: &str) -> String {
        format!("{}/{}{}", self.container_url, blob_name, self.sas_token)
    }
}

impl BlobStore for AzureBlobStore {
    fn upload_blob(
        &self,
        blob_name: &str,
        source: &Path,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlobError>> + Send + '_>> {
        let url = self.blob_url(blob_name);
        let source = source.to_path_buf();
        let blob_name = blob_name.to_string();

        Box::pin(async move {
            let file = tokio::fs::File::open(&source).await.map_err(|e| {
                BlobError::Permanent(format!("cannot open {}: {e}", source.display()))
            })?;
            let len = file.metadata().await.map_err(|e| {
                BlobError::Permanent(format!("cannot stat {}: {e}", source.display()))
            })?.len();

            let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
            let response = self
                .client
                .put(&url)
                .header("x-ms-blob-type", "BlockBlob")
                .header(reqwest::header::CONTENT_LENGTH, len)
                .body(body)
                .send()
                .await
                .map_err(|e| BlobError::Permanent(format!("request failed: {e}")))?;

            debug!(blob = %blob_name, status = %response.status(), "put blob");
            classify_status(response.status())
        })
    }
}

/// Server overload, rate limiting and 5xx-class gateway conditions are
/// worth retrying; everything else is permanent.
fn classify_status(status: StatusCode) -> Result<(), BlobError> {
    if status.is_success() {
        return Ok(());
    }
    match status.as_u16() {
        429 | 500 | 502 | 503 | 504 => Err(BlobError::Transient(format!("HTTP {status}"))),
        _ => Err(BlobError::Permanent(format!("HTTP {status}"))),
    }
}
