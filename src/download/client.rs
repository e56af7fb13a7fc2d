//! HTTP client wrapper for streaming page images to disk.
//!
//! This module provides the [`PageFetcher`] seam used by the dispatcher and
//! its production implementation, [`HttpClient`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use super::status::GlobalStatus;
use crate::user_agent;

/// Downloads one page image to a destination file.
///
/// Implementations must add every received byte to `status` as it arrives
/// and return the number of bytes written on success.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Streams `url` into `destination`, creating or truncating the file.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] when the request, the body stream or the
    /// file write fails.
    async fn fetch_page(
        &self,
        url: &str,
        destination: &Path,
        status: &GlobalStatus,
    ) -> Result<u64, DownloadError>;
}

/// HTTP client for archive requests.
///
/// Created once per run and shared by the manifest fetcher and every page
/// task, taking advantage of connection pooling.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes (for large page scans)
    /// - Gzip decompression: enabled
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    async fn download_page(
        &self,
        url: &str,
        destination: &Path,
        status: &GlobalStatus,
    ) -> Result<u64, DownloadError> {
        let mut file = File::create(destination)
            .await
            .map_err(|e| DownloadError::disk(destination, e))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url, e))?;

        if !response.status().is_success() {
            return Err(DownloadError::http_status(url, response.status().as_u16()));
        }

        let bytes_written = stream_to_file(&mut file, response, url, destination, status).await?;

        // Closing the handle here surfaces any deferred write error before we report success.
        file.shutdown()
            .await
            .map_err(|e| DownloadError::disk(destination, e))?;

        Ok(bytes_written)
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    #[instrument(skip(self, status), fields(url = %url, path = %destination.display()))]
    async fn fetch_page(
        &self,
        url: &str,
        destination: &Path,
        status: &GlobalStatus,
    ) -> Result<u64, DownloadError> {
        debug!("starting page download");

        let result = self.download_page(url, destination, status).await;

        match &result {
            Ok(bytes) => debug!(bytes, "page download complete"),
            Err(_) => {
                // Don't leave a truncated page behind; the next attempt recreates it.
                debug!("cleaning up partial file after error");
                let _ = tokio::fs::remove_file(destination).await;
            }
        }

        result
    }
}

/// Streams the response body to file, counting bytes as each chunk arrives.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    status: &GlobalStatus,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::from_reqwest(url, e))?;
        let len = chunk.len() as u64;
        status.add_bytes(len);

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::disk(file_path, e))?;

        bytes_written += len;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::disk(file_path, e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::DownloadPhase;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_page_writes_body_and_counts_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"TIFFDATA".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("0.tiff");
        let status = GlobalStatus::new();

        let bytes = HttpClient::new()
            .fetch_page(&format!("{}/page", server.uri()), &dest, &status)
            .await
            .unwrap();

        assert_eq!(bytes, 8);
        assert_eq!(status.bytes_downloaded(), 8);
        assert_eq!(std::fs::read(&dest).unwrap(), b"TIFFDATA");
    }

    #[tokio::test]
    async fn test_fetch_page_truncates_existing_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("1.tiff");
        std::fs::write(&dest, b"much longer stale content").unwrap();

        HttpClient::new()
            .fetch_page(&server.uri(), &dest, &GlobalStatus::new())
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_fetch_page_error_status_is_network_phase_and_removes_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("2.tiff");

        let err = HttpClient::new()
            .fetch_page(&server.uri(), &dest, &GlobalStatus::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::HttpStatus { status: 500, .. }));
        assert_eq!(err.phase(), DownloadPhase::Network);
        assert!(!dest.exists(), "partial file should be removed");
    }

    /// Serves one response that declares `declared` body bytes but sends only
    /// `sent`, then closes the connection.
    async fn spawn_truncating_server(declared: usize, sent: &'static [u8]) -> String {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Drain the request head so closing doesn't reset the connection.
            let mut request = Vec::new();
            let mut buf = [0_u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {declared}\r\n\r\n");
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(sent).await.unwrap();
            socket.flush().await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{addr}/page")
    }

    #[tokio::test]
    async fn test_fetch_page_truncated_body_counts_partial_bytes_and_removes_file() {
        let url = spawn_truncating_server(100, b"0123456789").await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("3.tiff");
        let status = GlobalStatus::new();

        let err = HttpClient::new()
            .fetch_page(&url, &dest, &status)
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Network { .. }), "{err:?}");
        assert_eq!(err.phase(), DownloadPhase::Network);
        assert_eq!(status.bytes_downloaded(), 10);
        assert!(!dest.exists(), "partial file should be removed");
    }

    #[tokio::test]
    async fn test_fetch_page_missing_folder_is_disk_phase() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("missing").join("0.tiff");

        // The file is opened before any request, so no server is needed.
        let err = HttpClient::new()
            .fetch_page("http://127.0.0.1:9/unused", &dest, &GlobalStatus::new())
            .await
            .unwrap_err();

        assert_eq!(err.phase(), DownloadPhase::Disk);
    }
}
