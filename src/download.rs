//! HTTP media fetching
//!
//! Downloads are streamed into a `.part` file next to the destination and only
//! renamed into place once the announced number of bytes has arrived.

use crate::temp::create_part_file;
use reqwest::header::{CONTENT_LENGTH, HeaderMap};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching a remote file
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Failed to set up the HTTP client
    #[error("Failed to create HTTP client: {0}")]
    ClientFailed(reqwest::Error),

    /// The request could not be sent or the response not received
    #[error("Failed to download {url}: {source}")]
    RequestFailed {
        url: String,
        source: reqwest::Error,
    },

    /// The server answered with a non-success status
    #[error("HTTP {status} while downloading {url}")]
    HttpStatus { url: String, status: u16 },

    /// Reading the response body failed mid-transfer
    #[error("Transfer of {url} was interrupted: {source}")]
    TransferFailed {
        url: String,
        source: std::io::Error,
    },

    /// The body length disagrees with the announced Content-Length
    #[error("Incomplete download of {url}: expected {expected} bytes, received {received}")]
    Incomplete {
        url: String,
        expected: u64,
        received: u64,
    },

    /// Writing the downloaded data to disk failed
    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Trait for fetching remote media into local files
pub trait MediaFetcher {
    /// Size of the remote file as announced by the server, if available
    ///
    /// Lookup failures yield `None`; the caller then verifies without a size
    /// expectation.
    fn expected_len(&self, url: &str) -> Option<u64>;

    /// Downloads `url` to `destination`, replacing any existing file
    ///
    /// `progress` receives the number of bytes received so far and the total
    /// if known. Returns the number of bytes written.
    fn fetch(
        &self,
        url: &str,
        destination: &Path,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<u64, DownloadError>;
}

/// Reads the Content-Length header
///
/// The header is read directly since the body size hint of a HEAD response
/// does not reflect it.
fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// Media fetcher using a blocking reqwest client
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Size of the read buffer for streaming downloads
    const BUFFER_SIZE: usize = 64 * 1024;

    /// Creates a new fetcher
    ///
    /// # Arguments
    ///
    /// * `transfer_timeout` - Upper bound for a whole transfer, `None` for no limit
    pub fn new(transfer_timeout: Option<Duration>) -> Result<Self, DownloadError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .timeout(transfer_timeout)
            .build()
            .map_err(DownloadError::ClientFailed)?;

        Ok(Self { client })
    }
}

impl MediaFetcher for HttpFetcher {
    fn expected_len(&self, url: &str) -> Option<u64> {
        match self.client.head(url).send() {
            Ok(response) if response.status().is_success() => content_length(response.headers()),
            Ok(response) => {
                tracing::debug!("HEAD {} returned HTTP {}", url, response.status());
                None
            }
            Err(e) => {
                tracing::warn!("HEAD {} failed: {}", url, e);
                None
            }
        }
    }

    fn fetch(
        &self,
        url: &str,
        destination: &Path,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<u64, DownloadError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| DownloadError::RequestFailed {
                url: url.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let total_size = content_length(response.headers());

        let write_failed = |path: &Path, source: std::io::Error| DownloadError::WriteFailed {
            path: path.to_path_buf(),
            source,
        };

        let (mut file, part) =
            create_part_file(destination).map_err(|e| write_failed(destination, e))?;

        let mut downloaded: u64 = 0;
        let mut buffer = vec![0u8; Self::BUFFER_SIZE];
        let mut last_progress_percent = 0;

        loop {
            let bytes_read =
                response
                    .read(&mut buffer)
                    .map_err(|e| DownloadError::TransferFailed {
                        url: url.to_string(),
                        source: e,
                    })?;

            if bytes_read == 0 {
                break; // EOF
            }

            file.write_all(&buffer[..bytes_read])
                .map_err(|e| write_failed(part.path(), e))?;

            downloaded += bytes_read as u64;

            // Report progress every 10%
            if let Some(total) = total_size.filter(|t| *t > 0) {
                let progress_percent = downloaded * 100 / total;
                if progress_percent >= last_progress_percent + 10 {
                    progress(downloaded, total_size);
                    last_progress_percent = progress_percent;
                }
            }
        }

        if let Some(expected) = total_size {
            if downloaded != expected {
                return Err(DownloadError::Incomplete {
                    url: url.to_string(),
                    expected,
                    received: downloaded,
                });
            }
        }

        file.flush().map_err(|e| write_failed(part.path(), e))?;
        drop(file);

        part.persist(destination)
            .map_err(|e| write_failed(destination, e))?;

        progress(downloaded, total_size);

        Ok(downloaded)
    }
}
