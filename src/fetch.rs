use crate::OptimgError;
use bytes::BytesMut;
use futures::StreamExt;
use mime::Mime;
use reqwest::Client;
use std::time::Duration;

/// Fetches source images over HTTP.
///
/// Holds one configured client for the life of the service; the request
/// timeout is applied at construction rather than per call.
pub struct Fetcher {
    client: Client,
    max_input_size: usize,
}

impl Fetcher {
    pub fn new(timeout: Duration, max_input_size: usize) -> Result<Self, OptimgError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OptimgError::Fetch(e.to_string()))?;
        Ok(Self { client, max_input_size })
    }

    /// Fetches source bytes from a remote URL.
    ///
    /// Single GET, no retries. Validation layers:
    /// 1. HTTP status must be 2xx
    /// 2. A parseable non-`image/*` Content-Type is rejected; unknown or
    ///    missing types fall through to the decoder
    /// 3. Content-Length pre-flight against the size limit
    /// 4. Streaming size enforcement, so a spoofed Content-Length header
    ///    cannot bypass the limit
    ///
    /// Decoding is not attempted here; undecodable bytes are the
    /// transcoder's error, not the fetcher's.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, OptimgError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| OptimgError::Fetch(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(OptimgError::Fetch(format!(
                "upstream status: {}",
                resp.status()
            )));
        }

        let ct = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if let Ok(m) = ct.parse::<Mime>() {
            if m.type_().as_str() != "image" {
                return Err(OptimgError::Fetch("source is not an image".into()));
            }
        }

        if let Some(len) = resp.content_length() {
            if len as usize > self.max_input_size {
                return Err(OptimgError::Fetch("input exceeds size limit".into()));
            }
        }

        let mut buf = BytesMut::with_capacity(8192);
        let mut stream = resp.bytes_stream();

        while let Some(chunk) = stream
            .next()
            .await
            .transpose()
            .map_err(|e| OptimgError::Fetch(e.to_string()))?
        {
            if buf.len() + chunk.len() > self.max_input_size {
                return Err(OptimgError::Fetch("input exceeds size limit".into()));
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(buf.to_vec())
    }
}
