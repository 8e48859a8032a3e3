use std::time::Duration;

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use reqwest::Client;
use url::Url;

use super::artifact::Artifact;
use crate::error::FetchError;

/// Turns a slot URL into a decoded artifact.
///
/// The returned future owns everything it needs so timer tasks can await it
/// without borrowing the fetcher.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<Artifact, FetchError>>;
}

/// Cheap local check run before any I/O: the string must be an absolute
/// http(s) URL with a host.
pub fn validate_url(raw: &str) -> Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme {:?}", other))),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    Ok(url)
}

/// Decode raw bytes into an artifact on the blocking pool.
pub async fn decode_artifact(bytes: Vec<u8>, source_url: String) -> Result<Artifact, FetchError> {
    tokio::task::spawn_blocking(move || decode_bytes(&bytes, &source_url))
        .await
        .map_err(|e| FetchError::Decode(format!("Decoder task failed: {}", e)))?
}

pub fn decode_bytes(bytes: &[u8], source_url: &str) -> Result<Artifact, FetchError> {
    let image = image::load_from_memory(bytes).map_err(|e| FetchError::Decode(e.to_string()))?;
    Ok(Artifact::new(image, source_url))
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mediagrid/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(format!("Client setup failed: {}", e)))?;
        Ok(Self { client })
    }

    async fn fetch_url(client: Client, url: Url) -> Result<Artifact, FetchError> {
        let source_url = url.to_string();

        let resp = client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(format!("Network error: {}", e)))?;

        if !resp.status().is_success() {
            return Err(FetchError::Transport(format!("HTTP {}", resp.status())));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(format!("Body read failed: {}", e)))?;

        decode_artifact(body.to_vec(), source_url).await
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<Artifact, FetchError>> {
        let parsed = match validate_url(url) {
            Ok(parsed) => parsed,
            Err(e) => return future::ready(Err(e)).boxed(),
        };
        Self::fetch_url(self.client.clone(), parsed).boxed()
    }
}
