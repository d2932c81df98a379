//! Resolve [`ContentsWithHash`] to bytes: cache first, then inline, then URL.

use std::sync::Arc;

use airport_codec::ContentsWithHash;
use airport_core::{AirportError, LocationDescriptor, Result, TransportResultExt};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use crate::cache::{verify_hash, ContentCache};
use crate::pool::ClientPool;

/// Fetches content published at a URL.
#[async_trait]
pub trait UrlFetcher: Send + Sync {
    async fn fetch(&self, url: &str, location: &LocationDescriptor) -> Result<Bytes>;
}

/// `reqwest` fetcher drawing clients from a [`ClientPool`].
#[derive(Debug, Default)]
pub struct HttpFetcher {
    pool: ClientPool,
}

impl HttpFetcher {
    pub fn new(pool: ClientPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &ClientPool {
        &self.pool
    }
}

#[async_trait]
impl UrlFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, location: &LocationDescriptor) -> Result<Bytes> {
        let client = self.pool.acquire().transport_at(location, "build http client")?;
        let context = format!("GET {}", url);
        let response = client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .transport_at(location, &context)?;
        response.bytes().await.transport_at(location, &context)
    }
}

pub struct ContentFetcher {
    cache: Option<ContentCache>,
    urls: Arc<dyn UrlFetcher>,
}

impl ContentFetcher {
    pub fn new(cache: Option<ContentCache>, urls: Arc<dyn UrlFetcher>) -> Self {
        Self { cache, urls }
    }

    pub fn cache(&self) -> Option<&ContentCache> {
        self.cache.as_ref()
    }

    /// Bytes named by `contents`, verified against its hash.
    ///
    /// A cached entry short-circuits any download. Freshly obtained content
    /// that fails verification is a [`AirportError::HashMismatch`] and is
    /// never stored.
    pub async fn resolve(
        &self,
        contents: &ContentsWithHash,
        location: &LocationDescriptor,
    ) -> Result<Vec<u8>> {
        let hash = contents.sha256.as_str();
        if let Some(cache) = &self.cache {
            if let Some(bytes) = cache.get(hash, location).await? {
                return Ok(bytes);
            }
        }

        let bytes = if let Some(inline) = contents.inline_bytes.as_ref().filter(|b| !b.is_empty()) {
            debug!(sha256 = hash, bytes = inline.len(), "using inline content");
            inline.to_vec()
        } else if let Some(url) = contents.url.as_deref().filter(|u| !u.is_empty()) {
            info!(sha256 = hash, url, "fetching content");
            self.urls.fetch(url, location).await?.to_vec()
        } else {
            return Err(AirportError::protocol(
                location,
                format!("content {} is not cached and has no url or inline bytes", hash),
            ));
        };

        verify_hash(hash, &bytes, location)?;
        self.store(hash, &bytes, location).await?;
        Ok(bytes)
    }

    /// Store already-verified bytes under `sha256`.
    pub async fn store(&self, sha256: &str, bytes: &[u8], location: &LocationDescriptor) -> Result<()> {
        if let Some(cache) = &self.cache {
            cache.put(sha256, bytes, location).await?;
        }
        Ok(())
    }
}
