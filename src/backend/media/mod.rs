//! Media Cleanup
//!
//! Attachments live in an external media service. When a message is
//! deleted its attachment urls are handed to a `MediaHook`; failures are
//! logged and never undo the deletion.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media deletion request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Removes stored attachments
#[async_trait]
pub trait MediaHook: Send + Sync {
    async fn remove(&self, url: &str) -> Result<(), MediaError>;
}

/// Calls `DELETE {endpoint}?url=<attachment url>` on the media service
#[derive(Debug, Clone)]
pub struct HttpMediaHook {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpMediaHook {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl MediaHook for HttpMediaHook {
    async fn remove(&self, url: &str) -> Result<(), MediaError> {
        self.client
            .delete(&self.endpoint)
            .query(&[("url", url)])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Ask `hook` to remove every url, logging failures
pub async fn remove_attachments(hook: Option<&Arc<dyn MediaHook>>, urls: &[String]) {
    let Some(hook) = hook else {
        if !urls.is_empty() {
            tracing::debug!("[Media] No media hook configured; keeping {} attachment(s)", urls.len());
        }
        return;
    };

    for url in urls {
        match hook.remove(url).await {
            Ok(()) => tracing::debug!("[Media] Removed {}", url),
            Err(err) => tracing::warn!("[Media] Failed to remove {}: {}", url, err),
        }
    }
}
