//! Receipt rendering: a provider-agnostic payload, the backends that turn it
//! into an artifact, and the dispatcher that fails over between them.

pub mod dispatcher;
pub mod image;
pub mod invoice;
pub mod template;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::domain::ProviderCredential;

pub use dispatcher::{ReceiptDispatcher, RenderError, RenderedReceipt};
pub use image::ImageRenderBackend;
pub use invoice::InvoiceLinkBackend;
pub use template::{ReceiptLine, RenderPayload};

/// Where the rendered receipt can be found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ArtifactReference {
    /// `data:` URI carrying the encoded image.
    #[serde(rename_all = "camelCase")]
    InlineImage { data_uri: String },
    /// Link returned by a hosted invoice provider.
    HostedUrl { url: String },
}

/// Why a single provider attempt failed. Never surfaced on its own; the
/// dispatcher logs it and moves to the next provider.
#[derive(Error, Debug)]
pub enum ProviderAttemptError {
    #[error("HTTP request failed: {0}")]
    Transport(reqwest::Error),
    #[error("provider responded with status {0}")]
    Status(u16),
    #[error("invalid response from provider: {0}")]
    InvalidResponse(String),
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
    #[error("circuit breaker open")]
    CircuitOpen,
    #[error("no backend registered for provider kind '{0}'")]
    Unsupported(String),
}

// Request URLs can carry provider credentials in the query string.
impl From<reqwest::Error> for ProviderAttemptError {
    fn from(err: reqwest::Error) -> Self {
        ProviderAttemptError::Transport(err.without_url())
    }
}

/// One rendering backend. Implementations issue exactly one external call
/// per invocation using the credential they are given.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    async fn render(
        &self,
        payload: &RenderPayload,
        credential: &ProviderCredential,
    ) -> Result<ArtifactReference, ProviderAttemptError>;
}
