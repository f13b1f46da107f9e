use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{header::CONTENT_TYPE, Client};
use std::time::Duration;

use super::{ArtifactReference, ProviderAttemptError, RenderBackend, RenderPayload};
use crate::domain::ProviderCredential;

pub const DEFAULT_IMAGE_RENDERER_URL: &str = "https://api.apiflash.com/v1";

/// HTML-to-image screenshot API. The receipt HTML is sent inline and the
/// PNG comes back in the response body.
#[derive(Clone)]
pub struct ImageRenderBackend {
    client: Client,
    base_url: String,
}

impl ImageRenderBackend {
    pub fn new(base_url: String) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        ImageRenderBackend { client, base_url }
    }

    fn endpoint(&self) -> String {
        format!("{}/urltoimage", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl RenderBackend for ImageRenderBackend {
    async fn render(
        &self,
        payload: &RenderPayload,
        credential: &ProviderCredential,
    ) -> Result<ArtifactReference, ProviderAttemptError> {
        let response = self
            .client
            .get(self.endpoint())
            .query(&[
                ("access_key", credential.secret.as_str()),
                ("format", "png"),
                ("html", payload.html.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderAttemptError::Status(response.status().as_u16()));
        }

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| "image/png".to_string());

        if !mime.starts_with("image/") {
            return Err(ProviderAttemptError::InvalidResponse(format!(
                "expected an image, got {}",
                mime
            )));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ProviderAttemptError::InvalidResponse(
                "empty image body".to_string(),
            ));
        }

        Ok(ArtifactReference::InlineImage {
            data_uri: format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(&bytes)),
        })
    }
}
