use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ArtifactReference, ProviderAttemptError, RenderBackend, RenderPayload};
use crate::domain::ProviderCredential;

#[derive(Debug, Serialize)]
struct CreateInvoiceRequest<'a> {
    external_id: &'a str,
    description: &'a str,
    customer_phone: &'a str,
    amount: i64,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateInvoiceResponse {
    url: Option<String>,
}

/// Hosted invoice service. Creates an invoice for the transaction and hands
/// back the provider's link to it.
#[derive(Clone)]
pub struct InvoiceLinkBackend {
    client: Client,
    base_url: String,
}

impl InvoiceLinkBackend {
    pub fn new(base_url: String) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        InvoiceLinkBackend { client, base_url }
    }
}

#[async_trait]
impl RenderBackend for InvoiceLinkBackend {
    async fn render(
        &self,
        payload: &RenderPayload,
        credential: &ProviderCredential,
    ) -> Result<ArtifactReference, ProviderAttemptError> {
        let url = format!("{}/invoices", self.base_url.trim_end_matches('/'));
        let body = CreateInvoiceRequest {
            external_id: &payload.reference,
            description: &payload.description,
            customer_phone: &payload.buyer,
            amount: payload.amount,
            html: &payload.html,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&credential.secret)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderAttemptError::Status(response.status().as_u16()));
        }

        let created = response
            .json::<CreateInvoiceResponse>()
            .await
            .map_err(|e| ProviderAttemptError::InvalidResponse(e.without_url().to_string()))?;

        match created.url {
            Some(url) if !url.trim().is_empty() => Ok(ArtifactReference::HostedUrl { url }),
            _ => Err(ProviderAttemptError::InvalidResponse(
                "invoice response has no url".to_string(),
            )),
        }
    }
}
