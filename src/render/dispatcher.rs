//! Priority-ordered failover across render providers.
//!
//! Providers are tried one at a time in ascending priority. A failed,
//! timed-out or circuit-broken attempt is logged and the next provider is
//! tried; the first success wins. Only when every provider has failed does
//! the caller see an error, and then a single one.

use chrono::{FixedOffset, Offset, Utc};
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

use super::{ArtifactReference, ProviderAttemptError, RenderBackend, RenderPayload};
use crate::domain::{ProviderCredential, ProviderKind, Transaction};
use crate::ports::ProviderRegistry;

pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(60);

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("no render providers configured")]
    NoProviders,

    #[error("could not load render providers: {0}")]
    Registry(String),

    #[error("rendering failed after trying all {} configured providers", .attempted.len())]
    Exhausted { attempted: Vec<String> },
}

/// A successful render and which provider produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedReceipt {
    pub provider: String,
    pub artifact: ArtifactReference,
    /// Provider names in the order they were tried, ending with `provider`.
    pub attempted: Vec<String>,
}

pub struct ReceiptDispatcher {
    registry: Arc<dyn ProviderRegistry>,
    backends: HashMap<ProviderKind, Arc<dyn RenderBackend>>,
    shop_name: String,
    display_offset: FixedOffset,
    attempt_timeout: Duration,
    failure_threshold: u32,
    reset_timeout: Duration,
    breakers: Mutex<HashMap<String, Breaker>>,
}

impl ReceiptDispatcher {
    pub fn new(registry: Arc<dyn ProviderRegistry>, shop_name: impl Into<String>) -> Self {
        Self {
            registry,
            backends: HashMap::new(),
            shop_name: shop_name.into(),
            display_offset: Utc.fix(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_backend(mut self, kind: ProviderKind, backend: Arc<dyn RenderBackend>) -> Self {
        self.backends.insert(kind, backend);
        self
    }

    /// UTC offset used for dates printed on the receipt.
    pub fn with_display_offset(mut self, offset: FixedOffset) -> Self {
        self.display_offset = offset;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Opens a provider's circuit after `failure_threshold` consecutive
    /// failures; it is retried after a jittered `reset_timeout`.
    pub fn with_circuit_breaker(mut self, failure_threshold: u32, reset_timeout: Duration) -> Self {
        self.failure_threshold = failure_threshold;
        self.reset_timeout = reset_timeout;
        self
    }

    pub async fn dispatch(&self, tx: &Transaction) -> Result<RenderedReceipt, RenderError> {
        let payload = RenderPayload::from_transaction_in(tx, &self.shop_name, self.display_offset);
        self.dispatch_payload(&payload).await
    }

    pub async fn dispatch_payload(
        &self,
        payload: &RenderPayload,
    ) -> Result<RenderedReceipt, RenderError> {
        let providers = self
            .registry
            .list_by_priority()
            .await
            .map_err(|e| RenderError::Registry(e.to_string()))?;

        if providers.is_empty() {
            tracing::warn!(reference = %payload.reference, "No render providers configured");
            return Err(RenderError::NoProviders);
        }

        let mut attempted = Vec::with_capacity(providers.len());
        for credential in &providers {
            attempted.push(credential.name.clone());

            match self.attempt(payload, credential).await {
                Ok(artifact) => {
                    tracing::info!(
                        reference = %payload.reference,
                        provider = %credential.name,
                        attempts = attempted.len(),
                        "Receipt rendered"
                    );
                    return Ok(RenderedReceipt {
                        provider: credential.name.clone(),
                        artifact,
                        attempted,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        reference = %payload.reference,
                        provider = %credential.name,
                        priority = credential.priority,
                        error = %e,
                        "Render provider failed, trying next"
                    );
                }
            }
        }

        tracing::error!(
            reference = %payload.reference,
            attempts = attempted.len(),
            "All render providers failed"
        );
        Err(RenderError::Exhausted { attempted })
    }

    async fn attempt(
        &self,
        payload: &RenderPayload,
        credential: &ProviderCredential,
    ) -> Result<ArtifactReference, ProviderAttemptError> {
        let backend = self
            .backends
            .get(&credential.kind)
            .ok_or_else(|| ProviderAttemptError::Unsupported(credential.kind.to_string()))?;

        let breaker = self.breaker_for(&credential.name);
        let timeout = self.attempt_timeout;

        let result = breaker
            .call(async move {
                match tokio::time::timeout(timeout, backend.render(payload, credential)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderAttemptError::Timeout(timeout)),
                }
            })
            .await;

        match result {
            Ok(artifact) => Ok(artifact),
            Err(FailsafeError::Rejected) => Err(ProviderAttemptError::CircuitOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    fn breaker_for(&self, provider: &str) -> Breaker {
        let mut breakers = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        breakers
            .entry(provider.to_string())
            .or_insert_with(|| {
                let backoff = backoff::equal_jittered(self.reset_timeout, self.reset_timeout * 2);
                let policy = failure_policy::consecutive_failures(self.failure_threshold, backoff);
                Config::new().failure_policy(policy).build()
            })
            .clone()
    }

    /// "closed" or "open", for diagnostics. Providers never attempted are
    /// reported closed.
    pub fn circuit_state(&self, provider: &str) -> String {
        let breakers = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        match breakers.get(provider) {
            Some(breaker) if !breaker.is_call_permitted() => "open".to_string(),
            _ => "closed".to_string(),
        }
    }
}
