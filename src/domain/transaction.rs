//! Transaction domain entity.
//! Framework-agnostic representation of a recorded sale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::expiry::{DurationUnit, PeriodStatus};

/// A period with its expiry fixed at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodTerm {
    pub duration: i32,
    pub unit: DurationUnit,
    pub expires_at: DateTime<Utc>,
}

impl PeriodTerm {
    pub fn status_at(&self, now: DateTime<Utc>) -> PeriodStatus {
        PeriodStatus::derive(now, self.expires_at)
    }
}

/// A transaction that has passed validation and been assigned a code, but
/// is not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub id: Uuid,
    pub transaction_code: String,
    pub product_name: String,
    pub product_price: i64,
    pub admin_name: String,
    pub buyer_number: String,
    pub serial_number: Option<String>,
    pub purchase_date: Option<DateTime<Utc>>,
    pub active_period: Option<PeriodTerm>,
    pub warranty: Option<PeriodTerm>,
}

/// A persisted transaction. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: Uuid,
    pub transaction_code: String,
    pub product_name: String,
    pub product_price: i64,
    pub admin_name: String,
    pub buyer_number: String,
    pub serial_number: Option<String>,
    pub purchase_date: Option<DateTime<Utc>>,
    pub active_period: Option<PeriodTerm>,
    pub warranty: Option<PeriodTerm>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn from_new(new: NewTransaction, created_at: DateTime<Utc>) -> Self {
        Self {
            id: new.id,
            transaction_code: new.transaction_code,
            product_name: new.product_name,
            product_price: new.product_price,
            admin_name: new.admin_name,
            buyer_number: new.buyer_number,
            serial_number: new.serial_number,
            purchase_date: new.purchase_date,
            active_period: new.active_period,
            warranty: new.warranty,
            created_at,
        }
    }

    /// Case-insensitive substring match over the searchable fields.
    /// `needle` must already be lowercased.
    pub fn matches_query(&self, needle: &str) -> bool {
        [
            Some(self.product_name.as_str()),
            Some(self.admin_name.as_str()),
            Some(self.buyer_number.as_str()),
            Some(self.transaction_code.as_str()),
            self.serial_number.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Which family of backend a provider credential belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// HTML-to-image renderer returning the receipt as a PNG.
    #[default]
    Image,
    /// Hosted invoice service returning a link to the invoice.
    Invoice,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Image => "image",
            ProviderKind::Invoice => "invoice",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(ProviderKind::Image),
            "invoice" => Ok(ProviderKind::Invoice),
            other => Err(format!("unknown provider kind '{}'", other)),
        }
    }
}

/// Credential for one external rendering backend. Priority 0 is tried first.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCredential {
    pub name: String,
    #[serde(skip_serializing)]
    pub secret: String,
    pub priority: i32,
    #[serde(default)]
    pub kind: ProviderKind,
}

impl ProviderCredential {
    pub fn new(name: impl Into<String>, secret: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
            priority,
            kind: ProviderKind::Image,
        }
    }

    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        self.kind = kind;
        self
    }
}

impl fmt::Debug for ProviderCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredential")
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .field("priority", &self.priority)
            .field("kind", &self.kind)
            .finish()
    }
}
