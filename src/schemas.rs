//! JSON shapes returned by the HTTP API.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{DurationUnit, PeriodStatus, Transaction};
use crate::render::ArtifactReference;
use crate::services::{CreatedTransaction, ReceiptOutcome};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSchema {
    pub id: Uuid,
    pub transaction_code: String,
    pub product_name: String,
    pub product_price: i64,
    pub admin_name: String,
    pub buyer_number: String,
    pub serial_number: Option<String>,
    pub purchase_date: Option<DateTime<Utc>>,
    pub has_active_period: bool,
    pub active_duration: Option<i32>,
    pub active_unit: Option<DurationUnit>,
    pub active_expiry_date: Option<DateTime<Utc>>,
    pub active_status: Option<PeriodStatus>,
    pub has_warranty: bool,
    pub warranty_duration: Option<i32>,
    pub warranty_unit: Option<DurationUnit>,
    pub warranty_expiry_date: Option<DateTime<Utc>>,
    pub warranty_status: Option<PeriodStatus>,
    pub created_at: DateTime<Utc>,
}

impl TransactionSchema {
    /// Period statuses are derived against `now` and never stored.
    pub fn at(tx: &Transaction, now: DateTime<Utc>) -> Self {
        let active = tx.active_period.as_ref();
        let warranty = tx.warranty.as_ref();

        Self {
            id: tx.id,
            transaction_code: tx.transaction_code.clone(),
            product_name: tx.product_name.clone(),
            product_price: tx.product_price,
            admin_name: tx.admin_name.clone(),
            buyer_number: tx.buyer_number.clone(),
            serial_number: tx.serial_number.clone(),
            purchase_date: tx.purchase_date,
            has_active_period: active.is_some(),
            active_duration: active.map(|p| p.duration),
            active_unit: active.map(|p| p.unit),
            active_expiry_date: active.map(|p| p.expires_at),
            active_status: active.map(|p| p.status_at(now)),
            has_warranty: warranty.is_some(),
            warranty_duration: warranty.map(|p| p.duration),
            warranty_unit: warranty.map(|p| p.unit),
            warranty_expiry_date: warranty.map(|p| p.expires_at),
            warranty_status: warranty.map(|p| p.status_at(now)),
            created_at: tx.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReceiptSchema {
    Rendered {
        provider: String,
        artifact: ArtifactReference,
        attempts: Vec<String>,
    },
    Failed {
        error: String,
    },
}

impl From<&ReceiptOutcome> for ReceiptSchema {
    fn from(outcome: &ReceiptOutcome) -> Self {
        match outcome {
            ReceiptOutcome::Rendered(rendered) => ReceiptSchema::Rendered {
                provider: rendered.provider.clone(),
                artifact: rendered.artifact.clone(),
                attempts: rendered.attempted.clone(),
            },
            ReceiptOutcome::Failed(err) => ReceiptSchema::Failed {
                error: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedResponse {
    pub success: bool,
    pub data: TransactionSchema,
    pub receipt: ReceiptSchema,
}

impl CreatedResponse {
    pub fn at(created: &CreatedTransaction, now: DateTime<Utc>) -> Self {
        Self {
            success: true,
            data: TransactionSchema::at(&created.transaction, now),
            receipt: ReceiptSchema::from(&created.receipt),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<TransactionSchema>,
}
