//! Transaction recording: validation, expiry computation, unique code
//! allocation, persistence and receipt dispatch, in that order.
//!
//! The record is durably stored before dispatch starts. A rendering failure
//! is reported next to the stored transaction and never undoes it.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    compute_expiry, CodeGenerator, DurationUnit, NewTransaction, PeriodTerm, Transaction,
};
use crate::ports::{LedgerStore, StoreError, UniqueField};
use crate::render::{ReceiptDispatcher, RenderError, RenderedReceipt};
use crate::validation::{self, ValidationError, BUYER_NUMBER_MAX_LEN, TEXT_FIELD_MAX_LEN};

pub const DEFAULT_MAX_CODE_ATTEMPTS: usize = 16;

/// Fields accepted when recording a sale. Everything is optional at the
/// type level so that missing fields surface as validation errors naming
/// the field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub product_name: Option<String>,
    pub product_price: Option<i64>,
    pub admin_name: Option<String>,
    pub buyer_number: Option<String>,
    pub serial_number: Option<String>,
    pub purchase_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_active_period: bool,
    pub active_duration: Option<i64>,
    pub active_unit: Option<String>,
    #[serde(default)]
    pub has_warranty: bool,
    pub warranty_duration: Option<i64>,
    pub warranty_unit: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("admin access required")]
    Unauthorized,

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(String),

    #[error("serial number {0} is already registered")]
    DuplicateSerial(String),

    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ServiceError::NotFound(what),
            other => ServiceError::Store(other.to_string()),
        }
    }
}

/// What happened to receipt generation for a stored transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptOutcome {
    Rendered(RenderedReceipt),
    Failed(RenderError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTransaction {
    pub transaction: Transaction,
    pub receipt: ReceiptOutcome,
}

struct ValidatedRequest {
    product_name: String,
    product_price: i64,
    admin_name: String,
    buyer_number: String,
    serial_number: Option<String>,
    purchase_date: Option<DateTime<Utc>>,
    active: Option<(i32, DurationUnit)>,
    warranty: Option<(i32, DurationUnit)>,
}

impl ValidatedRequest {
    fn from_request(req: CreateTransactionRequest) -> Result<Self, ValidationError> {
        let product_name =
            validation::required_text("productName", req.product_name.as_deref(), TEXT_FIELD_MAX_LEN)?;
        let product_price = validation::validate_price(req.product_price)?;
        let admin_name =
            validation::required_text("adminName", req.admin_name.as_deref(), TEXT_FIELD_MAX_LEN)?;
        let buyer_number = validation::required_text(
            "buyerNumber",
            req.buyer_number.as_deref(),
            BUYER_NUMBER_MAX_LEN,
        )?;

        let serial_number = match req.serial_number.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(validation::normalize_identifier("serialNumber", raw)?),
        };

        let active = validation::validate_period(
            "activeDuration",
            "activeUnit",
            req.has_active_period,
            req.active_duration,
            req.active_unit.as_deref(),
        )?;
        let warranty = validation::validate_period(
            "warrantyDuration",
            "warrantyUnit",
            req.has_warranty,
            req.warranty_duration,
            req.warranty_unit.as_deref(),
        )?;

        Ok(Self {
            product_name,
            product_price,
            admin_name,
            buyer_number,
            serial_number,
            purchase_date: req.purchase_date,
            active,
            warranty,
        })
    }
}

fn period_term(
    anchor: DateTime<Utc>,
    period: Option<(i32, DurationUnit)>,
    field: &'static str,
) -> Result<Option<PeriodTerm>, ValidationError> {
    period
        .map(|(duration, unit)| {
            compute_expiry(anchor, i64::from(duration), unit)
                .map(|expires_at| PeriodTerm {
                    duration,
                    unit,
                    expires_at,
                })
                .map_err(|e| ValidationError::new(field, e.to_string()))
        })
        .transpose()
}

pub struct TransactionService {
    store: Arc<dyn LedgerStore>,
    codes: Arc<dyn CodeGenerator>,
    dispatcher: Arc<ReceiptDispatcher>,
    max_code_attempts: usize,
}

impl TransactionService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        codes: Arc<dyn CodeGenerator>,
        dispatcher: Arc<ReceiptDispatcher>,
    ) -> Self {
        Self {
            store,
            codes,
            dispatcher,
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
        }
    }

    pub fn with_max_code_attempts(mut self, attempts: usize) -> Self {
        self.max_code_attempts = attempts.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Records a sale. `authorized` is the caller's admin status as decided
    /// by the boundary; this service never sees credentials.
    pub async fn create(
        &self,
        request: CreateTransactionRequest,
        authorized: bool,
    ) -> Result<CreatedTransaction, ServiceError> {
        self.create_received_at(request, authorized, Utc::now()).await
    }

    /// Like [`create`](Self::create) with an explicit request-received time,
    /// which anchors expiries when no purchase date is given.
    pub async fn create_received_at(
        &self,
        request: CreateTransactionRequest,
        authorized: bool,
        received_at: DateTime<Utc>,
    ) -> Result<CreatedTransaction, ServiceError> {
        if !authorized {
            tracing::warn!("Rejected unauthorized transaction creation");
            return Err(ServiceError::Unauthorized);
        }

        let valid = ValidatedRequest::from_request(request)?;

        let anchor = valid.purchase_date.unwrap_or(received_at);
        let active_period = period_term(anchor, valid.active, "activeDuration")?;
        let warranty = period_term(anchor, valid.warranty, "warrantyDuration")?;

        if let Some(serial) = &valid.serial_number {
            match self.store.find_by_serial(serial).await {
                Ok(_) => return Err(ServiceError::DuplicateSerial(serial.clone())),
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(ServiceError::Store(e.to_string())),
            }
        }

        let mut draft = NewTransaction {
            id: Uuid::new_v4(),
            transaction_code: String::new(),
            product_name: valid.product_name,
            product_price: valid.product_price,
            admin_name: valid.admin_name,
            buyer_number: valid.buyer_number,
            serial_number: valid.serial_number,
            purchase_date: valid.purchase_date,
            active_period,
            warranty,
        };

        let stored = self.allocate_and_persist(&mut draft).await?;
        tracing::info!(
            code = %stored.transaction_code,
            product = %stored.product_name,
            "Transaction recorded"
        );

        let receipt = match self.dispatcher.dispatch(&stored).await {
            Ok(rendered) => ReceiptOutcome::Rendered(rendered),
            Err(e) => {
                tracing::warn!(
                    code = %stored.transaction_code,
                    error = %e,
                    "Transaction stored without receipt"
                );
                ReceiptOutcome::Failed(e)
            }
        };

        Ok(CreatedTransaction {
            transaction: stored,
            receipt,
        })
    }

    /// Generates candidates until one is free, then inserts. A conflict at
    /// insert time means another writer took the code in between; a fresh
    /// code is drawn. Store failures end the loop immediately.
    async fn allocate_and_persist(
        &self,
        draft: &mut NewTransaction,
    ) -> Result<Transaction, ServiceError> {
        for attempt in 1..=self.max_code_attempts {
            let candidate = self.codes.generate();

            if self.store.code_exists(&candidate).await? {
                tracing::debug!(attempt, code = %candidate, "Code already taken, regenerating");
                continue;
            }

            draft.transaction_code = candidate;
            match self.store.insert(draft).await {
                Ok(stored) => return Ok(stored),
                Err(StoreError::Conflict(UniqueField::TransactionCode)) => {
                    tracing::warn!(
                        attempt,
                        code = %draft.transaction_code,
                        "Code claimed concurrently, regenerating"
                    );
                }
                Err(StoreError::Conflict(UniqueField::SerialNumber)) => {
                    return Err(ServiceError::DuplicateSerial(
                        draft.serial_number.clone().unwrap_or_default(),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::error!(
            attempts = self.max_code_attempts,
            "Could not allocate a unique transaction code"
        );
        Err(ServiceError::Store(format!(
            "could not allocate a unique transaction code after {} attempts",
            self.max_code_attempts
        )))
    }

    pub async fn get_by_code(&self, code: &str) -> Result<Transaction, ServiceError> {
        let code = validation::normalize_identifier("transactionCode", code)?;
        match self.store.find_by_code(&code).await {
            Err(StoreError::NotFound(_)) => Err(ServiceError::NotFound(format!(
                "transaction code {} not found",
                code
            ))),
            other => Ok(other?),
        }
    }

    pub async fn get_by_serial(&self, serial: &str) -> Result<Transaction, ServiceError> {
        let serial = validation::normalize_identifier("serialNumber", serial)?;
        match self.store.find_by_serial(&serial).await {
            Err(StoreError::NotFound(_)) => Err(ServiceError::NotFound(format!(
                "serial number {} not found",
                serial
            ))),
            other => Ok(other?),
        }
    }

    /// Substring search, or every record newest first when `query` is `all`.
    pub async fn search(&self, query: &str) -> Result<Vec<Transaction>, ServiceError> {
        if query.trim().eq_ignore_ascii_case("all") {
            return Ok(self.store.list_all(true).await?);
        }

        let query = validation::validate_search_query(query)?;
        Ok(self.store.search(&query).await?)
    }
}
