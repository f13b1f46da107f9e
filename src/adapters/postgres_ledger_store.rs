//! Postgres implementation of LedgerStore.
//!
//! Uniqueness of `transaction_code` and `serial_number` is enforced by unique
//! constraints (see `migrations/`), so two writers racing past the existence
//! check still cannot both commit the same code.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{DurationUnit, NewTransaction, PeriodTerm, Transaction};
use crate::ports::{LedgerStore, StoreError, StoreResult};

const SELECT_COLUMNS: &str = r#"
    id, transaction_code, product_name, product_price, admin_name, buyer_number,
    serial_number, purchase_date,
    has_active_period, active_duration, active_unit, active_expiry_date,
    has_warranty, warranty_duration, warranty_unit, warranty_expiry_date,
    created_at
"#;

/// Postgres-backed ledger store.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> StoreResult<Transaction> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE {} = $1",
            SELECT_COLUMNS, column
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| StoreError::NotFound(value.to_string()))?
            .into_domain()
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn insert(&self, tx: &NewTransaction) -> StoreResult<Transaction> {
        let active = PeriodColumns::from(tx.active_period);
        let warranty = PeriodColumns::from(tx.warranty);

        let sql = format!(
            r#"
            INSERT INTO transactions (
                id, transaction_code, product_name, product_price, admin_name, buyer_number,
                serial_number, purchase_date,
                has_active_period, active_duration, active_unit, active_expiry_date,
                has_warranty, warranty_duration, warranty_unit, warranty_expiry_date
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {}
            "#,
            SELECT_COLUMNS
        );

        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(tx.id)
            .bind(&tx.transaction_code)
            .bind(&tx.product_name)
            .bind(tx.product_price)
            .bind(&tx.admin_name)
            .bind(&tx.buyer_number)
            .bind(&tx.serial_number)
            .bind(tx.purchase_date)
            .bind(active.enabled)
            .bind(active.duration)
            .bind(active.unit)
            .bind(active.expires_at)
            .bind(warranty.enabled)
            .bind(warranty.duration)
            .bind(warranty.unit)
            .bind(warranty.expires_at)
            .fetch_one(&self.pool)
            .await?;

        row.into_domain()
    }

    async fn code_exists(&self, code: &str) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM transactions WHERE transaction_code = $1)",
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn find_by_code(&self, code: &str) -> StoreResult<Transaction> {
        self.fetch_one_by("transaction_code", code).await
    }

    async fn find_by_serial(&self, serial: &str) -> StoreResult<Transaction> {
        self.fetch_one_by("serial_number", serial).await
    }

    async fn search(&self, query: &str) -> StoreResult<Vec<Transaction>> {
        let sql = format!(
            r#"
            SELECT {} FROM transactions
            WHERE product_name ILIKE $1 ESCAPE '\'
               OR admin_name ILIKE $1 ESCAPE '\'
               OR buyer_number ILIKE $1 ESCAPE '\'
               OR transaction_code ILIKE $1 ESCAPE '\'
               OR serial_number ILIKE $1 ESCAPE '\'
            ORDER BY created_at DESC, transaction_code ASC
            "#,
            SELECT_COLUMNS
        );

        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(format!("%{}%", escape_like(query)))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn list_all(&self, newest_first: bool) -> StoreResult<Vec<Transaction>> {
        let direction = if newest_first { "DESC" } else { "ASC" };
        let sql = format!(
            "SELECT {} FROM transactions ORDER BY created_at {}, transaction_code ASC",
            SELECT_COLUMNS, direction
        );

        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Escapes LIKE metacharacters so the query is matched literally.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

struct PeriodColumns {
    enabled: bool,
    duration: Option<i32>,
    unit: Option<&'static str>,
    expires_at: Option<DateTime<Utc>>,
}

impl From<Option<PeriodTerm>> for PeriodColumns {
    fn from(term: Option<PeriodTerm>) -> Self {
        match term {
            Some(term) => Self {
                enabled: true,
                duration: Some(term.duration),
                unit: Some(term.unit.as_str()),
                expires_at: Some(term.expires_at),
            },
            None => Self {
                enabled: false,
                duration: None,
                unit: None,
                expires_at: None,
            },
        }
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    transaction_code: String,
    product_name: String,
    product_price: i64,
    admin_name: String,
    buyer_number: String,
    serial_number: Option<String>,
    purchase_date: Option<DateTime<Utc>>,
    has_active_period: bool,
    active_duration: Option<i32>,
    active_unit: Option<String>,
    active_expiry_date: Option<DateTime<Utc>>,
    has_warranty: bool,
    warranty_duration: Option<i32>,
    warranty_unit: Option<String>,
    warranty_expiry_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> StoreResult<Transaction> {
        let active_period = period_from_columns(
            &self.transaction_code,
            "active",
            self.has_active_period,
            self.active_duration,
            self.active_unit.as_deref(),
            self.active_expiry_date,
        )?;
        let warranty = period_from_columns(
            &self.transaction_code,
            "warranty",
            self.has_warranty,
            self.warranty_duration,
            self.warranty_unit.as_deref(),
            self.warranty_expiry_date,
        )?;

        Ok(Transaction {
            id: self.id,
            transaction_code: self.transaction_code,
            product_name: self.product_name,
            product_price: self.product_price,
            admin_name: self.admin_name,
            buyer_number: self.buyer_number,
            serial_number: self.serial_number,
            purchase_date: self.purchase_date,
            active_period,
            warranty,
            created_at: self.created_at,
        })
    }
}

fn period_from_columns(
    code: &str,
    label: &str,
    enabled: bool,
    duration: Option<i32>,
    unit: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
) -> StoreResult<Option<PeriodTerm>> {
    match (enabled, duration, unit, expires_at) {
        (false, None, None, None) => Ok(None),
        (true, Some(duration), Some(unit), Some(expires_at)) => {
            let unit = unit
                .parse::<DurationUnit>()
                .map_err(|e| StoreError::Corrupt(format!("{}: {} {}", code, label, e)))?;
            Ok(Some(PeriodTerm {
                duration,
                unit,
                expires_at,
            }))
        }
        _ => Err(StoreError::Corrupt(format!(
            "{}: partial {} period columns",
            code, label
        ))),
    }
}
