//! Postgres-backed provider registry.
//!
//! The service only reads from it. `add` and `remove` exist for the
//! `providers` CLI commands.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{ProviderCredential, ProviderKind};
use crate::ports::{ProviderRegistry, StoreError, StoreResult};

#[derive(Clone)]
pub struct PostgresProviderRegistry {
    pool: PgPool,
}

impl PostgresProviderRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn add(&self, credential: &ProviderCredential) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO render_providers (name, secret, priority, kind) VALUES ($1, $2, $3, $4)",
        )
        .bind(&credential.name)
        .bind(&credential.secret)
        .bind(credential.priority)
        .bind(credential.kind.as_str())
        .execute(&self.pool)
        .await?;

        tracing::info!(
            provider = %credential.name,
            priority = credential.priority,
            kind = %credential.kind,
            "Render provider added"
        );
        Ok(())
    }

    /// Returns false when no provider had that name.
    pub async fn remove(&self, name: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM render_providers WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ProviderRegistry for PostgresProviderRegistry {
    async fn list_by_priority(&self) -> StoreResult<Vec<ProviderCredential>> {
        let rows = sqlx::query_as::<_, (String, String, i32, String)>(
            "SELECT name, secret, priority, kind FROM render_providers ORDER BY priority ASC, name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(name, secret, priority, kind)| {
                let kind = kind.parse::<ProviderKind>().map_err(StoreError::Corrupt)?;
                Ok(ProviderCredential {
                    name,
                    secret,
                    priority,
                    kind,
                })
            })
            .collect()
    }
}
