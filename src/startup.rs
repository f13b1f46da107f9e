use crate::adapters::PostgresProviderRegistry;
use crate::config::Config;
use crate::domain::{ProviderCredential, ProviderKind};
use crate::ports::ProviderRegistry;
use anyhow::{Context, Result};
use sqlx::PgPool;

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub migrations: bool,
    pub providers: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database && self.migrations && self.providers
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));
        println!("Migrations Applied:    {}", status(self.migrations));
        println!("Render Providers:      {}", status(self.providers));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

pub async fn validate_environment(config: &Config, pool: &PgPool) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        migrations: true,
        providers: true,
        errors: Vec::new(),
    };

    if let Err(e) = config.validate() {
        report.environment = false;
        report.errors.push(format!("Environment: {:#}", e));
    }

    if let Err(e) = validate_database(pool).await {
        report.database = false;
        report.errors.push(format!("Database: {:#}", e));
        // Nothing below can be checked without a database
        report.migrations = false;
        report.providers = false;
        return Ok(report);
    }

    if let Err(e) = validate_migrations(pool).await {
        report.migrations = false;
        report.errors.push(format!("Migrations: {:#}", e));
    }

    if let Err(e) = validate_providers(config, pool).await {
        report.providers = false;
        report.errors.push(format!("Providers: {:#}", e));
    }

    Ok(report)
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    Ok(())
}

async fn validate_migrations(pool: &PgPool) -> Result<()> {
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

async fn validate_providers(config: &Config, pool: &PgPool) -> Result<()> {
    let providers = PostgresProviderRegistry::new(pool.clone())
        .list_by_priority()
        .await
        .context("Failed to read render providers")?;

    check_provider_setup(config, &providers)
}

fn check_provider_setup(config: &Config, providers: &[ProviderCredential]) -> Result<()> {
    if providers.is_empty() {
        anyhow::bail!("No render providers configured; receipts will not be generated");
    }

    let invoice_providers = providers
        .iter()
        .filter(|p| p.kind == ProviderKind::Invoice)
        .count();
    if invoice_providers > 0 && config.invoice_service_url.is_none() {
        anyhow::bail!(
            "{} invoice provider(s) configured but INVOICE_SERVICE_URL is not set",
            invoice_providers
        );
    }

    Ok(())
}
