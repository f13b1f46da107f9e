use clap::{Parser, Subcommand};
use sqlx::PgPool;

use crate::adapters::PostgresProviderRegistry;
use crate::config::Config;
use crate::domain::{ProviderCredential, ProviderKind};
use crate::ports::{ProviderRegistry, StoreError};

#[derive(Parser)]
#[command(name = "receipt-ledger")]
#[command(about = "Receipt Ledger - transaction recording and receipt generation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Render provider administration
    #[command(subcommand)]
    Providers(ProviderCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum ProviderCommands {
    /// List providers in the order they are tried
    List,

    /// Register a provider credential
    Add {
        /// Unique provider name
        #[arg(value_name = "NAME")]
        name: String,

        /// API key handed to the provider
        #[arg(short, long)]
        secret: String,

        /// Lower values are tried first
        #[arg(short, long, default_value_t = 0)]
        priority: i32,

        /// Backend family: image or invoice
        #[arg(short, long, default_value = "image")]
        kind: ProviderKind,
    },

    /// Remove a provider by name
    Remove {
        #[arg(value_name = "NAME")]
        name: String,
    },
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");

    Ok(())
}

pub async fn handle_providers_list(pool: &PgPool) -> anyhow::Result<()> {
    let providers = PostgresProviderRegistry::new(pool.clone())
        .list_by_priority()
        .await?;

    if providers.is_empty() {
        println!("No render providers configured");
        return Ok(());
    }

    println!("{:<10} {:<24} {:<10} {:<12}", "Priority", "Name", "Kind", "Secret");
    println!("{}", "-".repeat(58));

    for provider in providers {
        println!(
            "{:<10} {:<24} {:<10} {:<12}",
            provider.priority,
            provider.name,
            provider.kind,
            mask_secret(&provider.secret)
        );
    }

    Ok(())
}

pub async fn handle_providers_add(
    pool: &PgPool,
    name: String,
    secret: String,
    priority: i32,
    kind: ProviderKind,
) -> anyhow::Result<()> {
    let name = name.trim().to_string();
    if name.is_empty() || secret.trim().is_empty() {
        anyhow::bail!("Provider name and secret must not be empty");
    }

    let credential = ProviderCredential::new(name, secret, priority).with_kind(kind);
    match PostgresProviderRegistry::new(pool.clone()).add(&credential).await {
        Ok(()) => {
            println!(
                "✓ Provider {} added with priority {} ({})",
                credential.name, credential.priority, credential.kind
            );
            Ok(())
        }
        Err(StoreError::Conflict(_)) => {
            anyhow::bail!("Provider {} already exists", credential.name)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn handle_providers_remove(pool: &PgPool, name: &str) -> anyhow::Result<()> {
    if PostgresProviderRegistry::new(pool.clone()).remove(name).await? {
        tracing::info!(provider = %name, "Render provider removed");
        println!("✓ Provider {} removed", name);
        Ok(())
    } else {
        tracing::warn!(provider = %name, "Render provider not found");
        anyhow::bail!("Provider {} not found", name)
    }
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Image Renderer URL: {}", config.image_renderer_url);
    println!(
        "  Invoice Service URL: {}",
        config.invoice_service_url.as_deref().unwrap_or("(not set)")
    );
    println!("  Receipt Shop Name: {}", config.shop_name);
    println!("  Receipt UTC Offset: {:+}h", config.receipt_utc_offset_hours);
    println!("  Render Attempt Timeout: {}s", config.render_attempt_timeout_secs);
    println!(
        "  Code Format: {}-<{} chars>, {} attempts",
        config.code_prefix, config.code_length, config.max_code_attempts
    );

    let pool = crate::db::create_pool(config).await?;
    let report = crate::startup::validate_environment(config, &pool).await?;
    report.print();

    if !report.is_valid() {
        anyhow::bail!("Configuration validation failed");
    }

    tracing::info!("Configuration is valid");
    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        return "****".to_string();
    }
    format!("{}****", visible)
}
