use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use receipt_ledger::adapters::{PostgresLedgerStore, PostgresProviderRegistry};
use receipt_ledger::cli::{Cli, Commands, DbCommands, ProviderCommands};
use receipt_ledger::config::Config;
use receipt_ledger::domain::{ProviderKind, RandomCodeGenerator};
use receipt_ledger::render::{ImageRenderBackend, InvoiceLinkBackend, ReceiptDispatcher};
use receipt_ledger::services::TransactionService;
use receipt_ledger::{cli, create_app, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Cli::parse();
    let config = Config::from_env()?;

    match args.command {
        None | Some(Commands::Serve) => serve(config).await,
        Some(Commands::Db(DbCommands::Migrate)) => cli::handle_db_migrate(&config).await,
        Some(Commands::Providers(command)) => {
            let pool = db::create_pool(&config).await?;
            match command {
                ProviderCommands::List => cli::handle_providers_list(&pool).await,
                ProviderCommands::Add {
                    name,
                    secret,
                    priority,
                    kind,
                } => cli::handle_providers_add(&pool, name, secret, priority, kind).await,
                ProviderCommands::Remove { name } => {
                    cli::handle_providers_remove(&pool, &name).await
                }
            }
        }
        Some(Commands::Config) => cli::handle_config_validate(&config).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    // Database pool
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;

    let registry = Arc::new(PostgresProviderRegistry::new(pool.clone()));
    let mut dispatcher = ReceiptDispatcher::new(registry, config.shop_name.clone())
        .with_display_offset(config.receipt_offset())
        .with_attempt_timeout(config.render_attempt_timeout())
        .with_circuit_breaker(
            config.provider_failure_threshold,
            config.provider_reset_timeout(),
        )
        .with_backend(
            ProviderKind::Image,
            Arc::new(ImageRenderBackend::with_timeout(
                config.image_renderer_url.clone(),
                config.render_attempt_timeout(),
            )),
        );
    tracing::info!("Image renderer initialized with URL: {}", config.image_renderer_url);

    if let Some(invoice_url) = &config.invoice_service_url {
        dispatcher = dispatcher.with_backend(
            ProviderKind::Invoice,
            Arc::new(InvoiceLinkBackend::with_timeout(
                invoice_url.clone(),
                config.render_attempt_timeout(),
            )),
        );
        tracing::info!("Invoice service initialized with URL: {}", invoice_url);
    }

    let codes = Arc::new(RandomCodeGenerator::new(
        config.code_prefix.clone(),
        config.code_length,
    ));
    let service = TransactionService::new(
        Arc::new(PostgresLedgerStore::new(pool)),
        codes,
        Arc::new(dispatcher),
    )
    .with_max_code_attempts(config.max_code_attempts);

    let app = create_app(AppState {
        service: Arc::new(service),
        admin_api_key: config.admin_api_key.clone(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
