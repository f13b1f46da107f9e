pub mod memory;
pub mod postgres_ledger_store;
pub mod postgres_provider_registry;

pub use memory::{InMemoryLedgerStore, StaticProviderRegistry};
pub use postgres_ledger_store::PostgresLedgerStore;
pub use postgres_provider_registry::PostgresProviderRegistry;
