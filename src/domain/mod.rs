//! Framework-agnostic domain types and pure logic.

pub mod code;
pub mod expiry;
pub mod transaction;

pub use code::{CodeGenerator, RandomCodeGenerator};
pub use expiry::{compute_expiry, DurationUnit, ExpiryError, PeriodStatus};
pub use transaction::{
    NewTransaction, PeriodTerm, ProviderCredential, ProviderKind, Transaction,
};
