pub mod transaction_service;

pub use transaction_service::{
    CreateTransactionRequest, CreatedTransaction, ReceiptOutcome, ServiceError, TransactionService,
};
