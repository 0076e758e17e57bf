//! Ledger HTTP API access.
//!
//! Provides the typed client, its wire models, and endpoint configuration.

mod client;
pub mod config;
mod endpoints;
mod models;

pub use client::ApiClient;
pub use config::{ApiConfig, ConfigSource, load_api_config};
pub use models::{
    Budget, BudgetRequest, Ledger, LedgerList, LedgerRequest, LedgerUpdate, SummaryQuery,
    TokenResponse, Transaction, TransactionKind, TransactionList, TransactionQuery,
    TransactionRequest, TransactionSummary, TransactionUpdate,
};
