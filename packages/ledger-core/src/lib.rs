//! Ledger Core Library
//!
//! This crate provides the client-side core shared by ledger front ends:
//! - Session credentials (persisted token pair, observable)
//! - Unverified token decoding for display names
//! - Bearer header injection for outgoing API requests
//! - Per-user category lists
//! - Typed HTTP client for the ledger API
//!
//! # Features
//!
//! - `keyring-storage`: keep preferences in the platform keyring instead of
//!   a JSON file
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::{api, auth, storage};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = api::load_api_config();
//!     let store = storage::open_default(config.data_file.clone())?;
//!     let session = auth::Session::new(auth::CredentialStore::new(store));
//!
//!     // Log in; the credential is stored for later runs
//!     let client = api::ApiClient::new(&config, session.clone())?;
//!     client.login("alice", "secret").await?;
//!     println!("Hello, {}", session.display_label().await?);
//!
//!     // Authenticated calls carry the bearer token automatically
//!     let summary = client.transaction_summary(&api::SummaryQuery::default()).await?;
//!     println!("Balance: {:.2}", summary.balance);
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod categories;
pub mod error;
pub mod storage;

// Re-export commonly used types
pub use api::{ApiClient, ApiConfig, ConfigSource, TokenResponse};
pub use auth::{ClaimSet, Credential, CredentialStore, RequestAuthorizer, Session, SessionStatus};
pub use categories::{CategoryBook, CategoryKind, CategoryLists};
pub use error::{ApiError, AuthorizeError, StorageError};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
