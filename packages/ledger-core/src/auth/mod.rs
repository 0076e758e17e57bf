//! Authentication module for ledger clients.
//!
//! Provides session credential storage, unverified token decoding for
//! display, and bearer header injection for outgoing requests.

mod authorizer;
mod credentials;
mod session;
pub mod token;

pub use authorizer::{
    ExemptionPatterns, OutgoingRequest, RequestAuthorizer, RequestBody, RequestInterceptor,
};
pub use credentials::{Credential, CredentialStore, CredentialStream, TOKEN_KEY, TOKEN_TYPE_KEY};
pub use session::{Session, SessionStatus, UNKNOWN_USER};
pub use token::ClaimSet;
