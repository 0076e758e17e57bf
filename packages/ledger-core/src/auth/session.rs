use super::credentials::CredentialStore;
use super::token;
use crate::api::TokenResponse;
use crate::error::StorageError;
use serde::{Deserialize, Serialize};

/// Shown when a session exists but its token carries no readable username
pub const UNKNOWN_USER: &str = "Unknown user";

/// Session state for presentation layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    pub username: Option<String>,
    pub token_type: Option<String>,
}

/// Login, logout and identity lookup over the credential store.
///
/// Presentation code depends on this one seam instead of on storage and token
/// decoding directly.
#[derive(Clone)]
pub struct Session {
    credentials: CredentialStore,
}

impl Session {
    pub fn new(credentials: CredentialStore) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Store a token already obtained from the authentication endpoint.
    pub async fn login(&self, token: &str, token_type: &str) -> Result<(), StorageError> {
        self.credentials.save(token, token_type).await?;
        tracing::info!(
            "Logged in as {}",
            token::subject(token).as_deref().unwrap_or(UNKNOWN_USER)
        );
        Ok(())
    }

    /// Store the credential from a successful login response.
    pub async fn login_with(&self, response: &TokenResponse) -> Result<(), StorageError> {
        self.login(&response.access_token, &response.token_type).await
    }

    pub async fn logout(&self) -> Result<(), StorageError> {
        self.credentials.clear().await?;
        tracing::info!("Logged out");
        Ok(())
    }

    /// Username from the current token's `sub` claim.
    ///
    /// `None` when logged out, and also when the token cannot be decoded.
    pub async fn current_display_name(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .credentials
            .current()
            .await?
            .and_then(|credential| token::subject(&credential.token)))
    }

    /// Display name, falling back to a generic label.
    pub async fn display_label(&self) -> Result<String, StorageError> {
        Ok(self
            .current_display_name()
            .await?
            .unwrap_or_else(|| UNKNOWN_USER.to_string()))
    }

    pub async fn status(&self) -> Result<SessionStatus, StorageError> {
        Ok(match self.credentials.current().await? {
            Some(credential) => SessionStatus {
                authenticated: true,
                username: token::subject(&credential.token),
                token_type: Some(credential.token_type),
            },
            None => SessionStatus {
                authenticated: false,
                username: None,
                token_type: None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use std::sync::Arc;

    fn session() -> Session {
        Session::new(CredentialStore::new(Arc::new(MemoryStore::new())))
    }

    fn token_for(sub: &str) -> String {
        let payload = serde_json::json!({ "sub": sub, "exp": 1_700_000_000 });
        format!(
            "eyJhbGciOiJIUzI1NiJ9.{}.sig",
            URL_SAFE_NO_PAD.encode(payload.to_string())
        )
    }

    #[tokio::test]
    async fn test_display_name_lifecycle() {
        let session = session();
        assert_eq!(session.current_display_name().await.unwrap(), None);

        session.login(&token_for("alice"), "bearer").await.unwrap();
        assert_eq!(
            session.current_display_name().await.unwrap().as_deref(),
            Some("alice")
        );

        session.logout().await.unwrap();
        assert_eq!(session.current_display_name().await.unwrap(), None);
        assert_eq!(session.credentials().current().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_token_is_still_a_session() {
        let session = session();
        session.login("opaque-token", "bearer").await.unwrap();

        assert_eq!(session.current_display_name().await.unwrap(), None);
        assert_eq!(session.display_label().await.unwrap(), UNKNOWN_USER);

        let status = session.status().await.unwrap();
        assert!(status.authenticated);
        assert_eq!(status.username, None);
        assert_eq!(status.token_type.as_deref(), Some("bearer"));
    }

    #[tokio::test]
    async fn test_login_with_token_response() {
        let session = session();
        let response: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": token_for("bob"),
            "token_type": "bearer",
        }))
        .unwrap();

        session.login_with(&response).await.unwrap();
        assert_eq!(session.display_label().await.unwrap(), "bob");
        assert_eq!(
            session.status().await.unwrap(),
            SessionStatus {
                authenticated: true,
                username: Some("bob".to_string()),
                token_type: Some("bearer".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_logged_out_status() {
        let status = session().status().await.unwrap();
        assert!(!status.authenticated);
        assert_eq!(status.username, None);
    }
}
