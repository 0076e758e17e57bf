//! Bearer credential injection for outgoing API requests.
//!
//! The authorizer sits in the transport's interception hook. For every
//! request it decides whether the route is exempt (the login endpoint) and,
//! if not, attaches `Authorization: Bearer <token>` from the credential store.
//! It never caches the credential: each request resolves it afresh, so a
//! logout racing with an in-flight request may or may not see the token.

use super::credentials::CredentialStore;
use crate::error::AuthorizeError;
use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

/// Body of an [`OutgoingRequest`]
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

/// Description of a request before it is handed to the transport.
///
/// Values are never modified once built: the authorizer returns a new
/// request rather than editing the caller's.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<RequestBody>,
}

impl OutgoingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_query_pairs(mut self, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn with_form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = Some(RequestBody::Form(fields));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Value of the `Authorization` header, if any
    pub fn authorization(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
    }
}

/// Route rules that skip credential injection.
///
/// A path is exempt when it contains any of the patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExemptionPatterns(Vec<String>);

impl ExemptionPatterns {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        )
    }

    pub fn matches(&self, path: &str) -> bool {
        self.0.iter().any(|pattern| path.contains(pattern.as_str()))
    }

    pub fn patterns(&self) -> &[String] {
        &self.0
    }
}

impl Default for ExemptionPatterns {
    fn default() -> Self {
        Self::new(["login"])
    }
}

/// Transport interception hook, invoked once per request before sending
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    async fn intercept(&self, request: &OutgoingRequest) -> Result<OutgoingRequest, AuthorizeError>;
}

/// Attaches the stored bearer token to non-exempt requests
#[derive(Clone)]
pub struct RequestAuthorizer {
    credentials: CredentialStore,
    exemptions: ExemptionPatterns,
}

impl RequestAuthorizer {
    pub fn new(credentials: CredentialStore) -> Self {
        Self {
            credentials,
            exemptions: ExemptionPatterns::default(),
        }
    }

    pub fn with_exemptions(mut self, exemptions: ExemptionPatterns) -> Self {
        self.exemptions = exemptions;
        self
    }

    pub fn exemptions(&self) -> &ExemptionPatterns {
        &self.exemptions
    }

    /// Produce the request to actually send.
    ///
    /// Exempt paths come back unchanged without touching storage. Otherwise
    /// the current credential is resolved (suspending the task on storage
    /// I/O) and, when a non-empty token exists, the copy carries
    /// `Authorization: Bearer <token>`, replacing any previous value.
    pub async fn authorize(
        &self,
        request: &OutgoingRequest,
    ) -> Result<OutgoingRequest, AuthorizeError> {
        if self.exemptions.matches(request.path()) {
            tracing::trace!("{} {} is exempt from authorization", request.method(), request.path());
            return Ok(request.clone());
        }

        let credential = self
            .credentials
            .current()
            .await?
            .filter(|c| !c.token.is_empty());

        let Some(credential) = credential else {
            tracing::trace!("No credential for {} {}", request.method(), request.path());
            return Ok(request.clone());
        };

        let mut value = HeaderValue::from_str(&format!("Bearer {}", credential.token))
            .map_err(|_| AuthorizeError::InvalidHeader)?;
        value.set_sensitive(true);

        Ok(request.clone().with_header(AUTHORIZATION, value))
    }

    /// Synchronous bridge for transports that run interceptors on a plain
    /// thread.
    ///
    /// Blocks the calling thread until the credential has been read. Do not
    /// call this from an async runtime worker or while a credential write
    /// is in progress on the same thread; use [`authorize`](Self::authorize)
    /// there instead.
    pub fn authorize_blocking(
        &self,
        request: &OutgoingRequest,
    ) -> Result<OutgoingRequest, AuthorizeError> {
        futures::executor::block_on(self.authorize(request))
    }
}

#[async_trait]
impl RequestInterceptor for RequestAuthorizer {
    async fn intercept(&self, request: &OutgoingRequest) -> Result<OutgoingRequest, AuthorizeError> {
        self.authorize(request).await
    }
}
