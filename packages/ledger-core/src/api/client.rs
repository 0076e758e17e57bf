use super::config::ApiConfig;
use super::endpoints;
use super::models::{
    Budget, BudgetRequest, Ledger, LedgerList, LedgerRequest, LedgerUpdate, SummaryQuery,
    TokenResponse, Transaction, TransactionList, TransactionQuery, TransactionRequest,
    TransactionSummary, TransactionUpdate,
};
use crate::auth::{
    ExemptionPatterns, OutgoingRequest, RequestAuthorizer, RequestBody, RequestInterceptor,
    Session,
};
use crate::error::ApiError;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// HTTP client for the ledger API.
///
/// Every request passes through the installed interceptors before it is
/// sent; the first one is always the bearer-token authorizer.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Session,
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, session: Session) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        let authorizer = RequestAuthorizer::new(session.credentials().clone())
            .with_exemptions(ExemptionPatterns::new(config.exempt_paths.iter().cloned()));

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
            interceptors: vec![Arc::new(authorizer)],
        })
    }

    /// Run `interceptor` after the ones already installed
    pub fn with_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Authenticate with username and password and store the credential.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let token: TokenResponse = self.send_json(endpoints::login(username, password)).await?;
        self.session.login_with(&token).await?;
        Ok(token)
    }

    pub async fn list_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<TransactionList, ApiError> {
        self.send_json(endpoints::list_transactions(query)).await
    }

    pub async fn get_transaction(&self, id: i64) -> Result<Transaction, ApiError> {
        self.send_json(endpoints::get_transaction(id)).await
    }

    pub async fn create_transaction(
        &self,
        transaction: &TransactionRequest,
    ) -> Result<Transaction, ApiError> {
        self.send_json(endpoints::create_transaction(transaction)?)
            .await
    }

    /// Change the fields set in `update`, leaving the others untouched
    pub async fn update_transaction(
        &self,
        id: i64,
        update: &TransactionUpdate,
    ) -> Result<Transaction, ApiError> {
        self.send_json(endpoints::update_transaction(id, update)?)
            .await
    }

    pub async fn delete_transaction(&self, id: i64) -> Result<(), ApiError> {
        self.send(endpoints::delete_transaction(id)).await?;
        Ok(())
    }

    /// Total income, total expense and balance, optionally within a date range
    pub async fn transaction_summary(
        &self,
        query: &SummaryQuery,
    ) -> Result<TransactionSummary, ApiError> {
        self.send_json(endpoints::transaction_summary(query)).await
    }

    pub async fn list_ledgers(&self, skip: u32, limit: u32) -> Result<LedgerList, ApiError> {
        self.send_json(endpoints::list_ledgers(skip, limit)).await
    }

    pub async fn create_ledger(&self, ledger: &LedgerRequest) -> Result<Ledger, ApiError> {
        self.send_json(endpoints::create_ledger(ledger)?).await
    }

    pub async fn get_ledger(&self, id: i64) -> Result<Ledger, ApiError> {
        self.send_json(endpoints::get_ledger(id)).await
    }

    pub async fn update_ledger(&self, id: i64, update: &LedgerUpdate) -> Result<Ledger, ApiError> {
        self.send_json(endpoints::update_ledger(id, update)?).await
    }

    pub async fn delete_ledger(&self, id: i64) -> Result<(), ApiError> {
        self.send(endpoints::delete_ledger(id)).await?;
        Ok(())
    }

    /// Budgets for a `YYYY-MM` month
    pub async fn list_budgets(&self, month: &str) -> Result<Vec<Budget>, ApiError> {
        self.send_json(endpoints::list_budgets(month)).await
    }

    pub async fn set_budget(&self, budget: &BudgetRequest) -> Result<Budget, ApiError> {
        self.send_json(endpoints::set_budget(budget)?).await
    }

    /// Run the interceptors and build the transport request.
    pub(crate) async fn prepare(
        &self,
        request: OutgoingRequest,
    ) -> Result<reqwest::Request, ApiError> {
        let mut request = request;
        for interceptor in &self.interceptors {
            request = interceptor.intercept(&request).await?;
        }

        let url = format!("{}/{}", self.base_url, request.path().trim_start_matches('/'));
        let mut builder = self
            .http
            .request(request.method().clone(), &url)
            .headers(request.headers().clone());

        if !request.query().is_empty() {
            builder = builder.query(request.query());
        }
        builder = match request.body() {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Form(fields)) => builder.form(fields),
            None => builder,
        };

        Ok(builder.build()?)
    }

    async fn send(&self, request: OutgoingRequest) -> Result<reqwest::Response, ApiError> {
        let request = self.prepare(request).await?;
        tracing::debug!("{} {}", request.method(), request.url().path());

        let resp = self.http.execute(request).await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("Request failed: {} - {}", status, body);
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: OutgoingRequest) -> Result<T, ApiError> {
        let resp = self.send(request).await?;
        Ok(resp.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::TransactionKind;
    use crate::auth::CredentialStore;
    use crate::storage::MemoryStore;
    use reqwest::Method;
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
    use serde_json::json;

    fn client() -> ApiClient {
        let session = Session::new(CredentialStore::new(Arc::new(MemoryStore::new())));
        let config = ApiConfig {
            base_url: "http://ledger.test/api/".to_string(),
            ..ApiConfig::default()
        };
        ApiClient::new(&config, session).unwrap()
    }

    async fn logged_in_client() -> ApiClient {
        let client = client();
        client.session().login("abc", "bearer").await.unwrap();
        client
    }

    fn json_body(request: &reqwest::Request) -> serde_json::Value {
        serde_json::from_slice(request.body().and_then(|b| b.as_bytes()).unwrap()).unwrap()
    }

    fn assert_bearer(request: &reqwest::Request) {
        assert_eq!(request.headers().get(AUTHORIZATION).unwrap(), "Bearer abc");
    }

    #[tokio::test]
    async fn test_authenticated_request_carries_bearer() {
        let client = logged_in_client().await;

        let query = TransactionQuery {
            kind: Some(TransactionKind::Expense),
            limit: Some(5),
            ..Default::default()
        };
        let built = client
            .prepare(endpoints::list_transactions(&query))
            .await
            .unwrap();

        assert_eq!(built.method(), &Method::GET);
        assert_eq!(
            built.url().as_str(),
            "http://ledger.test/api/transactions?limit=5&type=expense"
        );
        assert_bearer(&built);
    }

    #[tokio::test]
    async fn test_login_request_has_no_bearer() {
        let client = logged_in_client().await;

        let built = client
            .prepare(endpoints::login("alice", "p&ss"))
            .await
            .unwrap();

        assert_eq!(built.url().as_str(), "http://ledger.test/api/users/login");
        assert!(built.headers().get(AUTHORIZATION).is_none());
        assert_eq!(
            built.headers().get(CONTENT_TYPE).unwrap(),
            "application/x-www-form-urlencoded"
        );
        let body = built.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(body, b"username=alice&password=p%26ss");
    }

    #[tokio::test]
    async fn test_logged_out_request_has_no_bearer() {
        let client = client();
        let built = client
            .prepare(endpoints::transaction_summary(&SummaryQuery::default()))
            .await
            .unwrap();
        assert!(built.headers().get(AUTHORIZATION).is_none());
        assert_eq!(
            built.url().as_str(),
            "http://ledger.test/api/transactions/summary/statistics"
        );
    }

    #[tokio::test]
    async fn test_json_body() {
        let client = client();
        let budget = BudgetRequest {
            amount: 1500.0,
            category: None,
            month: "2024-03".to_string(),
        };
        let built = client
            .prepare(endpoints::set_budget(&budget).unwrap())
            .await
            .unwrap();

        assert_eq!(built.headers().get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(
            json_body(&built),
            json!({"amount": 1500.0, "category": null, "month": "2024-03"})
        );
    }

    #[tokio::test]
    async fn test_get_and_update_transaction() {
        let client = logged_in_client().await;

        let built = client.prepare(endpoints::get_transaction(7)).await.unwrap();
        assert_eq!(built.method(), &Method::GET);
        assert_eq!(built.url().as_str(), "http://ledger.test/api/transactions/7");
        assert_bearer(&built);

        let update = TransactionUpdate {
            amount: Some(20.0),
            category: Some("Transport".to_string()),
            ..Default::default()
        };
        let built = client
            .prepare(endpoints::update_transaction(7, &update).unwrap())
            .await
            .unwrap();
        assert_eq!(built.method(), &Method::PUT);
        assert_eq!(built.url().as_str(), "http://ledger.test/api/transactions/7");
        assert_bearer(&built);
        assert_eq!(json_body(&built), json!({"amount": 20.0, "category": "Transport"}));
    }

    #[tokio::test]
    async fn test_date_range_filters() {
        let client = logged_in_client().await;
        let start = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0));
        let end = chrono::NaiveDate::from_ymd_opt(2024, 3, 31)
            .and_then(|d| d.and_hms_opt(23, 59, 59));

        let summary = SummaryQuery {
            start_date: start,
            end_date: None,
        };
        let built = client
            .prepare(endpoints::transaction_summary(&summary))
            .await
            .unwrap();
        assert_eq!(
            built.url().as_str(),
            "http://ledger.test/api/transactions/summary/statistics?start_date=2024-03-01T00%3A00%3A00"
        );
        assert_bearer(&built);

        let query = TransactionQuery {
            start_date: start,
            end_date: end,
            ..Default::default()
        };
        let built = client
            .prepare(endpoints::list_transactions(&query))
            .await
            .unwrap();
        assert_eq!(
            built.url().query(),
            Some("start_date=2024-03-01T00%3A00%3A00&end_date=2024-03-31T23%3A59%3A59")
        );
    }

    #[tokio::test]
    async fn test_ledger_requests() {
        let client = logged_in_client().await;

        let built = client.prepare(endpoints::list_ledgers(0, 100)).await.unwrap();
        assert_eq!(built.method(), &Method::GET);
        assert_eq!(built.url().as_str(), "http://ledger.test/api/ledgers?skip=0&limit=100");
        assert_bearer(&built);

        let create = LedgerRequest {
            name: "Household".to_string(),
            description: None,
        };
        let built = client
            .prepare(endpoints::create_ledger(&create).unwrap())
            .await
            .unwrap();
        assert_eq!(built.method(), &Method::POST);
        assert_eq!(built.url().as_str(), "http://ledger.test/api/ledgers");
        assert_bearer(&built);
        assert_eq!(json_body(&built), json!({"name": "Household"}));

        let built = client.prepare(endpoints::get_ledger(3)).await.unwrap();
        assert_eq!(built.method(), &Method::GET);
        assert_eq!(built.url().as_str(), "http://ledger.test/api/ledgers/3");
        assert_bearer(&built);

        let update = LedgerUpdate {
            name: Some("Home".to_string()),
            ..Default::default()
        };
        let built = client
            .prepare(endpoints::update_ledger(3, &update).unwrap())
            .await
            .unwrap();
        assert_eq!(built.method(), &Method::PUT);
        assert_eq!(built.url().as_str(), "http://ledger.test/api/ledgers/3");
        assert_bearer(&built);
        assert_eq!(json_body(&built), json!({"name": "Home"}));

        let built = client.prepare(endpoints::delete_ledger(3)).await.unwrap();
        assert_eq!(built.method(), &Method::DELETE);
        assert_eq!(built.url().as_str(), "http://ledger.test/api/ledgers/3");
        assert_bearer(&built);
        assert!(built.body().is_none());
    }

    struct Tagger;

    #[async_trait::async_trait]
    impl RequestInterceptor for Tagger {
        async fn intercept(
            &self,
            request: &OutgoingRequest,
        ) -> Result<OutgoingRequest, crate::error::AuthorizeError> {
            Ok(request.clone().with_header(
                reqwest::header::HeaderName::from_static("x-client"),
                reqwest::header::HeaderValue::from_static("ledger-core"),
            ))
        }
    }

    #[tokio::test]
    async fn test_extra_interceptor_runs_after_authorizer() {
        let client = logged_in_client().await.with_interceptor(Arc::new(Tagger));

        let built = client.prepare(endpoints::list_budgets("2024-03")).await.unwrap();
        assert_eq!(built.headers().get("x-client").unwrap(), "ledger-core");
        assert_bearer(&built);
    }
}
