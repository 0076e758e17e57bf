//! Request descriptions for each ledger API endpoint, relative to the base URL.

use super::models::{
    BudgetRequest, LedgerRequest, LedgerUpdate, SummaryQuery, TransactionQuery,
    TransactionRequest, TransactionUpdate,
};
use crate::auth::OutgoingRequest;
use crate::error::ApiError;
use serde::Serialize;

/// Path of the login endpoint; the default exemption list matches it
pub(crate) const LOGIN_PATH: &str = "users/login";

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Encode(e.to_string()))
}

pub(crate) fn login(username: &str, password: &str) -> OutgoingRequest {
    OutgoingRequest::post(LOGIN_PATH).with_form(vec![
        ("username".to_string(), username.to_string()),
        ("password".to_string(), password.to_string()),
    ])
}

pub(crate) fn list_transactions(query: &TransactionQuery) -> OutgoingRequest {
    OutgoingRequest::get("transactions").with_query_pairs(query.to_pairs())
}

pub(crate) fn get_transaction(id: i64) -> OutgoingRequest {
    OutgoingRequest::get(format!("transactions/{}", id))
}

pub(crate) fn create_transaction(
    transaction: &TransactionRequest,
) -> Result<OutgoingRequest, ApiError> {
    Ok(OutgoingRequest::post("transactions").with_json(to_json(transaction)?))
}

pub(crate) fn update_transaction(
    id: i64,
    update: &TransactionUpdate,
) -> Result<OutgoingRequest, ApiError> {
    Ok(OutgoingRequest::put(format!("transactions/{}", id)).with_json(to_json(update)?))
}

pub(crate) fn delete_transaction(id: i64) -> OutgoingRequest {
    OutgoingRequest::delete(format!("transactions/{}", id))
}

pub(crate) fn transaction_summary(query: &SummaryQuery) -> OutgoingRequest {
    OutgoingRequest::get("transactions/summary/statistics").with_query_pairs(query.to_pairs())
}

pub(crate) fn list_ledgers(skip: u32, limit: u32) -> OutgoingRequest {
    OutgoingRequest::get("ledgers")
        .with_query("skip", skip.to_string())
        .with_query("limit", limit.to_string())
}

pub(crate) fn create_ledger(ledger: &LedgerRequest) -> Result<OutgoingRequest, ApiError> {
    Ok(OutgoingRequest::post("ledgers").with_json(to_json(ledger)?))
}

pub(crate) fn get_ledger(id: i64) -> OutgoingRequest {
    OutgoingRequest::get(format!("ledgers/{}", id))
}

pub(crate) fn update_ledger(id: i64, update: &LedgerUpdate) -> Result<OutgoingRequest, ApiError> {
    Ok(OutgoingRequest::put(format!("ledgers/{}", id)).with_json(to_json(update)?))
}

pub(crate) fn delete_ledger(id: i64) -> OutgoingRequest {
    OutgoingRequest::delete(format!("ledgers/{}", id))
}

/// Budgets for a `YYYY-MM` month
pub(crate) fn list_budgets(month: &str) -> OutgoingRequest {
    OutgoingRequest::get("budgets").with_query("month", month)
}

pub(crate) fn set_budget(budget: &BudgetRequest) -> Result<OutgoingRequest, ApiError> {
    Ok(OutgoingRequest::post("budgets").with_json(to_json(budget)?))
}
