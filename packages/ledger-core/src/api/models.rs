//! Wire shapes of the ledger HTTP API.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Successful response of the login endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub category: String,
    pub description: Option<String>,
    pub image_path: Option<String>,
    pub date: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

/// Body for creating a transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRequest {
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    /// Server uses the current time when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TransactionList {
    pub total: u64,
    pub items: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TransactionSummary {
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
}

/// Partial update of a transaction; unset fields are left as they are
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransactionUpdate {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<TransactionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDateTime>,
}

impl TransactionUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Query-string form of a timestamp, as the server parses it
const QUERY_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn push_date(pairs: &mut Vec<(String, String)>, key: &str, date: Option<NaiveDateTime>) {
    if let Some(date) = date {
        pairs.push((key.to_string(), date.format(QUERY_DATE_FORMAT).to_string()));
    }
}

/// Filters for listing transactions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionQuery {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
    pub kind: Option<TransactionKind>,
    pub category: Option<String>,
    /// Inclusive lower bound on the transaction date
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
}

impl TransactionQuery {
    pub(crate) fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(skip) = self.skip {
            pairs.push(("skip".to_string(), skip.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(kind) = self.kind {
            pairs.push(("type".to_string(), kind.to_string()));
        }
        if let Some(category) = &self.category {
            pairs.push(("category".to_string(), category.clone()));
        }
        push_date(&mut pairs, "start_date", self.start_date);
        push_date(&mut pairs, "end_date", self.end_date);
        pairs
    }
}

/// Date range for the income/expense summary. Unbounded by default.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SummaryQuery {
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
}

impl SummaryQuery {
    pub(crate) fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        push_date(&mut pairs, "start_date", self.start_date);
        push_date(&mut pairs, "end_date", self.end_date);
        pairs
    }
}

/// A named book of transactions
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Ledger {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LedgerList {
    pub total: u64,
    pub items: Vec<Ledger>,
}

/// Body for creating a ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Partial update of a ledger
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Budget {
    pub id: i64,
    pub user_id: i64,
    pub amount: f64,
    /// `None` for the overall monthly budget
    pub category: Option<String>,
    /// `YYYY-MM`
    pub month: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetRequest {
    pub amount: f64,
    pub category: Option<String>,
    pub month: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transaction_from_server_json() {
        let tx: Transaction = serde_json::from_value(json!({
            "id": 7,
            "user_id": 1,
            "type": "expense",
            "amount": 12.5,
            "category": "Food",
            "description": null,
            "image_path": null,
            "date": "2024-01-15T10:30:00",
            "created_at": "2024-01-15T10:30:01.123456",
            "updated_at": null
        }))
        .unwrap();

        assert_eq!(tx.kind, TransactionKind::Expense);
        assert_eq!(tx.date.to_string(), "2024-01-15 10:30:00");
        assert!(tx.updated_at.is_none());
    }

    #[test]
    fn test_request_omits_unset_fields() {
        let body = serde_json::to_value(TransactionRequest {
            amount: 3000.0,
            kind: TransactionKind::Income,
            category: "Salary".to_string(),
            description: None,
            image_path: None,
            date: None,
        })
        .unwrap();

        assert_eq!(
            body,
            json!({"amount": 3000.0, "type": "income", "category": "Salary"})
        );
    }

    #[test]
    fn test_query_pairs() {
        let query = TransactionQuery {
            limit: Some(20),
            kind: Some(TransactionKind::Income),
            ..Default::default()
        };
        assert_eq!(
            query.to_pairs(),
            vec![
                ("limit".to_string(), "20".to_string()),
                ("type".to_string(), "income".to_string()),
            ]
        );
        assert!(TransactionQuery::default().to_pairs().is_empty());
    }

    #[test]
    fn test_date_range_pairs() {
        let start = NaiveDateTime::parse_from_str("2024-03-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let end = NaiveDateTime::parse_from_str("2024-03-31 23:59:59", "%Y-%m-%d %H:%M:%S").unwrap();

        let query = TransactionQuery {
            category: Some("Food".to_string()),
            start_date: Some(start),
            end_date: Some(end),
            ..Default::default()
        };
        assert_eq!(
            query.to_pairs(),
            vec![
                ("category".to_string(), "Food".to_string()),
                ("start_date".to_string(), "2024-03-01T00:00:00".to_string()),
                ("end_date".to_string(), "2024-03-31T23:59:59".to_string()),
            ]
        );

        let summary = SummaryQuery {
            start_date: None,
            end_date: Some(end),
        };
        assert_eq!(
            summary.to_pairs(),
            vec![("end_date".to_string(), "2024-03-31T23:59:59".to_string())]
        );
        assert!(SummaryQuery::default().to_pairs().is_empty());
    }

    #[test]
    fn test_update_sends_only_set_fields() {
        let update = TransactionUpdate {
            amount: Some(42.0),
            kind: Some(TransactionKind::Income),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"type": "income", "amount": 42.0})
        );
        assert!(!update.is_empty());
        assert!(TransactionUpdate::default().is_empty());

        let ledger = LedgerUpdate {
            description: Some("Trips".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&ledger).unwrap(), json!({"description": "Trips"}));
    }

    #[test]
    fn test_ledger_from_server_json() {
        let list: LedgerList = serde_json::from_value(json!({
            "total": 1,
            "items": [{
                "id": 3,
                "user_id": 1,
                "name": "Household",
                "description": null,
                "created_at": "2024-02-01T08:00:00",
                "updated_at": null
            }]
        }))
        .unwrap();

        assert_eq!(list.total, 1);
        assert_eq!(list.items[0].name, "Household");
        assert!(list.items[0].description.is_none());
    }
}
