//! Per-user income and expense category lists.
//!
//! Lists are kept client side under `ledger_categories:<username>` in the
//! preference store. An empty or unreadable list falls back to the built-in
//! defaults.

use crate::auth::Session;
use crate::error::StorageError;
use crate::storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

const STORAGE_KEY_BASE: &str = "ledger_categories";
/// Username used for the storage key when nobody is logged in
pub const GUEST_USER: &str = "guest";

const DEFAULT_INCOME: [&str; 4] = ["Salary", "Bonus", "Investment income", "Other income"];
const DEFAULT_EXPENSE: [&str; 6] = [
    "Food",
    "Transport",
    "Housing",
    "Medical",
    "Entertainment",
    "Shopping",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Income,
    Expense,
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryKind::Income => write!(f, "income"),
            CategoryKind::Expense => write!(f, "expense"),
        }
    }
}

/// Both category lists, in display order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryLists {
    pub income_categories: Vec<String>,
    pub expense_categories: Vec<String>,
}

impl CategoryLists {
    fn defaults() -> Self {
        Self {
            income_categories: DEFAULT_INCOME.iter().map(|s| s.to_string()).collect(),
            expense_categories: DEFAULT_EXPENSE.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Parse a stored blob. Missing, malformed or empty lists take the
    /// defaults.
    fn from_stored(raw: Option<&str>) -> Self {
        let parsed = match raw.map(serde_json::from_str::<Value>) {
            Some(Ok(value)) => value,
            Some(Err(e)) => {
                tracing::warn!("Ignoring unreadable category lists: {}", e);
                Value::Null
            }
            None => Value::Null,
        };

        let defaults = Self::defaults();
        Self {
            income_categories: string_list(&parsed, "incomeCategories")
                .unwrap_or(defaults.income_categories),
            expense_categories: string_list(&parsed, "expenseCategories")
                .unwrap_or(defaults.expense_categories),
        }
    }

    pub fn get(&self, kind: CategoryKind) -> &[String] {
        match kind {
            CategoryKind::Income => &self.income_categories,
            CategoryKind::Expense => &self.expense_categories,
        }
    }

    fn get_mut(&mut self, kind: CategoryKind) -> &mut Vec<String> {
        match kind {
            CategoryKind::Income => &mut self.income_categories,
            CategoryKind::Expense => &mut self.expense_categories,
        }
    }
}

/// Non-empty array of strings under `field`, if there is one
fn string_list(value: &Value, field: &str) -> Option<Vec<String>> {
    let list: Vec<String> = value
        .get(field)?
        .as_array()?
        .iter()
        .filter_map(|v| v.as_str().map(str::to_owned))
        .collect();
    (!list.is_empty()).then_some(list)
}

/// The category lists of one user, persisted on every change
pub struct CategoryBook {
    store: Arc<dyn KeyValueStore>,
    username: String,
    lists: CategoryLists,
}

impl CategoryBook {
    pub fn storage_key(username: &str) -> String {
        format!("{}:{}", STORAGE_KEY_BASE, username)
    }

    /// Load the lists stored for `username`.
    pub async fn load(
        store: Arc<dyn KeyValueStore>,
        username: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let username = username.into();
        let raw = store.get(&Self::storage_key(&username)).await?;
        let lists = CategoryLists::from_stored(raw.as_deref());
        Ok(Self {
            store,
            username,
            lists,
        })
    }

    /// Load the lists of whoever is logged in, or the guest lists.
    pub async fn for_session(session: &Session) -> Result<Self, StorageError> {
        let username = session
            .current_display_name()
            .await?
            .unwrap_or_else(|| GUEST_USER.to_string());
        Self::load(Arc::clone(session.credentials().backend()), username).await
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn lists(&self) -> &CategoryLists {
        &self.lists
    }

    pub fn categories(&self, kind: CategoryKind) -> &[String] {
        self.lists.get(kind)
    }

    /// Discard in-memory state and read the stored lists again.
    pub async fn reload(&mut self) -> Result<(), StorageError> {
        let raw = self.store.get(&Self::storage_key(&self.username)).await?;
        self.lists = CategoryLists::from_stored(raw.as_deref());
        Ok(())
    }

    /// Append a category. Blank or duplicate names are ignored.
    ///
    /// Returns whether the list changed.
    pub async fn add(&mut self, kind: CategoryKind, name: &str) -> Result<bool, StorageError> {
        let name = name.trim();
        if name.is_empty() || self.lists.get(kind).iter().any(|c| c == name) {
            return Ok(false);
        }
        self.lists.get_mut(kind).push(name.to_string());
        self.persist().await?;
        Ok(true)
    }

    /// Remove every entry equal to `name`. Returns whether the list changed.
    pub async fn remove(&mut self, kind: CategoryKind, name: &str) -> Result<bool, StorageError> {
        let list = self.lists.get_mut(kind);
        let before = list.len();
        list.retain(|c| c != name);
        if list.len() == before {
            return Ok(false);
        }
        self.persist().await?;
        Ok(true)
    }

    /// Move the entry at `from` to position `to`.
    ///
    /// `to` is clamped into range; an out-of-range `from` or `from == to`
    /// leaves the list alone. Returns whether the list changed.
    pub async fn reorder(
        &mut self,
        kind: CategoryKind,
        from: usize,
        to: usize,
    ) -> Result<bool, StorageError> {
        let list = self.lists.get_mut(kind);
        if from == to || from >= list.len() {
            return Ok(false);
        }
        let to = to.min(list.len() - 1);
        if from == to {
            return Ok(false);
        }

        let item = list.remove(from);
        list.insert(to, item);
        self.persist().await?;
        Ok(true)
    }

    async fn persist(&self) -> Result<(), StorageError> {
        let json = serde_json::to_string(&self.lists)
            .map_err(|e| StorageError::serialize("Failed to serialize category lists", e))?;
        self.store
            .set(&Self::storage_key(&self.username), &json)
            .await?;
        tracing::debug!("Saved category lists for {}", self.username);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CredentialStore;
    use crate::storage::MemoryStore;

    fn store() -> Arc<dyn KeyValueStore> {
        Arc::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn test_defaults_when_nothing_stored() {
        let book = CategoryBook::load(store(), "alice").await.unwrap();
        assert_eq!(book.categories(CategoryKind::Income), DEFAULT_INCOME);
        assert_eq!(book.categories(CategoryKind::Expense), DEFAULT_EXPENSE);
    }

    #[tokio::test]
    async fn test_add_trims_and_skips_duplicates() {
        let backend = store();
        let mut book = CategoryBook::load(backend.clone(), "alice").await.unwrap();

        assert!(book.add(CategoryKind::Expense, "  Pets ").await.unwrap());
        assert!(!book.add(CategoryKind::Expense, "Pets").await.unwrap());
        assert!(!book.add(CategoryKind::Expense, "   ").await.unwrap());
        assert_eq!(book.categories(CategoryKind::Expense).last().unwrap(), "Pets");

        let reloaded = CategoryBook::load(backend, "alice").await.unwrap();
        assert_eq!(reloaded.lists(), book.lists());
    }

    #[tokio::test]
    async fn test_lists_are_per_user() {
        let backend = store();
        let mut alice = CategoryBook::load(backend.clone(), "alice").await.unwrap();
        alice.add(CategoryKind::Income, "Dividends").await.unwrap();

        let bob = CategoryBook::load(backend.clone(), "bob").await.unwrap();
        assert!(!bob.categories(CategoryKind::Income).contains(&"Dividends".to_string()));
        assert!(backend.get("ledger_categories:alice").await.unwrap().is_some());
        assert!(backend.get("ledger_categories:bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove() {
        let mut book = CategoryBook::load(store(), "alice").await.unwrap();
        assert!(book.remove(CategoryKind::Income, "Bonus").await.unwrap());
        assert!(!book.remove(CategoryKind::Income, "Bonus").await.unwrap());
        assert_eq!(
            book.categories(CategoryKind::Income),
            ["Salary", "Investment income", "Other income"]
        );
    }

    #[tokio::test]
    async fn test_removing_everything_restores_defaults_on_reload() {
        let mut book = CategoryBook::load(store(), "alice").await.unwrap();
        for name in DEFAULT_INCOME {
            book.remove(CategoryKind::Income, name).await.unwrap();
        }
        assert!(book.categories(CategoryKind::Income).is_empty());

        book.reload().await.unwrap();
        assert_eq!(book.categories(CategoryKind::Income), DEFAULT_INCOME);
    }

    #[tokio::test]
    async fn test_reorder() {
        let mut book = CategoryBook::load(store(), "alice").await.unwrap();

        assert!(book.reorder(CategoryKind::Expense, 0, 2).await.unwrap());
        assert_eq!(
            &book.categories(CategoryKind::Expense)[..3],
            ["Transport", "Housing", "Food"]
        );

        // Target past the end is clamped to the last slot
        assert!(book.reorder(CategoryKind::Expense, 0, 99).await.unwrap());
        assert_eq!(book.categories(CategoryKind::Expense).last().unwrap(), "Transport");

        assert!(!book.reorder(CategoryKind::Expense, 1, 1).await.unwrap());
        assert!(!book.reorder(CategoryKind::Expense, 42, 0).await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_blob_falls_back_to_defaults() {
        let backend = store();
        backend
            .set("ledger_categories:alice", "{\"incomeCategories\": 5")
            .await
            .unwrap();
        let book = CategoryBook::load(backend.clone(), "alice").await.unwrap();
        assert_eq!(book.lists(), &CategoryLists::defaults());

        backend
            .set(
                "ledger_categories:alice",
                r#"{"incomeCategories": "Salary", "expenseCategories": ["Rent"]}"#,
            )
            .await
            .unwrap();
        let book = CategoryBook::load(backend, "alice").await.unwrap();
        assert_eq!(book.categories(CategoryKind::Income), DEFAULT_INCOME);
        assert_eq!(book.categories(CategoryKind::Expense), ["Rent"]);
    }

    #[tokio::test]
    async fn test_for_session_uses_guest_when_logged_out() {
        let session = Session::new(CredentialStore::new(store()));
        let book = CategoryBook::for_session(&session).await.unwrap();
        assert_eq!(book.username(), GUEST_USER);
    }
}
