use serde::{Deserialize, Serialize};

/// Result of a read query.
///
/// Reads never fail with an error: a store problem becomes
/// `StoreUnavailable`, so callers can tell "no data" from "could not ask".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum QueryOutcome<T> {
    Found(T),
    NotFound,
    StoreUnavailable(String),
}

impl<T> QueryOutcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, QueryOutcome::Found(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, QueryOutcome::NotFound)
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, QueryOutcome::StoreUnavailable(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            QueryOutcome::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryOutcome<U> {
        match self {
            QueryOutcome::Found(value) => QueryOutcome::Found(f(value)),
            QueryOutcome::NotFound => QueryOutcome::NotFound,
            QueryOutcome::StoreUnavailable(reason) => QueryOutcome::StoreUnavailable(reason),
        }
    }

    /// `[]`/`None`-style fallback for callers that only render data
    pub fn unwrap_or_default(self) -> T
    where
        T: Default,
    {
        self.into_option().unwrap_or_default()
    }
}

impl<T> QueryOutcome<Vec<T>> {
    /// Empty list reads as `NotFound`
    pub(crate) fn from_list(items: Vec<T>) -> Self {
        if items.is_empty() {
            QueryOutcome::NotFound
        } else {
            QueryOutcome::Found(items)
        }
    }
}

impl<T> From<Option<T>> for QueryOutcome<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => QueryOutcome::Found(value),
            None => QueryOutcome::NotFound,
        }
    }
}
