//! Pagination parameters and list-shape normalization.
//!
//! The backend is not uniform here. Sources, subscriptions, runs and outbox
//! take `limit`/`offset` and answer with a bare JSON array. Documents take
//! `skip`/`limit` and answer with an `{items, total, skip, limit}` envelope.
//! Both shapes are decoded into [`Page`]; `total` is only known for
//! enveloped endpoints.

use serde::{Deserialize, Serialize};

/// Query parameters for a paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    LimitOffset { limit: u32, offset: u32 },
    SkipLimit { skip: u32, limit: u32 },
}

impl Pagination {
    pub fn limit_offset(limit: u32, offset: u32) -> Self {
        Pagination::LimitOffset { limit, offset }
    }

    pub fn skip_limit(skip: u32, limit: u32) -> Self {
        Pagination::SkipLimit { skip, limit }
    }

    /// Backend defaults for `limit`/`offset` listings.
    pub fn default_limit_offset() -> Self {
        Self::limit_offset(50, 0)
    }

    /// Backend defaults for `skip`/`limit` listings.
    pub fn default_skip_limit() -> Self {
        Self::skip_limit(0, 10)
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        match *self {
            Pagination::LimitOffset { limit, offset } => vec![
                ("limit".to_string(), limit.to_string()),
                ("offset".to_string(), offset.to_string()),
            ],
            Pagination::SkipLimit { skip, limit } => vec![
                ("skip".to_string(), skip.to_string()),
                ("limit".to_string(), limit.to_string()),
            ],
        }
    }
}

/// Either list shape the backend returns.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Bare(Vec<T>),
    Envelope {
        items: Vec<T>,
        #[serde(default)]
        total: Option<u64>,
    },
}

/// A normalized page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> From<Listing<T>> for Page<T> {
    fn from(listing: Listing<T>) -> Self {
        match listing {
            Listing::Bare(items) => Page { items, total: None },
            Listing::Envelope { items, total } => Page { items, total },
        }
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
