//! Proxy descriptors.
//!
//! A proxy is a single named processing step placed between a caller and
//! a destination.

use serde::{Deserialize, Serialize};

/// A proxy service referenced from a chain.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Proxy {
    pub id: String,
    pub url: String,
    pub category: String,
}

impl Proxy {
    pub fn new(id: impl Into<String>, url: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            category: category.into(),
        }
    }

    /// All three identifying fields must be set.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.url.is_empty() && !self.category.is_empty()
    }
}

/// Field-wise comparison. False if either side is missing.
pub fn is_equal_proxy(first: Option<&Proxy>, second: Option<&Proxy>) -> bool {
    match (first, second) {
        (Some(first), Some(second)) => first == second,
        _ => false,
    }
}

/// Whether a proxy with `id` is in `proxies`.
pub fn is_proxy_exist(proxies: &[Proxy], id: &str) -> bool {
    proxies.iter().any(|proxy| proxy.id == id)
}
