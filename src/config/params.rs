//! Named parameters served to services.
//!
//! A parameter is looked up in the environment first, then in the defaults
//! registered at runtime.

use std::env;

use dashmap::DashMap;
use serde_json::Value;

/// Parameter store. Safe to share between request handlers.
#[derive(Debug, Default)]
pub struct Params {
    defaults: DashMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_default(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        tracing::debug!(name = %name, "Parameter default set");
        self.defaults.insert(name, value);
    }

    pub fn set_defaults<I, S>(&self, values: I)
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        for (name, value) in values {
            self.set_default(name, value);
        }
    }

    pub fn exist(&self, name: &str) -> bool {
        env::var_os(name).is_some() || self.defaults.contains_key(name)
    }

    /// Environment value, else the default rendered as a string, else empty.
    pub fn string(&self, name: &str) -> String {
        if let Ok(value) = env::var(name) {
            return value;
        }

        match self.defaults.get(name).as_deref() {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    /// Zero when missing or not a non-negative integer.
    pub fn uint64(&self, name: &str) -> u64 {
        if let Ok(value) = env::var(name) {
            return value.trim().parse().unwrap_or(0);
        }

        match self.defaults.get(name).as_deref() {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    /// True for `true`/`1`/`yes`/`on` (any case) or a JSON `true`.
    pub fn bool(&self, name: &str) -> bool {
        if let Ok(value) = env::var(name) {
            return truthy(&value);
        }

        match self.defaults.get(name).as_deref() {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => truthy(s),
            Some(Value::Number(n)) => n.as_u64().is_some_and(|n| n != 0),
            _ => false,
        }
    }
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
