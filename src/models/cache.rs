//! Cache entry row and provider/operation enums used as cache-key components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Osm,
    Here,
    Google,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderKind::Osm => "osm",
            ProviderKind::Here => "here",
            ProviderKind::Google => "google",
        };
        write!(f, "{s}")
    }
}

/// `(key, data, provider, operation, params, expires_at, hit_count)` per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub data: Value,
    pub provider: ProviderKind,
    pub operation: String,
    pub params: Value,
    pub expires_at: DateTime<Utc>,
    pub hit_count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub backend: &'static str,
    pub total_entries: i64,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    pub hit_rate_percent: f64,
}
