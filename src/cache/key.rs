//! Cache key generation: parameter normalization, canonical JSON, MD5 (spec §4.2).

use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::models::ProviderKind;

const COORDINATE_KEYS: &[&str] = &[
    "lat",
    "lon",
    "latitude",
    "longitude",
    "origin_lat",
    "origin_lon",
    "dest_lat",
    "dest_lon",
];

/// Normalizes cache params per spec §4.2 step 1: lowercase + collapse
/// whitespace on strings, round coordinate-named numeric keys to 3 decimals,
/// sort lists, leave other scalars unchanged.
pub fn normalize_params(params: &Map<String, Value>) -> Map<String, Value> {
    let mut normalized = Map::new();

    for (key, value) in params {
        let normalized_value = match value {
            Value::String(s) => Value::String(s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")),
            Value::Number(n) => {
                if COORDINATE_KEYS.contains(&key.as_str()) {
                    if let Some(f) = n.as_f64() {
                        serde_json::Number::from_f64(round_to(f, 3))
                            .map(Value::Number)
                            .unwrap_or_else(|| value.clone())
                    } else {
                        value.clone()
                    }
                } else {
                    value.clone()
                }
            }
            Value::Array(items) => {
                let mut sorted = items.clone();
                sorted.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
                Value::Array(sorted)
            }
            other => other.clone(),
        };
        normalized.insert(key.clone(), normalized_value);
    }

    normalized
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Canonical `"{provider}:{operation}:{md5(sorted-key JSON)}"` cache key.
pub fn generate_key(provider: ProviderKind, operation: &str, normalized_params: &Map<String, Value>) -> String {
    let sorted: std::collections::BTreeMap<String, Value> =
        normalized_params.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    let canonical_json = serde_json::to_string(&sorted).unwrap_or_default();
    let digest = md5::compute(canonical_json.as_bytes());
    format!("{provider}:{operation}:{digest:x}")
}

/// Brazilian address abbreviation table applied before Jaccard comparison
/// (spec §4.2 step 2; restored verbatim from the original's `_normalize_address`).
const ADDRESS_ABBREVIATIONS: &[(&str, &str)] = &[
    ("avenida", "av"),
    ("rua", "r"),
    ("praca", "pca"),
    ("sao", "sao"),
    ("santa", "santa"),
    ("santo", "santo"),
    ("estrada", "estr"),
    ("rodovia", "rod"),
    ("alameda", "al"),
];

/// Normalizes a free-text address for semantic geocode-cache matching.
pub fn normalize_address(address: &str) -> String {
    if address.is_empty() {
        return String::new();
    }

    let lowered = address.to_lowercase();
    let words: Vec<String> = lowered
        .split_whitespace()
        .map(|word| {
            let stripped: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
            for (pattern, replacement) in ADDRESS_ABBREVIATIONS {
                if stripped == *pattern {
                    return replacement.to_string();
                }
            }
            stripped
        })
        .filter(|w| !w.is_empty())
        .collect();

    words.join(" ")
}

/// Jaccard word-similarity between two normalized addresses; `true` when
/// overlap exceeds 0.7 (spec §4.2 step 2).
pub fn addresses_similar(addr1: &str, addr2: &str) -> bool {
    if addr1.is_empty() || addr2.is_empty() {
        return false;
    }

    let words1: BTreeSet<&str> = addr1.split_whitespace().collect();
    let words2: BTreeSet<&str> = addr2.split_whitespace().collect();
    if words1.is_empty() || words2.is_empty() {
        return false;
    }

    let intersection = words1.intersection(&words2).count();
    let union = words1.union(&words2).count();
    let similarity = intersection as f64 / union as f64;

    similarity > 0.7
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_params_rounds_coordinates_and_lowercases_strings() {
        let mut params = Map::new();
        params.insert("latitude".into(), json!(-19.91912345));
        params.insert("address".into(), json!("  Avenida   Paulista  "));
        let normalized = normalize_params(&params);
        assert_eq!(normalized["latitude"], json!(-19.919));
        assert_eq!(normalized["address"], json!("avenida paulista"));
    }

    #[test]
    fn generate_key_is_stable_for_same_normalized_params() {
        let mut a = Map::new();
        a.insert("x".into(), json!(1));
        a.insert("y".into(), json!(2));
        let mut b = Map::new();
        b.insert("y".into(), json!(2));
        b.insert("x".into(), json!(1));

        let key_a = generate_key(ProviderKind::Osm, "geocode", &a);
        let key_b = generate_key(ProviderKind::Osm, "geocode", &b);
        assert_eq!(key_a, key_b);
        assert!(key_a.starts_with("osm:geocode:"));
    }

    #[test]
    fn addresses_similar_matches_brazilian_abbreviation() {
        let a = normalize_address("Avenida Paulista, Sao Paulo, SP");
        let b = normalize_address("Av. Paulista, Sao Paulo");
        assert!(addresses_similar(&a, &b));
    }

    #[test]
    fn addresses_similar_rejects_unrelated_addresses() {
        let a = normalize_address("Rua das Flores, Belo Horizonte");
        let b = normalize_address("Avenida Paulista, Sao Paulo");
        assert!(!addresses_similar(&a, &b));
    }
}
