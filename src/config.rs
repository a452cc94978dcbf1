//! Environment-driven configuration, enumerated per spec §6.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoiProvider {
    Osm,
    Here,
}

impl PoiProvider {
    fn from_env(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "here" => PoiProvider::Here,
            _ => PoiProvider::Osm,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheTtls {
    pub geocode: Duration,
    pub route: Duration,
    pub poi_search: Duration,
    pub poi_details: Duration,
    pub google_places: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            geocode: Duration::from_secs(604_800),
            route: Duration::from_secs(21_600),
            poi_search: Duration::from_secs(86_400),
            poi_details: Duration::from_secs(43_200),
            google_places: Duration::from_secs(2_592_000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimits {
    pub osm_per_second: f64,
    pub here_per_second: f64,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self { osm_per_second: 1.0, here_per_second: 5.0 }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub pool_min_size: u32,
    pub pool_max_size: u32,
}

impl DatabaseConfig {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub poi_provider: PoiProvider,
    pub here_enrichment_enabled: bool,
    pub here_api_key: Option<String>,
    pub google_places_api_key: Option<String>,
    pub google_places_enabled: bool,
    pub cache_ttls: CacheTtls,
    pub rate_limits: RateLimits,
    pub database: DatabaseConfig,
    pub lookback_milestones_count: u32,
    pub duplicate_map_tolerance_km: f64,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from the process environment, applying the
    /// defaults enumerated in spec §6 for anything unset.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            poi_provider: PoiProvider::from_env(&env_or("POI_PROVIDER", "osm")),
            here_enrichment_enabled: env_bool("HERE_ENRICHMENT_ENABLED", false),
            here_api_key: env::var("HERE_API_KEY").ok(),
            google_places_api_key: env::var("GOOGLE_PLACES_API_KEY").ok(),
            google_places_enabled: env_bool("GOOGLE_PLACES_ENABLED", false),
            cache_ttls: CacheTtls {
                geocode: Duration::from_secs(env_parse("GEO_CACHE_TTL_GEOCODE", 604_800)),
                route: Duration::from_secs(env_parse("GEO_CACHE_TTL_ROUTE", 21_600)),
                poi_search: Duration::from_secs(env_parse("GEO_CACHE_TTL_POI", 86_400)),
                poi_details: Duration::from_secs(env_parse("GEO_CACHE_TTL_POI_DETAILS", 43_200)),
                google_places: Duration::from_secs(env_parse("GOOGLE_PLACES_CACHE_TTL", 2_592_000)),
            },
            rate_limits: RateLimits {
                osm_per_second: env_parse("GEO_RATE_LIMIT_OSM", 1.0),
                here_per_second: env_parse("GEO_RATE_LIMIT_HERE", 5.0),
            },
            database: DatabaseConfig {
                host: env_or("POSTGRES_HOST", "localhost"),
                port: env_parse("POSTGRES_PORT", 5432),
                database: env_or("POSTGRES_DATABASE", "mapalinear"),
                user: env_or("POSTGRES_USER", "postgres"),
                password: env_or("POSTGRES_PASSWORD", "postgres"),
                pool_min_size: env_parse("POSTGRES_POOL_MIN_SIZE", 0),
                pool_max_size: env_parse("POSTGRES_POOL_MAX_SIZE", 50),
            },
            lookback_milestones_count: env_parse("LOOKBACK_MILESTONES_COUNT", 10),
            duplicate_map_tolerance_km: env_parse("DUPLICATE_MAP_TOLERANCE_KM", 5.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poi_provider_defaults_to_osm() {
        assert_eq!(PoiProvider::from_env("bogus"), PoiProvider::Osm);
        assert_eq!(PoiProvider::from_env("HERE"), PoiProvider::Here);
    }

    #[test]
    fn cache_ttl_defaults_match_spec() {
        let ttls = CacheTtls::default();
        assert_eq!(ttls.geocode.as_secs(), 604_800);
        assert_eq!(ttls.route.as_secs(), 21_600);
        assert_eq!(ttls.poi_search.as_secs(), 86_400);
        assert_eq!(ttls.poi_details.as_secs(), 43_200);
        assert_eq!(ttls.google_places.as_secs(), 2_592_000);
    }
}
