//! Provider capability trait, adapters, and the registry that resolves
//! which provider backs each capability (spec §4.3).

pub mod here;
pub mod osm;
pub mod rate_limit;
pub mod registry;

pub use registry::ProviderRegistry;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::models::{GeoLocation, PoiCategory, ProviderKind, ProviderPoi, Route};

/// Capability set every provider adapter implements (spec §4.3).
#[async_trait]
pub trait GeoProvider: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Option<GeoLocation>, ProviderError>;

    async fn reverse_geocode(
        &self,
        lat: f64,
        lon: f64,
        poi_name: Option<&str>,
    ) -> Result<Option<GeoLocation>, ProviderError>;

    async fn calculate_route(
        &self,
        origin: &GeoLocation,
        destination: &GeoLocation,
    ) -> Result<Option<Route>, ProviderError>;

    async fn search_pois(
        &self,
        center_lat: f64,
        center_lon: f64,
        radius_m: f64,
        categories: &[PoiCategory],
        limit: u32,
    ) -> Result<Vec<ProviderPoi>, ProviderError>;

    async fn get_poi_details(&self, id: &str) -> Result<Option<ProviderPoi>, ProviderError>;

    fn provider_type(&self) -> ProviderKind;
    fn supports_offline_export(&self) -> bool;
    fn rate_limit_per_second(&self) -> f64;
}
