//! Data model shared by every pipeline component (spec §3).

pub mod cache;
pub mod geo;
pub mod map;
pub mod operation;
pub mod poi;
pub mod segment;

pub use cache::{CacheEntry, CacheStats, ProviderKind};
pub use geo::{Coordinate, GeoLocation, Route, RouteStep};
pub use map::{Map, MapPoi, MapSegment, MapStatistics, Side};
pub use operation::{AsyncOperation, OperationStatus};
pub use poi::{Poi, PoiCategory, ProviderPoi, QualityIssue};
pub use segment::{RouteSegment, SearchPoint, SegmentPoi};
