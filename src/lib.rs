//! MapaLinear — linear map generation from a road route
//!
//! Projects a driving route onto a single line and annotates it with
//! points of interest (gas stations, restaurants, cities, ...) found along
//! the way, resolving each POI's junction with the route and which side of
//! the road it sits on.
//!
//! # Pipeline
//!
//! - [`road_service`]: top-level conductor (geocode → route → assemble)
//! - [`segment_engine`]: splits a route into reusable, content-addressed segments
//! - [`poi_search`] / [`poi_persistence`]: discovers and canonicalizes POIs
//! - [`here_enrichment`]: optional second-pass contact/hours enrichment
//! - [`junction_calc`]: resolves each POI's position relative to the route
//! - [`map_assembly`]: assembles segments + POIs into a persisted `Map`
//! - [`async_ops`] / [`maintenance`]: operation tracking and periodic GC

pub mod async_ops;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod geo_utils;
pub mod here_enrichment;
pub mod junction_calc;
pub mod maintenance;
pub mod map_assembly;
pub mod models;
pub mod poi_persistence;
pub mod poi_search;
pub mod providers;
pub mod road_service;
pub mod segment_engine;

pub mod api;
