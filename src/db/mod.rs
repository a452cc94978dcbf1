//! Hand-written SQL access, one module per aggregate (spec §6). Every query
//! uses the runtime `sqlx::query`/`query_as` API rather than the
//! compile-time `query!` macros, since there is no live database available
//! to validate against at build time.

pub mod cache_repo;
pub mod maps;
pub mod operations;
pub mod pois;
pub mod segments;
