//! Single-load search between two points
use crate::context::RequestContext;
use crate::error::FreightResult;
use crate::geo::GeoPoint;
use crate::insight::ScanStats;
use crate::scoring;
use crate::store::{LoadFilter, LoadRepository};
use crate::types::{Equipment, LoadWithScore};

#[derive(Debug, Clone, PartialEq)]
pub struct DirectQuery {
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub driver_location: GeoPoint,
    pub equipment: Option<Equipment>,
    pub min_rate: Option<f64>,
}

/// Available loads picking up near `origin` and dropping near `destination`,
/// best trip score first.
pub fn direct_search(
    ctx: &RequestContext,
    loads: &dyn LoadRepository,
    query: &DirectQuery,
) -> FreightResult<(Vec<LoadWithScore>, ScanStats)> {
    let search = &ctx.config.search;
    let filter = LoadFilter::new(search.scan_cap)
        .origin_within(query.origin, search.radius_miles)
        .destination_within(query.destination, search.radius_miles)
        .equipment(query.equipment)
        .min_rate(query.min_rate);

    let candidates = loads.list_available(&filter)?;
    let stats = ScanStats::from_loads(&candidates);

    let mut scored: Vec<LoadWithScore> = candidates
        .iter()
        .map(|load| scoring::score_load(load, &query.driver_location, search.market_band))
        .collect();
    scoring::sort_by_score(&mut scored);

    tracing::debug!(
        trace_id = %ctx.trace_id,
        matches = scored.len(),
        best = ?scored.first().map(|s| s.trip_score),
        "direct search finished"
    );
    Ok((scored, stats))
}
