//! Corridor discovery: chaining loads that each make progress toward a
//! final destination.
//!
//! Every leg must satisfy the toward predicate, pick up within the search
//! radius of where the previous leg dropped (the requested origin for the
//! first leg) and use a load not already in the chain. A chain is emitted as
//! soon as a leg drops within the radius of the destination; otherwise it is
//! extended until the leg cap. Candidates come from one bounded repository
//! scan and the walk stops after a fixed number of expansions.
use crate::config::MAX_CHAIN_LEGS;
use crate::context::RequestContext;
use crate::error::FreightResult;
use crate::geo::{GeoPoint, distance_miles};
use crate::insight::ScanStats;
use crate::scoring;
use crate::store::{LoadFilter, LoadRepository};
use crate::types::{Equipment, Load, LoadChain};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub struct ChainQuery {
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub driver_location: GeoPoint,
    pub equipment: Option<Equipment>,
    pub min_rate: Option<f64>,
}

/// True when the leg shrinks the remaining distance to `target` below
/// `factor` of what it was at the leg's origin.
pub fn is_toward(leg_origin: &GeoPoint, leg_destination: &GeoPoint, target: &GeoPoint, factor: f64) -> bool {
    distance_miles(leg_destination, target) < distance_miles(leg_origin, target) * factor
}

struct Corridor<'a> {
    pool: Vec<&'a Load>,
    destination: GeoPoint,
    radius: f64,
    max_legs: usize,
    market_band: f64,
    budget: usize,
}

impl<'a> Corridor<'a> {
    fn extend(
        &mut self,
        pickup_near: GeoPoint,
        deadhead_from: GeoPoint,
        path: &mut Vec<(&'a Load, f64)>,
        out: &mut Vec<LoadChain>,
    ) {
        let candidates: Vec<&'a Load> = self
            .pool
            .iter()
            .copied()
            .filter(|load| load.origin.within(&pickup_near, self.radius))
            .filter(|load| path.iter().all(|(used, _)| used.id != load.id))
            .collect();

        for load in candidates {
            if self.budget == 0 {
                return;
            }
            self.budget -= 1;

            path.push((load, distance_miles(&deadhead_from, &load.origin)));
            if load.destination.within(&self.destination, self.radius) {
                out.push(build_chain(path, self.market_band));
            } else if path.len() < self.max_legs {
                self.extend(load.destination, load.destination, path, out);
            }
            path.pop();
        }
    }
}

fn build_chain(path: &[(&Load, f64)], market_band: f64) -> LoadChain {
    let legs: Vec<_> = path
        .iter()
        .map(|(load, deadhead)| scoring::score_with_deadhead(load, *deadhead, market_band))
        .collect();

    let total_revenue: f64 = legs.iter().map(|leg| leg.total_revenue).sum();
    let total_deadhead: f64 = legs.iter().map(|leg| leg.deadhead_miles).sum();
    let loaded_miles: f64 = legs.iter().map(|leg| leg.load.distance_miles).sum();
    let total_miles = loaded_miles + total_deadhead;
    let chain_score = scoring::chain_score(&legs, total_revenue, total_miles, total_deadhead);

    LoadChain {
        legs,
        chain_score,
        total_revenue,
        total_miles,
        total_deadhead,
    }
}

pub(crate) fn compare_chains(a: &LoadChain, b: &LoadChain) -> Ordering {
    b.chain_score
        .total_cmp(&a.chain_score)
        .then(b.total_revenue.total_cmp(&a.total_revenue))
        .then(a.legs.len().cmp(&b.legs.len()))
        .then_with(|| a.load_ids().cmp(&b.load_ids()))
}

/// Chains from `query.origin` to `query.destination`, best first.
pub fn chain_search(
    ctx: &RequestContext,
    loads: &dyn LoadRepository,
    query: &ChainQuery,
) -> FreightResult<(Vec<LoadChain>, ScanStats)> {
    let search = &ctx.config.search;
    let filter = LoadFilter::new(search.scan_cap)
        .equipment(query.equipment)
        .min_rate(query.min_rate);
    let scanned = loads.list_available(&filter)?;
    let stats = ScanStats::from_loads(&scanned);

    let pool = scanned
        .iter()
        .filter(|load| {
            is_toward(
                &load.origin,
                &load.destination,
                &query.destination,
                search.toward_factor,
            )
        })
        .collect();

    let max_legs = search.max_chain_legs.clamp(1, MAX_CHAIN_LEGS);
    let mut corridor = Corridor {
        pool,
        destination: query.destination,
        radius: search.radius_miles,
        max_legs,
        market_band: search.market_band,
        budget: search.max_chain_expansions,
    };
    let mut chains = Vec::new();
    corridor.extend(
        query.origin,
        query.driver_location,
        &mut Vec::with_capacity(max_legs),
        &mut chains,
    );

    chains.sort_by(compare_chains);
    chains.truncate(search.max_results);

    tracing::debug!(
        trace_id = %ctx.trace_id,
        corridor = corridor.pool.len(),
        chains = chains.len(),
        budget_left = corridor.budget,
        "chain search finished"
    );
    Ok((chains, stats))
}

/// Builds a chain from loads in order, each deadhead measured from where the
/// previous leg dropped.
pub fn chain_from_legs(driver_location: GeoPoint, legs: &[&Load], market_band: f64) -> LoadChain {
    let mut position = driver_location;
    let path: Vec<(&Load, f64)> = legs
        .iter()
        .map(|load| {
            let deadhead = distance_miles(&position, &load.origin);
            position = load.destination;
            (*load, deadhead)
        })
        .collect();
    build_chain(&path, market_band)
}
