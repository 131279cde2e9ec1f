//! Search entry point: validates a request and dispatches it to one of the
//! five search modes.
use crate::chain::{self, ChainQuery, chain_from_legs, compare_chains, is_toward};
use crate::context::RequestContext;
use crate::direct::{DirectQuery, direct_search};
use crate::error::{Failure, FreightError, FreightResult};
use crate::geo::{GeoPoint, distance_miles};
use crate::insight::{MarketInsight, ScanStats, market_insight};
use crate::scoring;
use crate::store::{DriverRepository, FreightStore, LoadFilter, LoadRepository};
use crate::types::{Driver, Equipment, LoadChain, LoadWithScore, RegionSummary, RoundTrip};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchMode {
    OneWay,
    CorridorChain,
    OpenEnded,
    Backhaul,
    RoundTrip,
}

impl SearchMode {
    fn needs_destination(self) -> bool {
        matches!(self, Self::OneWay | Self::CorridorChain | Self::RoundTrip)
    }
}

impl FromStr for SearchMode {
    type Err = FreightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "one_way" => Ok(Self::OneWay),
            "corridor_chain" => Ok(Self::CorridorChain),
            "open_ended" => Ok(Self::OpenEnded),
            "backhaul" => Ok(Self::Backhaul),
            "round_trip" => Ok(Self::RoundTrip),
            "" => Err(FreightError::input("search mode is required")),
            other => Err(FreightError::input(format!("unknown search mode {other:?}"))),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OneWay => "one_way",
            Self::CorridorChain => "corridor_chain",
            Self::OpenEnded => "open_ended",
            Self::Backhaul => "backhaul",
            Self::RoundTrip => "round_trip",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub mode: SearchMode,
    pub origin: Option<GeoPoint>,
    pub destination: Option<GeoPoint>,
    pub driver_id: Option<String>,
    pub equipment: Option<Equipment>,
    pub min_rate: Option<f64>,
    pub max_deadhead_miles: Option<f64>,
}

impl SearchRequest {
    pub fn new(mode: SearchMode) -> Self {
        Self {
            mode,
            origin: None,
            destination: None,
            driver_id: None,
            equipment: None,
            min_rate: None,
            max_deadhead_miles: None,
        }
    }
    pub fn starting_at(mut self, origin: GeoPoint) -> Self {
        self.origin = Some(origin);
        self
    }
    pub fn going_to(mut self, destination: GeoPoint) -> Self {
        self.destination = Some(destination);
        self
    }
    pub fn for_driver(mut self, driver_id: impl Into<String>) -> Self {
        self.driver_id = Some(driver_id.into());
        self
    }
    pub fn set_equipment(mut self, equipment: Equipment) -> Self {
        self.equipment = Some(equipment);
        self
    }
    pub fn set_min_rate(mut self, rate: f64) -> Self {
        self.min_rate = Some(rate);
        self
    }
    pub fn set_max_deadhead(mut self, miles: f64) -> Self {
        self.max_deadhead_miles = Some(miles);
        self
    }

    /// Field checks that need no repository access.
    pub fn validate(&self) -> FreightResult<()> {
        let Some(origin) = self.origin else {
            return Err(FreightError::input(format!("{} search needs an origin", self.mode)));
        };
        check_point("origin", &origin)?;

        match self.destination {
            Some(destination) => check_point("destination", &destination)?,
            None if self.mode.needs_destination() => {
                return Err(FreightError::input(format!(
                    "{} search needs a destination",
                    self.mode
                )));
            }
            None => {}
        }
        if self.mode == SearchMode::Backhaul && self.driver_id.is_none() {
            return Err(FreightError::input("backhaul search needs a driver id"));
        }
        if let Some(rate) = self.min_rate {
            check_positive("min_rate", rate)?;
        }
        if let Some(miles) = self.max_deadhead_miles {
            check_positive("max_deadhead_miles", miles)?;
        }
        Ok(())
    }
}

fn check_point(field: &str, point: &GeoPoint) -> FreightResult<()> {
    let valid = point.lat.is_finite()
        && point.lng.is_finite()
        && (-90.0..=90.0).contains(&point.lat)
        && (-180.0..=180.0).contains(&point.lng);
    if valid {
        Ok(())
    } else {
        Err(FreightError::input(format!("{field} is not a valid coordinate")))
    }
}

fn check_positive(field: &str, value: f64) -> FreightResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FreightError::input(format!("{field} must be positive, got {value}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchMetadata {
    pub mode: SearchMode,
    pub scanned_loads: usize,
    pub average_market_rate: f64,
    pub trace_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    pub direct_loads: Vec<LoadWithScore>,
    pub chains: Vec<LoadChain>,
    pub round_trips: Vec<RoundTrip>,
    pub regions: Vec<RegionSummary>,
    pub recommendation: MarketInsight,
    pub metadata: SearchMetadata,
}

#[derive(Default)]
struct Found {
    direct_loads: Vec<LoadWithScore>,
    chains: Vec<LoadChain>,
    round_trips: Vec<RoundTrip>,
    regions: Vec<RegionSummary>,
    stats: ScanStats,
}

/// Inputs resolved from the request and the driver record.
struct Resolved {
    origin: GeoPoint,
    destination: Option<GeoPoint>,
    driver_location: GeoPoint,
    equipment: Option<Equipment>,
    min_rate: Option<f64>,
    driver: Option<Driver>,
}

pub struct SearchService<S> {
    store: Arc<S>,
}

impl<S: FreightStore> SearchService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn search(
        &self,
        ctx: &RequestContext,
        request: &SearchRequest,
    ) -> Result<SearchResponse, Failure> {
        self.run(ctx, request).map_err(|e| ctx.fail(e))
    }

    fn run(&self, ctx: &RequestContext, request: &SearchRequest) -> FreightResult<SearchResponse> {
        request.validate()?;
        let resolved = self.resolve(request)?;
        tracing::info!(trace_id = %ctx.trace_id, mode = %request.mode, "search started");

        let found = match request.mode {
            SearchMode::OneWay => self.one_way(ctx, &resolved)?,
            SearchMode::CorridorChain => self.corridor_chain(ctx, &resolved)?,
            SearchMode::OpenEnded => self.open_ended(ctx, request, &resolved)?,
            SearchMode::Backhaul => self.backhaul(ctx, &resolved)?,
            SearchMode::RoundTrip => self.round_trip(ctx, &resolved)?,
        };

        let recommendation = market_insight(
            found.direct_loads.first(),
            found.chains.first(),
            found.stats,
            ctx.config.search.savings_threshold,
        );
        tracing::info!(
            trace_id = %ctx.trace_id,
            mode = %request.mode,
            direct = found.direct_loads.len(),
            chains = found.chains.len(),
            round_trips = found.round_trips.len(),
            regions = found.regions.len(),
            "search finished"
        );

        Ok(SearchResponse {
            metadata: SearchMetadata {
                mode: request.mode,
                scanned_loads: recommendation.scanned_loads,
                average_market_rate: recommendation.average_market_rate,
                trace_id: ctx.trace_id.clone(),
            },
            direct_loads: found.direct_loads,
            chains: found.chains,
            round_trips: found.round_trips,
            regions: found.regions,
            recommendation,
        })
    }

    fn resolve(&self, request: &SearchRequest) -> FreightResult<Resolved> {
        let driver = match &request.driver_id {
            Some(id) => Some(
                self.store
                    .get_driver(id)?
                    .ok_or_else(|| FreightError::not_found("driver", id))?,
            ),
            None => None,
        };
        let origin = request
            .origin
            .ok_or_else(|| FreightError::input("origin is required"))?;

        Ok(Resolved {
            origin,
            destination: request.destination,
            driver_location: driver.as_ref().map_or(origin, |d| d.current_location),
            equipment: request.equipment.or(driver.as_ref().map(|d| d.equipment)),
            min_rate: request.min_rate.or(driver.as_ref().map(|d| d.min_rate)),
            driver,
        })
    }

    fn destination(resolved: &Resolved) -> FreightResult<GeoPoint> {
        resolved
            .destination
            .ok_or_else(|| FreightError::input("destination is required"))
    }

    fn direct(
        &self,
        ctx: &RequestContext,
        resolved: &Resolved,
    ) -> FreightResult<(Vec<LoadWithScore>, ScanStats)> {
        let query = DirectQuery {
            origin: resolved.origin,
            destination: Self::destination(resolved)?,
            driver_location: resolved.driver_location,
            equipment: resolved.equipment,
            min_rate: resolved.min_rate,
        };
        direct_search(ctx, self.store.as_ref(), &query)
    }

    fn chains(
        &self,
        ctx: &RequestContext,
        resolved: &Resolved,
    ) -> FreightResult<(Vec<LoadChain>, ScanStats)> {
        let query = ChainQuery {
            origin: resolved.origin,
            destination: Self::destination(resolved)?,
            driver_location: resolved.driver_location,
            equipment: resolved.equipment,
            min_rate: resolved.min_rate,
        };
        chain::chain_search(ctx, self.store.as_ref(), &query)
    }

    fn one_way(&self, ctx: &RequestContext, resolved: &Resolved) -> FreightResult<Found> {
        let (direct_loads, stats) = self.direct(ctx, resolved)?;
        let good_enough = direct_loads
            .first()
            .is_some_and(|best| best.trip_score >= ctx.config.search.direct_score_threshold);
        if good_enough {
            return Ok(Found {
                direct_loads,
                stats,
                ..Found::default()
            });
        }

        let (chains, chain_stats) = self.chains(ctx, resolved)?;
        Ok(Found {
            direct_loads,
            chains,
            stats: stats.merge(chain_stats),
            ..Found::default()
        })
    }

    fn corridor_chain(&self, ctx: &RequestContext, resolved: &Resolved) -> FreightResult<Found> {
        let (chains, stats) = self.chains(ctx, resolved)?;
        Ok(Found {
            chains,
            stats,
            ..Found::default()
        })
    }

    fn open_ended(
        &self,
        ctx: &RequestContext,
        request: &SearchRequest,
        resolved: &Resolved,
    ) -> FreightResult<Found> {
        let search = &ctx.config.search;
        let max_deadhead = request
            .max_deadhead_miles
            .or(resolved
                .driver
                .as_ref()
                .and_then(|d| d.preferences.max_deadhead_miles))
            .unwrap_or(search.default_max_deadhead_miles);
        let avoided: &[String] = resolved
            .driver
            .as_ref()
            .map(|d| d.preferences.avoided_regions.as_slice())
            .unwrap_or_default();

        let filter = LoadFilter::new(search.scan_cap)
            .origin_within(resolved.origin, max_deadhead)
            .equipment(resolved.equipment)
            .min_rate(resolved.min_rate);
        let loads = self.store.list_available(&filter)?;
        let stats = ScanStats::from_loads(&loads);

        let mut scored: Vec<LoadWithScore> = loads
            .iter()
            .filter(|load| !avoided.contains(&load.destination_region))
            .map(|load| scoring::score_load(load, &resolved.driver_location, search.market_band))
            .collect();
        scoring::sort_by_score(&mut scored);

        // scored is sorted, so the first load seen per region is its best
        let mut groups: BTreeMap<&str, Vec<&LoadWithScore>> = BTreeMap::new();
        for load in &scored {
            groups
                .entry(load.load.destination_region.as_str())
                .or_default()
                .push(load);
        }
        let mut regions: Vec<RegionSummary> = groups
            .into_iter()
            .map(|(region, loads)| RegionSummary {
                region: region.to_string(),
                load_count: loads.len(),
                average_trip_score: loads.iter().map(|l| l.trip_score).sum::<f64>()
                    / loads.len() as f64,
                best: loads[0].clone(),
            })
            .collect();
        regions.sort_by(|a, b| {
            b.average_trip_score
                .total_cmp(&a.average_trip_score)
                .then(b.load_count.cmp(&a.load_count))
                .then_with(|| a.region.cmp(&b.region))
        });

        scored.truncate(search.max_results);
        Ok(Found {
            direct_loads: scored,
            regions,
            stats,
            ..Found::default()
        })
    }

    fn backhaul(&self, ctx: &RequestContext, resolved: &Resolved) -> FreightResult<Found> {
        let search = &ctx.config.search;
        let Some(driver) = resolved.driver.as_ref() else {
            return Err(FreightError::input("backhaul search needs a driver id"));
        };
        let home = driver.home_base;
        let current = driver.current_location;

        let filter = LoadFilter::new(search.scan_cap)
            .origin_within(current, search.radius_miles)
            .destination_within(home, search.home_radius_miles)
            .equipment(resolved.equipment)
            .min_rate(resolved.min_rate);
        let loads = self.store.list_available(&filter)?;
        let stats = ScanStats::from_loads(&loads);

        if !loads.is_empty() {
            let mut direct_loads: Vec<LoadWithScore> = loads
                .iter()
                .map(|load| scoring::score_load(load, &resolved.driver_location, search.market_band))
                .collect();
            scoring::sort_by_score(&mut direct_loads);
            return Ok(Found {
                direct_loads,
                stats,
                ..Found::default()
            });
        }

        // no straight shot home: try one triangle via an intermediate drop
        let pool_filter = LoadFilter::new(search.scan_cap)
            .equipment(resolved.equipment)
            .min_rate(resolved.min_rate);
        let pool = self.store.list_available(&pool_filter)?;
        let stats = stats.merge(ScanStats::from_loads(&pool));

        let mut best: Option<LoadChain> = None;
        let first_legs = pool.iter().filter(|load| {
            load.origin.within(&current, search.radius_miles)
                && is_toward(&load.origin, &load.destination, &home, search.backhaul_toward_factor)
        });
        for first in first_legs {
            let second_legs = pool.iter().filter(|load| {
                load.id != first.id
                    && load.origin.within(&first.destination, search.radius_miles)
                    && load.destination.within(&home, search.home_radius_miles)
            });
            for second in second_legs {
                let candidate =
                    chain_from_legs(resolved.driver_location, &[first, second], search.market_band);
                let better = best
                    .as_ref()
                    .is_none_or(|b| compare_chains(&candidate, b).is_lt());
                if better {
                    best = Some(candidate);
                }
            }
        }

        tracing::debug!(trace_id = %ctx.trace_id, found = best.is_some(), "backhaul triangle");
        Ok(Found {
            chains: best.into_iter().collect(),
            stats,
            ..Found::default()
        })
    }

    fn round_trip(&self, ctx: &RequestContext, resolved: &Resolved) -> FreightResult<Found> {
        let search = &ctx.config.search;
        let destination = Self::destination(resolved)?;
        let (outbound, stats) = self.direct(ctx, resolved)?;

        let return_filter = LoadFilter::new(search.scan_cap)
            .origin_within(destination, search.radius_miles)
            .destination_within(resolved.origin, search.radius_miles)
            .equipment(resolved.equipment)
            .min_rate(resolved.min_rate);
        let returns = self.store.list_available(&return_filter)?;
        let stats = stats.merge(ScanStats::from_loads(&returns));

        let mut round_trips = Vec::new();
        for out in &outbound {
            for ret in returns.iter().filter(|ret| ret.id != out.load.id) {
                let deadhead = distance_miles(&out.load.destination, &ret.origin);
                let inbound = scoring::score_with_deadhead(ret, deadhead, search.market_band);
                let total_revenue = out.total_revenue + inbound.total_revenue;
                let total_miles = out.load.distance_miles
                    + out.deadhead_miles
                    + inbound.load.distance_miles
                    + inbound.deadhead_miles;
                let revenue_per_mile = if total_miles > 0.0 {
                    total_revenue / total_miles
                } else {
                    0.0
                };
                round_trips.push(RoundTrip {
                    outbound: out.clone(),
                    inbound,
                    total_revenue,
                    total_miles,
                    revenue_per_mile,
                });
            }
        }
        round_trips.sort_by(|a, b| {
            b.revenue_per_mile
                .total_cmp(&a.revenue_per_mile)
                .then(b.total_revenue.total_cmp(&a.total_revenue))
        });
        round_trips.truncate(search.max_results);

        Ok(Found {
            direct_loads: outbound,
            round_trips,
            stats,
            ..Found::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes() {
        assert_eq!("ONE_WAY".parse::<SearchMode>().unwrap(), SearchMode::OneWay);
        assert_eq!("round-trip".parse::<SearchMode>().unwrap(), SearchMode::RoundTrip);
        assert!(matches!(
            "teleport".parse::<SearchMode>(),
            Err(FreightError::ClientInput(_))
        ));
        assert!("".parse::<SearchMode>().is_err());
    }

    #[test]
    fn destination_rules() {
        let origin = GeoPoint::new(32.7, -96.8);
        assert!(SearchRequest::new(SearchMode::OneWay).starting_at(origin).validate().is_err());
        assert!(SearchRequest::new(SearchMode::CorridorChain).starting_at(origin).validate().is_err());
        assert!(SearchRequest::new(SearchMode::RoundTrip).starting_at(origin).validate().is_err());
        assert!(SearchRequest::new(SearchMode::OpenEnded).starting_at(origin).validate().is_ok());
        assert!(SearchRequest::new(SearchMode::Backhaul).starting_at(origin).validate().is_err());
        assert!(
            SearchRequest::new(SearchMode::Backhaul)
                .starting_at(origin)
                .for_driver("drv_1")
                .validate()
                .is_ok()
        );
        assert!(SearchRequest::new(SearchMode::OpenEnded).validate().is_err());
    }

    #[test]
    fn rejects_bad_numbers() {
        let req = SearchRequest::new(SearchMode::OpenEnded)
            .starting_at(GeoPoint::new(32.7, -96.8))
            .set_max_deadhead(-5.0);
        assert!(req.validate().is_err());
        let req = SearchRequest::new(SearchMode::OpenEnded).starting_at(GeoPoint::new(132.7, -96.8));
        assert!(req.validate().is_err());
    }
}
