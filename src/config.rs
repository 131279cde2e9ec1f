//! Tunable search and negotiation parameters
use crate::error::{FreightError, FreightResult};
use std::str::FromStr;
use std::time::Duration;

/// Longest corridor chain search will ever build.
pub const MAX_CHAIN_LEGS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Pickup/drop radius around requested points and between chained legs.
    pub radius_miles: f64,
    /// A leg must end closer than `factor × start distance` to the destination.
    pub toward_factor: f64,
    /// Backhaul first legs must shrink distance-to-home at least this much.
    pub backhaul_toward_factor: f64,
    /// Backhaul loads must land this close to home.
    pub home_radius_miles: f64,
    pub default_max_deadhead_miles: f64,
    pub max_chain_legs: usize,
    /// Chain search stops after visiting this many candidate legs.
    pub max_chain_expansions: usize,
    pub max_results: usize,
    /// Upper bound on loads read from the repository per scan.
    pub scan_cap: usize,
    /// ONE_WAY skips chain search when the best direct load scores this high.
    pub direct_score_threshold: f64,
    pub market_band: f64,
    pub savings_threshold: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            radius_miles: 75.0,
            toward_factor: 0.8,
            backhaul_toward_factor: 0.7,
            home_radius_miles: 100.0,
            default_max_deadhead_miles: 100.0,
            max_chain_legs: 3,
            max_chain_expansions: 10_000,
            max_results: 10,
            scan_cap: 500,
            direct_score_threshold: 7.0,
            market_band: 0.05,
            savings_threshold: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NegotiationConfig {
    pub default_max_rounds: u32,
    pub collaborator_timeout: Duration,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            default_max_rounds: 4,
            collaborator_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub search: SearchConfig,
    pub negotiation: NegotiationConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_radius_miles(mut self, miles: f64) -> Self {
        self.search.radius_miles = miles;
        self
    }
    pub fn set_toward_factor(mut self, factor: f64) -> Self {
        self.search.toward_factor = factor;
        self
    }
    /// Clamped to `1..=MAX_CHAIN_LEGS`.
    pub fn set_max_chain_legs(mut self, legs: usize) -> Self {
        self.search.max_chain_legs = legs.clamp(1, MAX_CHAIN_LEGS);
        self
    }
    pub fn set_scan_cap(mut self, cap: usize) -> Self {
        self.search.scan_cap = cap;
        self
    }
    /// At least one round.
    pub fn set_max_rounds(mut self, rounds: u32) -> Self {
        self.negotiation.default_max_rounds = rounds.max(1);
        self
    }
    pub fn set_collaborator_timeout(mut self, timeout: Duration) -> Self {
        self.negotiation.collaborator_timeout = timeout;
        self
    }

    /// Defaults overridden by `FREIGHT_*` variables, reading `.env` first.
    pub fn from_env() -> FreightResult<Self> {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> FreightResult<Self> {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "FREIGHT_SEARCH_RADIUS_MILES")? {
            config.search.radius_miles = v;
        }
        if let Some(v) = parse_var(&lookup, "FREIGHT_TOWARD_FACTOR")? {
            config.search.toward_factor = v;
        }
        if let Some(v) = parse_var(&lookup, "FREIGHT_MAX_CHAIN_LEGS")? {
            if !(1..=MAX_CHAIN_LEGS).contains(&v) {
                return Err(FreightError::input(format!(
                    "FREIGHT_MAX_CHAIN_LEGS must be between 1 and {MAX_CHAIN_LEGS}, got {v}"
                )));
            }
            config.search.max_chain_legs = v;
        }
        if let Some(v) = parse_var(&lookup, "FREIGHT_SCAN_CAP")? {
            config.search.scan_cap = v;
        }
        if let Some(v) = parse_var::<u32>(&lookup, "FREIGHT_MAX_ROUNDS")? {
            if v == 0 {
                return Err(FreightError::input("FREIGHT_MAX_ROUNDS must be at least 1"));
            }
            config.negotiation.default_max_rounds = v;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "FREIGHT_COLLABORATOR_TIMEOUT_SECS")? {
            config.negotiation.collaborator_timeout = Duration::from_secs(secs);
        }

        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> FreightResult<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| FreightError::input(format!("{key} has an invalid value {raw:?}"))),
    }
}
