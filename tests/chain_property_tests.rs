//! Property-based tests for corridor chain discovery
//!
//! Random load boards are generated inside a box around north Texas and the
//! Gulf states, then searched through an in-memory repository. Whatever the
//! board looks like, every chain returned must be a legal path.
//!
// These property tests cover:
//
// 1. Leg cap and unique load ids
// 2. Pickup continuity (each leg starts near where the last one dropped)
// 3. The toward rule on every leg
// 4. Totals: miles include every loaded mile, score stays in [0, 10]
// 5. Result ordering and truncation

use freight_match::{
    chain::{ChainQuery, chain_search, is_toward},
    config::Config,
    context::RequestContext,
    error::{FreightError, FreightResult},
    geo::{GeoPoint, distance_miles},
    store::{LoadFilter, LoadRepository},
    types::{BrokerContact, Equipment, Load, LoadStatus, MarketRate},
};
use proptest::prelude::*;
use std::collections::HashSet;

/// Read-only board held in memory.
struct Board(Vec<Load>);

impl LoadRepository for Board {
    fn list_available(&self, filter: &LoadFilter) -> FreightResult<Vec<Load>> {
        Ok(self
            .0
            .iter()
            .filter(|load| filter.matches(load))
            .take(filter.limit)
            .cloned()
            .collect())
    }

    fn get_load(&self, id: &str) -> FreightResult<Option<Load>> {
        Ok(self.0.iter().find(|load| load.id == id).cloned())
    }

    fn put_load(&self, _: &Load) -> FreightResult<()> {
        Err(FreightError::internal("board is read-only"))
    }

    fn update_load_status(
        &self,
        id: &str,
        _: &[LoadStatus],
        _: LoadStatus,
    ) -> FreightResult<Load> {
        Err(FreightError::conflict(format!("board is read-only ({id})")))
    }
}

const ORIGIN: GeoPoint = GeoPoint::new(32.7767, -96.7970);
const DESTINATION: GeoPoint = GeoPoint::new(33.7490, -84.3880);

fn point() -> impl Strategy<Value = GeoPoint> {
    (31.0..35.0f64, -98.0..-84.0f64).prop_map(|(lat, lng)| GeoPoint::new(lat, lng))
}

fn board(max_loads: usize) -> impl Strategy<Value = Vec<Load>> {
    prop::collection::vec((point(), point(), 1.8..3.6f64), 1..max_loads).prop_map(|legs| {
        legs.into_iter()
            .enumerate()
            .map(|(i, (origin, destination, posted_rate))| Load {
                id: format!("load_{i:02}"),
                origin,
                destination,
                origin_region: String::new(),
                destination_region: String::new(),
                distance_miles: distance_miles(&origin, &destination),
                equipment: Equipment::DryVan,
                posted_rate,
                market: MarketRate {
                    avg: 2.7,
                    high: 3.0,
                    low: 2.4,
                },
                broker: BrokerContact {
                    name: "broker".into(),
                    email: "broker@test".into(),
                },
                status: LoadStatus::Available,
            })
            .collect()
    })
}

fn query() -> ChainQuery {
    ChainQuery {
        origin: ORIGIN,
        destination: DESTINATION,
        driver_location: ORIGIN,
        equipment: None,
        min_rate: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn chains_are_legal_paths(loads in board(40)) {
        let ctx = RequestContext::new(Config::new().set_radius_miles(150.0));
        let search = &ctx.config.search;
        let (chains, stats) = chain_search(&ctx, &Board(loads.clone()), &query()).unwrap();

        prop_assert_eq!(stats.scanned, loads.len());
        prop_assert!(chains.len() <= search.max_results);

        for chain in &chains {
            prop_assert!(!chain.legs.is_empty() && chain.legs.len() <= search.max_chain_legs);

            let ids: HashSet<&str> = chain.load_ids().into_iter().collect();
            prop_assert_eq!(ids.len(), chain.legs.len());

            let mut pickup_near = ORIGIN;
            for leg in &chain.legs {
                prop_assert!(leg.load.origin.within(&pickup_near, search.radius_miles));
                prop_assert!(is_toward(&leg.load.origin, &leg.load.destination, &DESTINATION, search.toward_factor));
                pickup_near = leg.load.destination;
            }
            prop_assert!(pickup_near.within(&DESTINATION, search.radius_miles));

            let loaded: f64 = chain.legs.iter().map(|l| l.load.distance_miles).sum();
            prop_assert!(chain.total_miles + 1e-6 >= loaded);
            prop_assert!((0.0..=10.0).contains(&chain.chain_score));
        }

        prop_assert!(chains.windows(2).all(|w| w[0].chain_score >= w[1].chain_score));
    }

    // small boards, so the expansion budget never runs out before every
    // single-leg candidate has been seen
    #[test]
    fn a_shorter_cap_only_removes_chains(loads in board(15)) {
        let wide = RequestContext::new(Config::new().set_radius_miles(150.0));
        let narrow = RequestContext::new(Config::new().set_radius_miles(150.0).set_max_chain_legs(1));
        let board = Board(loads);

        let (singles, _) = chain_search(&narrow, &board, &query()).unwrap();
        prop_assert!(singles.iter().all(|c| c.legs.len() == 1));

        let (all, _) = chain_search(&wide, &board, &query()).unwrap();
        // the wider search can only add chains
        if let Some(best_single) = singles.first() {
            prop_assert!(!all.is_empty());
            prop_assert!(all[0].chain_score >= best_single.chain_score);
        }
    }
}
