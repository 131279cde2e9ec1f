//! Shared fixtures for the integration tests
//!
//! Every test gets its own sled database in a temp dir; sled locks the
//! directory, so stores are never shared between tests.
#![allow(dead_code)]

use freight_match::{
    config::Config,
    context::RequestContext,
    geo::{GeoPoint, distance_miles},
    store::{DriverRepository, LoadRepository, SledStore},
    types::{
        BrokerContact, Driver, DriverPreferences, Equipment, Load, LoadStatus, MarketRate,
    },
};
use std::sync::Arc;
use tempfile::TempDir;

pub const DALLAS: GeoPoint = GeoPoint::new(32.7767, -96.7970);
pub const HOUSTON: GeoPoint = GeoPoint::new(29.7604, -95.3698);
pub const WACO: GeoPoint = GeoPoint::new(31.5493, -97.1467);
pub const AUSTIN: GeoPoint = GeoPoint::new(30.2672, -97.7431);
pub const SAN_ANTONIO: GeoPoint = GeoPoint::new(29.4241, -98.4936);
pub const SHREVEPORT: GeoPoint = GeoPoint::new(32.5252, -93.7502);
pub const JACKSON: GeoPoint = GeoPoint::new(32.2988, -90.1848);
pub const BIRMINGHAM: GeoPoint = GeoPoint::new(33.5186, -86.8104);
pub const ATLANTA: GeoPoint = GeoPoint::new(33.7490, -84.3880);
pub const OKLAHOMA_CITY: GeoPoint = GeoPoint::new(35.4676, -97.5164);

/// The store is returned with the temp dir that owns its files; keep both
/// alive for the length of the test.
pub fn temp_store(name: &str) -> anyhow::Result<(TempDir, Arc<SledStore>)> {
    let dir = tempfile::tempdir()?;
    let store = SledStore::open(dir.path().join(format!("{name}.db")))?;
    Ok((dir, Arc::new(store)))
}

pub fn ctx() -> RequestContext {
    RequestContext::new(Config::default())
}

pub fn load(id: &str, origin: GeoPoint, destination: GeoPoint, posted_rate: f64) -> Load {
    Load {
        id: id.to_string(),
        origin,
        destination,
        origin_region: region_of(&origin),
        destination_region: region_of(&destination),
        distance_miles: distance_miles(&origin, &destination),
        equipment: Equipment::DryVan,
        posted_rate,
        market: MarketRate {
            avg: 2.84,
            high: 3.20,
            low: 2.40,
        },
        broker: BrokerContact {
            name: "Pat Broker".into(),
            email: "pat@brokerage.test".into(),
        },
        status: LoadStatus::Available,
    }
}

pub fn with_equipment(mut load: Load, equipment: Equipment) -> Load {
    load.equipment = equipment;
    load
}

pub fn with_market(mut load: Load, avg: f64) -> Load {
    load.market = MarketRate {
        avg,
        high: avg * 1.1,
        low: avg * 0.9,
    };
    load
}

pub fn with_status(mut load: Load, status: LoadStatus) -> Load {
    load.status = status;
    load
}

fn region_of(point: &GeoPoint) -> String {
    let named = [
        (DALLAS, "Dallas, TX"),
        (HOUSTON, "Houston, TX"),
        (WACO, "Waco, TX"),
        (AUSTIN, "Austin, TX"),
        (SAN_ANTONIO, "San Antonio, TX"),
        (SHREVEPORT, "Shreveport, LA"),
        (JACKSON, "Jackson, MS"),
        (BIRMINGHAM, "Birmingham, AL"),
        (ATLANTA, "Atlanta, GA"),
        (OKLAHOMA_CITY, "Oklahoma City, OK"),
    ];
    named
        .iter()
        .find(|(p, _)| p.within(point, 10.0))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("{:.2},{:.2}", point.lat, point.lng))
}

pub fn driver(id: &str, at: GeoPoint, min_rate: f64) -> Driver {
    Driver {
        id: id.to_string(),
        name: "Sam Trucker".into(),
        email: "sam@owner-op.test".into(),
        home_base: at,
        current_location: at,
        min_rate,
        equipment: Equipment::DryVan,
        preferences: DriverPreferences::default(),
    }
}

pub fn seed(store: &SledStore, loads: &[Load]) -> anyhow::Result<()> {
    for load in loads {
        store.put_load(load)?;
    }
    Ok(())
}

pub fn seed_driver(store: &SledStore, driver: &Driver) -> anyhow::Result<()> {
    store.put_driver(driver)?;
    Ok(())
}
