//! Seeds a throwaway store, searches the Dallas to Atlanta corridor and
//! negotiates the first leg of the best chain against the simulated broker.
//!
//! cargo run --example negotiate

use anyhow::Context;
use freight_match::{
    Config, NegotiationService, RequestContext, SearchMode, SearchRequest, SearchService,
    SledStore, StartNegotiation, TurnOutcome,
    collaborators::{LogDispatcher, TemplateDrafter},
    geo::{GeoPoint, distance_miles},
    logging,
    negotiation::Strategy,
    simulator::{BrokerInput, BrokerSimulator},
    store::{DriverRepository, LoadRepository},
    types::{
        BrokerContact, Driver, DriverPreferences, Equipment, Load, LoadStatus, MarketRate,
    },
    utils,
};
use std::sync::Arc;

const DALLAS: GeoPoint = GeoPoint::new(32.7767, -96.7970);
const SHREVEPORT: GeoPoint = GeoPoint::new(32.5252, -93.7502);
const JACKSON: GeoPoint = GeoPoint::new(32.2988, -90.1848);
const ATLANTA: GeoPoint = GeoPoint::new(33.7490, -84.3880);

fn load(
    from: (&str, GeoPoint),
    to: (&str, GeoPoint),
    posted_rate: f64,
    market_avg: f64,
) -> anyhow::Result<Load> {
    Ok(Load {
        id: utils::new_id("load_")?,
        origin: from.1,
        destination: to.1,
        origin_region: from.0.into(),
        destination_region: to.0.into(),
        distance_miles: distance_miles(&from.1, &to.1),
        equipment: Equipment::DryVan,
        posted_rate,
        market: MarketRate {
            avg: market_avg,
            high: market_avg * 1.12,
            low: market_avg * 0.88,
        },
        broker: BrokerContact {
            name: "Riley at Lone Star Logistics".into(),
            email: "riley@lonestar.example".into(),
        },
        status: LoadStatus::Available,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing(Some("info"));
    let config = Config::from_env().context("reading configuration")?;

    let dir = tempfile::tempdir().context("creating temp dir")?;
    let store = Arc::new(SledStore::open(dir.path().join("demo.db")).context("opening store")?);

    let board = [
        load(("Dallas, TX", DALLAS), ("Atlanta, GA", ATLANTA), 2.05, 2.40)?,
        load(("Dallas, TX", DALLAS), ("Shreveport, LA", SHREVEPORT), 2.70, 2.84)?,
        load(("Shreveport, LA", SHREVEPORT), ("Jackson, MS", JACKSON), 2.75, 2.80)?,
        load(("Jackson, MS", JACKSON), ("Atlanta, GA", ATLANTA), 2.90, 2.85)?,
    ];
    for l in &board {
        store.put_load(l)?;
    }
    let driver = Driver {
        id: utils::new_id("drv_")?,
        name: "Jordan Reyes".into(),
        email: "jordan@owner-op.example".into(),
        home_base: DALLAS,
        current_location: DALLAS,
        min_rate: 2.97,
        equipment: Equipment::DryVan,
        preferences: DriverPreferences::default(),
    };
    store.put_driver(&driver)?;

    let search = SearchService::new(store.clone());
    let ctx = RequestContext::new(config.clone());
    let request = SearchRequest::new(SearchMode::OneWay)
        .starting_at(DALLAS)
        .going_to(ATLANTA)
        .for_driver(driver.id.clone())
        // posted rates sit under the driver's floor
        .set_min_rate(2.0);
    let found = search.search(&ctx, &request)?;
    println!("{}", found.recommendation.summary);

    let first_leg = found
        .chains
        .first()
        .and_then(|chain| chain.legs.first())
        .or_else(|| found.direct_loads.first())
        .context("nothing to negotiate")?
        .load
        .clone();
    println!(
        "negotiating {} -> {} (posted ${:.2}/mile)",
        first_leg.origin_region, first_leg.destination_region, first_leg.posted_rate
    );

    let negotiations = NegotiationService::new(
        store.clone(),
        Arc::new(TemplateDrafter),
        Arc::new(LogDispatcher),
    );
    let mut broker = BrokerSimulator::seeded(2024);
    let ctx = RequestContext::new(config);
    let mut negotiation = negotiations
        .start(
            &ctx,
            StartNegotiation::new(first_leg.id.clone(), driver.id.clone(), Strategy::Moderate),
        )
        .await?;

    while !negotiation.is_terminal() {
        let ask = negotiation.last_offer().context("negotiation has no offers")?;
        let input = BrokerInput {
            driver_offer: ask.amount,
            posted_rate: negotiation.posted_rate,
            market_rate_avg: negotiation.market_rate,
            round: negotiation.current_round + 1,
            max_rounds: negotiation.max_rounds,
        };
        let response = broker.respond(&input);
        println!(
            "round {}: broker answers after {:?}: {}",
            input.round,
            response.delay,
            response.prose(&input)
        );

        let reply = response.to_prose_reply(&input);
        let turn_ctx = RequestContext::new(ctx.config.clone());
        let turn = negotiations
            .broker_response(&turn_ctx, &negotiation.id, &reply)
            .await?;
        match &turn.outcome {
            TurnOutcome::Countered { offer } => {
                println!("round {}: driver counters at ${:.2}/mile", offer.round, offer.amount)
            }
            TurnOutcome::Accepted { booking } => {
                println!("booked {} at ${:.2}/mile", booking.id, booking.final_rate)
            }
            TurnOutcome::WalkedAway => println!("driver walked away"),
            TurnOutcome::Rejected => println!("broker passed"),
        }
        negotiation = turn.negotiation;
    }

    store.flush()?;
    Ok(())
}
