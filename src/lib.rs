//! Trip discovery and broker rate negotiation for owner-operator truck drivers.
//!
//! Search ranks available loads for a driver (direct loads, multi-leg
//! corridor chains, backhauls, round trips) and negotiation runs a bounded
//! round-by-round rate exchange with a broker, ending in an atomic booking.

pub mod booking;
pub mod chain;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod direct;
pub mod error;
pub mod geo;
pub mod insight;
pub mod logging;
pub mod negotiation;
pub mod offer;
pub mod router;
pub mod scoring;
pub mod service;
pub mod simulator;
pub mod store;
pub mod types;
pub mod utils;

pub use config::Config;
pub use context::RequestContext;
pub use error::{Failure, FreightError, FreightResult};
pub use router::{SearchMode, SearchRequest, SearchResponse, SearchService};
pub use service::{NegotiationService, StartNegotiation, Turn, TurnOutcome};
pub use store::SledStore;
