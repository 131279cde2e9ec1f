//! Rule-based stand-in for a broker answering driver offers
use crate::offer::BrokerReply;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrokerInput {
    pub driver_offer: f64,
    pub posted_rate: f64,
    pub market_rate_avg: f64,
    pub round: u32,
    pub max_rounds: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BrokerAction {
    Accept,
    Counter { offer: f64 },
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrokerResponse {
    pub action: BrokerAction,
    /// How long the broker would take to answer.
    pub delay: Duration,
}

impl BrokerResponse {
    /// The response as a reply the negotiation service understands.
    /// Accepting the driver's offer is expressed as countering at that offer.
    pub fn to_reply(&self, input: &BrokerInput) -> BrokerReply {
        match self.action {
            BrokerAction::Accept => BrokerReply::amount(input.driver_offer),
            BrokerAction::Counter { offer } => BrokerReply::amount(offer),
            BrokerAction::Reject => BrokerReply::declined(self.prose(input)),
        }
    }

    /// Broker-style email text carrying a `$X.XX/mile` token.
    pub fn prose(&self, input: &BrokerInput) -> String {
        match self.action {
            BrokerAction::Accept => format!(
                "Deal. We can confirm ${:.2}/mile, rate con coming over shortly.",
                input.driver_offer
            ),
            BrokerAction::Counter { offer } => format!(
                "Appreciate the interest. Best I can do on this one is ${offer:.2}/mile."
            ),
            BrokerAction::Reject => format!(
                "Sorry, ${:.2}/mile is way over what the shipper pays. We'll pass.",
                input.driver_offer
            ),
        }
    }

    /// Like [`to_reply`](Self::to_reply) but free text only, so the
    /// extraction path gets used.
    pub fn to_prose_reply(&self, input: &BrokerInput) -> BrokerReply {
        match self.action {
            BrokerAction::Reject => BrokerReply::declined(self.prose(input)),
            _ => BrokerReply::message(self.prose(input)),
        }
    }
}

pub struct BrokerSimulator {
    rng: StdRng,
}

impl BrokerSimulator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn respond(&mut self, input: &BrokerInput) -> BrokerResponse {
        let action = self.decide(input);
        let (lo, hi) = match action {
            BrokerAction::Accept => (5, 45),
            BrokerAction::Counter { .. } => (30, 120),
            BrokerAction::Reject => (10, 60),
        };
        let delay = Duration::from_secs(self.rng.gen_range(lo..=hi));
        tracing::debug!(?input, ?action, ?delay, "simulated broker response");
        BrokerResponse { action, delay }
    }

    fn decide(&mut self, input: &BrokerInput) -> BrokerAction {
        let offer = input.driver_offer;
        let posted = input.posted_rate;
        let midpoint = BrokerAction::Counter {
            offer: (offer + posted) / 2.0,
        };

        if input.round >= input.max_rounds || offer <= posted {
            return BrokerAction::Accept;
        }
        if offer <= posted * 1.15 {
            return midpoint;
        }
        if offer <= input.market_rate_avg * 1.05 {
            // patience runs out round by round
            let p = (0.8 - 0.1 * input.round.saturating_sub(1) as f64).max(0.0);
            return if self.rng.gen_bool(p) {
                BrokerAction::Accept
            } else {
                BrokerAction::Counter {
                    offer: posted * 0.95,
                }
            };
        }
        if offer > input.market_rate_avg * 1.15 {
            return BrokerAction::Reject;
        }
        midpoint
    }
}

impl Default for BrokerSimulator {
    fn default() -> Self {
        Self::new()
    }
}
