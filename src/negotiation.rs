//! Negotiation record and its round-by-round state machine
use crate::error::{FreightError, FreightResult};
use crate::types::{BrokerContact, Load, TimeStamp};
use chrono::Utc;
use std::fmt;
use std::str::FromStr;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationStatus {
    #[n(0)]
    InProgress,
    #[n(1)]
    Accepted,
    #[n(2)]
    Rejected,
    #[n(3)]
    WalkedAway,
}

impl NegotiationStatus {
    pub fn is_terminal(self) -> bool {
        self != Self::InProgress
    }

    pub fn can_transition(self, next: NegotiationStatus) -> bool {
        use NegotiationStatus::*;
        matches!(
            (self, next),
            (InProgress, Accepted) | (InProgress, Rejected) | (InProgress, WalkedAway)
        )
    }
}

impl fmt::Display for NegotiationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InProgress => "in_progress",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::WalkedAway => "walked_away",
        };
        f.write_str(s)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    #[n(0)]
    Aggressive,
    #[n(1)]
    Moderate,
    #[n(2)]
    Conservative,
}

impl FromStr for Strategy {
    type Err = FreightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aggressive" => Ok(Self::Aggressive),
            "moderate" => Ok(Self::Moderate),
            "conservative" => Ok(Self::Conservative),
            other => Err(FreightError::input(format!("unknown strategy {other:?}"))),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Aggressive => "aggressive",
            Self::Moderate => "moderate",
            Self::Conservative => "conservative",
        };
        f.write_str(s)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    #[n(0)]
    Driver,
    #[n(1)]
    Broker,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Offer {
    #[n(0)]
    pub round: u32,
    #[n(1)]
    pub amount: f64, // $/mile
    #[n(2)]
    pub sender: Sender,
    #[n(3)]
    pub timestamp: TimeStamp<Utc>,
    #[n(4)]
    pub rationale: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Negotiation {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub load_id: String,
    #[n(2)]
    pub driver_id: String,
    #[n(3)]
    pub broker: BrokerContact,
    #[n(4)]
    pub driver_min_rate: f64,
    #[n(5)]
    pub market_rate: f64,
    #[n(6)]
    pub posted_rate: f64,
    #[n(7)]
    pub max_rounds: u32,
    #[n(8)]
    pub current_round: u32,
    #[n(9)]
    pub strategy: Strategy,
    #[n(10)]
    pub status: NegotiationStatus,
    #[n(11)]
    pub offers: Vec<Offer>, // append-only
    #[n(12)]
    pub booking_id: Option<String>,
    #[n(13)]
    pub created_at: TimeStamp<Utc>,
    #[n(14)]
    pub updated_at: TimeStamp<Utc>,
}

/// What the driver side does with a broker counter-offer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Accept { final_rate: f64 },
    Counter { round: u32, amount: f64 },
    WalkAway,
}

pub struct OpenNegotiation<'a> {
    pub id: String,
    pub load: &'a Load,
    pub driver_id: String,
    pub broker: BrokerContact,
    pub driver_min_rate: f64,
    pub max_rounds: u32,
    pub strategy: Strategy,
    pub opening_rationale: String,
}

impl Negotiation {
    /// A fresh negotiation at round 1 holding the driver's opening offer.
    pub fn open(params: OpenNegotiation<'_>, now: TimeStamp<Utc>) -> Self {
        let opening = Offer {
            round: 1,
            amount: params.driver_min_rate,
            sender: Sender::Driver,
            timestamp: now.clone(),
            rationale: params.opening_rationale,
        };

        Self {
            id: params.id,
            load_id: params.load.id.clone(),
            driver_id: params.driver_id,
            broker: params.broker,
            driver_min_rate: params.driver_min_rate,
            market_rate: params.load.market.avg,
            posted_rate: params.load.posted_rate,
            max_rounds: params.max_rounds,
            current_round: 1,
            strategy: params.strategy,
            status: NegotiationStatus::InProgress,
            offers: vec![opening],
            booking_id: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn last_offer(&self) -> Option<&Offer> {
        self.offers.last()
    }

    pub fn transition(&mut self, next: NegotiationStatus) -> FreightResult<()> {
        if !self.status.can_transition(next) {
            return Err(FreightError::conflict(format!(
                "negotiation {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Appends an offer at the next round. Rounds only move forward.
    pub fn record_offer(
        &mut self,
        sender: Sender,
        amount: f64,
        rationale: String,
        now: TimeStamp<Utc>,
    ) -> FreightResult<u32> {
        if self.is_terminal() {
            return Err(FreightError::conflict(format!(
                "negotiation {} is already {}",
                self.id, self.status
            )));
        }
        let round = self.current_round + 1;
        if self.offers.last().is_some_and(|last| last.round >= round) {
            return Err(FreightError::internal(format!(
                "offer history of {} is ahead of its round counter",
                self.id
            )));
        }

        self.offers.push(Offer {
            round,
            amount,
            sender,
            timestamp: now.clone(),
            rationale,
        });
        self.current_round = round;
        self.updated_at = now;
        Ok(round)
    }

    /// Decide on a broker counter that has just been recorded.
    pub fn decide(&self, counter: f64) -> Decision {
        if counter >= self.driver_min_rate {
            Decision::Accept {
                final_rate: counter,
            }
        } else if self.current_round < self.max_rounds {
            Decision::Counter {
                round: self.current_round + 1,
                amount: self.driver_min_rate,
            }
        } else {
            Decision::WalkAway
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::types::{Equipment, LoadStatus, MarketRate};

    fn load() -> Load {
        Load {
            id: "load_1".into(),
            origin: GeoPoint::new(32.77, -96.79),
            destination: GeoPoint::new(29.76, -95.36),
            origin_region: "Dallas, TX".into(),
            destination_region: "Houston, TX".into(),
            distance_miles: 240.0,
            equipment: Equipment::DryVan,
            posted_rate: 2.70,
            market: MarketRate {
                avg: 2.84,
                high: 3.10,
                low: 2.50,
            },
            broker: BrokerContact {
                name: "Lane Logistics".into(),
                email: "ops@lane.example".into(),
            },
            status: LoadStatus::Available,
        }
    }

    fn negotiation(max_rounds: u32) -> Negotiation {
        let load = load();
        Negotiation::open(
            OpenNegotiation {
                id: "neg_1".into(),
                load: &load,
                driver_id: "drv_1".into(),
                broker: load.broker.clone(),
                driver_min_rate: 3.00,
                max_rounds,
                strategy: Strategy::Moderate,
                opening_rationale: "opening".into(),
            },
            TimeStamp::new(),
        )
    }

    #[test]
    fn opens_at_round_one_with_driver_offer() {
        let n = negotiation(4);
        assert_eq!(n.current_round, 1);
        assert_eq!(n.status, NegotiationStatus::InProgress);
        assert_eq!(n.offers.len(), 1);
        assert_eq!(n.offers[0].sender, Sender::Driver);
        assert_eq!(n.offers[0].amount, 3.00);
    }

    #[test]
    fn decide_follows_round_budget() {
        let mut n = negotiation(4);
        n.record_offer(Sender::Broker, 2.80, "".into(), TimeStamp::new())
            .unwrap();
        assert_eq!(
            n.decide(2.80),
            Decision::Counter {
                round: 3,
                amount: 3.00
            }
        );
        assert_eq!(n.decide(3.05), Decision::Accept { final_rate: 3.05 });

        n.record_offer(Sender::Driver, 3.00, "".into(), TimeStamp::new())
            .unwrap();
        n.record_offer(Sender::Broker, 2.90, "".into(), TimeStamp::new())
            .unwrap();
        assert_eq!(n.current_round, 4);
        assert_eq!(n.decide(2.90), Decision::WalkAway);
    }

    #[test]
    fn terminal_states_are_final() {
        let mut n = negotiation(4);
        n.transition(NegotiationStatus::WalkedAway).unwrap();
        for next in [
            NegotiationStatus::InProgress,
            NegotiationStatus::Accepted,
            NegotiationStatus::Rejected,
            NegotiationStatus::WalkedAway,
        ] {
            assert!(n.clone().transition(next).is_err());
        }
        assert!(
            n.record_offer(Sender::Broker, 3.0, "".into(), TimeStamp::new())
                .is_err()
        );
    }

    #[test]
    fn rounds_strictly_increase() {
        let mut n = negotiation(6);
        for i in 0..4 {
            let sender = if i % 2 == 0 {
                Sender::Broker
            } else {
                Sender::Driver
            };
            n.record_offer(sender, 2.9, "".into(), TimeStamp::new())
                .unwrap();
        }
        assert!(n.offers.windows(2).all(|w| w[0].round < w[1].round));
    }

    #[test]
    fn cbor_roundtrip_keeps_history() {
        let mut n = negotiation(4);
        n.record_offer(Sender::Broker, 2.85, "counter".into(), TimeStamp::new())
            .unwrap();
        let bytes = minicbor::to_vec(&n).unwrap();
        let decoded: Negotiation = minicbor::decode(&bytes).unwrap();
        assert_eq!(n, decoded);
    }
}
