//! Service layer API for the negotiation workflow
use crate::booking::{self, BookingRequest};
use crate::collaborators::{DraftContext, EmailDispatcher, TextGenerator};
use crate::context::RequestContext;
use crate::error::{Failure, FreightError, FreightResult};
use crate::negotiation::{
    Decision, Negotiation, NegotiationStatus, Offer, OpenNegotiation, Sender, Strategy,
};
use crate::offer::{BrokerReply, OfferExtractor, RateTokenExtractor, resolve_counter_offer};
use crate::store::{
    AcceptedNegotiation, DriverRepository, FreightStore, LoadRepository, NegotiationStore,
};
use crate::types::{Booking, BrokerContact, Load, LoadStatus, TimeStamp};
use crate::utils;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct StartNegotiation {
    pub load_id: String,
    pub driver_id: String,
    /// Defaults to the broker posting the load.
    pub broker: Option<BrokerContact>,
    pub strategy: Strategy,
    /// Defaults to the configured round budget.
    pub max_rounds: Option<u32>,
    /// Defaults to the driver's minimum rate.
    pub driver_min_rate: Option<f64>,
}

impl StartNegotiation {
    pub fn new(load_id: impl Into<String>, driver_id: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            load_id: load_id.into(),
            driver_id: driver_id.into(),
            broker: None,
            strategy,
            max_rounds: None,
            driver_min_rate: None,
        }
    }
    pub fn set_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = Some(rounds);
        self
    }
    pub fn set_min_rate(mut self, rate: f64) -> Self {
        self.driver_min_rate = Some(rate);
        self
    }
    pub fn set_broker(mut self, broker: BrokerContact) -> Self {
        self.broker = Some(broker);
        self
    }

    fn validate(&self) -> FreightResult<()> {
        if self.load_id.trim().is_empty() || self.driver_id.trim().is_empty() {
            return Err(FreightError::input("load id and driver id are required"));
        }
        if self.max_rounds == Some(0) {
            return Err(FreightError::input("max_rounds must be at least 1"));
        }
        if let Some(rate) = self.driver_min_rate {
            check_rate(rate)?;
        }
        Ok(())
    }
}

fn check_rate(rate: f64) -> FreightResult<()> {
    if rate.is_finite() && rate > 0.0 {
        Ok(())
    } else {
        Err(FreightError::input(format!("rate must be positive, got {rate}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Countered { offer: Offer },
    Accepted { booking: Booking },
    WalkedAway,
    Rejected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub negotiation: Negotiation,
    pub outcome: TurnOutcome,
}

/// Runs a collaborator call under a deadline. Any failure is reported as
/// the collaborator being unavailable.
async fn within<T>(
    limit: Duration,
    what: &str,
    call: impl Future<Output = FreightResult<T>>,
) -> FreightResult<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(FreightError::ServiceUnavailable(msg))) => Err(FreightError::unavailable(msg)),
        Ok(Err(err)) => Err(FreightError::unavailable(format!("{what} failed: {err}"))),
        Err(_) => Err(FreightError::unavailable(format!(
            "{what} timed out after {limit:?}"
        ))),
    }
}

fn lane(load: &Load) -> String {
    format!("{} -> {}", load.origin_region, load.destination_region)
}

pub struct NegotiationService<S> {
    store: Arc<S>,
    drafter: Arc<dyn TextGenerator>,
    mailer: Arc<dyn EmailDispatcher>,
    extractor: Box<dyn OfferExtractor>,
}

impl<S: FreightStore> NegotiationService<S> {
    pub fn new(
        store: Arc<S>,
        drafter: Arc<dyn TextGenerator>,
        mailer: Arc<dyn EmailDispatcher>,
    ) -> Self {
        Self {
            store,
            drafter,
            mailer,
            extractor: Box::new(RateTokenExtractor::new()),
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn OfferExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    fn load(&self, id: &str) -> FreightResult<Load> {
        self.store
            .get_load(id)?
            .ok_or_else(|| FreightError::not_found("load", id))
    }

    pub fn get(&self, ctx: &RequestContext, id: &str) -> Result<Negotiation, Failure> {
        self.store
            .get_negotiation(id)
            .and_then(|n| n.ok_or_else(|| FreightError::not_found("negotiation", id)))
            .map_err(|e| ctx.fail(e))
    }

    /// Drafts the driver's offer and sends it to the broker.
    async fn send_offer(
        &self,
        ctx: &RequestContext,
        negotiation: &Negotiation,
        load: &Load,
        round: u32,
        amount: f64,
    ) -> FreightResult<String> {
        let limit = ctx.config.negotiation.collaborator_timeout;
        let draft = DraftContext {
            negotiation_id: negotiation.id.clone(),
            load_id: load.id.clone(),
            lane: lane(load),
            broker_name: negotiation.broker.name.clone(),
            offer_amount: amount,
            posted_rate: negotiation.posted_rate,
            market_rate: negotiation.market_rate,
            round,
            max_rounds: negotiation.max_rounds,
        };

        let body = within(
            limit,
            "text generation",
            self.drafter.draft_email(&draft, negotiation.strategy),
        )
        .await?;
        let subject = format!("Load {} ({}): ${:.2}/mile", load.id, draft.lane, amount);
        let ack = within(
            limit,
            "email delivery",
            self.mailer.deliver(&negotiation.broker.email, &subject, &body),
        )
        .await?;

        tracing::debug!(
            trace_id = %ctx.trace_id,
            negotiation_id = %negotiation.id,
            round,
            message_id = %ack.message_id,
            "offer sent"
        );
        Ok(body)
    }

    /// Opens a negotiation on an available load with the driver's minimum
    /// rate as the round 1 offer.
    pub async fn start(
        &self,
        ctx: &RequestContext,
        request: StartNegotiation,
    ) -> Result<Negotiation, Failure> {
        self.try_start(ctx, request).await.map_err(|e| ctx.fail(e))
    }

    async fn try_start(
        &self,
        ctx: &RequestContext,
        request: StartNegotiation,
    ) -> FreightResult<Negotiation> {
        request.validate()?;

        let load = self.load(&request.load_id)?;
        let driver = self
            .store
            .get_driver(&request.driver_id)?
            .ok_or_else(|| FreightError::not_found("driver", &request.driver_id))?;
        if load.status != LoadStatus::Available {
            return Err(FreightError::conflict(format!(
                "load {} is {}",
                load.id, load.status
            )));
        }
        let driver_min_rate = request.driver_min_rate.unwrap_or(driver.min_rate);
        check_rate(driver_min_rate)?;
        let max_rounds = request
            .max_rounds
            .unwrap_or(ctx.config.negotiation.default_max_rounds);
        if max_rounds == 0 {
            return Err(FreightError::input("max_rounds must be at least 1"));
        }

        let mut negotiation = Negotiation::open(
            OpenNegotiation {
                id: utils::new_id("neg_")?,
                load: &load,
                driver_id: driver.id.clone(),
                broker: request.broker.unwrap_or_else(|| load.broker.clone()),
                driver_min_rate,
                max_rounds,
                strategy: request.strategy,
                opening_rationale: String::new(),
            },
            ctx.received_at.clone(),
        );

        let body = self
            .send_offer(ctx, &negotiation, &load, 1, driver_min_rate)
            .await?;
        if let Some(opening) = negotiation.offers.first_mut() {
            opening.rationale = body;
        }

        self.store.create_negotiation(&negotiation)?;
        tracing::info!(
            trace_id = %ctx.trace_id,
            negotiation_id = %negotiation.id,
            load_id = %load.id,
            driver_min_rate,
            max_rounds = negotiation.max_rounds,
            strategy = %negotiation.strategy,
            "negotiation started"
        );
        Ok(negotiation)
    }

    /// Applies one broker reply: accept, counter or walk away.
    pub async fn broker_response(
        &self,
        ctx: &RequestContext,
        negotiation_id: &str,
        reply: &BrokerReply,
    ) -> Result<Turn, Failure> {
        self.try_broker_response(ctx, negotiation_id, reply)
            .await
            .map_err(|e| ctx.fail(e))
    }

    async fn try_broker_response(
        &self,
        ctx: &RequestContext,
        negotiation_id: &str,
        reply: &BrokerReply,
    ) -> FreightResult<Turn> {
        let counter = if reply.declined {
            None
        } else {
            Some(resolve_counter_offer(reply, self.extractor.as_ref())?)
        };

        let stored = self
            .store
            .get_negotiation(negotiation_id)?
            .ok_or_else(|| FreightError::not_found("negotiation", negotiation_id))?;
        if stored.is_terminal() {
            return Err(FreightError::conflict(format!(
                "negotiation {} is already {}",
                stored.id, stored.status
            )));
        }
        let expected_round = stored.current_round;
        let now = ctx.received_at.clone();
        let mut next = stored.clone();

        let Some(counter) = counter else {
            next.transition(NegotiationStatus::Rejected)?;
            next.updated_at = now;
            return self.persist(ctx, next, expected_round, TurnOutcome::Rejected);
        };

        let rationale = reply
            .message
            .clone()
            .unwrap_or_else(|| format!("counter-offer ${counter:.2}/mile"));
        next.record_offer(Sender::Broker, counter, rationale, now.clone())?;

        match next.decide(counter) {
            Decision::Accept { final_rate } => {
                self.accept(ctx, next, expected_round, final_rate, now)
            }
            Decision::Counter { round, amount } => {
                let load = self.load(&next.load_id)?;
                let body = self.send_offer(ctx, &next, &load, round, amount).await?;
                next.record_offer(Sender::Driver, amount, body, now)?;
                let offer = next
                    .last_offer()
                    .cloned()
                    .ok_or_else(|| FreightError::internal("driver counter was not recorded"))?;
                self.persist(ctx, next, expected_round, TurnOutcome::Countered { offer })
            }
            Decision::WalkAway => {
                next.transition(NegotiationStatus::WalkedAway)?;
                self.persist(ctx, next, expected_round, TurnOutcome::WalkedAway)
            }
        }
    }

    fn persist(
        &self,
        ctx: &RequestContext,
        next: Negotiation,
        expected_round: u32,
        outcome: TurnOutcome,
    ) -> FreightResult<Turn> {
        let negotiation =
            self.store
                .update_negotiation(&next.id, expected_round, &|stored: &mut Negotiation| {
                    *stored = next.clone();
                    Ok(())
                })?;
        tracing::info!(
            trace_id = %ctx.trace_id,
            negotiation_id = %negotiation.id,
            round = negotiation.current_round,
            status = %negotiation.status,
            "negotiation turn recorded"
        );
        Ok(Turn {
            negotiation,
            outcome,
        })
    }

    fn accept(
        &self,
        ctx: &RequestContext,
        mut next: Negotiation,
        expected_round: u32,
        final_rate: f64,
        now: TimeStamp<Utc>,
    ) -> FreightResult<Turn> {
        next.transition(NegotiationStatus::Accepted)?;
        let load = self.load(&next.load_id)?;
        let driver = self
            .store
            .get_driver(&next.driver_id)?
            .ok_or_else(|| FreightError::not_found("driver", &next.driver_id))?;

        let prepared = booking::prepare(
            &BookingRequest {
                load: &load,
                driver: &driver,
                final_rate,
                negotiation_id: Some(next.id.clone()),
            },
            now,
        )?;
        next.booking_id = Some(prepared.booking.id.clone());

        let booking = booking::commit(
            self.store.as_ref(),
            prepared,
            Some(AcceptedNegotiation {
                expected_round,
                negotiation: next.clone(),
            }),
        )?;
        tracing::info!(
            trace_id = %ctx.trace_id,
            negotiation_id = %next.id,
            booking_id = %booking.id,
            final_rate,
            "negotiation accepted"
        );
        Ok(Turn {
            negotiation: next,
            outcome: TurnOutcome::Accepted { booking },
        })
    }
}
