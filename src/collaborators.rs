//! Text drafting and email delivery collaborators
//!
//! Both sit behind async traits so the negotiation service can put a timeout
//! on every call. The built-in implementations are deterministic: a template
//! drafter and a dispatcher that records messages in the log.
use crate::error::FreightResult;
use crate::negotiation::Strategy;
use crate::types::TimeStamp;
use crate::utils;
use chrono::Utc;

/// Facts the drafter may use. The core never parses the prose it gets back.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftContext {
    pub negotiation_id: String,
    pub load_id: String,
    pub lane: String, // "Dallas, TX -> Houston, TX"
    pub broker_name: String,
    pub offer_amount: f64,
    pub posted_rate: f64,
    pub market_rate: f64,
    pub round: u32,
    pub max_rounds: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailAck {
    pub message_id: String,
    pub accepted_at: TimeStamp<Utc>,
}

#[mockall::automock]
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    async fn draft_email(&self, context: &DraftContext, strategy: Strategy)
    -> FreightResult<String>;
}

#[mockall::automock]
#[async_trait::async_trait]
pub trait EmailDispatcher: Send + Sync {
    async fn deliver(&self, to: &str, subject: &str, body: &str) -> FreightResult<EmailAck>;
}

pub struct TemplateDrafter;

#[async_trait::async_trait]
impl TextGenerator for TemplateDrafter {
    async fn draft_email(
        &self,
        context: &DraftContext,
        strategy: Strategy,
    ) -> FreightResult<String> {
        let pitch = match strategy {
            Strategy::Aggressive => "This is the number that works for my truck.",
            Strategy::Moderate => "I think this is fair for the lane.",
            Strategy::Conservative => "Happy to talk it through if this is a stretch.",
        };
        let opener = if context.round == 1 {
            format!("I'm interested in load {} ({}).", context.load_id, context.lane)
        } else {
            format!(
                "Thanks for the counter on load {}. I can't go that low.",
                context.load_id
            )
        };

        Ok(format!(
            "Hi {},\n\n{} I can haul it at ${:.2}/mile. {}\n\nMarket on this lane is running around ${:.2}/mile.\n",
            context.broker_name, opener, context.offer_amount, pitch, context.market_rate
        ))
    }
}

pub struct LogDispatcher;

#[async_trait::async_trait]
impl EmailDispatcher for LogDispatcher {
    async fn deliver(&self, to: &str, subject: &str, body: &str) -> FreightResult<EmailAck> {
        let message_id = utils::new_id("msg_")?;
        tracing::info!(%to, %subject, %message_id, bytes = body.len(), "email dispatched");
        Ok(EmailAck {
            message_id,
            accepted_at: TimeStamp::new(),
        })
    }
}
