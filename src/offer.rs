//! Pulling a counter-offer out of a broker reply
use crate::error::{FreightError, FreightResult};
use regex::Regex;
use std::sync::LazyLock;

/// Finds a $/mile rate in broker prose.
pub trait OfferExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Option<f64>;
}

static RATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$\s*(\d+(?:\.\d+)?)\s*(?:/|per)\s*(?:mile|mi)\b").unwrap()
});

/// Takes the first `$X/mile` style token: "$2.85/mile", "$2.85 / mi",
/// "$ 2.85 per mile".
pub struct RateTokenExtractor {
    pattern: &'static Regex,
}

impl RateTokenExtractor {
    pub fn new() -> Self {
        Self {
            pattern: &RATE_TOKEN,
        }
    }
}

impl Default for RateTokenExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl OfferExtractor for RateTokenExtractor {
    fn extract(&self, text: &str) -> Option<f64> {
        self.pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .filter(|rate| rate.is_finite() && *rate > 0.0)
    }
}

/// What a broker sent back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrokerReply {
    pub amount: Option<f64>,
    pub message: Option<String>,
    pub declined: bool,
}

impl BrokerReply {
    pub fn amount(amount: f64) -> Self {
        Self {
            amount: Some(amount),
            ..Self::default()
        }
    }
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            ..Self::default()
        }
    }
    pub fn declined(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            declined: true,
            ..Self::default()
        }
    }
}

/// The broker's counter in $/mile: the explicit field wins, then the text.
pub fn resolve_counter_offer(
    reply: &BrokerReply,
    extractor: &dyn OfferExtractor,
) -> FreightResult<f64> {
    if let Some(amount) = reply.amount {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(FreightError::input(format!(
                "broker offer must be a positive rate, got {amount}"
            )));
        }
        return Ok(amount);
    }
    reply
        .message
        .as_deref()
        .and_then(|text| extractor.extract(text))
        .ok_or_else(|| FreightError::input("no $/mile offer found in broker reply"))
}
