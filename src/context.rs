//! Per-request context threaded through search and negotiation
use crate::config::Config;
use crate::error::{Failure, FreightError};
use crate::types::TimeStamp;
use crate::utils;
use chrono::Utc;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub trace_id: String,
    pub config: Config,
    pub received_at: TimeStamp<Utc>, // issued when the request enters the pipeline
}

impl RequestContext {
    pub fn new(config: Config) -> Self {
        Self {
            trace_id: utils::new_trace_id(),
            config,
            received_at: TimeStamp::new(),
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    /// Tag an error with this request's trace id.
    pub fn fail(&self, error: FreightError) -> Failure {
        Failure::new(&self.trace_id, error)
    }
}
