//! Turning an agreed rate into a booking and its rate confirmation
use crate::context::RequestContext;
use crate::error::{Failure, FreightError, FreightResult};
use crate::store::{
    AcceptedNegotiation, BookingCommit, BookingStore, DriverRepository, FreightStore, LoadRepository,
};
use crate::types::{Booking, BookingStatus, Document, DocumentKind, Driver, Load, TimeStamp};
use crate::utils;
use chrono::Utc;
use std::sync::Arc;

pub struct BookingRequest<'a> {
    pub load: &'a Load,
    pub driver: &'a Driver,
    pub final_rate: f64,
    pub negotiation_id: Option<String>,
}

/// Records built before the write, so ids can be handed out in advance.
#[derive(Debug, Clone)]
pub struct PreparedBooking {
    pub booking: Booking,
    pub document: Document,
}

pub fn rate_confirmation(
    request: &BookingRequest<'_>,
    booking_id: &str,
    issued: &TimeStamp<Utc>,
) -> String {
    let load = request.load;
    let driver = request.driver;
    format!(
        "RATE CONFIRMATION\n\
         Booking: {booking_id}\n\
         Load: {} ({} -> {})\n\
         Equipment: {:?}\n\
         Distance: {:.0} mi\n\
         Rate: ${:.2}/mile\n\
         Line haul: ${:.2}\n\
         Carrier: {} <{}>\n\
         Broker: {} <{}>\n\
         Issued: {}\n",
        load.id,
        load.origin_region,
        load.destination_region,
        load.equipment,
        load.distance_miles,
        request.final_rate,
        request.final_rate * load.distance_miles,
        driver.name,
        driver.email,
        load.broker.name,
        load.broker.email,
        issued.to_datetime_utc().to_rfc3339(),
    )
}

pub fn prepare(
    request: &BookingRequest<'_>,
    now: TimeStamp<Utc>,
) -> FreightResult<PreparedBooking> {
    if !request.final_rate.is_finite() || request.final_rate <= 0.0 {
        return Err(FreightError::input(format!(
            "booking rate must be positive, got {}",
            request.final_rate
        )));
    }

    let booking_id = utils::new_id("bkg_")?;
    let document_id = utils::new_id("doc_")?;
    let content = rate_confirmation(request, &booking_id, &now);
    let content_hash = sha256::digest(content.as_str());

    Ok(PreparedBooking {
        booking: Booking {
            id: booking_id.clone(),
            load_id: request.load.id.clone(),
            driver_id: request.driver.id.clone(),
            negotiation_id: request.negotiation_id.clone(),
            final_rate: request.final_rate,
            status: BookingStatus::Confirmed,
            created_at: now.clone(),
            document_id: document_id.clone(),
        },
        document: Document {
            id: document_id,
            booking_id,
            kind: DocumentKind::RateConfirmation,
            content,
            content_hash,
            created_at: now,
        },
    })
}

/// Books the load, stores booking and document, and (for an accepted
/// negotiation) the negotiation itself, all in one write.
pub fn commit(
    store: &dyn BookingStore,
    prepared: PreparedBooking,
    accepted: Option<AcceptedNegotiation>,
) -> FreightResult<Booking> {
    let commit = BookingCommit {
        booking: prepared.booking,
        document: prepared.document,
        accepted,
    };
    let booking = store.commit_booking(&commit)?;
    tracing::info!(
        booking_id = %booking.id,
        load_id = %booking.load_id,
        final_rate = booking.final_rate,
        negotiated = booking.negotiation_id.is_some(),
        "load booked"
    );
    Ok(booking)
}

pub struct BookingService<S> {
    store: Arc<S>,
}

impl<S: FreightStore> BookingService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Books a load outright, at the posted rate unless `rate` is given.
    pub fn book_load(
        &self,
        ctx: &RequestContext,
        load_id: &str,
        driver_id: &str,
        rate: Option<f64>,
    ) -> Result<Booking, Failure> {
        self.try_book(ctx, load_id, driver_id, rate)
            .map_err(|e| ctx.fail(e))
    }

    fn try_book(
        &self,
        ctx: &RequestContext,
        load_id: &str,
        driver_id: &str,
        rate: Option<f64>,
    ) -> FreightResult<Booking> {
        let load = self
            .store
            .get_load(load_id)?
            .ok_or_else(|| FreightError::not_found("load", load_id))?;
        let driver = self
            .store
            .get_driver(driver_id)?
            .ok_or_else(|| FreightError::not_found("driver", driver_id))?;

        let request = BookingRequest {
            final_rate: rate.unwrap_or(load.posted_rate),
            load: &load,
            driver: &driver,
            negotiation_id: None,
        };
        let prepared = prepare(&request, ctx.received_at.clone())?;
        tracing::debug!(trace_id = %ctx.trace_id, load_id, "committing direct booking");
        commit(self.store.as_ref(), prepared, None)
    }

    pub fn get_booking(&self, ctx: &RequestContext, id: &str) -> Result<Booking, Failure> {
        self.store
            .get_booking(id)
            .and_then(|b| b.ok_or_else(|| FreightError::not_found("booking", id)))
            .map_err(|e| ctx.fail(e))
    }

    pub fn get_document(&self, ctx: &RequestContext, id: &str) -> Result<Document, Failure> {
        self.store
            .get_document(id)
            .and_then(|d| d.ok_or_else(|| FreightError::not_found("document", id)))
            .map_err(|e| ctx.fail(e))
    }
}
