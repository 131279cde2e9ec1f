//! Booking transaction tests
//!
//! Several threads race to book the same load through one shared store. The
//! sled transaction must let exactly one of them through.
mod common;

use common::*;
use freight_match::{
    booking::BookingService,
    error::{ErrorCategory, FreightError},
    store::{BookingStore, LoadRepository},
    types::{BookingStatus, LoadStatus},
};
use std::thread;

#[test]
fn racing_bookings_produce_one_winner() -> anyhow::Result<()> {
    let (_dir, store) = temp_store("race")?;
    seed(&store, &[load("load_hot", DALLAS, HOUSTON, 2.90)])?;
    for i in 0..8 {
        seed_driver(&store, &driver(&format!("drv_{i}"), DALLAS, 2.0))?;
    }
    let service = BookingService::new(store.clone());

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = &service;
                s.spawn(move || service.book_load(&ctx(), "load_hot", &format!("drv_{i}"), None))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    for failure in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(failure.error, FreightError::Conflict(_)));
        assert_eq!(failure.category, ErrorCategory::Retry);
    }

    let booking = winners[0];
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.final_rate, 2.90);
    assert_eq!(store.booking_for_load("load_hot")?.as_ref(), Some(booking));
    let load = store.get_load("load_hot")?.unwrap();
    assert_eq!(load.status, LoadStatus::Booked);
    Ok(())
}

#[test]
fn rate_confirmation_is_stored_with_its_hash() -> anyhow::Result<()> {
    let (_dir, store) = temp_store("document")?;
    seed(&store, &[load("load_doc", DALLAS, HOUSTON, 2.75)])?;
    seed_driver(&store, &driver("drv_sam", DALLAS, 2.0))?;
    let service = BookingService::new(store.clone());
    let ctx = ctx();

    let booking = service.book_load(&ctx, "load_doc", "drv_sam", Some(2.95))?;
    assert_eq!(booking.final_rate, 2.95);
    assert!(booking.id.starts_with("bkg_1"));
    assert_eq!(service.get_booking(&ctx, &booking.id)?, booking);

    let document = service.get_document(&ctx, &booking.document_id)?;
    assert!(document.id.starts_with("doc_1"));
    assert_eq!(document.booking_id, booking.id);
    assert_eq!(document.content_hash, sha256::digest(document.content.as_str()));
    assert_eq!(document.content_hash.len(), 64);
    assert!(document.content.contains("RATE CONFIRMATION"));
    assert!(document.content.contains(&booking.id));
    assert!(document.content.contains("$2.95/mile"));
    Ok(())
}

#[test]
fn booked_or_claimed_loads_cannot_be_booked_directly() -> anyhow::Result<()> {
    let (_dir, store) = temp_store("claimed")?;
    seed(
        &store,
        &[
            with_status(load("load_neg", DALLAS, HOUSTON, 2.75), LoadStatus::InNegotiation),
            with_status(load("load_done", DALLAS, HOUSTON, 2.75), LoadStatus::Booked),
        ],
    )?;
    seed_driver(&store, &driver("drv_sam", DALLAS, 2.0))?;
    let service = BookingService::new(store.clone());
    let ctx = ctx();

    for id in ["load_neg", "load_done"] {
        let err = service.book_load(&ctx, id, "drv_sam", None).unwrap_err();
        assert!(matches!(err.error, FreightError::Conflict(_)), "{id}");
        assert!(store.booking_for_load(id)?.is_none());
    }

    let err = service
        .book_load(&ctx, "load_neg", "drv_ghost", None)
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::Gone);

    let err = service
        .book_load(&ctx, "load_neg", "drv_sam", Some(-1.0))
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::Input);
    Ok(())
}
