//! Repository interfaces and their sled implementation
//!
//! Every status change is a sled transaction: loads are claimed, released and
//! booked only through conditional writes, and negotiation turns are a
//! compare-and-swap on the stored round.
use crate::error::{FreightError, FreightResult};
use crate::geo::GeoPoint;
use crate::negotiation::{Negotiation, NegotiationStatus};
use crate::types::{Booking, Document, Driver, Equipment, Load, LoadStatus};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionResult, TransactionalTree,
};
use sled::{Db, Transactional, Tree};

#[derive(Debug, Clone, Default)]
pub struct LoadFilter {
    pub origin_near: Option<(GeoPoint, f64)>,
    pub destination_near: Option<(GeoPoint, f64)>,
    pub equipment: Option<Equipment>,
    pub min_rate: Option<f64>,
    /// Scan cap: at most this many loads are returned.
    pub limit: usize,
}

impl LoadFilter {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }
    pub fn origin_within(mut self, point: GeoPoint, miles: f64) -> Self {
        self.origin_near = Some((point, miles));
        self
    }
    pub fn destination_within(mut self, point: GeoPoint, miles: f64) -> Self {
        self.destination_near = Some((point, miles));
        self
    }
    pub fn equipment(mut self, equipment: Option<Equipment>) -> Self {
        self.equipment = equipment;
        self
    }
    pub fn min_rate(mut self, rate: Option<f64>) -> Self {
        self.min_rate = rate;
        self
    }

    pub fn matches(&self, load: &Load) -> bool {
        load.status == LoadStatus::Available
            && self.equipment.is_none_or(|e| e == load.equipment)
            && self.min_rate.is_none_or(|r| load.posted_rate >= r)
            && self
                .origin_near
                .is_none_or(|(p, miles)| load.origin.within(&p, miles))
            && self
                .destination_near
                .is_none_or(|(p, miles)| load.destination.within(&p, miles))
    }
}

pub trait LoadRepository: Send + Sync {
    fn list_available(&self, filter: &LoadFilter) -> FreightResult<Vec<Load>>;
    fn get_load(&self, id: &str) -> FreightResult<Option<Load>>;
    fn put_load(&self, load: &Load) -> FreightResult<()>;
    /// Moves the load to `next` only if its current status is one of `expected`.
    fn update_load_status(
        &self,
        id: &str,
        expected: &[LoadStatus],
        next: LoadStatus,
    ) -> FreightResult<Load>;
}

pub trait DriverRepository: Send + Sync {
    fn get_driver(&self, id: &str) -> FreightResult<Option<Driver>>;
    fn put_driver(&self, driver: &Driver) -> FreightResult<()>;
}

pub trait NegotiationStore: Send + Sync {
    fn get_negotiation(&self, id: &str) -> FreightResult<Option<Negotiation>>;
    /// Inserts the negotiation and claims its load in one write.
    fn create_negotiation(&self, negotiation: &Negotiation) -> FreightResult<()>;
    /// Applies `mutation` if the stored negotiation is still in progress at
    /// `expected_round`. Ending without a deal releases the load.
    fn update_negotiation(
        &self,
        id: &str,
        expected_round: u32,
        mutation: &dyn Fn(&mut Negotiation) -> FreightResult<()>,
    ) -> FreightResult<Negotiation>;
}

/// An accepted negotiation written together with its booking.
#[derive(Debug, Clone)]
pub struct AcceptedNegotiation {
    pub expected_round: u32,
    pub negotiation: Negotiation,
}

#[derive(Debug, Clone)]
pub struct BookingCommit {
    pub booking: Booking,
    pub document: Document,
    pub accepted: Option<AcceptedNegotiation>,
}

pub trait BookingStore: Send + Sync {
    fn commit_booking(&self, commit: &BookingCommit) -> FreightResult<Booking>;
    fn get_booking(&self, id: &str) -> FreightResult<Option<Booking>>;
    fn booking_for_load(&self, load_id: &str) -> FreightResult<Option<Booking>>;
    fn get_document(&self, id: &str) -> FreightResult<Option<Document>>;
}

pub trait FreightStore: LoadRepository + DriverRepository + NegotiationStore + BookingStore {}

impl<T> FreightStore for T where T: LoadRepository + DriverRepository + NegotiationStore + BookingStore
{}

pub struct SledStore {
    db: Db,
    loads: Tree,
    drivers: Tree,
    negotiations: Tree,
    bookings: Tree,
    documents: Tree,
    load_bookings: Tree, // load id -> booking id
}

impl SledStore {
    pub fn new(db: Db) -> FreightResult<Self> {
        Ok(Self {
            loads: db.open_tree("loads")?,
            drivers: db.open_tree("drivers")?,
            negotiations: db.open_tree("negotiations")?,
            bookings: db.open_tree("bookings")?,
            documents: db.open_tree("documents")?,
            load_bookings: db.open_tree("load_bookings")?,
            db,
        })
    }

    pub fn open(path: impl AsRef<std::path::Path>) -> FreightResult<Self> {
        Self::new(sled::open(path)?)
    }

    pub fn flush(&self) -> FreightResult<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Raw stored bytes of a negotiation, for checking writes byte for byte.
    pub fn negotiation_bytes(&self, id: &str) -> FreightResult<Option<Vec<u8>>> {
        Ok(self.negotiations.get(id.as_bytes())?.map(|v| v.to_vec()))
    }
}

fn encode<T: minicbor::Encode<()>>(value: &T) -> FreightResult<Vec<u8>> {
    Ok(minicbor::to_vec(value)?)
}

fn decode<T: for<'b> minicbor::Decode<'b, ()>>(bytes: &[u8]) -> FreightResult<T> {
    Ok(minicbor::decode(bytes)?)
}

fn get_record<T: for<'b> minicbor::Decode<'b, ()>>(
    tree: &Tree,
    key: &str,
) -> FreightResult<Option<T>> {
    tree.get(key.as_bytes())?
        .map(|bytes| decode(&bytes))
        .transpose()
}

fn abort<T>(err: FreightError) -> ConflictableTransactionResult<T, FreightError> {
    Err(ConflictableTransactionError::Abort(err))
}

fn tx_get<T: for<'b> minicbor::Decode<'b, ()>>(
    tree: &TransactionalTree,
    key: &str,
) -> ConflictableTransactionResult<Option<T>, FreightError> {
    match tree.get(key.as_bytes())? {
        None => Ok(None),
        Some(bytes) => decode(&bytes)
            .map(Some)
            .map_err(ConflictableTransactionError::Abort),
    }
}

fn tx_put<T: minicbor::Encode<()>>(
    tree: &TransactionalTree,
    key: &str,
    value: &T,
) -> ConflictableTransactionResult<(), FreightError> {
    let bytes = encode(value).map_err(ConflictableTransactionError::Abort)?;
    tree.insert(key.as_bytes(), bytes)?;
    Ok(())
}

fn finish<T>(result: TransactionResult<T, FreightError>) -> FreightResult<T> {
    result.map_err(|err| match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => err.into(),
    })
}

/// Checks a stored negotiation can take the turn computed at `expected_round`.
fn check_turn(stored: &Negotiation, expected_round: u32) -> FreightResult<()> {
    if stored.is_terminal() {
        return Err(FreightError::conflict(format!(
            "negotiation {} is already {}",
            stored.id, stored.status
        )));
    }
    if stored.current_round != expected_round {
        return Err(FreightError::conflict(format!(
            "negotiation {} moved to round {} (expected {})",
            stored.id, stored.current_round, expected_round
        )));
    }
    Ok(())
}

impl LoadRepository for SledStore {
    fn list_available(&self, filter: &LoadFilter) -> FreightResult<Vec<Load>> {
        let mut loads = Vec::new();
        for entry in self.loads.iter() {
            if loads.len() >= filter.limit {
                break;
            }
            let (_, bytes) = entry?;
            let load: Load = decode(&bytes)?;
            if filter.matches(&load) {
                loads.push(load);
            }
        }
        tracing::debug!(count = loads.len(), limit = filter.limit, "scanned loads");
        Ok(loads)
    }

    fn get_load(&self, id: &str) -> FreightResult<Option<Load>> {
        get_record(&self.loads, id)
    }

    fn put_load(&self, load: &Load) -> FreightResult<()> {
        self.loads.insert(load.id.as_bytes(), encode(load)?)?;
        Ok(())
    }

    fn update_load_status(
        &self,
        id: &str,
        expected: &[LoadStatus],
        next: LoadStatus,
    ) -> FreightResult<Load> {
        finish(self.loads.transaction(|loads| {
            let Some(mut load) = tx_get::<Load>(loads, id)? else {
                return abort(FreightError::not_found("load", id));
            };
            if !expected.contains(&load.status) || !load.status.can_transition(next) {
                return abort(FreightError::conflict(format!(
                    "load {id} is {} and cannot become {next}",
                    load.status
                )));
            }
            load.status = next;
            tx_put(loads, id, &load)?;
            Ok(load)
        }))
    }
}

impl DriverRepository for SledStore {
    fn get_driver(&self, id: &str) -> FreightResult<Option<Driver>> {
        get_record(&self.drivers, id)
    }

    fn put_driver(&self, driver: &Driver) -> FreightResult<()> {
        self.drivers.insert(driver.id.as_bytes(), encode(driver)?)?;
        Ok(())
    }
}

impl NegotiationStore for SledStore {
    fn get_negotiation(&self, id: &str) -> FreightResult<Option<Negotiation>> {
        get_record(&self.negotiations, id)
    }

    fn create_negotiation(&self, negotiation: &Negotiation) -> FreightResult<()> {
        finish(
            (&self.loads, &self.negotiations).transaction(|(loads, negotiations)| {
                if negotiations.get(negotiation.id.as_bytes())?.is_some() {
                    return abort(FreightError::conflict(format!(
                        "negotiation {} already exists",
                        negotiation.id
                    )));
                }
                let Some(mut load) = tx_get::<Load>(loads, &negotiation.load_id)? else {
                    return abort(FreightError::not_found("load", &negotiation.load_id));
                };
                if load.status != LoadStatus::Available {
                    return abort(FreightError::conflict(format!(
                        "load {} is {}",
                        load.id, load.status
                    )));
                }
                load.status = LoadStatus::InNegotiation;
                tx_put(loads, &load.id, &load)?;
                tx_put(negotiations, &negotiation.id, negotiation)?;
                Ok(())
            }),
        )
    }

    fn update_negotiation(
        &self,
        id: &str,
        expected_round: u32,
        mutation: &dyn Fn(&mut Negotiation) -> FreightResult<()>,
    ) -> FreightResult<Negotiation> {
        finish(
            (&self.negotiations, &self.loads).transaction(|(negotiations, loads)| {
                let Some(stored) = tx_get::<Negotiation>(negotiations, id)? else {
                    return abort(FreightError::not_found("negotiation", id));
                };
                if let Err(err) = check_turn(&stored, expected_round) {
                    return abort(err);
                }

                let mut next = stored.clone();
                if let Err(err) = mutation(&mut next) {
                    return abort(err);
                }
                if next.status == NegotiationStatus::Accepted {
                    return abort(FreightError::internal(
                        "acceptance must be committed together with its booking",
                    ));
                }
                if next.status == NegotiationStatus::InProgress
                    && next.current_round <= stored.current_round
                {
                    return abort(FreightError::internal(format!(
                        "negotiation {id} update did not advance the round"
                    )));
                }

                if matches!(
                    next.status,
                    NegotiationStatus::WalkedAway | NegotiationStatus::Rejected
                ) {
                    if let Some(mut load) = tx_get::<Load>(loads, &next.load_id)? {
                        if load.status == LoadStatus::InNegotiation {
                            load.status = LoadStatus::Available;
                            tx_put(loads, &load.id, &load)?;
                        }
                    }
                }

                tx_put(negotiations, id, &next)?;
                Ok(next)
            }),
        )
    }
}

impl BookingStore for SledStore {
    fn commit_booking(&self, commit: &BookingCommit) -> FreightResult<Booking> {
        let booking = &commit.booking;
        let document = &commit.document;

        finish(
            (
                &self.loads,
                &self.negotiations,
                &self.bookings,
                &self.documents,
                &self.load_bookings,
            )
                .transaction(
                    |(loads, negotiations, bookings, documents, load_bookings)| {
                        let Some(mut load) = tx_get::<Load>(loads, &booking.load_id)? else {
                            return abort(FreightError::not_found("load", &booking.load_id));
                        };
                        // a load under negotiation is booked only through it
                        let claimed = load.status == LoadStatus::InNegotiation
                            && commit.accepted.is_none();
                        if claimed || !load.status.can_transition(LoadStatus::Booked) {
                            return abort(FreightError::conflict(format!(
                                "load {} is already {}",
                                load.id, load.status
                            )));
                        }

                        if let Some(accepted) = &commit.accepted {
                            let id = &accepted.negotiation.id;
                            let Some(stored) = tx_get::<Negotiation>(negotiations, id)? else {
                                return abort(FreightError::not_found("negotiation", id));
                            };
                            if let Err(err) = check_turn(&stored, accepted.expected_round) {
                                return abort(err);
                            }
                            tx_put(negotiations, id, &accepted.negotiation)?;
                        }

                        load.status = LoadStatus::Booked;
                        tx_put(loads, &load.id, &load)?;
                        tx_put(bookings, &booking.id, booking)?;
                        tx_put(documents, &document.id, document)?;
                        load_bookings.insert(load.id.as_bytes(), booking.id.as_bytes())?;
                        Ok(booking.clone())
                    },
                ),
        )
    }

    fn get_booking(&self, id: &str) -> FreightResult<Option<Booking>> {
        get_record(&self.bookings, id)
    }

    fn booking_for_load(&self, load_id: &str) -> FreightResult<Option<Booking>> {
        match self.load_bookings.get(load_id.as_bytes())? {
            None => Ok(None),
            Some(booking_id) => {
                let booking_id = String::from_utf8(booking_id.to_vec())
                    .map_err(|e| FreightError::internal(format!("corrupt booking index: {e}")))?;
                self.get_booking(&booking_id)
            }
        }
    }

    fn get_document(&self, id: &str) -> FreightResult<Option<Document>> {
        get_record(&self.documents, id)
    }
}
