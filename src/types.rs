//! Core load, driver and booking records
use crate::error::FreightError;
use crate::geo::GeoPoint;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl<T: TimeZone + Eq> PartialOrd for TimeStamp<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: TimeZone + Eq> Ord for TimeStamp<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Self)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    pub fn plus_seconds(&self, secs: i64) -> Self {
        Self(self.0 + Duration::seconds(secs))
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl From<DateTime<Utc>> for TimeStamp<Utc> {
    fn from(value: DateTime<Utc>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Equipment {
    #[n(0)]
    DryVan,
    #[n(1)]
    Reefer,
    #[n(2)]
    Flatbed,
}

impl FromStr for Equipment {
    type Err = FreightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "dry_van" | "van" => Ok(Self::DryVan),
            "reefer" => Ok(Self::Reefer),
            "flatbed" => Ok(Self::Flatbed),
            other => Err(FreightError::input(format!("unknown equipment {other:?}"))),
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStatus {
    #[n(0)]
    Available,
    #[n(1)]
    InNegotiation,
    #[n(2)]
    Booked,
}

impl LoadStatus {
    /// Legal status moves. `Booked` is final; a negotiation that ends
    /// without a deal hands the load back.
    pub fn can_transition(self, next: LoadStatus) -> bool {
        use LoadStatus::*;
        matches!(
            (self, next),
            (Available, InNegotiation)
                | (Available, Booked)
                | (InNegotiation, Booked)
                | (InNegotiation, Available)
        )
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Available => "available",
            Self::InNegotiation => "in_negotiation",
            Self::Booked => "booked",
        };
        f.write_str(s)
    }
}

/// Market rate band for the lane, in $/mile.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq)]
pub struct MarketRate {
    #[n(0)]
    pub avg: f64,
    #[n(1)]
    pub high: f64,
    #[n(2)]
    pub low: f64,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct BrokerContact {
    #[n(0)]
    pub name: String,
    #[n(1)]
    pub email: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Load {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub origin: GeoPoint,
    #[n(2)]
    pub destination: GeoPoint,
    #[n(3)]
    pub origin_region: String, // e.g. "Dallas, TX"
    #[n(4)]
    pub destination_region: String,
    #[n(5)]
    pub distance_miles: f64,
    #[n(6)]
    pub equipment: Equipment,
    #[n(7)]
    pub posted_rate: f64, // $/mile
    #[n(8)]
    pub market: MarketRate,
    #[n(9)]
    pub broker: BrokerContact,
    #[n(10)]
    pub status: LoadStatus,
}

impl Load {
    pub fn revenue(&self) -> f64 {
        self.posted_rate * self.distance_miles
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Default)]
pub struct DriverPreferences {
    #[n(0)]
    pub max_deadhead_miles: Option<f64>,
    #[n(1)]
    pub preferred_regions: Vec<String>,
    #[n(2)]
    pub avoided_regions: Vec<String>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Driver {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub email: String,
    #[n(3)]
    pub home_base: GeoPoint,
    #[n(4)]
    pub current_location: GeoPoint,
    #[n(5)]
    pub min_rate: f64,
    #[n(6)]
    pub equipment: Equipment,
    #[n(7)]
    pub preferences: DriverPreferences,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketComparison {
    Above,
    At,
    Below,
}

/// A load scored against one driver position.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadWithScore {
    pub load: Load,
    pub trip_score: f64,
    pub deadhead_miles: f64,
    pub revenue_per_mile: f64, // all-in, deadhead included
    pub total_revenue: f64,
    pub market_comparison: MarketComparison,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadChain {
    pub legs: Vec<LoadWithScore>,
    pub chain_score: f64,
    pub total_revenue: f64,
    pub total_miles: f64,
    pub total_deadhead: f64,
}

impl LoadChain {
    pub fn load_ids(&self) -> Vec<&str> {
        self.legs.iter().map(|leg| leg.load.id.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoundTrip {
    pub outbound: LoadWithScore,
    pub inbound: LoadWithScore,
    pub total_revenue: f64,
    pub total_miles: f64,
    pub revenue_per_mile: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionSummary {
    pub region: String,
    pub load_count: usize,
    pub average_trip_score: f64,
    pub best: LoadWithScore,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    #[n(0)]
    Confirmed,
    #[n(1)]
    InTransit,
    #[n(2)]
    Delivered,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Booking {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub load_id: String,
    #[n(2)]
    pub driver_id: String,
    #[n(3)]
    pub negotiation_id: Option<String>,
    #[n(4)]
    pub final_rate: f64,
    #[n(5)]
    pub status: BookingStatus,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
    #[n(7)]
    pub document_id: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    #[n(0)]
    RateConfirmation,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Document {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub booking_id: String,
    #[n(2)]
    pub kind: DocumentKind,
    #[n(3)]
    pub content: String,
    #[n(4)]
    pub content_hash: String, // sha256 of content
    #[n(5)]
    pub created_at: TimeStamp<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn booked_is_final() {
        for next in [
            LoadStatus::Available,
            LoadStatus::InNegotiation,
            LoadStatus::Booked,
        ] {
            assert!(!LoadStatus::Booked.can_transition(next));
        }
        assert!(LoadStatus::Available.can_transition(LoadStatus::Booked));
        assert!(LoadStatus::InNegotiation.can_transition(LoadStatus::Available));
        assert!(!LoadStatus::Available.can_transition(LoadStatus::Available));
    }

    #[test]
    fn equipment_parsing() {
        assert_eq!("Dry-Van".parse::<Equipment>().unwrap(), Equipment::DryVan);
        assert_eq!("reefer".parse::<Equipment>().unwrap(), Equipment::Reefer);
        assert!("tanker".parse::<Equipment>().is_err());
    }
}
