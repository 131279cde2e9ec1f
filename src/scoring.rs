//! Trip and chain scoring. Everything here is pure.
use crate::geo::{GeoPoint, distance_miles};
use crate::types::{Load, LoadWithScore, MarketComparison};

/// Clamp `value` into `[min, max]` and rescale onto `[0, 10]`.
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() || max <= min {
        return 0.0;
    }
    (value.clamp(min, max) - min) / (max - min) * 10.0
}

fn market_ratio(posted_rate: f64, market_avg: f64) -> f64 {
    if market_avg > 0.0 {
        posted_rate / market_avg
    } else {
        1.0
    }
}

fn market_score(posted_rate: f64, market_avg: f64) -> f64 {
    normalize(market_ratio(posted_rate, market_avg), 0.8, 1.2)
}

pub fn trip_score(posted_rate: f64, deadhead_miles: f64, market_avg: f64) -> f64 {
    let rate = normalize(posted_rate, 1.5, 3.5);
    let deadhead = (10.0 - deadhead_miles.max(0.0) / 20.0).max(0.0);
    let market = market_score(posted_rate, market_avg);

    (0.5 * rate + 0.3 * deadhead + 0.2 * market).clamp(0.0, 10.0)
}

pub fn chain_score(
    legs: &[LoadWithScore],
    total_revenue: f64,
    total_miles: f64,
    total_deadhead: f64,
) -> f64 {
    let revenue_per_mile = if total_miles > 0.0 {
        total_revenue / total_miles
    } else {
        0.0
    };
    let avg_market_score = if legs.is_empty() {
        0.0
    } else {
        legs.iter()
            .map(|leg| market_score(leg.load.posted_rate, leg.load.market.avg))
            .sum::<f64>()
            / legs.len() as f64
    };
    let deadhead_penalty = total_deadhead / 10.0;

    let raw = 0.6 * revenue_per_mile + 0.2 * avg_market_score - 0.2 * deadhead_penalty;
    normalize(raw, 1.5, 3.0)
}

pub fn market_comparison(posted_rate: f64, market_avg: f64, band: f64) -> MarketComparison {
    if posted_rate > market_avg * (1.0 + band) {
        MarketComparison::Above
    } else if posted_rate < market_avg * (1.0 - band) {
        MarketComparison::Below
    } else {
        MarketComparison::At
    }
}

/// Score `load` for a driver starting from `from`.
pub fn score_load(load: &Load, from: &GeoPoint, market_band: f64) -> LoadWithScore {
    let deadhead_miles = distance_miles(from, &load.origin);
    score_with_deadhead(load, deadhead_miles, market_band)
}

pub fn score_with_deadhead(load: &Load, deadhead_miles: f64, market_band: f64) -> LoadWithScore {
    let total_revenue = load.revenue();
    let driven = load.distance_miles + deadhead_miles;
    let revenue_per_mile = if driven > 0.0 {
        total_revenue / driven
    } else {
        0.0
    };

    LoadWithScore {
        load: load.clone(),
        trip_score: trip_score(load.posted_rate, deadhead_miles, load.market.avg),
        deadhead_miles,
        revenue_per_mile,
        total_revenue,
        market_comparison: market_comparison(load.posted_rate, load.market.avg, market_band),
    }
}

/// Highest score first; ties go to more revenue, then to the lower id.
pub fn sort_by_score(scored: &mut [LoadWithScore]) {
    scored.sort_by(|a, b| {
        b.trip_score
            .total_cmp(&a.trip_score)
            .then(b.total_revenue.total_cmp(&a.total_revenue))
            .then_with(|| a.load.id.cmp(&b.load.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_endpoints() {
        assert_eq!(normalize(1.5, 1.5, 3.5), 0.0);
        assert_eq!(normalize(3.5, 1.5, 3.5), 10.0);
        assert_eq!(normalize(2.5, 1.5, 3.5), 5.0);
        assert_eq!(normalize(-4.0, 1.5, 3.5), 0.0);
        assert_eq!(normalize(99.0, 1.5, 3.5), 10.0);
        assert_eq!(normalize(f64::NAN, 0.0, 1.0), 0.0);
        assert_eq!(normalize(1.0, 2.0, 2.0), 0.0);
    }

    #[test]
    fn perfect_trip() {
        // top of the rate band, zero deadhead, 20% over market
        let score = trip_score(3.5, 0.0, 3.5 / 1.2);
        assert!((score - 10.0).abs() < 1e-9);
    }

    #[test]
    fn deadhead_term_bottoms_out_at_200_miles() {
        let at_200 = trip_score(2.5, 200.0, 2.5);
        let at_900 = trip_score(2.5, 900.0, 2.5);
        assert!((at_200 - at_900).abs() < 1e-12);
        assert!((at_200 - (0.5 * 5.0 + 0.2 * 5.0)).abs() < 1e-9);
    }

    #[test]
    fn zero_market_average_is_neutral() {
        assert_eq!(trip_score(2.5, 0.0, 0.0), trip_score(2.5, 0.0, 2.5));
    }

    #[test]
    fn market_band() {
        assert_eq!(market_comparison(3.0, 2.84, 0.05), MarketComparison::Above);
        assert_eq!(market_comparison(2.84, 2.84, 0.05), MarketComparison::At);
        assert_eq!(market_comparison(2.70, 2.84, 0.05), MarketComparison::At);
        assert_eq!(market_comparison(2.60, 2.84, 0.05), MarketComparison::Below);
    }

    #[test]
    fn empty_chain_scores_zero() {
        assert_eq!(chain_score(&[], 0.0, 0.0, 0.0), 0.0);
    }
}
