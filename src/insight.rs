//! Direct-versus-chain recommendation
use crate::types::{Load, LoadChain, LoadWithScore};

/// Loads read from the repository during one search.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScanStats {
    pub scanned: usize,
    pub market_rate_total: f64,
}

impl ScanStats {
    pub fn from_loads(loads: &[Load]) -> Self {
        Self {
            scanned: loads.len(),
            market_rate_total: loads.iter().map(|l| l.market.avg).sum(),
        }
    }

    pub fn merge(self, other: ScanStats) -> Self {
        Self {
            scanned: self.scanned + other.scanned,
            market_rate_total: self.market_rate_total + other.market_rate_total,
        }
    }

    pub fn average_market_rate(&self) -> f64 {
        if self.scanned == 0 {
            0.0
        } else {
            self.market_rate_total / self.scanned as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recommendation {
    Nothing,
    Direct { load_id: String, revenue: f64 },
    Chain { load_ids: Vec<String>, revenue: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketInsight {
    pub recommendation: Recommendation,
    /// Chain revenue minus direct revenue, when both exist.
    pub savings: Option<f64>,
    pub average_market_rate: f64,
    pub scanned_loads: usize,
    pub summary: String,
}

fn direct(best: &LoadWithScore) -> Recommendation {
    Recommendation::Direct {
        load_id: best.load.id.clone(),
        revenue: best.total_revenue,
    }
}

fn chain(best: &LoadChain) -> Recommendation {
    Recommendation::Chain {
        load_ids: best.load_ids().into_iter().map(String::from).collect(),
        revenue: best.total_revenue,
    }
}

pub fn market_insight(
    best_direct: Option<&LoadWithScore>,
    best_chain: Option<&LoadChain>,
    stats: ScanStats,
    savings_threshold: f64,
) -> MarketInsight {
    let (recommendation, savings) = match (best_direct, best_chain) {
        (None, None) => (Recommendation::Nothing, None),
        (Some(d), None) => (direct(d), None),
        (None, Some(c)) => (chain(c), None),
        (Some(d), Some(c)) => {
            let savings = c.total_revenue - d.total_revenue;
            // a near tie goes to the single load
            let pick = if savings > savings_threshold {
                chain(c)
            } else {
                direct(d)
            };
            (pick, Some(savings))
        }
    };

    let average_market_rate = stats.average_market_rate();
    let summary = match (&recommendation, savings) {
        (Recommendation::Nothing, _) => format!(
            "No matching loads among {} scanned; market averages ${average_market_rate:.2}/mile.",
            stats.scanned
        ),
        (Recommendation::Direct { load_id, revenue }, Some(s)) => format!(
            "Take load {load_id} direct for ${revenue:.0}; the best chain differs by ${s:.0}."
        ),
        (Recommendation::Direct { load_id, revenue }, None) => {
            format!("Take load {load_id} direct for ${revenue:.0}.")
        }
        (Recommendation::Chain { load_ids, revenue }, Some(s)) => format!(
            "Chain {} for ${revenue:.0}, ${s:.0} more than the best direct load.",
            load_ids.join(" -> ")
        ),
        (Recommendation::Chain { load_ids, revenue }, None) => {
            format!("Chain {} for ${revenue:.0}.", load_ids.join(" -> "))
        }
    };

    MarketInsight {
        recommendation,
        savings,
        average_market_rate,
        scanned_loads: stats.scanned,
        summary,
    }
}
