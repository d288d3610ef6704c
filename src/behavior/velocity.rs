use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::BehavioralConfig;
use crate::tx::{Address, TransactionRecord};

use super::round_to;

const HOUR_SECS: i64 = 3_600;
const DAY_SECS: i64 = 86_400;
const WEEK_SECS: i64 = 7 * DAY_SECS;

/// Transaction rate statistics for one address.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct VelocityScore {
    pub tx_count_1h: usize,
    pub tx_count_24h: usize,
    pub tx_count_7d: usize,
    pub avg_tx_per_day: f64,
    pub max_tx_in_hour: usize,
    pub burst_detected: bool,
    pub velocity_risk_score: f64,
}

/// Rate statistics over the timestamped rows where `address` is sender or recipient.
/// Windows are counted back from `reference`.
pub fn analyze_velocity(
    history: &[TransactionRecord],
    address: &Address,
    reference: DateTime<Utc>,
    config: &BehavioralConfig,
) -> VelocityScore {
    let timestamps: Vec<i64> = history
        .iter()
        .filter(|t| t.involves(address))
        .filter_map(|t| t.timestamp())
        .collect();

    if timestamps.is_empty() {
        return VelocityScore::default();
    }

    let now = reference.timestamp();
    let within = |secs: i64| timestamps.iter().filter(|&&ts| ts >= now - secs).count();
    let tx_count_1h = within(HOUR_SECS);
    let tx_count_24h = within(DAY_SECS);
    let tx_count_7d = within(WEEK_SECS);

    let n = timestamps.len();
    let avg_tx_per_day = if n > 1 {
        let first = timestamps.iter().copied().min().unwrap_or(now);
        let last = timestamps.iter().copied().max().unwrap_or(now);
        // Denominator floored at one day
        let span_days = ((last as f64 - first as f64) / DAY_SECS as f64).max(1.0);
        n as f64 / span_days
    } else {
        n as f64
    };

    let mut per_hour: HashMap<i64, usize> = HashMap::new();
    for ts in &timestamps {
        *per_hour.entry(ts.div_euclid(HOUR_SECS)).or_default() += 1;
    }
    let max_tx_in_hour = per_hour.values().copied().max().unwrap_or(0);

    let burst_threshold = config.burst_tx_threshold as f64;
    let burst_detected = max_tx_in_hour as f64 >= burst_threshold;

    let score = 0.4 * (tx_count_1h as f64 / burst_threshold)
        + 0.3 * (avg_tx_per_day / config.high_velocity_threshold)
        + if burst_detected { 0.3 } else { 0.0 };

    VelocityScore {
        tx_count_1h,
        tx_count_24h,
        tx_count_7d,
        avg_tx_per_day: round_to(avg_tx_per_day, 2),
        max_tx_in_hour,
        burst_detected,
        velocity_risk_score: round_to(score.min(1.0), 3),
    }
}
