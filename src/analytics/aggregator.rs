//! Aggregation of click events into dashboard summaries.
//!
//! `aggregate` is a pure function over an unordered slice of events: the
//! same multiset of events produces the same summary regardless of input
//! order. Grouping is by value equality only.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::ClickEvent;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Totals {
    pub total_clicks: u64,
    pub unique_visitors: u64,
}

/// One row of a distribution chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionEntry {
    pub value: String,
    pub count: u64,
    pub percentage: f64,
}

/// One day of the time series, `date` in UTC `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimePoint {
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClickSummary {
    pub summary: Totals,
    pub country_distribution: Vec<DistributionEntry>,
    pub device_distribution: Vec<DistributionEntry>,
    pub browser_distribution: Vec<DistributionEntry>,
    pub time_series: Vec<TimePoint>,
}

pub fn aggregate(events: &[ClickEvent]) -> ClickSummary {
    let total_clicks = events.len() as u64;
    let unique_visitors = events
        .iter()
        .map(|e| e.ip.as_str())
        .collect::<HashSet<_>>()
        .len() as u64;

    let mut days: BTreeMap<String, u64> = BTreeMap::new();
    for event in events {
        *days.entry(utc_date(event.timestamp)).or_insert(0) += 1;
    }
    let time_series = days
        .into_iter()
        .map(|(date, count)| TimePoint { date, count })
        .collect();

    ClickSummary {
        summary: Totals {
            total_clicks,
            unique_visitors,
        },
        country_distribution: distribution(events, |e| e.country.as_str()),
        device_distribution: distribution(events, |e| e.device.as_str()),
        browser_distribution: distribution(events, |e| e.browser.as_str()),
        time_series,
    }
}

/// Group by one field; percentage of the total, rounded to one decimal.
/// An empty input yields an empty list rather than dividing by zero.
fn distribution<'a, F>(events: &'a [ClickEvent], field: F) -> Vec<DistributionEntry>
where
    F: Fn(&'a ClickEvent) -> &'a str,
{
    if events.is_empty() {
        return Vec::new();
    }

    let total = events.len() as f64;
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for event in events {
        *counts.entry(field(event)).or_insert(0) += 1;
    }

    let mut entries: Vec<DistributionEntry> = counts
        .into_iter()
        .map(|(value, count)| DistributionEntry {
            value: value.to_string(),
            count,
            percentage: round1(count as f64 / total * 100.0),
        })
        .collect();

    // HashMap iteration order is arbitrary; sort for a stable output.
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    entries
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn utc_date(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.date_naive().to_string())
        .unwrap_or_else(|| "1970-01-01".to_string())
}
