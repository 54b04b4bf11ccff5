//! Click analytics: geolocation, client IP extraction, and aggregation of
//! stored click events into dashboard summaries.

pub mod aggregator;
pub mod geoip;
pub mod ip_extractor;

pub use aggregator::{aggregate, ClickSummary, DistributionEntry, TimePoint, Totals};
pub use geoip::{GeoResolver, Location};
pub use ip_extractor::extract_client_ip;
