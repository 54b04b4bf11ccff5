use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One recorded redirect, as stored. Events are append-only: the application
/// never mutates or deletes them, and they survive deletion of their short
/// link.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClickEvent {
    pub id: i64,
    pub short_link_id: i64,
    pub ip: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub device: String,
    pub browser: String,
    pub timestamp: i64,
}

/// A click about to be appended (no id yet).
#[derive(Debug, Clone)]
pub struct NewClickEvent {
    pub short_link_id: i64,
    pub ip: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub device: String,
    pub browser: String,
    pub timestamp: i64,
}

/// Device class derived from the User-Agent header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Mobile,
    Desktop,
    Tablet,
    Unknown,
}

impl Device {
    /// Substring classification: "mobile" and "tablet" (case-insensitive)
    /// win over the desktop default; a missing or blank header is Unknown.
    pub fn classify(user_agent: Option<&str>) -> Self {
        let ua = match user_agent {
            Some(ua) if !ua.trim().is_empty() => ua.to_ascii_lowercase(),
            _ => return Device::Unknown,
        };

        if ua.contains("mobile") {
            Device::Mobile
        } else if ua.contains("tablet") {
            Device::Tablet
        } else {
            Device::Desktop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Mobile => "Mobile",
            Device::Desktop => "Desktop",
            Device::Tablet => "Tablet",
            Device::Unknown => "Unknown",
        }
    }
}
