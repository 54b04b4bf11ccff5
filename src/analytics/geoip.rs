//! IP geolocation backed by a MaxMind GeoLite2/GeoIP2 City database.
//!
//! The database is optional: without one, every public lookup resolves to
//! "Unknown". Loopback and private source addresses short-circuit to
//! "Local" before the database is consulted.

use anyhow::{Context, Result};
use maxminddb::{geoip2, Mmap, Reader};
use std::net::IpAddr;
use std::sync::Arc;

/// Coarse location attached to a click event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub country: String,
    pub region: String,
    pub city: String,
}

impl Location {
    fn uniform(value: &str) -> Self {
        Self {
            country: value.to_string(),
            region: value.to_string(),
            city: value.to_string(),
        }
    }

    pub fn unknown() -> Self {
        Self::uniform("Unknown")
    }

    pub fn local() -> Self {
        Self::uniform("Local")
    }
}

pub struct GeoResolver {
    reader: Option<Arc<Reader<Mmap>>>,
}

impl GeoResolver {
    /// Open the resolver, memory-mapping the City database when a path is
    /// configured.
    pub fn new(db_path: Option<&str>) -> Result<Self> {
        let reader = match db_path {
            Some(path) => {
                let reader = unsafe { Reader::open_mmap(path) }
                    .with_context(|| format!("failed to open GeoIP database at {}", path))?;
                Some(Arc::new(reader))
            }
            None => None,
        };

        Ok(Self { reader })
    }

    /// Resolve an IP to country/region/city. Fields the database cannot
    /// answer stay "Unknown"; reserved source addresses are "Local".
    pub fn lookup(&self, ip: IpAddr) -> Location {
        if is_reserved(ip) {
            return Location::local();
        }

        let Some(reader) = &self.reader else {
            return Location::unknown();
        };

        let mut location = Location::unknown();

        if let Ok(result) = reader.lookup(ip) {
            if let Ok(Some(city)) = result.decode::<geoip2::City>() {
                if let Some(code) = city.country.iso_code {
                    location.country = code.to_string();
                }
                if let Some(subdivision) = city.subdivisions.first() {
                    if let Some(name) = subdivision.names.english {
                        location.region = name.to_string();
                    }
                }
                if let Some(name) = city.city.names.english {
                    location.city = name.to_string();
                }
            }
        }

        location
    }
}

fn is_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            // fc00::/7 unique local, fe80::/10 link local
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

impl Clone for GeoResolver {
    fn clone(&self) -> Self {
        Self {
            reader: self.reader.clone(),
        }
    }
}
