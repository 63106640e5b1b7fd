//! Payer geo-location.
//!
//! The order manager only needs a country, a subdivision, a city and a timezone for an IP address. [`GeoIpTable`] is
//! a small in-memory resolver built from a JSON list of CIDR blocks, which is enough for region-priced projects and
//! for tests. Anything smarter can be plugged in by implementing [`GeoIpResolver`].
use std::{fs, net::IpAddr, path::Path};

use ipnet::IpNet;
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GeoIpError {
    #[error("No geo record for address {0}")]
    AddressNotFound(IpAddr),
    #[error("Could not load the GeoIP database: {0}")]
    LoadError(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoRecord {
    /// ISO 3166-1 alpha-2 country code
    pub country_code: String,
    /// ISO 3166-2 subdivision code, without the country prefix
    pub subdivision: Option<String>,
    pub city: Option<String>,
    pub timezone: Option<String>,
}

pub trait GeoIpResolver: Send + Sync {
    fn resolve(&self, ip: IpAddr) -> Result<GeoRecord, GeoIpError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpEntry {
    pub network: IpNet,
    #[serde(flatten)]
    pub record: GeoRecord,
}

/// CIDR table lookup. The most specific matching network wins.
#[derive(Debug, Clone, Default)]
pub struct GeoIpTable {
    entries: Vec<GeoIpEntry>,
}

impl GeoIpTable {
    pub fn new(entries: Vec<GeoIpEntry>) -> Self {
        Self { entries }
    }

    /// Loads a JSON array of entries such as `{"network": "81.2.69.0/24", "country_code": "GB", "city": "London"}`.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, GeoIpError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| GeoIpError::LoadError(format!("{}: {e}", path.display())))?;
        let table = Self::from_json(&data)?;
        info!("🌍️ Loaded {} GeoIP networks from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn from_json(data: &str) -> Result<Self, GeoIpError> {
        let entries = serde_json::from_str::<Vec<GeoIpEntry>>(data).map_err(|e| GeoIpError::LoadError(e.to_string()))?;
        Ok(Self::new(entries))
    }

    pub fn insert(&mut self, network: IpNet, record: GeoRecord) -> &mut Self {
        self.entries.push(GeoIpEntry { network, record });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl GeoIpResolver for GeoIpTable {
    fn resolve(&self, ip: IpAddr) -> Result<GeoRecord, GeoIpError> {
        let found = self
            .entries
            .iter()
            .filter(|e| e.network.contains(&ip))
            .max_by_key(|e| e.network.prefix_len())
            .map(|e| e.record.clone());
        trace!("🌍️ GeoIP lookup for {ip}: {found:?}");
        found.ok_or(GeoIpError::AddressNotFound(ip))
    }
}
