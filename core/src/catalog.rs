//! Catalog provider: the source of record snapshots.

use crate::Record;
use std::fmt;

/// Kind of record a selection runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Network devices (with interfaces, site, labels, sending IPs, SNMP IP).
    Device,
    /// Monitoring agents.
    Agent,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Device => "device",
            Self::Agent => "agent",
        })
    }
}

/// Supplies complete record snapshots.
///
/// Each call returns everything the provider knows about, or fails. Errors are
/// surfaced unchanged as [`SelectError::Provider`](crate::SelectError::Provider);
/// nothing is retried.
pub trait CatalogProvider {
    /// Provider-specific failure.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch all device records.
    ///
    /// # Errors
    ///
    /// Provider-specific.
    fn fetch_devices(&self) -> Result<Vec<Record>, Self::Error>;

    /// Fetch all agent records.
    ///
    /// # Errors
    ///
    /// Provider-specific.
    fn fetch_agents(&self) -> Result<Vec<Record>, Self::Error>;

    /// Fetch records of the given kind.
    ///
    /// # Errors
    ///
    /// Provider-specific.
    fn fetch(&self, kind: RecordKind) -> Result<Vec<Record>, Self::Error> {
        match kind {
            RecordKind::Device => self.fetch_devices(),
            RecordKind::Agent => self.fetch_agents(),
        }
    }
}
