//! Address extraction: turns selected devices into target addresses
//!
//! Each [`AddressSpec`] names a device attribute that supplies addresses, plus
//! family and public-only filters. Extraction is device-major: for each device,
//! each spec contributes in configured order. The union is de-duplicated keeping
//! the first occurrence.

use crate::{ConfigError, EvalContext, Record, Rule, SelectError, Value};
use indexmap::IndexSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Which device attribute supplies addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressSource {
    /// `interfaces[*].ip_address` and `interfaces[*].secondary_ips[*]`.
    InterfaceAddresses,
    /// The device's `sending_ips`.
    SendingIps,
    /// The device's `device_snmp_ip`.
    SnmpIp,
}

impl AddressSource {
    /// Every source, in canonical order.
    pub const ALL: [Self; 3] = [Self::InterfaceAddresses, Self::SendingIps, Self::SnmpIp];

    /// Configuration key of this source.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::InterfaceAddresses => "interface_addresses",
            Self::SendingIps => "sending_ips",
            Self::SnmpIp => "snmp_ip",
        }
    }
}

impl fmt::Display for AddressSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// IP family filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AddressFamily {
    /// IPv4 and IPv6.
    #[default]
    Dual,
    /// IPv4 only.
    V4,
    /// IPv6 only.
    V6,
}

impl AddressFamily {
    /// Whether `addr` belongs to this family.
    #[must_use]
    pub fn admits(self, addr: &IpAddr) -> bool {
        match self {
            Self::Dual => true,
            Self::V4 => addr.is_ipv4(),
            Self::V6 => addr.is_ipv6(),
        }
    }
}

impl FromStr for AddressFamily {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "dual" | "DUAL" | "IP_FAMILY_DUAL" => Ok(Self::Dual),
            "v4" | "V4" | "IP_FAMILY_V4" => Ok(Self::V4),
            "v6" | "V6" | "IP_FAMILY_V6" => Ok(Self::V6),
            other => Err(ConfigError::InvalidAddressFamily {
                family: other.to_owned(),
            }),
        }
    }
}

/// One configured address source with its filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpec {
    /// Where addresses come from.
    pub source: AddressSource,
    /// Family filter.
    pub family: AddressFamily,
    /// Drop private and special-use addresses.
    pub public_only: bool,
}

impl AddressSpec {
    /// A dual-stack spec without the public-only filter.
    #[must_use]
    pub fn new(source: AddressSource) -> Self {
        Self {
            source,
            family: AddressFamily::Dual,
            public_only: false,
        }
    }

    /// Set the family filter.
    #[must_use]
    pub fn family(mut self, family: AddressFamily) -> Self {
        self.family = family;
        self
    }

    /// Set the public-only filter.
    #[must_use]
    pub fn public_only(mut self, public_only: bool) -> Self {
        self.public_only = public_only;
        self
    }

    /// Whether an address passes this spec's filters.
    #[must_use]
    pub fn admits(&self, addr: &IpAddr) -> bool {
        self.family.admits(addr) && (!self.public_only || is_public(addr))
    }
}

/// Extracts addresses from device records.
#[derive(Debug, Clone, Default)]
pub struct AddressSelector {
    specs: Vec<AddressSpec>,
    interfaces: Option<Rule>,
}

impl AddressSelector {
    /// A selector over the given specs, in order.
    #[must_use]
    pub fn new(specs: Vec<AddressSpec>) -> Self {
        Self {
            specs,
            interfaces: None,
        }
    }

    /// Only interfaces matching `rule` contribute to `interface_addresses`.
    #[must_use]
    pub fn with_interface_filter(mut self, rule: Rule) -> Self {
        self.interfaces = Some(rule);
        self
    }

    /// The configured specs.
    #[must_use]
    pub fn specs(&self) -> &[AddressSpec] {
        &self.specs
    }

    /// Extract, filter and de-duplicate addresses.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::NoAddressSource`] if no spec is configured.
    pub fn extract(
        &self,
        devices: &[&Record],
        ctx: &EvalContext,
    ) -> Result<Vec<IpAddr>, SelectError> {
        if self.specs.is_empty() {
            return Err(SelectError::NoAddressSource);
        }
        let mut out: IndexSet<IpAddr> = IndexSet::new();
        for device in devices {
            for spec in &self.specs {
                let before = out.len();
                for raw in self.raw_addresses(device, spec.source, ctx) {
                    let Some(addr) = parse_address(&raw, device) else {
                        continue;
                    };
                    if spec.admits(&addr) {
                        out.insert(addr);
                    } else {
                        tracing::trace!(%addr, source = %spec.source, "address filtered out");
                    }
                }
                tracing::trace!(
                    device = %device.label(),
                    source = %spec.source,
                    added = out.len() - before,
                    "addresses extracted"
                );
            }
        }
        tracing::debug!(devices = devices.len(), addresses = out.len(), "address extraction done");
        Ok(out.into_iter().collect())
    }

    fn raw_addresses(
        &self,
        device: &Record,
        source: AddressSource,
        ctx: &EvalContext,
    ) -> Vec<String> {
        let mut raw = Vec::new();
        match source {
            AddressSource::InterfaceAddresses => {
                let interfaces = device
                    .get("interfaces")
                    .and_then(Value::as_list)
                    .unwrap_or_default();
                for interface in interfaces.iter().filter_map(Value::as_record) {
                    if let Some(rule) = &self.interfaces {
                        if !rule.evaluate(interface, ctx) {
                            continue;
                        }
                    }
                    collect_strings(interface.get("ip_address"), &mut raw);
                    collect_strings(interface.get("secondary_ips"), &mut raw);
                }
            }
            AddressSource::SendingIps => collect_strings(device.get("sending_ips"), &mut raw),
            AddressSource::SnmpIp => collect_strings(device.get("device_snmp_ip"), &mut raw),
        }
        raw
    }
}

/// Strings, lists of strings, and records carrying an `address` field.
fn collect_strings(value: Option<&Value>, out: &mut Vec<String>) {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => out.push(s.clone()),
        Some(Value::List(items)) => {
            for item in items {
                collect_strings(Some(item), out);
            }
        }
        Some(Value::Record(r)) => collect_strings(r.get("address"), out),
        _ => {}
    }
}

fn parse_address(raw: &str, device: &Record) -> Option<IpAddr> {
    match raw.trim().parse::<IpAddr>() {
        Ok(addr) => Some(addr),
        Err(e) => {
            tracing::warn!(
                device = %device.label(),
                address = raw,
                error = %e,
                "skipping invalid address"
            );
            None
        }
    }
}

/// Whether an address is publicly routable.
///
/// Excludes unspecified, loopback, private, shared, link-local, multicast,
/// broadcast, documentation, benchmarking and reserved ranges.
#[must_use]
pub fn is_public(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => is_public_v6(v6),
    }
}

fn in_v4(addr: &Ipv4Addr, net: [u8; 4], prefix: u32) -> bool {
    let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
    u32::from(*addr) & mask == u32::from(Ipv4Addr::from(net)) & mask
}

fn is_public_v4(addr: &Ipv4Addr) -> bool {
    const SPECIAL: &[([u8; 4], u32)] = &[
        ([0, 0, 0, 0], 8),
        ([10, 0, 0, 0], 8),
        ([100, 64, 0, 0], 10),
        ([127, 0, 0, 0], 8),
        ([169, 254, 0, 0], 16),
        ([172, 16, 0, 0], 12),
        ([192, 0, 0, 0], 24),
        ([192, 0, 2, 0], 24),
        ([192, 168, 0, 0], 16),
        ([198, 18, 0, 0], 15),
        ([198, 51, 100, 0], 24),
        ([203, 0, 113, 0], 24),
        ([224, 0, 0, 0], 4),
        ([240, 0, 0, 0], 4),
    ];
    !SPECIAL.iter().any(|(net, prefix)| in_v4(addr, *net, *prefix))
}

fn in_v6(addr: &Ipv6Addr, net: [u16; 8], prefix: u32) -> bool {
    let mask = u128::MAX.checked_shl(128 - prefix).unwrap_or(0);
    u128::from(*addr) & mask == u128::from(Ipv6Addr::from(net)) & mask
}

fn is_public_v6(addr: &Ipv6Addr) -> bool {
    const SPECIAL: &[([u16; 8], u32)] = &[
        ([0, 0, 0, 0, 0, 0, 0, 0], 128),
        ([0, 0, 0, 0, 0, 0, 0, 1], 128),
        ([0, 0, 0, 0, 0, 0xffff, 0, 0], 96),
        ([0x100, 0, 0, 0, 0, 0, 0, 0], 64),
        ([0x2001, 0, 0, 0, 0, 0, 0, 0], 23),
        ([0x2001, 0xdb8, 0, 0, 0, 0, 0, 0], 32),
        ([0xfc00, 0, 0, 0, 0, 0, 0, 0], 7),
        ([0xfe80, 0, 0, 0, 0, 0, 0, 0], 10),
        ([0xff00, 0, 0, 0, 0, 0, 0, 0], 8),
    ];
    !SPECIAL.iter().any(|(net, prefix)| in_v6(addr, *net, *prefix))
}
