//! sift-test: test catalog and conformance fixtures
//!
//! Provides an in-memory [`CatalogProvider`] with failure injection, record
//! builders for devices and agents, and (with the `fixtures` feature) the YAML
//! fixture runners used by the conformance tests.
//!
//! # Example
//!
//! ```
//! use sift_test::prelude::*;
//!
//! let catalog = TestCatalog::new()
//!     .with_device(device("r1-west-a").site("west").interface("198.51.99.1", &[]).build());
//!
//! let rules = RuleCompiler::default().compile_cli_rules(&["site.site_name:west"]).unwrap();
//! let pipeline = Pipeline::records(rules, SelectionBounds::unbounded());
//! let selection = pipeline.run(&catalog, RecordKind::Device, &fixed_context()).unwrap();
//! assert_eq!(selection.len(), 1);
//! ```

use chrono::{TimeZone, Utc};
use sift::prelude::*;
use std::cell::Cell;

#[cfg(feature = "fixtures")]
pub mod config_fixture;
#[cfg(feature = "fixtures")]
pub mod fixture;

/// The instant used as "now" by fixtures and [`fixed_context`]: 2024-05-10T12:00:00Z.
#[must_use]
pub fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// An evaluation context pinned to [`fixed_now`].
#[must_use]
pub fn fixed_context() -> EvalContext {
    EvalContext::at(fixed_now())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Catalog
// ═══════════════════════════════════════════════════════════════════════════════

/// Failure reported by [`TestCatalog`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("test catalog unavailable: {0}")]
pub struct CatalogError(pub String);

/// In-memory catalog.
///
/// Counts fetches so tests can assert a run fetched exactly once.
#[derive(Debug, Clone, Default)]
pub struct TestCatalog {
    devices: Vec<Record>,
    agents: Vec<Record>,
    failure: Option<String>,
    fetches: Cell<usize>,
}

impl TestCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device (builder pattern).
    #[must_use]
    pub fn with_device(mut self, device: Record) -> Self {
        self.devices.push(device);
        self
    }

    /// Add devices.
    #[must_use]
    pub fn with_devices(mut self, devices: impl IntoIterator<Item = Record>) -> Self {
        self.devices.extend(devices);
        self
    }

    /// Add an agent.
    #[must_use]
    pub fn with_agent(mut self, agent: Record) -> Self {
        self.agents.push(agent);
        self
    }

    /// Add agents.
    #[must_use]
    pub fn with_agents(mut self, agents: impl IntoIterator<Item = Record>) -> Self {
        self.agents.extend(agents);
        self
    }

    /// Make every fetch fail with `message`.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Number of fetches so far.
    #[must_use]
    pub fn fetches(&self) -> usize {
        self.fetches.get()
    }

    fn snapshot(&self, records: &[Record]) -> Result<Vec<Record>, CatalogError> {
        self.fetches.set(self.fetches.get() + 1);
        match &self.failure {
            Some(message) => Err(CatalogError(message.clone())),
            None => Ok(records.to_vec()),
        }
    }
}

impl CatalogProvider for TestCatalog {
    type Error = CatalogError;

    fn fetch_devices(&self) -> Result<Vec<Record>, CatalogError> {
        self.snapshot(&self.devices)
    }

    fn fetch_agents(&self) -> Result<Vec<Record>, CatalogError> {
        self.snapshot(&self.agents)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Record builders
// ═══════════════════════════════════════════════════════════════════════════════

/// Start building a device record.
#[must_use]
pub fn device(name: &str) -> DeviceBuilder {
    DeviceBuilder {
        record: Record::new().with("device_name", name),
        interfaces: Vec::new(),
        labels: Vec::new(),
    }
}

/// Builds device records shaped like the inventory API's.
#[derive(Debug, Clone)]
pub struct DeviceBuilder {
    record: Record,
    interfaces: Vec<Value>,
    labels: Vec<Value>,
}

impl DeviceBuilder {
    /// Set any attribute.
    #[must_use]
    pub fn attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.record = self.record.with(key, value);
        self
    }

    /// Set `site.site_name`.
    #[must_use]
    pub fn site(self, site_name: &str) -> Self {
        self.attr("site", Record::new().with("site_name", site_name))
    }

    /// Add a label (`{name: ...}`).
    #[must_use]
    pub fn label(mut self, name: &str) -> Self {
        self.labels.push(Record::new().with("name", name).into());
        self
    }

    /// Add an interface with a primary and secondary addresses.
    #[must_use]
    pub fn interface(mut self, ip_address: &str, secondary_ips: &[&str]) -> Self {
        self.interfaces.push(
            Record::new()
                .with("ip_address", ip_address)
                .with("secondary_ips", secondary_ips.to_vec())
                .into(),
        );
        self
    }

    /// Add a pre-built interface record.
    #[must_use]
    pub fn interface_record(mut self, interface: Record) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Set `sending_ips`.
    #[must_use]
    pub fn sending_ips(self, ips: &[&str]) -> Self {
        self.attr("sending_ips", ips.to_vec())
    }

    /// Set `device_snmp_ip`.
    #[must_use]
    pub fn snmp_ip(self, ip: &str) -> Self {
        self.attr("device_snmp_ip", ip)
    }

    /// Finish the record.
    #[must_use]
    pub fn build(self) -> Record {
        let mut record = self.record;
        if !self.interfaces.is_empty() {
            record = record.with("interfaces", Value::List(self.interfaces));
        }
        if !self.labels.is_empty() {
            record = record.with("labels", Value::List(self.labels));
        }
        record
    }
}

/// Build an agent record with camelCase fields, as the agent catalog reports them.
#[must_use]
pub fn agent(id: &str, country: &str, asn: i64) -> Record {
    Record::new()
        .with("id", id)
        .with("alias", format!("agent-{id}"))
        .with("country", country)
        .with("asn", asn)
        .with("status", "AGENT_STATUS_OK")
        .with("agentImpl", "IMPLEMENT_TYPE_RUST")
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        agent, device, fixed_context, fixed_now, CatalogError, DeviceBuilder, TestCatalog,
    };
    pub use sift::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn catalog_returns_snapshots_and_counts_fetches() {
        let catalog = TestCatalog::new()
            .with_device(device("r1").build())
            .with_agent(agent("1", "US", 7018));
        assert_eq!(catalog.fetch_devices().unwrap().len(), 1);
        assert_eq!(catalog.fetch(RecordKind::Agent).unwrap().len(), 1);
        assert_eq!(catalog.fetches(), 2);
    }

    #[test]
    fn failure_injection() {
        let catalog = TestCatalog::new().failing("inventory down");
        assert_eq!(
            catalog.fetch_devices().unwrap_err(),
            CatalogError("inventory down".into())
        );
    }

    #[test]
    fn provider_error_passes_through_pipeline() {
        let catalog = TestCatalog::new().failing("inventory down");
        let err = Pipeline::records(RuleSet::match_all(), SelectionBounds::unbounded())
            .run(&catalog, RecordKind::Device, &fixed_context())
            .unwrap_err();
        assert!(matches!(err, SelectError::Provider(_)));
        assert_eq!(err.to_string(), "test catalog unavailable: inventory down");
    }

    #[test]
    fn pipeline_run_fetches_once() {
        let catalog = TestCatalog::new()
            .with_device(device("r1").interface("10.0.0.1", &[]).build())
            .with_device(device("r2").interface("10.0.0.2", &[]).build());
        let selection = Pipeline::records(RuleSet::match_all(), SelectionBounds::unbounded())
            .run(&catalog, RecordKind::Device, &fixed_context())
            .unwrap();
        assert_eq!(selection.len(), 2);
        assert_eq!(catalog.fetches(), 1);
    }

    #[test]
    fn config_plans_fetch_once_or_not_at_all() {
        let config: SiftConfig = serde_yaml::from_str(
            "targets:\n  match:\n    interface_addresses: {}\n\
             agents:\n  use: [\"611\"]\n",
        )
        .unwrap();
        let compiled = config.compile().unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        let targets =
            TestCatalog::new().with_device(device("r1").interface("10.0.0.1", &[]).build());
        let plan = compiled.targets.as_ref().unwrap();
        assert_eq!(plan.execute(&targets, &fixed_context(), &mut rng).unwrap().len(), 1);
        assert_eq!(targets.fetches(), 1);

        let agents = TestCatalog::new().with_agent(agent("611", "US", 7018));
        let plan = compiled.agents.as_ref().unwrap();
        assert_eq!(plan.execute(&agents, &fixed_context(), &mut rng).unwrap().len(), 1);
        assert_eq!(agents.fetches(), 0);
    }

    #[test]
    fn device_builder_shape() {
        let d = device("r1")
            .site("west")
            .label("edge")
            .interface("10.0.0.1", &["192.168.1.1"])
            .snmp_ip("10.0.0.2")
            .build();
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["site"]["site_name"], "west");
        assert_eq!(json["labels"][0]["name"], "edge");
        assert_eq!(json["interfaces"][0]["secondary_ips"][0], "192.168.1.1");
        assert_eq!(json["device_snmp_ip"], "10.0.0.2");
    }
}
