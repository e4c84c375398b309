//! Config conformance fixture runner.
//!
//! Exercises the production path end to end:
//! YAML → [`SiftConfig`] → [`SiftConfig::compile`] → [`Plan::execute`] against a
//! [`TestCatalog`], with a seeded RNG and a fixed current time.
//!
//! ```yaml
//! name: public_targets
//! catalog:
//!   devices:
//!     - device_name: r1
//!       interfaces: [{ ip_address: 10.0.0.1, secondary_ips: [192.168.1.1] }]
//! cases:
//!   - name: nothing public
//!     config:
//!       targets:
//!         match:
//!           interface_addresses: { family: v4, public_only: true }
//!         min_matches: 0
//!     expect:
//!       targets: []
//! ```

use crate::{fixed_context, TestCatalog};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use sift::prelude::*;
use sift::Plan;

/// A catalog and the configurations run against it.
#[derive(Debug, Deserialize)]
pub struct ConfigFixture {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub catalog: CatalogFixture,
    pub cases: Vec<ConfigCase>,
}

/// One configuration document and its expected outcome.
#[derive(Debug, Deserialize)]
pub struct ConfigCase {
    pub name: String,
    /// RNG seed for `randomize`.
    #[serde(default)]
    pub seed: u64,
    pub config: SiftConfig,
    pub expect: Expectations,
}

/// Catalog contents.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogFixture {
    #[serde(default)]
    pub devices: Vec<Record>,
    #[serde(default)]
    pub agents: Vec<Record>,
    /// Make every fetch fail with this message.
    #[serde(default)]
    pub fail: Option<String>,
}

/// Expected outcomes.
#[derive(Debug, Default, Deserialize)]
pub struct Expectations {
    /// Substring of the expected compile error. Sections are not run.
    #[serde(default)]
    pub compile_error: Option<String>,
    #[serde(default)]
    pub targets: Option<Outcome>,
    #[serde(default)]
    pub agents: Option<Outcome>,
}

/// Expected outcome of one section.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Outcome {
    /// Addresses, record labels or ids, in order.
    Selected(Vec<String>),
    /// Substring of the expected run error.
    Failed { error: String },
}

impl Outcome {
    fn check(&self, actual: &Result<Vec<String>, String>) -> bool {
        match (self, actual) {
            (Self::Selected(expected), Ok(items)) => expected == items,
            (Self::Failed { error }, Err(message)) => message.contains(error.as_str()),
            _ => false,
        }
    }
}

fn items(selection: Selection) -> Vec<String> {
    match selection {
        Selection::Records(records) => records.iter().map(Record::label).collect(),
        Selection::Addresses(addresses) => addresses.iter().map(ToString::to_string).collect(),
        Selection::Ids(ids) => ids,
    }
}

impl ConfigFixture {
    /// Parse a single config fixture from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Parse multiple config fixtures from a YAML file with `---` separators.
    pub fn from_yaml_multi(yaml: &str) -> Result<Vec<Self>, serde_yaml::Error> {
        let mut fixtures = Vec::new();
        for doc in serde_yaml::Deserializer::from_str(yaml) {
            fixtures.push(Self::deserialize(doc)?);
        }
        Ok(fixtures)
    }

    fn catalog(&self) -> TestCatalog {
        let catalog = TestCatalog::new()
            .with_devices(self.catalog.devices.iter().cloned())
            .with_agents(self.catalog.agents.iter().cloned());
        match &self.catalog.fail {
            Some(message) => catalog.failing(message.clone()),
            None => catalog,
        }
    }

    /// Run every case and panic on the first mismatch.
    pub fn run_and_assert(&self) {
        let catalog = self.catalog();
        for case in &self.cases {
            case.run_and_assert(&self.name, &catalog);
        }
    }
}

impl ConfigCase {
    fn execute(&self, plan: &Plan, catalog: &TestCatalog) -> Result<Vec<String>, String> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        plan.execute(catalog, &fixed_context(), &mut rng)
            .map(items)
            .map_err(|e| e.to_string())
    }

    fn check_section(
        &self,
        fixture: &str,
        section: &str,
        expected: Option<&Outcome>,
        plan: Option<&Plan>,
        catalog: &TestCatalog,
    ) {
        match (expected, plan) {
            (None, _) => {}
            (Some(_), None) => panic!(
                "Fixture '{fixture}' case '{}': no {section} section to check",
                self.name
            ),
            (Some(outcome), Some(plan)) => {
                let actual = self.execute(plan, catalog);
                assert!(
                    outcome.check(&actual),
                    "Fixture '{fixture}' case '{}' {section}: expected {outcome:?}, got {actual:?}",
                    self.name
                );
            }
        }
    }

    fn run_and_assert(&self, fixture: &str, catalog: &TestCatalog) {
        match (&self.expect.compile_error, self.config.compile()) {
            (Some(needle), Err(e)) => assert!(
                e.to_string().contains(needle.as_str()),
                "Fixture '{fixture}' case '{}': expected compile error containing {needle:?}, \
                 got {e}",
                self.name
            ),
            (Some(needle), Ok(_)) => panic!(
                "Fixture '{fixture}' case '{}': expected compile error containing {needle:?}, \
                 but config compiled",
                self.name
            ),
            (None, Err(e)) => panic!(
                "Fixture '{fixture}' case '{}': unexpected compile error: {e}",
                self.name
            ),
            (None, Ok(compiled)) => {
                let expect = &self.expect;
                let targets = compiled.targets.as_ref();
                let agents = compiled.agents.as_ref();
                self.check_section(fixture, "targets", expect.targets.as_ref(), targets, catalog);
                self.check_section(fixture, "agents", expect.agents.as_ref(), agents, catalog);
            }
        }
    }
}
