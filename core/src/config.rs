//! Config types for selection construction.
//!
//! These types are serde-deserializable and format-agnostic (YAML or JSON).
//! They compile into runtime types through [`RuleCompiler`]:
//!
//! | Config type | Runtime type |
//! |-------------|--------------|
//! | [`RuleListConfig`] | [`RuleSet`](crate::RuleSet) / [`Rule`](crate::Rule) |
//! | [`AddressSpecConfig`] | [`AddressSpec`] |
//! | [`TargetsConfig`] | [`Plan`] producing addresses |
//! | [`AgentsConfig`] | [`Plan`] producing agent records |
//!
//! ```yaml
//! targets:
//!   match:
//!     devices:
//!       - site.site_name: "one_of(west, east)"
//!     interface_addresses: { family: v4, public_only: true }
//!   max_matches: 10
//! agents:
//!   match:
//!     - status: AGENT_STATUS_OK
//!     - one_of_each: { country: [US, DE] }
//! ```

use crate::{
    AddressFamily, AddressSelector, AddressSource, AddressSpec, CatalogProvider, CompileOptions,
    ConfigError, EvalContext, Pipeline, RecordKind, RuleCompiler, RuleSet, SelectError, Selection,
    SelectionBounds,
};
use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use std::net::IpAddr;

/// A rule list: a sequence of maps, each key one rule.
///
/// See [`compile`](crate::compile) for the accepted shapes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleListConfig(pub Vec<IndexMap<String, serde_json::Value>>);

impl RuleListConfig {
    /// Iterate over the maps in order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexMap<String, serde_json::Value>> {
        self.0.iter()
    }

    /// Number of maps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the list is empty (matches everything).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Configuration of one address source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddressSpecConfig {
    /// `dual` (default), `v4` or `v6`; `IP_FAMILY_*` spellings are accepted.
    #[serde(default)]
    pub family: Option<String>,
    /// Drop private and special-use addresses.
    #[serde(default)]
    pub public_only: bool,
}

impl AddressSpecConfig {
    /// Compile into a runtime spec.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddressFamily`] for an unknown family.
    pub fn to_spec(&self, source: AddressSource) -> Result<AddressSpec, ConfigError> {
        let family = match &self.family {
            Some(f) => f.parse::<AddressFamily>()?,
            None => AddressFamily::Dual,
        };
        Ok(AddressSpec::new(source)
            .family(family)
            .public_only(self.public_only))
    }
}

/// `targets.match`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetMatchConfig {
    /// Device rules.
    #[serde(default)]
    pub devices: RuleListConfig,
    /// Interface rules, limiting which interfaces supply `interface_addresses`.
    #[serde(default)]
    pub interfaces: Option<RuleListConfig>,
    /// Interface primary and secondary addresses.
    #[serde(default, deserialize_with = "present")]
    pub interface_addresses: Option<Option<AddressSpecConfig>>,
    /// Device sending IPs.
    #[serde(default, deserialize_with = "present")]
    pub sending_ips: Option<Option<AddressSpecConfig>>,
    /// Device SNMP IP.
    #[serde(default, alias = "device_snmp_ip", deserialize_with = "present")]
    pub snmp_ip: Option<Option<AddressSpecConfig>>,
}

/// A key given with a `null` value (`snmp_ip:`) counts as present with defaults.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl TargetMatchConfig {
    /// Device-level sources come before interface addresses, so they are
    /// the ones kept when `max_matches` truncates.
    fn address_specs(&self) -> Result<Vec<AddressSpec>, ConfigError> {
        let configured = [
            (AddressSource::SendingIps, &self.sending_ips),
            (AddressSource::SnmpIp, &self.snmp_ip),
            (AddressSource::InterfaceAddresses, &self.interface_addresses),
        ];
        configured
            .into_iter()
            .filter_map(|(source, cfg)| {
                cfg.as_ref().map(|c| (source, c.clone().unwrap_or_default()))
            })
            .map(|(source, cfg)| {
                cfg.to_spec(source)
                    .map_err(|e| e.at(format!("targets.match.{source}")))
            })
            .collect()
    }
}

fn default_min_matches() -> usize {
    1
}

fn bounds(
    section: &str,
    min_matches: usize,
    max_matches: Option<usize>,
    randomize: bool,
) -> Result<SelectionBounds, ConfigError> {
    SelectionBounds::new(Some(min_matches), max_matches, randomize).map_err(|e| e.at(section))
}

/// The `targets` section: devices resolved to addresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetsConfig {
    /// Match-based selection.
    #[serde(default, rename = "match")]
    pub match_: Option<TargetMatchConfig>,
    /// Explicit target addresses.
    #[serde(default, rename = "use")]
    pub use_: Option<Vec<String>>,
    /// Minimum number of results (default 1).
    #[serde(default = "default_min_matches")]
    pub min_matches: usize,
    /// Maximum number of results.
    #[serde(default)]
    pub max_matches: Option<usize>,
    /// Shuffle before truncating to `max_matches`.
    #[serde(default)]
    pub randomize: bool,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            match_: None,
            use_: None,
            min_matches: default_min_matches(),
            max_matches: None,
            randomize: false,
        }
    }
}

impl TargetsConfig {
    /// Compile into a plan.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`], located under `targets`.
    pub fn compile(&self, compiler: &RuleCompiler) -> Result<Plan, ConfigError> {
        match (&self.match_, &self.use_) {
            (Some(m), None) => {
                let rules = compiler.compile_rule_set(&m.devices, "targets.match.devices")?;
                let mut selector = AddressSelector::new(m.address_specs()?);
                if let Some(interfaces) = &m.interfaces {
                    let filter = compiler.compile_filter(interfaces, "targets.match.interfaces")?;
                    selector = selector.with_interface_filter(filter);
                }
                let bounds =
                    bounds("targets", self.min_matches, self.max_matches, self.randomize)?;
                Ok(Plan::Select {
                    kind: RecordKind::Device,
                    pipeline: Pipeline::addresses(rules, selector, bounds),
                })
            }
            (None, Some(addresses)) => {
                let parsed = addresses
                    .iter()
                    .map(|a| {
                        a.trim().parse::<IpAddr>().map_err(|_| {
                            ConfigError::InvalidAddress { address: a.clone() }.at("targets.use")
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Plan::Explicit(Selection::Addresses(parsed)))
            }
            _ => Err(ConfigError::MatchOrUse {
                section: "targets".into(),
            }),
        }
    }
}

/// The `agents` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentsConfig {
    /// Agent rules.
    #[serde(default, rename = "match")]
    pub match_: Option<RuleListConfig>,
    /// Explicit agent ids.
    #[serde(default, rename = "use")]
    pub use_: Option<Vec<String>>,
    /// Minimum number of results (default 1).
    #[serde(default = "default_min_matches")]
    pub min_matches: usize,
    /// Maximum number of results.
    #[serde(default)]
    pub max_matches: Option<usize>,
    /// Shuffle before truncating to `max_matches`.
    #[serde(default)]
    pub randomize: bool,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            match_: None,
            use_: None,
            min_matches: default_min_matches(),
            max_matches: None,
            randomize: false,
        }
    }
}

impl AgentsConfig {
    /// Compile into a plan.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`], located under `agents`.
    pub fn compile(&self, compiler: &RuleCompiler) -> Result<Plan, ConfigError> {
        match (&self.match_, &self.use_) {
            (Some(rules), None) => {
                let rules = compiler.compile_rule_set(rules, "agents.match")?;
                let bounds = bounds("agents", self.min_matches, self.max_matches, self.randomize)?;
                Ok(Plan::Select {
                    kind: RecordKind::Agent,
                    pipeline: Pipeline::records(rules, bounds),
                })
            }
            (None, Some(ids)) => Ok(Plan::Explicit(Selection::Ids(ids.clone()))),
            _ => Err(ConfigError::MatchOrUse {
                section: "agents".into(),
            }),
        }
    }
}

/// A complete configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiftConfig {
    /// Target selection.
    #[serde(default)]
    pub targets: Option<TargetsConfig>,
    /// Agent selection.
    #[serde(default)]
    pub agents: Option<AgentsConfig>,
}

/// A compiled configuration document.
#[derive(Debug, Clone, Default)]
pub struct CompiledConfig {
    /// Compiled `targets` section.
    pub targets: Option<Plan>,
    /// Compiled `agents` section.
    pub agents: Option<Plan>,
}

impl SiftConfig {
    /// Compile both sections. Device attributes are used as written, agent
    /// attributes are converted to camelCase.
    ///
    /// # Errors
    ///
    /// The first [`ConfigError`] found.
    pub fn compile(&self) -> Result<CompiledConfig, ConfigError> {
        let targets = self
            .targets
            .as_ref()
            .map(|t| t.compile(&RuleCompiler::default()))
            .transpose()?;
        let agents = self
            .agents
            .as_ref()
            .map(|a| a.compile(&RuleCompiler::new(CompileOptions::agents())))
            .transpose()?;
        Ok(CompiledConfig { targets, agents })
    }
}

/// A compiled `targets` or `agents` section.
#[derive(Debug, Clone)]
pub enum Plan {
    /// Select from a catalog snapshot.
    Select {
        /// Which records to fetch.
        kind: RecordKind,
        /// The selection to run.
        pipeline: Pipeline,
    },
    /// An explicit list that bypasses matching.
    Explicit(Selection),
}

impl Plan {
    /// Execute the plan. Explicit lists never touch the provider.
    ///
    /// # Errors
    ///
    /// As [`Pipeline::run_with_rng`].
    pub fn execute<P: CatalogProvider + ?Sized, R: Rng + ?Sized>(
        &self,
        provider: &P,
        ctx: &EvalContext,
        rng: &mut R,
    ) -> Result<Selection, SelectError> {
        match self {
            Self::Select { kind, pipeline } => pipeline.run_with_rng(provider, *kind, ctx, rng),
            Self::Explicit(selection) => Ok(selection.clone()),
        }
    }

    /// The rule set, if the plan selects.
    #[must_use]
    pub fn rules(&self) -> Option<&RuleSet> {
        match self {
            Self::Select { pipeline, .. } => Some(pipeline.rules()),
            Self::Explicit(_) => None,
        }
    }
}
