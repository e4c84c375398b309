//! sift - rule matching and target selection for network inventory
//!
//! Selects a subset of inventory records (devices or agents) that satisfy a
//! declarative rule list and, for target selection, turns the selected devices
//! into concrete addresses.
//!
//! # Architecture
//!
//! Leaves first:
//!
//! - [`Value`] / [`Record`]: Typed attribute trees (scalars, lists, nested records)
//! - [`Attribute`]: Resolves dotted paths (`site.site_name`) and the derived `label`
//! - [`ValueMatcher`]: Literal, `regex`, `contains`, `one_of`, `newer_than`, `older_than`, negation
//! - [`Rule`]: Boolean tree of attribute tests (`all`, `any`)
//! - [`OneOfEach`]: At most one record per combination of attribute values
//! - [`AddressSelector`]: Device → address extraction with family / public-only filters
//! - [`Pipeline`]: Filter, select, extract, then enforce [`SelectionBounds`]
//!
//! # Key Design Insights
//!
//! 1. **Compile once, evaluate many**: every argument is parsed and validated by
//!    [`RuleCompiler`] before any record is evaluated. Evaluation cannot fail.
//!
//! 2. **Absent → false**: a rule on a missing (or null) attribute does not match;
//!    a negated rule on a missing attribute does.
//!
//! 3. **Explicit time**: [`EvalContext`] carries the current time captured once
//!    per run, so relative time specs are consistent within a run.
//!
//! # Example
//!
//! ```
//! use sift::prelude::*;
//!
//! let devices: Vec<Record> = ["r1-west-a", "r2-east-b", "r3-west-c"]
//!     .into_iter()
//!     .map(|name| Record::new().with("device_name", name))
//!     .collect();
//!
//! let rules = RuleCompiler::default()
//!     .compile_cli_rules(&["device_name:regex(.*-west-.*)"])
//!     .unwrap();
//! let pipeline = Pipeline::records(rules, SelectionBounds::unbounded());
//!
//! let selection = pipeline.select(&devices, &EvalContext::now()).unwrap();
//! let Selection::Records(selected) = selection else { unreachable!() };
//! let names: Vec<String> = selected.iter().map(Record::label).collect();
//! assert_eq!(names, ["r1-west-a", "r3-west-c"]);
//! ```

// ═══════════════════════════════════════════════════════════════════════════════
// Modules
// ═══════════════════════════════════════════════════════════════════════════════

mod accessor;
mod address;
mod catalog;
pub mod compile;
mod config;
mod context;
mod error;
mod matcher;
mod one_of_each;
mod rule;
mod selection;
mod time_spec;
mod trace;
mod value;

// ═══════════════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════════════

// Core types
pub use accessor::{snake_to_camel, Attribute, AttributePath, KeyStyle};
pub use context::EvalContext;
pub use matcher::{MatchFunction, ValueMatcher, FUNCTION_NAMES, NEGATION_MARKER};
pub use one_of_each::OneOfEach;
pub use rule::{AttributeRule, Rule, RuleEntry, RuleSet};
pub use time_spec::{parse_timestamp, TimeSpec};
pub use value::{Record, Value};

// Selection
pub use address::{is_public, AddressFamily, AddressSelector, AddressSource, AddressSpec};
pub use catalog::{CatalogProvider, RecordKind};
pub use selection::{Pipeline, Selection, SelectionBounds};

// Config
pub use compile::{parse_rule_arg, CompileOptions, RuleCompiler};
pub use config::{
    AddressSpecConfig, AgentsConfig, CompiledConfig, Plan, RuleListConfig, SiftConfig,
    TargetMatchConfig, TargetsConfig,
};

// Errors
pub use error::{ConfigError, SelectError};

// Trace types
pub use trace::RuleTrace;

// ═══════════════════════════════════════════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════════════════════════════════════════

/// Prelude module for convenient imports.
///
/// ```
/// use sift::prelude::*;
/// ```
pub mod prelude {
    // Values and rules
    pub use crate::{
        Attribute, AttributePath, EvalContext, KeyStyle, OneOfEach, Record, Rule, RuleEntry,
        RuleSet, RuleTrace, Value, ValueMatcher,
    };

    // Selection
    pub use crate::{
        AddressFamily, AddressSelector, AddressSource, AddressSpec, CatalogProvider, Pipeline,
        RecordKind, Selection, SelectionBounds,
    };

    // Config and errors
    pub use crate::{CompileOptions, ConfigError, RuleCompiler, SelectError, SiftConfig};
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum allowed depth for nested rules.
///
/// Protects against stack overflow from deeply nested `all` / `any`.
/// Enforced at compile time via [`Rule::validate`].
pub const MAX_DEPTH: usize = 32;

/// Maximum number of children in a single `all` or `any`.
///
/// Width-based protection complementing [`MAX_DEPTH`].
pub const MAX_RULES_PER_COMPOUND: usize = 256;

/// Maximum length for non-regex match arguments.
pub const MAX_PATTERN_LENGTH: usize = 8192;

/// Maximum length for regex patterns.
///
/// Shorter limit than [`MAX_PATTERN_LENGTH`] because regex compilation cost
/// scales faster than literal matching.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4096;

/// Maximum number of `one_of_each` combinations.
pub const MAX_COMBINATIONS: usize = 65_536;
