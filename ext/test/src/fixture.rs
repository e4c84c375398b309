//! Rule conformance fixture runner
//!
//! A fixture holds a record set and cases, each a rule list with the expected
//! selection (by record label) or an expected compile error:
//!
//! ```yaml
//! name: regex_filter
//! description: regex is a search, not a full match
//! records:
//!   - { device_name: r1-west-a }
//!   - { device_name: r2-east-b }
//! cases:
//!   - name: west
//!     match: [{ device_name: "regex(-west-)" }]
//!     expect: [r1-west-a]
//!   - name: unknown function
//!     match: [{ device_name: "startswith(r)" }]
//!     expect_error: unknown match function
//! ```

use crate::fixed_context;
use serde::Deserialize;
use sift::prelude::*;
use sift::RuleListConfig;

/// Which compile options a fixture uses.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureKind {
    /// Attributes as written.
    #[default]
    Device,
    /// Attributes converted to camelCase.
    Agent,
}

/// A complete rule fixture.
#[derive(Debug, Deserialize)]
pub struct Fixture {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: FixtureKind,
    pub records: Vec<Record>,
    pub cases: Vec<TestCase>,
}

/// One rule list and its expected outcome.
#[derive(Debug, Deserialize)]
pub struct TestCase {
    pub name: String,
    #[serde(rename = "match")]
    pub rules: RuleListConfig,
    /// Expected record labels, in order.
    #[serde(default)]
    pub expect: Option<Vec<String>>,
    /// Substring of the expected compile error.
    #[serde(default)]
    pub expect_error: Option<String>,
}

/// Result of running a single test case.
#[derive(Debug)]
pub struct CaseResult {
    pub case_name: String,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
}

impl Fixture {
    /// Parse a fixture from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Parse multiple fixtures from a YAML file with `---` separators.
    pub fn from_yaml_multi(yaml: &str) -> Result<Vec<Self>, serde_yaml::Error> {
        let mut fixtures = Vec::new();
        for doc in serde_yaml::Deserializer::from_str(yaml) {
            fixtures.push(Self::deserialize(doc)?);
        }
        Ok(fixtures)
    }

    fn compiler(&self) -> RuleCompiler {
        match self.kind {
            FixtureKind::Device => RuleCompiler::default(),
            FixtureKind::Agent => RuleCompiler::new(CompileOptions::agents()),
        }
    }

    /// Run all test cases and return results.
    pub fn run(&self) -> Vec<CaseResult> {
        let compiler = self.compiler();
        let ctx = fixed_context();
        self.cases
            .iter()
            .map(|case| {
                let expected = match (&case.expect, &case.expect_error) {
                    (Some(labels), None) => format!("{labels:?}"),
                    (None, Some(error)) => format!("error containing {error:?}"),
                    _ => "exactly one of expect / expect_error".to_owned(),
                };
                let (passed, actual) = match compiler.compile_rule_set(&case.rules, "match") {
                    Ok(rules) => {
                        let labels: Vec<String> = rules
                            .apply(&self.records, &ctx)
                            .iter()
                            .map(|r| r.label())
                            .collect();
                        let passed = case.expect_error.is_none()
                            && case.expect.as_ref() == Some(&labels);
                        (passed, format!("{labels:?}"))
                    }
                    Err(e) => {
                        let message = e.to_string();
                        let passed = case.expect.is_none()
                            && case
                                .expect_error
                                .as_ref()
                                .is_some_and(|needle| message.contains(needle.as_str()));
                        (passed, format!("error {message:?}"))
                    }
                };
                CaseResult {
                    case_name: case.name.clone(),
                    passed,
                    expected,
                    actual,
                }
            })
            .collect()
    }

    /// Run all test cases and panic on first failure.
    pub fn run_and_assert(&self) {
        for result in self.run() {
            assert!(
                result.passed,
                "Fixture '{}' case '{}' failed: expected {}, got {}",
                self.name, result.case_name, result.expected, result.actual
            );
        }
    }
}
