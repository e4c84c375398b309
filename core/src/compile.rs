//! Rule compiler: turns configuration rule lists into rule trees
//!
//! A rule list is a sequence of maps. Every key of every map is one rule, in order:
//!
//! | Key | Value | Compiles to |
//! |-----|-------|-------------|
//! | `all` | rule list | [`Rule::All`] |
//! | `any` | rule list | [`Rule::Any`] |
//! | `one_of_each` | map of attribute → value list | [`OneOfEach`] (top level only) |
//! | anything else | scalar match argument | [`Rule::Attribute`] |
//!
//! All validation happens here: unknown functions, bad patterns and time
//! specs, misplaced `one_of_each`, depth and width limits. Errors carry the
//! location of the offending rule (`devices[1].any[0].site.site_name`).

use crate::config::RuleListConfig;
use crate::{
    Attribute, AttributePath, AttributeRule, ConfigError, KeyStyle, OneOfEach, Rule, RuleEntry,
    RuleSet, Value, ValueMatcher, MAX_DEPTH,
};

/// Key of the conjunction rule.
pub const ALL_KEY: &str = "all";
/// Key of the disjunction rule.
pub const ANY_KEY: &str = "any";
/// Key of the combinatorial selector.
pub const ONE_OF_EACH_KEY: &str = "one_of_each";

/// Options for [`RuleCompiler`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// How attribute names map onto record field names.
    pub key_style: KeyStyle,
}

impl CompileOptions {
    /// Options for agent records, whose fields are camelCase.
    #[must_use]
    pub fn agents() -> Self {
        Self {
            key_style: KeyStyle::CamelCase,
        }
    }
}

/// Compiles rule lists into [`RuleSet`]s and [`Rule`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleCompiler {
    options: CompileOptions,
}

impl RuleCompiler {
    /// Create a compiler.
    #[must_use]
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    /// The compiler's options.
    #[must_use]
    pub fn options(&self) -> CompileOptions {
        self.options
    }

    /// Compile a top-level rule list (may contain one `one_of_each`).
    ///
    /// `location` prefixes error locations, e.g. `"devices"`.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`], wrapped in [`ConfigError::Located`].
    pub fn compile_rule_set(
        &self,
        list: &RuleListConfig,
        location: &str,
    ) -> Result<RuleSet, ConfigError> {
        let mut entries = Vec::new();
        self.compile_list(list, location, 1, true, &mut entries)?;
        let set = RuleSet::from_entries(entries).map_err(|e| e.at(location))?;
        tracing::debug!(
            location,
            depth = set.filter().depth(),
            one_of_each = set.one_of_each().is_some(),
            "compiled rule set"
        );
        Ok(set)
    }

    /// Compile a rule list into a single `all` rule. `one_of_each` is rejected.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`], wrapped in [`ConfigError::Located`].
    pub fn compile_filter(
        &self,
        list: &RuleListConfig,
        location: &str,
    ) -> Result<Rule, ConfigError> {
        let rule = Rule::All(self.compile_children(list, location, 1)?);
        rule.validate().map_err(|e| e.at(location))?;
        Ok(rule)
    }

    /// Compile `property:value` command-line rules into an implicit `all`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MalformedRule`] for arguments without `:`, or any error
    /// from the match argument.
    pub fn compile_cli_rules<S: AsRef<str>>(&self, rules: &[S]) -> Result<RuleSet, ConfigError> {
        let mut filter = Vec::with_capacity(rules.len());
        for (i, raw) in rules.iter().enumerate() {
            let at = format!("rule[{i}]");
            let (attribute, argument) = parse_rule_arg(raw.as_ref()).map_err(|e| e.at(&at))?;
            filter.push(self.attribute_rule(attribute, argument).map_err(|e| e.at(&at))?);
        }
        RuleSet::from_entries(filter.into_iter().map(RuleEntry::Rule).collect())
    }

    fn compile_children(
        &self,
        list: &RuleListConfig,
        location: &str,
        depth: usize,
    ) -> Result<Vec<Rule>, ConfigError> {
        let mut entries = Vec::new();
        self.compile_list(list, location, depth, false, &mut entries)?;
        Ok(entries
            .into_iter()
            .filter_map(|entry| match entry {
                RuleEntry::Rule(rule) => Some(rule),
                RuleEntry::OneOfEach(_) => None,
            })
            .collect())
    }

    fn compile_list(
        &self,
        list: &RuleListConfig,
        location: &str,
        depth: usize,
        top_level: bool,
        out: &mut Vec<RuleEntry>,
    ) -> Result<(), ConfigError> {
        if depth > MAX_DEPTH {
            return Err(ConfigError::DepthExceeded {
                depth,
                max: MAX_DEPTH,
            }
            .at(location));
        }
        for (i, map) in list.iter().enumerate() {
            if map.is_empty() {
                return Err(ConfigError::MalformedRule {
                    reason: "empty rule".into(),
                }
                .at(format!("{location}[{i}]")));
            }
            for (key, value) in map {
                let at = format!("{location}[{i}].{key}");
                let entry = self.compile_entry(key, value, &at, depth, top_level)?;
                out.push(entry);
            }
        }
        Ok(())
    }

    fn compile_entry(
        &self,
        key: &str,
        value: &serde_json::Value,
        at: &str,
        depth: usize,
        top_level: bool,
    ) -> Result<RuleEntry, ConfigError> {
        match key {
            ALL_KEY | ANY_KEY => {
                let children: RuleListConfig = serde_json::from_value(value.clone()).map_err(|_| {
                    ConfigError::MalformedRule {
                        reason: format!("\"{key}\" requires a list of rules"),
                    }
                    .at(at)
                })?;
                let children = self.compile_children(&children, at, depth + 1)?;
                Ok(RuleEntry::Rule(if key == ALL_KEY {
                    Rule::All(children)
                } else {
                    Rule::Any(children)
                }))
            }
            ONE_OF_EACH_KEY => {
                if !top_level {
                    return Err(ConfigError::NestedOneOfEach.at(at));
                }
                self.one_of_each(value).map(RuleEntry::OneOfEach).map_err(|e| e.at(at))
            }
            attribute => {
                let argument = scalar_argument(value).map_err(|e| e.at(at))?;
                self.attribute_rule(attribute, &argument)
                    .map(RuleEntry::Rule)
                    .map_err(|e| e.at(at))
            }
        }
    }

    fn attribute_rule(&self, attribute: &str, argument: &str) -> Result<Rule, ConfigError> {
        let attribute = Attribute::parse(attribute, self.options.key_style)?;
        let matcher = ValueMatcher::parse(argument)?;
        AttributeRule::new(attribute, matcher).map(Rule::Attribute)
    }

    fn one_of_each(&self, value: &serde_json::Value) -> Result<OneOfEach, ConfigError> {
        let serde_json::Value::Object(map) = value else {
            return Err(ConfigError::MalformedRule {
                reason: "one_of_each requires a map of attribute to value list".into(),
            });
        };
        let mut keys = Vec::with_capacity(map.len());
        for (attribute, values) in map {
            let path = AttributePath::parse(attribute, self.options.key_style)?;
            let values = match values {
                serde_json::Value::Array(items) => items
                    .iter()
                    .map(scalar_argument)
                    .collect::<Result<Vec<_>, _>>()?,
                scalar => vec![scalar_argument(scalar)?],
            };
            keys.push((path, values));
        }
        OneOfEach::new(keys)
    }
}

/// The normalized string of a scalar configuration value.
fn scalar_argument(value: &serde_json::Value) -> Result<String, ConfigError> {
    let converted = Value::from(value.clone());
    if !converted.is_scalar() {
        return Err(ConfigError::MalformedRule {
            reason: format!("expected a scalar value, found {}", converted.type_name()),
        });
    }
    converted
        .match_string()
        .map(std::borrow::Cow::into_owned)
        .ok_or_else(|| ConfigError::MalformedRule {
            reason: "expected a scalar value".into(),
        })
}

/// Split a `property:value` rule on the first `:`.
///
/// # Errors
///
/// Returns [`ConfigError::MalformedRule`] if there is no `:` or the property is empty.
pub fn parse_rule_arg(raw: &str) -> Result<(&str, &str), ConfigError> {
    match raw.split_once(':') {
        Some((property, value)) if !property.trim().is_empty() => Ok((property.trim(), value)),
        _ => Err(ConfigError::MalformedRule {
            reason: format!("invalid rule \"{raw}\" (expected <property>:<value>)"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EvalContext, Record};

    fn list(yaml: &str) -> RuleListConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn compile(yaml: &str) -> Result<RuleSet, ConfigError> {
        RuleCompiler::default().compile_rule_set(&list(yaml), "devices")
    }

    #[test]
    fn compiles_nested_rules() {
        let set = compile(
            r#"
- site.site_name: "one_of(west, east)"
- any:
    - device_type: router
    - label: edge
- device_name: "!regex(^lab-)"
"#,
        )
        .unwrap();
        let ctx = EvalContext::now();
        let router = Record::new()
            .with("device_name", "r1")
            .with("device_type", "router")
            .with("site", Record::new().with("site_name", "west"));
        assert!(set.matches(&router, &ctx));
        let lab = router.clone().with("device_name", "lab-1");
        assert!(!set.matches(&lab, &ctx));
        assert!(set.one_of_each().is_none());
    }

    #[test]
    fn multi_key_maps_are_separate_rules() {
        let set = compile("- { device_type: router, vendor: cisco }").unwrap();
        let ctx = EvalContext::now();
        let both = Record::new().with("device_type", "router").with("vendor", "cisco");
        let one = Record::new().with("device_type", "router").with("vendor", "juniper");
        assert!(set.matches(&both, &ctx));
        assert!(!set.matches(&one, &ctx));
    }

    #[test]
    fn non_string_scalars_are_literals() {
        let set = compile("- asn: 7018\n- managed: true").unwrap();
        let r = Record::new().with("asn", 7018).with("managed", true);
        assert!(set.matches(&r, &EvalContext::now()));
    }

    #[test]
    fn one_of_each_at_top_level() {
        let set = compile("- one_of_each: { country: [US, DE], asn: [7018, 3320] }").unwrap();
        let selector = set.one_of_each().unwrap();
        assert_eq!(selector.combinations(), 4);
        assert_eq!(selector.keys()[1].1, ["7018", "3320"]);
    }

    #[test]
    fn nested_one_of_each_is_rejected_with_location() {
        let err = compile("- any:\n    - one_of_each: { country: [US] }").unwrap_err();
        assert_eq!(err.root(), &ConfigError::NestedOneOfEach);
        assert_eq!(
            err.to_string(),
            "devices[0].any[0].one_of_each: \
             one_of_each is only allowed at the top level of a device or agent rule list"
        );
    }

    #[test]
    fn duplicate_one_of_each_is_rejected() {
        let err = compile("- one_of_each: { a: [1] }\n- one_of_each: { b: [2] }").unwrap_err();
        assert_eq!(err.root(), &ConfigError::DuplicateOneOfEach);
    }

    #[test]
    fn unknown_function_reports_attribute() {
        let err = compile("- vendor: \"startswith(cis)\"").unwrap_err();
        assert!(matches!(err.root(), ConfigError::UnknownFunction { .. }));
        assert!(err.to_string().starts_with("devices[0].vendor:"));
    }

    #[test]
    fn malformed_shapes() {
        for yaml in [
            "- any: router",
            "- vendor: [a, b]",
            "- vendor: { x: 1 }",
            "- vendor: null",
            "- {}",
            "- one_of_each: [a]",
        ] {
            let err = compile(yaml).unwrap_err();
            assert!(
                matches!(err.root(), ConfigError::MalformedRule { .. }),
                "{yaml}: {err}"
            );
        }
    }

    #[test]
    fn filter_rejects_one_of_each() {
        let err = RuleCompiler::default()
            .compile_filter(&list("- one_of_each: { a: [1] }"), "interfaces")
            .unwrap_err();
        assert_eq!(err.root(), &ConfigError::NestedOneOfEach);
    }

    #[test]
    fn depth_limit() {
        let mut yaml = String::from("[{device_type: router}]");
        for _ in 0..MAX_DEPTH {
            yaml = format!("[{{all: {yaml}}}]");
        }
        let err = compile(&yaml).unwrap_err();
        assert!(matches!(err.root(), ConfigError::DepthExceeded { .. }));
    }

    #[test]
    fn camel_case_agents() {
        let set = RuleCompiler::new(CompileOptions::agents())
            .compile_rule_set(&list("- agent_impl: IMPLEMENT_TYPE_RUST"), "agents")
            .unwrap();
        let agent = Record::new().with("agentImpl", "IMPLEMENT_TYPE_RUST");
        assert!(set.matches(&agent, &EvalContext::now()));
    }

    #[test]
    fn cli_rules() {
        assert_eq!(parse_rule_arg("site.site_name:west").unwrap(), ("site.site_name", "west"));
        assert_eq!(parse_rule_arg("name:regex(a:b)").unwrap(), ("name", "regex(a:b)"));
        assert!(parse_rule_arg("no-colon").is_err());
        assert!(parse_rule_arg(":value").is_err());

        let set = RuleCompiler::default()
            .compile_cli_rules(&["device_type:router", "site.site_name:!east"])
            .unwrap();
        let r = Record::new()
            .with("device_type", "router")
            .with("site", Record::new().with("site_name", "west"));
        assert!(set.matches(&r, &EvalContext::now()));

        let err = RuleCompiler::default().compile_cli_rules(&["bad"]).unwrap_err();
        assert!(err.to_string().starts_with("rule[0]:"));
    }
}
