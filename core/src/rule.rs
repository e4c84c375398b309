//! Rule: boolean trees over record attributes
//!
//! A [`Rule`] is an attribute test or an `all` / `any` composition of rules.
//! A [`RuleSet`] is a top-level rule list: an implicit `all` filter plus at most
//! one [`OneOfEach`] block that runs over the filtered records.

use crate::{
    Attribute, ConfigError, EvalContext, MatchFunction, OneOfEach, Record, RuleTrace, Value,
    ValueMatcher, MAX_DEPTH, MAX_RULES_PER_COMPOUND,
};

/// A single attribute test: resolve an attribute, then apply a match function.
///
/// # INV: absent → false
///
/// If the attribute is absent (or null) the rule does not match, unless the
/// matcher is negated, in which case it does.
#[derive(Debug, Clone)]
pub struct AttributeRule {
    attribute: Attribute,
    matcher: ValueMatcher,
}

impl AttributeRule {
    /// Create an attribute rule.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedLabelFunction`] if `label` is combined with
    /// anything other than literal or `one_of` matching.
    pub fn new(attribute: Attribute, matcher: ValueMatcher) -> Result<Self, ConfigError> {
        if attribute == Attribute::Label
            && !matches!(
                matcher.function(),
                MatchFunction::Literal(_) | MatchFunction::OneOf(_)
            )
        {
            return Err(ConfigError::UnsupportedLabelFunction {
                function: matcher.function().name(),
            });
        }
        Ok(Self { attribute, matcher })
    }

    /// The tested attribute.
    #[must_use]
    pub fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    /// The match function.
    #[must_use]
    pub fn matcher(&self) -> &ValueMatcher {
        &self.matcher
    }

    fn test(&self, value: Option<&Value>, ctx: &EvalContext) -> bool {
        match (&self.attribute, self.matcher.function(), value) {
            // Any label in the set.
            (Attribute::Label, function @ MatchFunction::OneOf(_), Some(Value::List(names))) => {
                names.iter().any(|name| function.matches(name, ctx)) ^ self.matcher.is_negated()
            }
            _ => self.matcher.evaluate(value, ctx),
        }
    }

    /// Evaluate against a record.
    #[must_use]
    pub fn evaluate(&self, record: &Record, ctx: &EvalContext) -> bool {
        let value = self.attribute.resolve(record);
        self.test(value.as_deref(), ctx)
    }

    /// Evaluate with a trace of the resolved value.
    #[must_use]
    pub fn evaluate_with_trace(&self, record: &Record, ctx: &EvalContext) -> RuleTrace {
        let value = self.attribute.resolve(record);
        RuleTrace::Attribute {
            matched: self.test(value.as_deref(), ctx),
            attribute: self.attribute.to_string(),
            value: value.map(std::borrow::Cow::into_owned),
            matcher: self.matcher.to_string(),
        }
    }
}

/// A boolean rule tree.
///
/// # Variants
///
/// - `Attribute`: a single attribute test
/// - `All`: every child must match (short-circuit on first false; empty is true)
/// - `Any`: some child must match (short-circuit on first true; empty is false)
///
/// # Example
///
/// ```
/// use sift::prelude::*;
///
/// let rule = Rule::Any(vec![
///     Rule::attribute("name", "regex(-west-)").unwrap(),
///     Rule::attribute("site.site_name", "one_of(west, north)").unwrap(),
/// ]);
///
/// let ctx = EvalContext::now();
/// assert!(rule.evaluate(&Record::new().with("name", "r1-west-a"), &ctx));
/// assert!(!rule.evaluate(&Record::new().with("name", "r2-east-b"), &ctx));
/// ```
#[derive(Debug, Clone)]
pub enum Rule {
    /// A single attribute test.
    Attribute(AttributeRule),
    /// Logical AND.
    All(Vec<Rule>),
    /// Logical OR.
    Any(Vec<Rule>),
}

impl Rule {
    /// Build an attribute rule from an attribute name and a textual match argument.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from parsing the attribute or the match argument.
    pub fn attribute(attribute: &str, argument: &str) -> Result<Self, ConfigError> {
        let attribute = Attribute::parse(attribute, crate::KeyStyle::AsWritten)?;
        let matcher = ValueMatcher::parse(argument)?;
        AttributeRule::new(attribute, matcher).map(Self::Attribute)
    }

    /// Evaluate against a record.
    ///
    /// Recursion depth is bounded by [`MAX_DEPTH`], enforced by [`validate`](Self::validate)
    /// at compile time.
    #[must_use]
    pub fn evaluate(&self, record: &Record, ctx: &EvalContext) -> bool {
        match self {
            Self::Attribute(rule) => rule.evaluate(record, ctx),
            Self::All(rules) => rules.iter().all(|r| r.evaluate(record, ctx)),
            Self::Any(rules) => rules.iter().any(|r| r.evaluate(record, ctx)),
        }
    }

    /// Evaluate with full trace for debugging.
    ///
    /// Unlike [`evaluate()`](Self::evaluate), this does NOT short-circuit.
    #[must_use]
    pub fn evaluate_with_trace(&self, record: &Record, ctx: &EvalContext) -> RuleTrace {
        match self {
            Self::Attribute(rule) => rule.evaluate_with_trace(record, ctx),
            Self::All(rules) => {
                let children: Vec<RuleTrace> =
                    rules.iter().map(|r| r.evaluate_with_trace(record, ctx)).collect();
                let matched = children.iter().all(RuleTrace::matched);
                RuleTrace::All { matched, children }
            }
            Self::Any(rules) => {
                let children: Vec<RuleTrace> =
                    rules.iter().map(|r| r.evaluate_with_trace(record, ctx)).collect();
                let matched = children.iter().any(RuleTrace::matched);
                RuleTrace::Any { matched, children }
            }
        }
    }

    /// Depth of the rule tree (an attribute rule has depth 1).
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Attribute(_) => 1,
            Self::All(rules) | Self::Any(rules) => {
                1 + rules.iter().map(Rule::depth).max().unwrap_or(0)
            }
        }
    }

    /// Check depth and width limits.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::DepthExceeded`] beyond [`MAX_DEPTH`]
    /// - [`ConfigError::TooManyRules`] for a compound with more than
    ///   [`MAX_RULES_PER_COMPOUND`] children
    pub fn validate(&self) -> Result<(), ConfigError> {
        let depth = self.depth();
        if depth > MAX_DEPTH {
            return Err(ConfigError::DepthExceeded {
                depth,
                max: MAX_DEPTH,
            });
        }
        self.validate_width()
    }

    fn validate_width(&self) -> Result<(), ConfigError> {
        match self {
            Self::Attribute(_) => Ok(()),
            Self::All(rules) | Self::Any(rules) => {
                if rules.len() > MAX_RULES_PER_COMPOUND {
                    return Err(ConfigError::TooManyRules {
                        count: rules.len(),
                        max: MAX_RULES_PER_COMPOUND,
                    });
                }
                rules.iter().try_for_each(Rule::validate_width)
            }
        }
    }
}

/// One element of a top-level rule list.
#[derive(Debug, Clone)]
pub enum RuleEntry {
    /// A boolean rule, part of the implicit `all` filter.
    Rule(Rule),
    /// The combinatorial selector.
    OneOfEach(OneOfEach),
}

/// A compiled top-level rule list.
///
/// The boolean entries form an implicit `all` filter applied to every record.
/// If a `one_of_each` entry is present, it runs over the records that passed the
/// filter.
#[derive(Debug, Clone)]
pub struct RuleSet {
    filter: Rule,
    one_of_each: Option<OneOfEach>,
}

impl RuleSet {
    /// A rule set with a filter and optional selector.
    #[must_use]
    pub fn new(filter: Vec<Rule>, one_of_each: Option<OneOfEach>) -> Self {
        Self {
            filter: Rule::All(filter),
            one_of_each,
        }
    }

    /// A rule set matching every record.
    #[must_use]
    pub fn match_all() -> Self {
        Self::new(Vec::new(), None)
    }

    /// Partition a top-level rule list.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::DuplicateOneOfEach`] if more than one `one_of_each` is present
    /// - any limit error from [`Rule::validate`]
    pub fn from_entries(entries: Vec<RuleEntry>) -> Result<Self, ConfigError> {
        let mut filter = Vec::with_capacity(entries.len());
        let mut one_of_each = None;
        for entry in entries {
            match entry {
                RuleEntry::Rule(rule) => filter.push(rule),
                RuleEntry::OneOfEach(selector) => {
                    if one_of_each.replace(selector).is_some() {
                        return Err(ConfigError::DuplicateOneOfEach);
                    }
                }
            }
        }
        let set = Self::new(filter, one_of_each);
        set.filter.validate()?;
        Ok(set)
    }

    /// The implicit `all` filter.
    #[must_use]
    pub fn filter(&self) -> &Rule {
        &self.filter
    }

    /// The combinatorial selector, if any.
    #[must_use]
    pub fn one_of_each(&self) -> Option<&OneOfEach> {
        self.one_of_each.as_ref()
    }

    /// Whether a single record passes the filter (ignores `one_of_each`).
    #[must_use]
    pub fn matches(&self, record: &Record, ctx: &EvalContext) -> bool {
        self.filter.evaluate(record, ctx)
    }

    /// Filter records, then run `one_of_each` if present. Preserves input order.
    #[must_use]
    pub fn apply<'a>(&self, records: &'a [Record], ctx: &EvalContext) -> Vec<&'a Record> {
        let filtered: Vec<&'a Record> = records
            .iter()
            .filter(|record| {
                let matched = self.matches(record, ctx);
                tracing::trace!(record = %record.label(), matched, "filter");
                matched
            })
            .collect();
        tracing::debug!(
            candidates = records.len(),
            matched = filtered.len(),
            "rule filter applied"
        );
        match &self.one_of_each {
            Some(selector) => selector.select(&filtered),
            None => filtered,
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::match_all()
    }
}
