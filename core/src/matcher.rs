//! Match functions: the value tests a rule applies to one attribute
//!
//! A [`ValueMatcher`] is a [`MatchFunction`] plus a negation flag. It is parsed
//! from the textual argument authors write in configuration:
//!
//! | Argument | Function |
//! |----------|----------|
//! | `router` | literal equality (implicit contains against lists) |
//! | `regex(^r\d+-)` | regex search against the value's string form |
//! | `contains(edge)` | list-valued attribute has an element equal to `edge` |
//! | `one_of(west, east)` | value equals one of the comma-separated alternatives |
//! | `newer_than(-7d)` / `older_than(2024-01-01)` | timestamp comparison |
//! | `!<any of the above>` | negation |
//!
//! All arguments are validated when the rule tree is compiled. Evaluation never fails:
//! a value of the wrong shape simply does not match.

use crate::time_spec::{epoch_float, parse_timestamp};
use crate::{
    ConfigError, EvalContext, TimeSpec, Value, MAX_PATTERN_LENGTH, MAX_REGEX_PATTERN_LENGTH,
};
use chrono::{DateTime, Utc};
use std::fmt;

/// Prefix marking a negated match argument.
pub const NEGATION_MARKER: char = '!';

/// Names of the match functions recognized in `name(arg)` arguments.
pub const FUNCTION_NAMES: &[&str] = &["regex", "contains", "one_of", "newer_than", "older_than"];

/// A single match function over one attribute value.
#[derive(Debug, Clone)]
pub enum MatchFunction {
    /// String equality after normalization; against a list, any element.
    Literal(String),
    /// Regex search (not full match) over the value's string form.
    Regex(regex::Regex),
    /// The list-valued attribute contains an element equal to this string.
    Contains(String),
    /// The value equals one of the alternatives.
    OneOf(Vec<String>),
    /// The value's timestamp is after the resolved spec.
    NewerThan(TimeSpec),
    /// The value's timestamp is before the resolved spec.
    OlderThan(TimeSpec),
}

impl MatchFunction {
    /// Build a regex function.
    ///
    /// Uses the `regex` crate, which guarantees linear-time matching.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::PatternTooLong`] or [`ConfigError::InvalidPattern`].
    pub fn regex(pattern: &str) -> Result<Self, ConfigError> {
        if pattern.len() > MAX_REGEX_PATTERN_LENGTH {
            return Err(ConfigError::PatternTooLong {
                len: pattern.len(),
                max: MAX_REGEX_PATTERN_LENGTH,
            });
        }
        regex::Regex::new(pattern)
            .map(Self::Regex)
            .map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.to_owned(),
                message: e.to_string(),
            })
    }

    /// Build a `one_of` function from a comma-separated list.
    #[must_use]
    pub fn one_of(alternatives: &str) -> Self {
        Self::OneOf(alternatives.split(',').map(|s| s.trim().to_owned()).collect())
    }

    /// The configuration name of this function (`"literal"` for plain values).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::Regex(_) => "regex",
            Self::Contains(_) => "contains",
            Self::OneOf(_) => "one_of",
            Self::NewerThan(_) => "newer_than",
            Self::OlderThan(_) => "older_than",
        }
    }

    /// Test a present (non-null) attribute value.
    #[must_use]
    pub fn matches(&self, value: &Value, ctx: &EvalContext) -> bool {
        match self {
            Self::Literal(expected) => match value {
                Value::List(items) => items.iter().any(|item| eq_str(item, expected)),
                _ => eq_str(value, expected),
            },
            Self::Regex(re) => {
                !value.is_list() && value.match_string().is_some_and(|s| re.is_match(&s))
            }
            Self::Contains(expected) => value
                .as_list()
                .is_some_and(|items| items.iter().any(|item| eq_str(item, expected))),
            Self::OneOf(alternatives) => {
                !value.is_list() && alternatives.iter().any(|alt| eq_str(value, alt))
            }
            Self::NewerThan(spec) => {
                value_timestamp(value).is_some_and(|ts| ts > spec.resolve(ctx.current_time()))
            }
            Self::OlderThan(spec) => {
                value_timestamp(value).is_some_and(|ts| ts < spec.resolve(ctx.current_time()))
            }
        }
    }
}

impl fmt::Display for MatchFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => write!(f, "\"{v}\""),
            Self::Regex(re) => write!(f, "regex({})", re.as_str()),
            Self::Contains(v) => write!(f, "contains({v})"),
            Self::OneOf(vs) => write!(f, "one_of({})", vs.join(", ")),
            Self::NewerThan(spec) => write!(f, "newer_than({spec})"),
            Self::OlderThan(spec) => write!(f, "older_than({spec})"),
        }
    }
}

fn eq_str(value: &Value, expected: &str) -> bool {
    value.match_string().is_some_and(|s| s == expected)
}

/// Interprets an attribute value as a timestamp.
fn value_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let ts = match value {
        Value::Timestamp(ts) => Some(*ts),
        Value::String(s) => parse_timestamp(s),
        Value::Int(secs) => DateTime::from_timestamp(*secs, 0),
        Value::Float(secs) => epoch_float(*secs),
        _ => None,
    };
    if ts.is_none() {
        tracing::debug!(value = ?value, "cannot interpret attribute as a timestamp");
    }
    ts
}

/// A match function with optional negation.
///
/// # Example
///
/// ```
/// use sift::{EvalContext, Value, ValueMatcher};
///
/// let ctx = EvalContext::now();
/// let m = ValueMatcher::parse("!one_of(west, east)").unwrap();
/// assert!(m.is_negated());
/// assert!(m.evaluate(Some(&Value::from("north")), &ctx));
/// assert!(!m.evaluate(Some(&Value::from("west")), &ctx));
/// // Negation of an absent attribute is satisfied.
/// assert!(m.evaluate(None, &ctx));
/// ```
#[derive(Debug, Clone)]
pub struct ValueMatcher {
    function: MatchFunction,
    negated: bool,
}

impl ValueMatcher {
    /// Create a matcher from a function and negation flag.
    #[must_use]
    pub fn new(function: MatchFunction, negated: bool) -> Self {
        Self { function, negated }
    }

    /// A non-negated literal equality matcher.
    pub fn literal(expected: impl Into<String>) -> Self {
        Self::new(MatchFunction::Literal(expected.into()), false)
    }

    /// Parse a textual match argument (`[!]name(arg)` or a literal).
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnknownFunction`] for `name(...)` with an unrecognized name
    /// - [`ConfigError::InvalidPattern`] / [`ConfigError::PatternTooLong`] for bad regexes
    /// - [`ConfigError::InvalidTimeSpec`] for bad `newer_than` / `older_than` arguments
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let (negated, body) = match text.strip_prefix(NEGATION_MARKER) {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        if body.len() > MAX_PATTERN_LENGTH {
            return Err(ConfigError::PatternTooLong {
                len: body.len(),
                max: MAX_PATTERN_LENGTH,
            });
        }

        let Some((name, arg)) = split_call(body) else {
            return Ok(Self::new(MatchFunction::Literal(body.to_owned()), negated));
        };
        let function = match name {
            "regex" => MatchFunction::regex(arg)?,
            "contains" => MatchFunction::Contains(arg.to_owned()),
            "one_of" => MatchFunction::one_of(arg),
            "newer_than" => MatchFunction::NewerThan(TimeSpec::parse(arg)?),
            "older_than" => MatchFunction::OlderThan(TimeSpec::parse(arg)?),
            other => {
                return Err(ConfigError::UnknownFunction {
                    function: other.to_owned(),
                    available: FUNCTION_NAMES.iter().map(|s| (*s).to_owned()).collect(),
                })
            }
        };
        Ok(Self::new(function, negated))
    }

    /// The wrapped match function.
    #[must_use]
    pub fn function(&self) -> &MatchFunction {
        &self.function
    }

    /// Returns `true` if the result is inverted.
    #[must_use]
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Evaluate against a resolved attribute (`None` = absent).
    ///
    /// # INV: absent → no match, negated absent → match
    ///
    /// `Null` counts as absent.
    #[must_use]
    pub fn evaluate(&self, value: Option<&Value>, ctx: &EvalContext) -> bool {
        match value {
            None | Some(Value::Null) => self.negated,
            Some(v) => self.function.matches(v, ctx) ^ self.negated,
        }
    }
}

impl fmt::Display for ValueMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "{NEGATION_MARKER}{}", self.function)
        } else {
            self.function.fmt(f)
        }
    }
}

/// Splits `name(arg)` into its parts when `name` looks like a function identifier.
fn split_call(body: &str) -> Option<(&str, &str)> {
    let open = body.find('(')?;
    let inner = body.strip_suffix(')')?.get(open + 1..)?;
    let name = &body[..open];
    let mut chars = name.chars();
    let is_ident = chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    is_ident.then_some((name, inner))
}
