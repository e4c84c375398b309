//! Attribute accessor: resolves dotted attribute paths against a [`Record`]
//!
//! `site.site_name` indexes into the nested `site` record and returns its
//! `site_name` field. Traversal only descends through nested records: a list
//! in the middle of a path makes the attribute absent (multi-valued traversal
//! is only supported for the final segment, whose list value is returned as is).
//!
//! # INV: absent → no match
//!
//! [`Attribute::resolve`] returns `None` when any segment is missing. Rules turn
//! that into a non-match, and negated rules into a match.

use crate::{ConfigError, Record, Value};
use std::borrow::Cow;
use std::fmt;

/// How configured attribute names map onto catalog field names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyStyle {
    /// Use path segments exactly as written.
    #[default]
    AsWritten,
    /// Convert `snake_case` segments to `camelCase` (agent catalog field names).
    CamelCase,
}

impl KeyStyle {
    fn apply(self, segment: &str) -> String {
        match self {
            Self::AsWritten => segment.to_owned(),
            Self::CamelCase => snake_to_camel(segment),
        }
    }
}

/// Converts `snake_case` to `camelCase`; already-camel input is unchanged.
#[must_use]
pub fn snake_to_camel(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = false;
    for (i, c) in s.chars().enumerate() {
        if c == '_' && i > 0 {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// A parsed dotted attribute path.
///
/// # Example
///
/// ```
/// use sift::{AttributePath, KeyStyle, Record};
///
/// let path = AttributePath::parse("site.site_name", KeyStyle::AsWritten).unwrap();
/// let device = Record::new().with("site", Record::new().with("site_name", "west"));
/// assert_eq!(path.get(&device).and_then(|v| v.as_str()), Some("west"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePath {
    raw: String,
    segments: Vec<String>,
}

impl AttributePath {
    /// Parse a dotted path, applying the key style to each segment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAttributePath`] for an empty path or an
    /// empty segment (`"a..b"`, `".a"`).
    pub fn parse(raw: &str, style: KeyStyle) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.split('.').any(str::is_empty) {
            return Err(ConfigError::InvalidAttributePath {
                path: raw.to_owned(),
            });
        }
        Ok(Self {
            raw: trimmed.to_owned(),
            segments: trimmed.split('.').map(|s| style.apply(s)).collect(),
        })
    }

    /// The path as written in configuration.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The resolved field names, one per segment.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolve this path against a record.
    ///
    /// Returns `None` if a segment is missing or an intermediate value is not
    /// a record.
    #[must_use]
    pub fn get<'a>(&self, record: &'a Record) -> Option<&'a Value> {
        let (last, parents) = self.segments.split_last()?;
        let mut current = record;
        for segment in parents {
            current = current.get(segment)?.as_record()?;
        }
        current.get(last)
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// The attribute a rule tests: a plain path or the derived device `label`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// A dotted attribute path.
    Path(AttributePath),
    /// The names of a device's labels (`labels[*]` as strings or `labels[*].name`).
    Label,
}

impl Attribute {
    /// Name of the derived label attribute in configuration.
    pub const LABEL: &'static str = "label";

    /// Parse a configured attribute name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAttributePath`] for malformed paths.
    pub fn parse(raw: &str, style: KeyStyle) -> Result<Self, ConfigError> {
        if raw.trim() == Self::LABEL {
            return Ok(Self::Label);
        }
        AttributePath::parse(raw, style).map(Self::Path)
    }

    /// Resolve the attribute against a record.
    ///
    /// Labels produce an owned list of names. Returns `None` when absent.
    #[must_use]
    pub fn resolve<'a>(&self, record: &'a Record) -> Option<Cow<'a, Value>> {
        match self {
            Self::Path(path) => path.get(record).map(Cow::Borrowed),
            Self::Label => {
                let labels = record.get("labels")?.as_list()?;
                let names = labels
                    .iter()
                    .filter_map(|label| match label {
                        Value::String(_) => Some(label.clone()),
                        Value::Record(r) => r.get("name").cloned(),
                        _ => None,
                    })
                    .collect();
                Some(Cow::Owned(Value::List(names)))
            }
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => p.fmt(f),
            Self::Label => f.write_str(Self::LABEL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> Record {
        Record::new()
            .with("device_name", "r1-west-a")
            .with(
                "site",
                Record::new()
                    .with("site_name", "west")
                    .with("geo", Record::new().with("country", "US")),
            )
            .with(
                "interfaces",
                vec![Record::new().with("ip_address", "10.0.0.1")],
            )
            .with(
                "labels",
                vec![
                    Value::from(Record::new().with("name", "edge").with("id", 1)),
                    Value::from("core"),
                ],
            )
            .with("cdn", Value::Null)
    }

    #[test]
    fn resolves_top_level_and_nested() {
        let d = device();
        let p = AttributePath::parse("device_name", KeyStyle::AsWritten).unwrap();
        assert_eq!(p.get(&d), Some(&Value::from("r1-west-a")));
        let p = AttributePath::parse("site.geo.country", KeyStyle::AsWritten).unwrap();
        assert_eq!(p.get(&d), Some(&Value::from("US")));
    }

    #[test]
    fn missing_segment_is_absent() {
        let d = device();
        let p = AttributePath::parse("site.region", KeyStyle::AsWritten).unwrap();
        assert!(p.get(&d).is_none());
        let p = AttributePath::parse("device_name.length", KeyStyle::AsWritten).unwrap();
        assert!(p.get(&d).is_none());
    }

    #[test]
    fn traversal_through_list_is_absent() {
        let d = device();
        let p = AttributePath::parse("interfaces.ip_address", KeyStyle::AsWritten).unwrap();
        assert!(p.get(&d).is_none());
        // The final segment may be list-valued.
        let p = AttributePath::parse("interfaces", KeyStyle::AsWritten).unwrap();
        assert!(p.get(&d).is_some_and(Value::is_list));
    }

    #[test]
    fn null_is_distinct_from_absent() {
        let d = device();
        let p = AttributePath::parse("cdn", KeyStyle::AsWritten).unwrap();
        assert_eq!(p.get(&d), Some(&Value::Null));
    }

    #[test]
    fn rejects_malformed_paths() {
        for raw in ["", "  ", "a..b", ".a", "a."] {
            assert!(
                matches!(
                    AttributePath::parse(raw, KeyStyle::AsWritten),
                    Err(ConfigError::InvalidAttributePath { .. })
                ),
                "expected error for {raw:?}"
            );
        }
    }

    #[test]
    fn camel_case_key_style() {
        let p = AttributePath::parse("agent_impl.site_name", KeyStyle::CamelCase).unwrap();
        assert_eq!(p.segments(), &["agentImpl".to_owned(), "siteName".to_owned()]);
        assert_eq!(p.as_str(), "agent_impl.site_name");
        assert_eq!(snake_to_camel("asn"), "asn");
        assert_eq!(snake_to_camel("alreadyCamel"), "alreadyCamel");
        assert_eq!(snake_to_camel("_private"), "_private");
    }

    #[test]
    fn label_resolves_names() {
        let d = device();
        let names = Attribute::parse("label", KeyStyle::AsWritten)
            .unwrap()
            .resolve(&d)
            .unwrap();
        assert_eq!(names.as_ref(), &Value::from(vec!["edge", "core"]));
        assert!(Attribute::Label.resolve(&Record::new()).is_none());
    }
}
