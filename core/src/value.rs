//! `Value` and `Record`: the typed attribute tree every rule runs against
//!
//! Catalog responses arrive as generic attribute trees (JSON from the inventory
//! API, YAML from fixtures). They are converted once into [`Record`]s whose
//! fields are tagged [`Value`]s, so the accessor and match functions can
//! pattern-match instead of inspecting types at runtime.
//!
//! # String normalization
//!
//! Literal equality, `one_of`, `contains`, `regex` and `one_of_each` all compare
//! through [`Value::match_string`]. Both the configured argument and the record
//! attribute go through the same normalization, so `5`, `"5"` and `5` written in
//! YAML compare equal.

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;

/// A single attribute value inside a [`Record`].
///
/// # Variants
///
/// - `Null`: explicit null; matches like an absent attribute
/// - `Bool`, `Int`, `Float`, `String`: scalars
/// - `Timestamp`: a point in time (UTC)
/// - `List`: list of values (usually scalars, sometimes records)
/// - `Record`: nested record
///
/// # Example
///
/// ```
/// use sift::Value;
///
/// let v = Value::from(42);
/// assert_eq!(v.match_string().as_deref(), Some("42"));
/// assert!(Value::from(vec!["a", "b"]).is_list());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit null.
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Integer scalar.
    Int(i64),
    /// Floating point scalar.
    Float(f64),
    /// String scalar.
    String(String),
    /// Timestamp scalar (UTC).
    Timestamp(DateTime<Utc>),
    /// List of values.
    List(Vec<Value>),
    /// Nested record.
    Record(Record),
}

impl Value {
    /// Returns `true` if this is the `Null` variant.
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` if this is the `List` variant.
    #[inline]
    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Returns `true` for bool, int, float, string and timestamp values.
    #[inline]
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::String(_) | Self::Timestamp(_)
        )
    }

    /// Try to get the value as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Try to get the value as a list.
    #[inline]
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Try to get the value as a nested record.
    #[inline]
    #[must_use]
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    /// The normalized string form used for every comparison.
    ///
    /// Returns `None` for `Null`, `List` and `Record`: those have no scalar
    /// string form and never compare equal to a literal.
    #[must_use]
    pub fn match_string(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::String(s) => Some(Cow::Borrowed(s.as_str())),
            Self::Int(i) => Some(Cow::Owned(i.to_string())),
            Self::Float(f) => Some(Cow::Owned(f.to_string())),
            Self::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
            Self::Timestamp(ts) => {
                Some(Cow::Owned(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
            }
            Self::Null | Self::List(_) | Self::Record(_) => None,
        }
    }

    /// Returns a string describing the type of this value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Timestamp(_) => "timestamp",
            Self::List(_) => "list",
            Self::Record(_) => "record",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Self::Record(r)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    // u64 beyond i64::MAX or a real float
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Record(Record::from(map)),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::Timestamp(ts) => {
                serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Self::List(items) => items.serialize(serializer),
            Self::Record(r) => r.serialize(serializer),
        }
    }
}

/// An immutable snapshot of one inventory object (device, interface or agent).
///
/// Field order is preserved from the source document so presentation output
/// reads the same as the catalog response.
///
/// # Example
///
/// ```
/// use sift::{Record, Value};
///
/// let device = Record::new()
///     .with("device_name", "r1-west-a")
///     .with("site", Record::new().with("site_name", "west"));
///
/// assert_eq!(device.get("device_name"), Some(&Value::from("r1-west-a")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field (builder pattern).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Get a direct field by name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns `true` if the record has a field with this name.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Number of direct fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Short human label for logs and brief output.
    ///
    /// Uses the first of `device_name`, `name`, `alias`, `id` that is present.
    #[must_use]
    pub fn label(&self) -> String {
        ["device_name", "name", "alias", "id"]
            .iter()
            .find_map(|k| self.get(k).and_then(Value::match_string))
            .map_or_else(|| "<unnamed>".to_owned(), Cow::into_owned)
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Record {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
