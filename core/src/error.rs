//! Error types
//!
//! [`ConfigError`] covers everything detected while compiling configuration into
//! rule trees, before any record is evaluated. [`SelectError`] covers failures of a
//! selection run. Both are terminal for the run: no partial results are returned.

use std::error::Error as StdError;

/// Errors from rule and selection construction.
///
/// Raised at compile time, never during evaluation. Fix the configuration and
/// compile again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An attribute path is empty or has an empty segment.
    #[error("invalid attribute path \"{path}\"")]
    InvalidAttributePath {
        /// The path as written.
        path: String,
    },

    /// `name(arg)` names no known match function.
    #[error("unknown match function \"{function}\" (available: {})", available.join(", "))]
    UnknownFunction {
        /// The unrecognized function name.
        function: String,
        /// Names that are recognized.
        available: Vec<String>,
    },

    /// A regex failed to compile.
    #[error("invalid pattern \"{pattern}\": {message}")]
    InvalidPattern {
        /// The pattern that failed to compile.
        pattern: String,
        /// The regex engine's message.
        message: String,
    },

    /// A match argument exceeds the maximum allowed length.
    #[error("pattern length is {len}, but maximum allowed is {max}")]
    PatternTooLong {
        /// Actual length.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// A `newer_than` / `older_than` argument could not be parsed.
    #[error("invalid time specification \"{spec}\": {reason}")]
    InvalidTimeSpec {
        /// The specification as written.
        spec: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The `label` attribute only supports literal and `one_of` matching.
    #[error("\"label\" only supports literal and one_of matching, not {function}")]
    UnsupportedLabelFunction {
        /// The rejected function name.
        function: &'static str,
    },

    /// A rule does not have one of the recognized shapes.
    #[error("malformed rule: {reason}")]
    MalformedRule {
        /// What was wrong with it.
        reason: String,
    },

    /// `one_of_each` appeared inside `all` / `any` or an interface rule list.
    #[error("one_of_each is only allowed at the top level of a device or agent rule list")]
    NestedOneOfEach,

    /// More than one `one_of_each` in a single rule list.
    #[error("a rule list may contain at most one one_of_each")]
    DuplicateOneOfEach,

    /// Rule nesting exceeds [`MAX_DEPTH`](crate::MAX_DEPTH).
    #[error("rule nesting depth is {depth}, but maximum allowed is {max}")]
    DepthExceeded {
        /// Actual depth.
        depth: usize,
        /// Maximum allowed depth.
        max: usize,
    },

    /// Too many children in one `all` / `any`.
    #[error("compound rule has {count} children, but maximum allowed is {max}")]
    TooManyRules {
        /// Actual child count.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// The `one_of_each` Cartesian product is too large.
    #[error("one_of_each produces {count} combinations, but maximum allowed is {max}")]
    TooManyCombinations {
        /// Number of combinations (saturating).
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Unrecognized address family.
    #[error("invalid address family \"{family}\" (expected dual, v4 or v6)")]
    InvalidAddressFamily {
        /// The family as written.
        family: String,
    },

    /// `min_matches` is greater than `max_matches`.
    #[error("min_matches ({min}) is greater than max_matches ({max})")]
    InvalidBounds {
        /// Configured minimum.
        min: usize,
        /// Configured maximum.
        max: usize,
    },

    /// An explicit target is not an IP address.
    #[error("invalid target address \"{address}\"")]
    InvalidAddress {
        /// The address as written.
        address: String,
    },

    /// A section must have exactly one of `match` and `use`.
    #[error("{section}: exactly one of \"match\" and \"use\" is required")]
    MatchOrUse {
        /// The offending section (`targets` or `agents`).
        section: String,
    },

    /// An error with the location of the offending rule.
    #[error("{at}: {source}")]
    Located {
        /// Rule location, e.g. `devices[1].any[0].site.site_name`.
        at: String,
        /// The underlying error.
        #[source]
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    /// Attach a rule location. Already-located errors keep their innermost location.
    #[must_use]
    pub fn at(self, location: impl Into<String>) -> Self {
        match self {
            located @ Self::Located { .. } => located,
            other => Self::Located {
                at: location.into(),
                source: Box::new(other),
            },
        }
    }

    /// The error without its location wrapper.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Located { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Errors from a selection run.
#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Fewer results than `min_matches`.
    #[error("{found} matches found, but at least {required} required")]
    InsufficientMatches {
        /// Number of results after filtering.
        found: usize,
        /// Configured `min_matches`.
        required: usize,
    },

    /// Address resolution requested without any address source.
    #[error("no address source: one of interface_addresses, sending_ips or snmp_ip is required")]
    NoAddressSource,

    /// The catalog provider failed; its error is passed through unchanged.
    #[error(transparent)]
    Provider(Box<dyn StdError + Send + Sync + 'static>),
}

impl SelectError {
    /// Wrap a catalog provider error.
    pub fn provider<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Provider(Box::new(err))
    }
}
