//! Evaluation trace types for debugging rule behavior.
//!
//! [`RuleTrace`] mirrors [`Rule`](crate::Rule) but captures evaluation results
//! instead of inputs. Use [`Rule::evaluate_with_trace`](crate::Rule::evaluate_with_trace)
//! to see why a record was or was not selected.
//!
//! In `all` / `any`, every child is evaluated (no short-circuit) for maximum
//! debugging value. The `matched` result is still correct.

use crate::Value;
use serde::Serialize;
use std::fmt;

/// Trace of a rule evaluation against one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleTrace {
    /// An attribute rule.
    Attribute {
        /// Whether the rule matched.
        matched: bool,
        /// The attribute as configured.
        attribute: String,
        /// The resolved value (`None` when absent).
        value: Option<Value>,
        /// The match argument, e.g. `!regex(^r1)`.
        matcher: String,
    },
    /// All children must match.
    All {
        /// Whether all children matched.
        matched: bool,
        /// Trace of each child.
        children: Vec<RuleTrace>,
    },
    /// Any child must match.
    Any {
        /// Whether any child matched.
        matched: bool,
        /// Trace of each child.
        children: Vec<RuleTrace>,
    },
}

impl RuleTrace {
    /// The overall match result.
    #[must_use]
    pub fn matched(&self) -> bool {
        match self {
            Self::Attribute { matched, .. }
            | Self::All { matched, .. }
            | Self::Any { matched, .. } => *matched,
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let mark = if self.matched() { "+" } else { "-" };
        let pad = "  ".repeat(indent);
        match self {
            Self::Attribute {
                attribute,
                value,
                matcher,
                ..
            } => {
                let shown = match value {
                    None => "<absent>".to_owned(),
                    Some(v) => v
                        .match_string()
                        .map_or_else(|| format!("<{}>", v.type_name()), |s| format!("\"{s}\"")),
                };
                writeln!(f, "{pad}{mark} {attribute} = {shown} ~ {matcher}")
            }
            Self::All { children, .. } | Self::Any { children, .. } => {
                let name = if matches!(self, Self::All { .. }) { "all" } else { "any" };
                writeln!(f, "{pad}{mark} {name}")?;
                for child in children {
                    child.write_indented(f, indent + 1)?;
                }
                Ok(())
            }
        }
    }
}

/// Renders an indented tree, one line per node, `+` for matched and `-` otherwise.
impl fmt::Display for RuleTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}
