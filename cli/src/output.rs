//! Output formatting: brief, JSON, YAML.
//!
//! Brief prints one item per line, with any `--fields` appended as
//! `path=value`. Structured formats serialize the selection via serde.

use serde::Serialize;
use sift::{AttributePath, Record, RuleTrace, Selection, Value};

use crate::cli::OutputFormat;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// How one record fared against the rules of `sift explain`.
#[derive(Debug, Serialize)]
pub struct Explanation {
    pub record: String,
    pub matched: bool,
    pub trace: RuleTrace,
}

fn render_json<T: Serialize + ?Sized>(data: &T) -> Result<String, RenderError> {
    Ok(serde_json::to_string_pretty(data)?)
}

fn render_yaml<T: Serialize + ?Sized>(data: &T) -> Result<String, RenderError> {
    Ok(serde_yaml::to_string(data)?.trim_end().to_owned())
}

fn show(value: Option<&Value>) -> String {
    match value {
        None => "<absent>".to_owned(),
        Some(v) => v.match_string().map_or_else(
            || serde_json::to_string(v).unwrap_or_else(|_| format!("<{}>", v.type_name())),
            std::borrow::Cow::into_owned,
        ),
    }
}

fn brief_record(record: &Record, fields: &[AttributePath]) -> String {
    let mut line = record.label();
    for field in fields {
        line.push_str(&format!("  {}={}", field.as_str(), show(field.get(record))));
    }
    line
}

/// Render a selection. `empty` is printed in brief mode when nothing was selected.
pub fn render_selection(
    format: OutputFormat,
    selection: &Selection,
    fields: &[AttributePath],
    empty: &str,
) -> Result<String, RenderError> {
    match format {
        OutputFormat::Json => render_json(selection),
        OutputFormat::Yaml => render_yaml(selection),
        OutputFormat::Brief if selection.is_empty() => Ok(empty.to_owned()),
        OutputFormat::Brief => Ok(match selection {
            Selection::Records(records) => records
                .iter()
                .map(|r| brief_record(r, fields))
                .collect::<Vec<_>>()
                .join("\n"),
            Selection::Addresses(addresses) => addresses
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
            Selection::Ids(ids) => ids.join("\n"),
        }),
    }
}

/// Render rule traces.
pub fn render_explanations(
    format: OutputFormat,
    explanations: &[Explanation],
) -> Result<String, RenderError> {
    match format {
        OutputFormat::Json => render_json(explanations),
        OutputFormat::Yaml => render_yaml(explanations),
        OutputFormat::Brief => Ok(explanations
            .iter()
            .map(|e| {
                let verdict = if e.matched { "matched" } else { "no match" };
                let tree: String =
                    e.trace.to_string().lines().map(|l| format!("  {l}\n")).collect();
                format!("{}: {verdict}\n{tree}", e.record)
            })
            .collect::<Vec<_>>()
            .join("\n")
            .trim_end()
            .to_owned()),
    }
}
