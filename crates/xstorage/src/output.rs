//! Output formatting: table, JSON, YAML.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde.

use std::io::{self, IsTerminal, Write};

use serde::Serialize;
use serde_json::Value;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

/// Longest cell text before it is cut with an ellipsis.
const CELL_WIDTH: usize = 72;

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of items: `Tabled` rows for tables, the original data
/// for structured formats.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
) -> Result<String, CliError>
where
    T: Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        other => render_structured(other, data),
    }
}

/// Render a single item; `detail_fn` produces the table form.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        other => render_structured(other, data),
    }
}

/// Render an arbitrary JSON value. Objects become a field/value table,
/// anything else is printed as compact JSON.
pub fn render_value(format: OutputFormat, value: &Value) -> Result<String, CliError> {
    render_single(format, value, |v| match v {
        Value::Object(map) => {
            let rows: Vec<FieldRow> = map
                .iter()
                .map(|(k, v)| FieldRow {
                    field: k.clone(),
                    value: summarize(v),
                })
                .collect();
            render_table(&rows)
        }
        other => summarize(other),
    })
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Rows & cells ─────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct FieldRow {
    #[tabled(rename = "Field")]
    pub field: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// One-line rendering of a value for a table cell.
pub fn summarize(value: &Value) -> String {
    let text = match value {
        Value::Null => "-".to_owned(),
        Value::String(s) => s.clone(),
        Value::Object(map) if map.is_empty() => "(no data)".to_owned(),
        other => other.to_string(),
    };
    truncate(&text, CELL_WIDTH)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

// ── Format-specific renderers ────────────────────────────────────────

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_structured<T: Serialize + ?Sized>(format: OutputFormat, data: &T) -> Result<String, CliError> {
    match format {
        OutputFormat::Json | OutputFormat::Table => Ok(serde_json::to_string_pretty(data)?),
        OutputFormat::JsonCompact => Ok(serde_json::to_string(data)?),
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(|e| CliError::Render(e.to_string())),
    }
}
