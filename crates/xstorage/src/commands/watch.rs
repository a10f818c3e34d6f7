//! `xstorage watch`: run the coordinator's periodic task and print every
//! cycle until interrupted or `--count` is reached.

use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;

use xstorage_core::{Coordinator, CycleState, Snapshot};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(coordinator: &Coordinator, args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if coordinator.poll_interval().is_zero() {
        return Err(CliError::Validation {
            field: "interval".into(),
            reason: "must be at least one second".into(),
        });
    }
    let color = output::should_color(global.color_mode());

    // A retryable first failure (no data, device unreachable) is reported
    // and polling continues; sign-in and config problems end the watch.
    match coordinator.first_refresh().await {
        Ok(snapshot) => emit(&snapshot, global, color)?,
        Err(e) if e.is_retryable() => report_failure(Utc::now(), &e.to_string(), color),
        Err(e) => return Err(e.into()),
    }

    let mut cycles = 1;
    if args.count.is_some_and(|n| cycles >= n) {
        return Ok(());
    }

    let mut states = coordinator.subscribe();
    coordinator.start().await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            changed = states.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = states.borrow_and_update().clone();
                match state {
                    CycleState::Succeeded { .. } => {
                        if let Some(snapshot) = coordinator.snapshot() {
                            if let Err(e) = emit(&snapshot, global, color) {
                                break Err(e);
                            }
                        }
                    }
                    CycleState::Failed { at, endpoints } => {
                        let message = format!("update failed: no data from {}", endpoints.join(", "));
                        report_failure(at, &message, color);
                    }
                    CycleState::Idle | CycleState::Fetching => continue,
                }
                cycles += 1;
                if args.count.is_some_and(|n| cycles >= n) {
                    break Ok(());
                }
            }
        }
    };

    coordinator.shutdown().await;
    result
}

fn emit(snapshot: &Snapshot, global: &GlobalOpts, color: bool) -> Result<(), CliError> {
    let line = match global.output_format() {
        OutputFormat::Table => summary_line(snapshot, color),
        // One document per line so the stream stays parseable.
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(snapshot)?,
        OutputFormat::Yaml => {
            let doc = serde_yaml::to_string(snapshot).map_err(|e| CliError::Render(e.to_string()))?;
            format!("---\n{}", doc.trim_end())
        }
    };
    output::print_output(&line, global.quiet);
    Ok(())
}

fn summary_line(snapshot: &Snapshot, color: bool) -> String {
    let at = snapshot.fetched_at().format("%Y-%m-%d %H:%M:%S").to_string();
    let battery = snapshot
        .battery_level()
        .map_or_else(|| "battery ?".to_owned(), |level| format!("battery {level}%"));
    let fields = snapshot.fields();
    let with_data = fields.keys().filter(|e| snapshot.has_data(**e)).count();
    let coverage = format!("{with_data}/{} endpoints", fields.len());

    if color {
        format!("{}  {}  {}", at.dimmed(), battery.green(), coverage)
    } else {
        format!("{at}  {battery}  {coverage}")
    }
}

fn report_failure(at: DateTime<Utc>, message: &str, color: bool) {
    let at = at.format("%Y-%m-%d %H:%M:%S").to_string();
    if color {
        eprintln!("{}  {}", at.dimmed(), message.red());
    } else {
        eprintln!("{at}  {message}");
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use serde_json::json;
    use xstorage_api::Endpoint;

    use super::*;

    #[test]
    fn summary_counts_endpoints_with_data() {
        let mut fields = IndexMap::new();
        fields.insert(Endpoint::Status, json!({"energyFlow": {"stateOfCharge": 80}}));
        fields.insert(Endpoint::Device, json!({"firmwareVersion": "1.2"}));
        fields.insert(Endpoint::Metrics, json!({}));
        let snapshot = Snapshot::new(fields, Utc::now());

        let line = summary_line(&snapshot, false);

        assert!(line.contains("battery 80%"));
        assert!(line.contains("2/3 endpoints"));
    }
}
