//! `xstorage snapshot`: one polling cycle, printed.

use xstorage_core::{Coordinator, DeviceInfo, Snapshot};

use crate::cli::{GlobalOpts, OutputFormat, SnapshotArgs};
use crate::error::CliError;
use crate::output::{self, FieldRow};

pub async fn handle(coordinator: &Coordinator, args: &SnapshotArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshot = coordinator.first_refresh().await?;

    let out = if args.info {
        let info = coordinator.device_info();
        output::render_single(global.output_format(), &info, info_detail)?
    } else if let Some(ref path) = args.path {
        let value = snapshot.value_at(path).ok_or_else(|| CliError::Validation {
            field: "path".into(),
            reason: format!("nothing at '{path}' in this snapshot"),
        })?;
        output::render_value(global.output_format(), value)?
    } else {
        render_snapshot(global.output_format(), &snapshot)?
    };

    output::print_output(&out, global.quiet);
    Ok(())
}

/// Full snapshot: one row per endpoint for tables, the whole document
/// otherwise.
pub fn render_snapshot(format: OutputFormat, snapshot: &Snapshot) -> Result<String, CliError> {
    output::render_single(format, snapshot, |s| {
        let rows: Vec<FieldRow> = s
            .fields()
            .iter()
            .map(|(endpoint, value)| FieldRow {
                field: endpoint.name().to_owned(),
                value: output::summarize(value),
            })
            .collect();
        let battery = s
            .battery_level()
            .map_or_else(|| "unknown".to_owned(), |level| format!("{level}%"));
        format!(
            "Fetched {}  battery {battery}\n{}",
            s.fetched_at().to_rfc3339(),
            output::render_table(&rows)
        )
    })
}

fn info_detail(info: &DeviceInfo) -> String {
    [
        format!("Manufacturer:  {}", info.manufacturer),
        format!("Model:         {}", info.model),
        format!("Firmware:      {}", info.sw_version.as_deref().unwrap_or("-")),
        format!("BMS firmware:  {}", info.hw_version.as_deref().unwrap_or("-")),
        format!("Serial:        {}", info.serial_number.as_deref().unwrap_or("-")),
        format!("URL:           {}", info.configuration_url),
    ]
    .join("\n")
}
