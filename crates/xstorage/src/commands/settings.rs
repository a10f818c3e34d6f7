//! `xstorage settings show|set`.

use serde_json::{Map, Value};

use xstorage_core::{Coordinator, reduce};

use crate::cli::{GlobalOpts, SettingsArgs, SettingsCommand};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

pub async fn handle(coordinator: &Coordinator, args: SettingsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let client = coordinator.client();

    match args.command {
        SettingsCommand::Show => {
            let body = util::ensure_successful(client.get_settings().await?)?;
            let out = output::render_value(global.output_format(), &reduce(Ok(body)))?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SettingsCommand::Set { pairs, from_file } => {
            let mut patch = match from_file {
                Some(ref path) => util::read_json_object(path)?,
                None => Map::new(),
            };
            patch.extend(pairs);
            if patch.is_empty() {
                return Err(CliError::Validation {
                    field: "settings".into(),
                    reason: "nothing to change; pass --set KEY=VALUE or --from-file".into(),
                });
            }

            let fields: Vec<String> = patch.keys().cloned().collect();
            let response = util::ensure_successful(client.update_settings_with(patch).await?)?;

            let out = output::render_single(global.output_format(), &response, |_: &Value| {
                format!("Settings updated: {}", fields.join(", "))
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
