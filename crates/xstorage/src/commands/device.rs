//! `xstorage command` and `xstorage power`.

use serde_json::Value;

use xstorage_api::DeviceCommand;
use xstorage_core::Coordinator;

use crate::cli::{CommandArgs, GlobalOpts, PowerArgs, PowerState};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

pub async fn command(coordinator: &Coordinator, args: CommandArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let name = args.name.trim().to_owned();
    if name.is_empty() {
        return Err(CliError::Validation {
            field: "command".into(),
            reason: "command name is empty".into(),
        });
    }

    let command = args
        .params
        .into_iter()
        .fold(DeviceCommand::new(name, args.duration), |cmd, (k, v)| cmd.with_parameter(k, v));

    let response = util::ensure_successful(coordinator.client().send_device_command(&command).await?)?;

    let out = output::render_single(global.output_format(), &response, |_: &Value| {
        format!("Command {} accepted ({} min)", command.command, command.duration)
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn power(coordinator: &Coordinator, args: &PowerArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let on = args.state == PowerState::On;
    let response = util::ensure_successful(coordinator.client().set_device_power(on).await?)?;

    let out = output::render_single(global.output_format(), &response, |_: &Value| {
        format!("Inverter switched {}", if on { "on" } else { "off" })
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
