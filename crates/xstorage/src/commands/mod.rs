//! Command dispatch: bridges CLI args -> coordinator/client calls -> output formatting.

pub mod device;
pub mod login;
pub mod notifications;
pub mod settings;
pub mod snapshot;
pub mod util;
pub mod watch;

use xstorage_core::Coordinator;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    coordinator: &Coordinator,
    global: &GlobalOpts,
    profile_name: &str,
) -> Result<(), CliError> {
    match cmd {
        Command::Login(args) => login::handle(coordinator, &args, global, profile_name).await,
        Command::Snapshot(args) => snapshot::handle(coordinator, &args, global).await,
        Command::Watch(args) => watch::handle(coordinator, &args, global).await,
        Command::Settings(args) => settings::handle(coordinator, args, global).await,
        Command::Command(args) => device::command(coordinator, args, global).await,
        Command::Power(args) => device::power(coordinator, &args, global).await,
        Command::Notifications(args) => notifications::handle(coordinator, args, global).await,
        // Handled before dispatch
        Command::Completions(_) => unreachable!(),
    }
}
