mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::io::BufRead;
use std::time::Duration;

use clap::Parser;
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

use xstorage_core::Coordinator;

use crate::cli::{Cli, Command};
use crate::config::Overrides;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { mut global, command } = cli;
    match command {
        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "xstorage", &mut std::io::stdout());
            Ok(())
        }

        // All other commands talk to the device
        cmd => {
            let cfg = xstorage_config::load_config_or_default();
            config::apply_display_defaults(&mut global, &cfg);

            let overrides = overrides_for(&cmd)?;
            let (device_config, profile_name) = config::build_device_config(&global, &cfg, overrides)?;
            let coordinator = Coordinator::new(&device_config)?;

            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &coordinator, &global, &profile_name).await
        }
    }
}

/// Per-command inputs that feed into the device config.
fn overrides_for(cmd: &Command) -> Result<Overrides, CliError> {
    match cmd {
        Command::Login(args) if args.password_stdin => Ok(Overrides {
            password: Some(read_password_stdin()?),
            ..Overrides::default()
        }),
        Command::Watch(args) => Ok(Overrides {
            poll_interval: args.interval.map(Duration::from_secs),
            ..Overrides::default()
        }),
        _ => Ok(Overrides::default()),
    }
}

fn read_password_stdin() -> Result<SecretString, CliError> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "nothing read from stdin".into(),
        });
    }
    Ok(SecretString::from(password.to_owned()))
}
