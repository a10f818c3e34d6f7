//! Clap derive structures for the `xstorage` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;

use xstorage_api::AccountType;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// xstorage -- monitor and control an Eaton xStorage Home battery
#[derive(Debug, Parser)]
#[command(
    name = "xstorage",
    version,
    about = "Monitor and control an Eaton xStorage Home battery system",
    long_about = "Talks to the local REST API of an Eaton xStorage Home device.\n\n\
        Reads are aggregated into snapshots by a polling coordinator;\n\
        settings, commands and power changes go straight to the device.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Device profile to use
    #[arg(long, short = 'p', env = "XSTORAGE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Device host or IP (overrides profile)
    #[arg(long, short = 'H', env = "XSTORAGE_HOST", global = true)]
    pub host: Option<String>,

    /// Account username (overrides profile)
    #[arg(long, short = 'u', global = true)]
    pub username: Option<String>,

    /// Account type used to sign in
    #[arg(long, global = true)]
    pub account_type: Option<AccountKind>,

    /// Inverter serial number (technician accounts)
    #[arg(long, env = "XSTORAGE_INVERTER_SERIAL", global = true)]
    pub inverter_serial: Option<String>,

    /// Output format [default: `defaults.output` from config, else table]
    #[arg(long, short = 'o', env = "XSTORAGE_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output [default: `defaults.color` from config, else auto]
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept the device's self-signed TLS certificate
    #[arg(long, short = 'k', env = "XSTORAGE_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "XSTORAGE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

impl GlobalOpts {
    pub fn output_format(&self) -> OutputFormat {
        self.output.unwrap_or(OutputFormat::Table)
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color.unwrap_or(ColorMode::Auto)
    }
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AccountKind {
    /// Home owner account
    Customer,
    /// Installer account; needs the inverter serial
    #[value(alias = "technician")]
    Tech,
}

impl From<AccountKind> for AccountType {
    fn from(kind: AccountKind) -> Self {
        match kind {
            AccountKind::Customer => AccountType::Customer,
            AccountKind::Tech => AccountType::Technician,
        }
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and persist the session
    Login(LoginArgs),

    /// Run one polling cycle and print the snapshot
    #[command(alias = "snap")]
    Snapshot(SnapshotArgs),

    /// Poll continuously and print each snapshot
    Watch(WatchArgs),

    /// Show or change device settings
    Settings(SettingsArgs),

    /// Send a device command
    #[command(alias = "cmd")]
    Command(CommandArgs),

    /// Switch the inverter on or off
    Power(PowerArgs),

    /// Read and acknowledge device notifications
    #[command(alias = "notif")]
    Notifications(NotificationsArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Login ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Read the password from stdin instead of the credential chain
    #[arg(long)]
    pub password_stdin: bool,

    /// Store the password in the system keyring for this profile
    #[arg(long)]
    pub save_password: bool,

    /// Write host, username, account type and serial to the profile in config.toml
    #[arg(long)]
    pub save_profile: bool,
}

// ── Snapshot / Watch ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// Print only the value at a dotted path, e.g. status.energyFlow.stateOfCharge
    #[arg(long)]
    pub path: Option<String>,

    /// Print device identity instead of the snapshot
    #[arg(long, conflicts_with = "path")]
    pub info: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Seconds between cycles (overrides profile)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,

    /// Stop after this many cycles
    #[arg(long, short = 'n')]
    pub count: Option<u64>,
}

// ── Settings ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Show current device settings
    Show,

    /// Change settings; unspecified fields keep their current value
    Set {
        /// Field assignment, e.g. --set maxPower=3600 (value parsed as JSON, else string)
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        pairs: Vec<(String, Value)>,

        /// JSON object of fields to change
        #[arg(long, short = 'F')]
        from_file: Option<PathBuf>,
    },
}

// ── Device command / power ───────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CommandArgs {
    /// Command name, e.g. SET_CHARGE or SET_BASIC_MODE
    pub name: String,

    /// How long the command stays active, in minutes
    #[arg(long, short = 'd', default_value = "0")]
    pub duration: u32,

    /// Command parameter, e.g. --param power=2000 (value parsed as JSON, else string)
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub params: Vec<(String, Value)>,
}

#[derive(Debug, Args)]
pub struct PowerArgs {
    pub state: PowerState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PowerState {
    On,
    Off,
}

// ── Notifications ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct NotificationsArgs {
    #[command(subcommand)]
    pub command: NotificationsCommand,
}

#[derive(Debug, Subcommand)]
pub enum NotificationsCommand {
    /// List notifications
    #[command(alias = "ls")]
    List {
        /// Filter by status, e.g. UNREAD
        #[arg(long)]
        status: Option<String>,

        /// Page size
        #[arg(long)]
        size: Option<u32>,

        /// Page offset
        #[arg(long)]
        offset: Option<u32>,
    },

    /// Show the unread notification count
    Unread,

    /// Mark every notification as read
    MarkRead,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

// ── Value parsers ────────────────────────────────────────────────────

/// Parse `KEY=VALUE`, reading VALUE as JSON and falling back to a string.
fn parse_key_val(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
    Ok((key.to_owned(), value))
}
