//! Burn-in tier counter
//!
//! Scans every enabled device's inbox, counts completed units since the
//! previous scan and raises approval requests for tier advancement. Tier
//! changes happen only through `burnin approvals approve`.

use anyhow::Result;
use burnin_core::{Config, Decision};
use burnin_logging::{init_logging, log_name_for_config, LogConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

mod cli;

#[derive(Parser, Debug)]
#[command(name = "burnin", version, about = "Burn-in tier counter and approval workflow")]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Counter configuration (JSON or TOML)
    #[arg(short = 'c', long, global = true, env = "BURNIN_CONFIG", default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan every enabled device once and raise approval requests
    Scan {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the last persisted scan without scanning
    Report {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show counter status: last scan, bootstrap, pending approvals
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show each device's progress toward its next tier
    Devices {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Review and decide tier advancement requests
    Approvals {
        #[command(subcommand)]
        action: ApprovalsAction,
    },
}

#[derive(Subcommand, Debug)]
enum ApprovalsAction {
    /// List pending requests, oldest first
    List {
        #[arg(long)]
        json: bool,
    },

    /// List decided requests, newest first
    History {
        #[arg(long)]
        json: bool,
    },

    /// Approve one or more requests
    Approve {
        /// Approval ids
        #[arg(required = true)]
        ids: Vec<String>,

        /// Name recorded as the approver
        #[arg(short, long, env = "BURNIN_APPROVER")]
        approver: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Reject one or more requests (count restarts, tier unchanged)
    Reject {
        /// Approval ids
        #[arg(required = true)]
        ids: Vec<String>,

        /// Name recorded as the approver
        #[arg(short, long, env = "BURNIN_APPROVER")]
        approver: Option<String>,

        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli::load_config(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {:?}", err);
            return ExitCode::FAILURE;
        }
    };

    let log_name = log_name_for_config(&cli.config);
    if let Err(err) = init_logging(LogConfig {
        app_name: &log_name,
        verbose: cli.verbose,
        default_level: Some(config.logging.level.as_str()),
        log_dir: None,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }
    info!(
        config = %cli.config.display(),
        mode = config.run_mode().as_str(),
        devices = config.devices.len(),
        enabled = config.enabled_devices().count(),
        "Loaded configuration"
    );

    match run(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            eprintln!("Error: {:?}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Scan { json } => cli::scan::run(config, json),
        Commands::Report { json } => cli::report::run_report(config, json),
        Commands::Status { json } => cli::report::run_status(config, json),
        Commands::Devices { json } => cli::report::run_devices(config, json),
        Commands::Approvals { action } => match action {
            ApprovalsAction::List { json } => cli::approvals::run_list(&config, json),
            ApprovalsAction::History { json } => cli::approvals::run_history(&config, json),
            ApprovalsAction::Approve { ids, approver, json } => {
                cli::approvals::run_resolve(&config, &ids, Decision::Approve, approver.as_deref(), json)
            }
            ApprovalsAction::Reject { ids, approver, json } => {
                cli::approvals::run_resolve(&config, &ids, Decision::Reject, approver.as_deref(), json)
            }
        },
    }
}
