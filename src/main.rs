//! tickwatch - epoch-transition watchdog
//!
//! Polls a ledger node's tick status and drives recovery actions whenever
//! tick progress stalls.

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::io::Read;
use std::path::PathBuf;

mod operations;

use crate::operations::NodeTooling;
use tickwatch::snapshot::{contains_error_marker, StatusParser};
use tickwatch::{ConfigOverrides, TokioSleeper, Watchdog, WatchdogConfig, WatchdogError};

#[derive(Parser)]
#[command(name = "tickwatch")]
#[command(version = "0.1.0")]
#[command(about = "Watches epoch transitions and recovers stalled tick progress", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults to ./tickwatch.toml when present)
    #[arg(short, long, global = true, env = "TICKWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Node and tooling flags shared by commands that resolve a configuration.
#[derive(clap::Args)]
struct NodeArgs {
    /// Poll interval in minutes while the node is progressing
    #[arg(short = 'n', long = "interval", value_name = "MINUTES")]
    interval: Option<u64>,

    /// Comma-separated list of node IPs; the first one is the primary
    #[arg(long, value_delimiter = ',', env = "TICKWATCH_NODE_IPS")]
    node_ips: Vec<String>,

    /// Comma-separated list of node ports (default: 31841 for all)
    #[arg(long, value_delimiter = ',', env = "TICKWATCH_NODE_PORTS")]
    node_ports: Vec<u16>,

    /// Number of ticks per epoch
    #[arg(long, env = "TICKWATCH_TICKS_PER_EPOCH")]
    ticks_per_epoch: Option<u64>,

    /// Operator seed passed to administrative commands
    #[arg(long, env = "TICKWATCH_SEED", hide_env_values = true)]
    seed: Option<String>,

    /// Role tokens for the main/aux toggle, e.g. MAIN,AUX
    #[arg(long, value_delimiter = ',')]
    toggle_roles: Vec<String>,

    /// Path to the node administration tool
    #[arg(long, value_name = "PATH")]
    cli_path: Option<PathBuf>,

    /// Path to the epoch broadcast tool
    #[arg(long, value_name = "PATH")]
    broadcaster_path: Option<PathBuf>,

    /// Timeout for a single external command in seconds
    #[arg(long, value_name = "SECS")]
    command_timeout: Option<u64>,
}

impl NodeArgs {
    fn into_overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            poll_interval_minutes: self.interval,
            node_addresses: self.node_ips,
            node_ports: self.node_ports,
            ticks_per_epoch: self.ticks_per_epoch,
            cli_path: self.cli_path,
            broadcaster_path: self.broadcaster_path,
            seed: self.seed,
            toggle_roles: self.toggle_roles,
            command_timeout_secs: self.command_timeout,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the watchdog loop
    Run {
        #[command(flatten)]
        nodes: NodeArgs,

        /// Stop after this many cycles (runs forever when omitted)
        #[arg(long)]
        max_cycles: Option<u64>,
    },

    /// Parse a status report and print the decoded snapshot
    Check {
        /// Status report file, or - for stdin
        #[arg(default_value = "-")]
        input: PathBuf,

        /// Ticks per epoch, to also print the end tick
        #[arg(long)]
        ticks_per_epoch: Option<u64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or validate the resolved configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show resolved configuration (seed redacted)
    Show {
        #[command(flatten)]
        nodes: NodeArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration and check that the node tools exist
    Validate {
        #[command(flatten)]
        nodes: NodeArgs,
    },
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        "tickwatch=debug,info"
    } else {
        "tickwatch=info,warn"
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn resolve_config(path: Option<&PathBuf>, nodes: NodeArgs) -> tickwatch::Result<WatchdogConfig> {
    let base = match path {
        Some(path) => WatchdogConfig::load(path)?,
        None => WatchdogConfig::load_or_default(&std::env::current_dir()?)?,
    };
    nodes.into_overrides().apply(base)
}

fn fail(err: &WatchdogError) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), err);
    std::process::exit(err.exit_code());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    match cli.command {
        Commands::Run { nodes, max_cycles } => {
            let config = resolve_config(cli.config.as_ref(), nodes).unwrap_or_else(|e| fail(&e));
            for tool in config.missing_tools() {
                tracing::warn!(tool = %tool.display(), "Node tool not found; its invocations will fail");
            }

            let tooling = NodeTooling::new(&config);
            let mut watchdog = Watchdog::new(config, tooling.clone(), tooling, TokioSleeper)
                .unwrap_or_else(|e| fail(&e));
            let cycles = watchdog.run(max_cycles).await;
            println!("{} {} cycles completed", "Done:".green().bold(), cycles);
        }

        Commands::Check {
            input,
            ticks_per_epoch,
            json,
        } => {
            let text = if input.as_os_str() == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&input)?
            };

            if contains_error_marker(&text) {
                eprintln!("{} status report carries an error marker", "Error:".red().bold());
                std::process::exit(1);
            }

            let snapshot = match StatusParser::new()?.parse(&text) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    eprintln!("{} {}", "Error:".red().bold(), err);
                    std::process::exit(1);
                }
            };

            if json {
                let mut value = serde_json::to_value(snapshot)?;
                if let Some(tpe) = ticks_per_epoch {
                    value["end_tick"] = snapshot.end_tick(tpe).into();
                    value["exceeded"] = snapshot.has_passed_end_tick(tpe).into();
                }
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{}", "Tick status".bold());
                println!("  Tick:          {}", snapshot.latest_tick);
                println!("  Epoch:         {}", snapshot.current_epoch);
                println!("  Initial tick:  {}", snapshot.initial_tick);
                if let Some(tpe) = ticks_per_epoch {
                    let end_tick = snapshot.end_tick(tpe);
                    let verdict = if snapshot.has_passed_end_tick(tpe) {
                        "exceeded".red().to_string()
                    } else {
                        "not reached".green().to_string()
                    };
                    println!("  End tick:      {} ({})", end_tick, verdict);
                    println!("  Distance:      {}", snapshot.distance_to_end_tick(tpe));
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show { nodes, json } => {
                let config = resolve_config(cli.config.as_ref(), nodes)
                    .unwrap_or_else(|e| fail(&e))
                    .redacted();
                if json {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                } else {
                    println!("{}", toml::to_string_pretty(&config)?);
                }
            }
            ConfigAction::Validate { nodes } => {
                let config = resolve_config(cli.config.as_ref(), nodes).unwrap_or_else(|e| fail(&e));
                if let Err(err) = config.validate() {
                    fail(&err);
                }
                for tool in config.missing_tools() {
                    println!(
                        "{} node tool not found: {}",
                        "Warning:".yellow().bold(),
                        tool.display()
                    );
                }
                println!(
                    "{} {} node(s), {} ticks per epoch",
                    "Configuration is valid:".green().bold(),
                    config.endpoints.len(),
                    config.ticks_per_epoch
                );
            }
        },
    }

    Ok(())
}
