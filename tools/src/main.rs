//! perfdoc-tools: run system telemetry probes from the command line
//!
//! Reads tool calls (chat tool-call or native shape), dispatches them through
//! the probe registry, and prints one response per call as JSON on stdout.
//! Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter};

use perfdoc_tools::config::{self, ToolsConfig};
use perfdoc_tools::envelope::{parse_call_batch, CallResponse};
use perfdoc_tools::executor::{diagnostic_plan, Dispatcher};
use perfdoc_tools::prereq;
use perfdoc_tools::registry::Registry;
use perfdoc_tools::runner::SystemRunner;

#[derive(Parser)]
#[command(name = "perfdoc-tools")]
#[command(about = "Normalized Linux performance telemetry for function-calling agents")]
#[command(version)]
struct Cli {
    /// Config file (default: $PERFDOC_CONFIG, then /etc/perfdoc/tools.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the function-calling definitions of every tool
    Tools {
        /// Only tools in this namespace (monitor, hw, net, process)
        #[arg(long)]
        namespace: Option<String>,
    },

    /// Dispatch a JSON batch of tool calls
    Dispatch {
        /// Read calls from this file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,

        /// Print chat `tool` messages instead of response envelopes
        #[arg(long)]
        chat: bool,
    },

    /// Run every probe once with the standard diagnostic arguments
    Plan {
        /// Print chat `tool` messages instead of response envelopes
        #[arg(long)]
        chat: bool,
    },

    /// Report configured diagnostic commands missing from PATH
    Check,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = init_logging();
    let config = config::load_config(cli.config.as_deref())?;
    logging.apply_config_level(&config.system.log_level);

    match cli.command {
        Commands::Tools { namespace } => {
            let registry = Registry::builtin();
            let definitions: Vec<Value> = registry
                .list_tools(namespace.as_deref().unwrap_or(""))
                .into_iter()
                .map(|tool| tool.definition())
                .collect();
            print_json(&definitions)?;
        }
        Commands::Dispatch { input, chat } => {
            let text = read_input(input.as_deref())?;
            let entries = parse_call_batch(&text).context("Failed to parse tool calls")?;
            info!("Dispatching {} calls", entries.len());
            let responses = dispatcher(config).dispatch_batch(entries).await;
            print_responses(&responses, chat)?;
        }
        Commands::Plan { chat } => {
            let responses = dispatcher(config).dispatch(diagnostic_plan()).await;
            print_responses(&responses, chat)?;
        }
        Commands::Check => {
            if !check_prerequisites(&config) {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

type FilterHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// Logging installed before the config is read, so config warnings are not
/// lost. The filter is swapped for the configured level afterwards.
struct Logging {
    filter: FilterHandle,
    from_env: bool,
}

impl Logging {
    /// `RUST_LOG` wins over the configured level
    fn apply_config_level(&self, log_level: &str) {
        if self.from_env {
            return;
        }
        if let Err(e) = self.filter.reload(config_filter(log_level)) {
            warn!("Failed to apply log level {log_level:?}: {e}");
        }
    }
}

fn init_logging() -> Logging {
    let (filter, from_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new("info"), false),
    };
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true)
                .compact(),
        )
        .init();

    Logging {
        filter: handle,
        from_env,
    }
}

/// Filter for a configured level; unparseable levels fall back to `info`.
fn config_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(log_level).unwrap_or_else(|e| {
        warn!("Invalid log level {log_level:?} in config ({e}), using info");
        EnvFilter::new("info")
    })
}

fn dispatcher(config: ToolsConfig) -> Dispatcher<SystemRunner> {
    Dispatcher::new(Registry::builtin(), SystemRunner::new(), config)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read calls from {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read calls from stdin")?;
            Ok(text)
        }
    }
}

fn print_responses(responses: &[CallResponse], chat: bool) -> Result<()> {
    if chat {
        let messages: Vec<Value> = responses.iter().map(CallResponse::to_chat_message).collect();
        print_json(&messages)
    } else {
        print_json(&responses)
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{text}");
    Ok(())
}

fn check_prerequisites(config: &ToolsConfig) -> bool {
    let missing = prereq::missing_commands(&config.commands);
    if missing.is_empty() {
        println!("All required commands are available.");
        return true;
    }

    let names: Vec<&str> = missing.iter().map(|m| m.command.as_str()).collect();
    println!("Missing required commands: {}", names.join(", "));
    for line in prereq::install_hints(&missing) {
        println!("{line}");
    }
    false
}
