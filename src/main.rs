// Terminal front end for the kore course service

use anyhow::{Context as _, anyhow, bail};
use clap::{Parser, Subcommand};
use kore_dispatch::commands::{self, Command};
use kore_dispatch::config::{CONFIG_FILE, config_dir};
use kore_dispatch::dispatcher::show_status;
use kore_dispatch::model::GradingScope;
use kore_dispatch::terminal::{TerminalDialogs, TerminalNotices};
use kore_dispatch::{DispatchService, KoreConfig, OperationResult, logging, proxy, routing};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "kore")]
#[command(about = "Kore - course management and grade dispatch", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Service prefix of the kore REST API (overrides config and KORE_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered commands
    Commands,

    /// Run a command, e.g. `kore:import-assignment`, `reset-course` or `import problem`
    Run {
        /// Command id (the `kore:` prefix may be omitted), or an operation and a context
        #[arg(required = true, num_args = 1..)]
        target: Vec<String>,
    },

    /// Show the course title of the current session
    Status,

    /// Relay the REST API to the course service
    Proxy {
        /// Listen port (0 = OS-assigned)
        #[arg(short, long)]
        port: Option<u16>,

        /// Acting user injected into forwarded requests
        #[arg(short, long)]
        user: Option<String>,

        /// Course service URL
        #[arg(long)]
        upstream: Option<String>,
    },

    /// Show or edit kore.json
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (token masked)
    Show,

    /// Store one value in kore.json, e.g. `proxy.user ta`
    Set {
        /// Dotted key, e.g. `client.base_url`
        key: String,

        /// New value (empty clears optional keys)
        value: String,
    },
}

fn print_commands() {
    for info in commands::registry() {
        println!("{:<22} {}", info.id, info.label);
        println!("{:<22} {}", "", info.caption);
        let Some(command) = Command::from_id(&info.id) else {
            continue;
        };
        if command == Command::SendGrades {
            for scope in [GradingScope::Current, GradingScope::All] {
                if let Some(plan) = routing::plan(command, &scope) {
                    println!("{:<22} {scope:?}: {plan}", "");
                }
            }
        } else if let Some(plan) = routing::plan(command, &GradingScope::Current) {
            println!("{:<22} {plan}", "");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();

    let mut config = KoreConfig::load();
    if let Some(base_url) = cli.base_url {
        config.client.base_url = base_url;
    }

    match cli.command {
        Commands::Commands => print_commands(),
        Commands::Run { target } => {
            let command = Command::resolve(&target.join(" "))
                .map_err(|e| anyhow!("{e}. Run `kore commands` for the list."))?;
            let dispatcher = kore_dispatch::http_dispatcher(
                &config.client,
                Arc::new(TerminalDialogs::new()),
                Arc::new(TerminalNotices),
            )
            .map_err(|e| anyhow!(e))?;

            match dispatcher.execute(command).await {
                OperationResult::Success { .. } | OperationResult::Cancelled => {}
                OperationResult::Failure { kind, .. } => bail!("{} failed ({kind:?})", command.label()),
            }
        }
        Commands::Status => {
            let dialogs = Arc::new(TerminalDialogs::new());
            let dispatcher =
                kore_dispatch::http_dispatcher(&config.client, dialogs.clone(), Arc::new(TerminalNotices))
                    .map_err(|e| anyhow!(e))?;
            show_status(&dispatcher, &*dialogs).await;
        }
        Commands::Proxy { port, user, upstream } => {
            if let Some(port) = port {
                config.proxy.port = port;
            }
            if let Some(user) = user {
                config.proxy.user = user;
            }
            if upstream.is_some() {
                config.proxy.upstream = upstream;
            }
            if config.proxy.user.is_empty() {
                bail!("No acting user: pass --user or set KORE_USER");
            }
            proxy::start_server(&config.proxy)
                .await
                .map_err(|e| anyhow!(e))
                .context("proxy stopped")?;
        }
        Commands::Config { action: ConfigAction::Show } => {
            println!("# {}", config_dir().join(CONFIG_FILE).display());
            println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        }
        Commands::Config { action: ConfigAction::Set { key, value } } => {
            // Environment overrides are not written back
            let mut stored = KoreConfig::load_file();
            stored.set(&key, &value).map_err(|e| anyhow!(e))?;
            stored.save().map_err(|e| anyhow!(e))?;
            tracing::info!(%key, "config updated");
        }
    }
    Ok(())
}
