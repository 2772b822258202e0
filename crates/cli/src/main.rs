mod agent;
mod config_commands;
mod memory_commands;
mod segment_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "ringle", about = "Ringle, a conversation partner over text messages")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to load instead of searching the default locations.
    #[arg(long, global = true, env = "RINGLE_CONFIG")]
    config: Option<PathBuf>,

    /// Serve Prometheus metrics on this address while running.
    #[cfg(feature = "prometheus")]
    #[arg(long, global = true, env = "RINGLE_METRICS_LISTEN")]
    metrics_listen: Option<std::net::SocketAddr>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the agent on every enabled channel (default).
    Run,
    /// Show how a reply would be split and paced.
    Segment {
        /// Reply text to split.
        text: String,
    },
    /// List stored conversation summaries.
    Summaries {
        /// Only this conversation, e.g. `telegram:42`.
        #[arg(long)]
        chat: Option<String>,
        #[arg(long, default_value_t = 5)]
        limit: u32,
        /// Output as JSON for scripting.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config_path = cli.config.as_deref();
    match cli.command {
        None | Some(Commands::Run) => {
            info!(version = env!("CARGO_PKG_VERSION"), "ringle starting");
            #[cfg(feature = "prometheus")]
            if let Some(listen) = cli.metrics_listen {
                ringle_metrics::init_prometheus(listen)?;
            }
            agent::run(config_path).await
        },
        Some(Commands::Segment { text }) => segment_commands::show(config_path, &text),
        Some(Commands::Summaries { chat, limit, json }) => {
            memory_commands::list_summaries(config_path, chat.as_deref(), limit, json).await
        },
        Some(Commands::Config { action }) => config_commands::handle_config(config_path, action),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["ringle"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "ringle",
            "summaries",
            "--limit",
            "3",
            "--chat",
            "telegram:42",
            "--config",
            "/tmp/ringle.toml",
            "--json-logs",
        ])
        .unwrap();
        assert!(cli.json_logs);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/ringle.toml")));
        assert!(matches!(
            cli.command,
            Some(Commands::Summaries {
                chat: Some(ref chat),
                limit: 3,
                json: false
            }) if chat == "telegram:42"
        ));
    }
}
