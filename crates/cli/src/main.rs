mod config_commands;
mod send_commands;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "nlrelay", about = "nlrelay: Bot Framework to NLP backend turn relay")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides BOT_BIND).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides bot_port / BOT_PORT).
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Backend prompt endpoint (overrides nlapiurl).
    #[arg(long, global = true)]
    nlapiurl: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server (default when no subcommand is provided).
    Serve,
    /// Validate the environment configuration and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
        /// Print the effective configuration with secrets redacted.
        #[arg(long)]
        show: bool,
    },
    /// Relay a single turn to the backend and print the reply.
    Send {
        #[arg(short, long)]
        text: String,
        /// User id forwarded as `user_id`.
        #[arg(long)]
        user: Option<String>,
        /// Channel id forwarded as `channel_id`.
        #[arg(long)]
        channel: Option<String>,
    },
}

impl Cli {
    /// Environment lookup with command-line overrides applied first.
    fn lookup(&self) -> impl Fn(&str) -> Option<String> + '_ {
        move |key| {
            let flag = match key {
                "nlapiurl" => self.nlapiurl.clone(),
                "bot_port" => self.port.map(|p| p.to_string()),
                "BOT_BIND" => self.bind.clone(),
                _ => None,
            };
            flag.or_else(|| std::env::var(key).ok())
        }
    }
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

    match &cli.command {
        // Default: start the server when no subcommand is provided
        None | Some(Commands::Serve) => {
            info!(version = env!("CARGO_PKG_VERSION"), "nlrelay starting");
            let config = relay_config::load_with(cli.lookup())?;
            relay_gateway::server::start_gateway(&config).await
        },
        Some(Commands::Check { verbose, show }) => {
            config_commands::check(cli.lookup(), *verbose, *show)
        },
        Some(Commands::Send {
            text,
            user,
            channel,
        }) => {
            let config = relay_config::load_with(cli.lookup())?;
            send_commands::send(&config, text, user.as_deref(), channel.as_deref()).await
        },
    }
}
