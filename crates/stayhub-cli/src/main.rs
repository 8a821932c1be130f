//! `StayHub` CLI
//!
//! Sign in, review bookings and cancellation refunds, and chat with hosts
//! and guests in real time.

use clap::{Parser, Subcommand};
use tracing::info;

use stayhub_cli::auth_cmd::{self, AuthAction};
use stayhub_cli::booking_cmd::{self, BookingAction};
use stayhub_cli::chat_cmd::{self, ChatAction};
use stayhub_cli::context::CliContext;
use stayhub_core::config::{load_config, session_path};
use stayhub_core::tracing_init::init_tracing;
use stayhub_core::{Config, Session};

#[derive(Parser, Debug)]
#[command(name = "stayhub")]
#[command(version, about = "Short-term rental marketplace CLI", long_about = None)]
struct Cli {
    /// REST base URL, including the `/api` prefix.
    #[arg(long, global = true, env = "STAYHUB_API_URL")]
    api_url: Option<String>,

    /// WebSocket URL of the real-time channel.
    #[arg(long, global = true, env = "STAYHUB_WS_URL")]
    ws_url: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in and out.
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
    /// Bookings and cancellations.
    Bookings {
        #[command(subcommand)]
        action: BookingAction,
    },
    /// Chats with hosts and guests.
    Chats {
        #[command(subcommand)]
        action: ChatAction,
    },
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.api_url {
            config.api.base_url.clone_from(url);
        }
        if let Some(url) = &self.ws_url {
            config.api.ws_url.clone_from(url);
        }
        if let Some(level) = &self.log_level {
            config.log_level.clone_from(level);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let project_dir = std::env::current_dir().ok();
    let mut config = load_config(project_dir.as_deref())?;
    cli.apply(&mut config);

    init_tracing(&format!("stayhub={}", config.log_level), cli.log_json);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting stayhub CLI");

    let session_file = session_path()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine config directory for the session file"))?;
    let mut ctx = CliContext::new(config, Session::restore(session_file));

    match cli.command {
        Commands::Auth { action } => auth_cmd::run(action, &mut ctx).await,
        Commands::Bookings { action } => booking_cmd::run(action, &mut ctx).await,
        Commands::Chats { action } => chat_cmd::run(action, &mut ctx).await,
    }
}
