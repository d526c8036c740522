mod admin_cmd;
mod chat_cmd;
mod context;
mod sessions_cmd;
mod status_cmd;
mod terminal_output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use concierge_config::redact;
use concierge_core::Responder;
use concierge_gateway::{hash_password, start_server, GatewayState};

use context::AppContext;
use sessions_cmd::SessionCommands;

#[derive(Parser)]
#[command(name = "concierge")]
#[command(about = "Concierge: website chat assistant with human takeover")]
#[command(version)]
struct Cli {
    /// Config directory (defaults to $CONCIERGE_CONFIG_DIR, then ~/.concierge)
    #[arg(long = "config", global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Chat from the terminal as a website visitor
    Chat {
        /// Resume an existing session
        #[arg(short, long)]
        session: Option<String>,
        /// Get replies from a running server (e.g. http://localhost:8080)
        #[arg(long, value_name = "URL")]
        server: Option<String>,
    },
    /// Inspect sessions as an admin
    #[command(subcommand)]
    Sessions(SessionCommands),
    /// Take over a session as an admin
    Takeover {
        id: String,
        /// Operator username (defaults to admin.username)
        #[arg(long)]
        operator: Option<String>,
    },
    /// Send an admin message into a session
    Send {
        id: String,
        text: String,
        #[arg(long)]
        operator: Option<String>,
    },
    /// Show the status of a running server
    Status,
    /// Hash an admin password for the config file
    HashPassword {
        password: String,
        /// Salt to use (a random one is generated when omitted)
        #[arg(long)]
        salt: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::HashPassword { password, salt } = &cli.command {
        let salt = salt
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        println!("admin:\n  salt: \"{salt}\"\n  passwordHash: \"{}\"", hash_password(&salt, password));
        return Ok(());
    }

    let ctx = AppContext::load(cli.config_dir.as_deref()).await?;

    // Only the server writes to the terminal; interactive commands log to file.
    match &cli.command {
        Commands::Serve { .. } => concierge_logging::init_logger(ctx.log_dir(), ctx.config.log_level())?,
        _ => concierge_logging::init_file_logger(ctx.log_dir(), ctx.config.log_level())?,
    }
    debug!(config = %redact(&serde_json::to_value(&ctx.config)?), "Config loaded");

    match cli.command {
        Commands::Serve { port } => run_server(&ctx, port).await?,
        Commands::Chat { session, server } => chat_cmd::run(&ctx, session, server.as_deref()).await?,
        Commands::Sessions(cmd) => sessions_cmd::run(&ctx, cmd).await?,
        Commands::Takeover { id, operator } => admin_cmd::take_over(&ctx, id, operator).await?,
        Commands::Send { id, text, operator } => admin_cmd::send(&ctx, id, text, operator).await?,
        Commands::Status => status_cmd::run(ctx.local_port()).await?,
        Commands::HashPassword { .. } => {}
    }

    Ok(())
}

async fn run_server(ctx: &AppContext, port: Option<u16>) -> Result<()> {
    let addr = ctx.bind_address(port)?;
    let (responder, health) = ctx.responder()?;
    let auth = ctx.admin_auth();
    info!(
        addr = %addr,
        responder = %responder.name(),
        faq_loaded = health.faq_loaded,
        admin_login = auth.is_enabled(),
        "Starting Concierge"
    );

    let state = GatewayState::new(
        ctx.repo.clone(),
        responder,
        health,
        ctx.policy(),
        ctx.links(),
        auth,
    )
    .with_rate_limiter(ctx.rate_limiter());

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received");
    };
    start_server(addr, state, shutdown).await
}
