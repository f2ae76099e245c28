use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use vault_panel::comms::local_api::{self, AppState};
use vault_panel::config::Config;
use vault_panel::utils;

#[derive(Parser)]
#[command(name = "vault", version, about = "Multi-tenant vault service")]
struct AppCli {
    /// Config file path (built-in seed data when omitted)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API (default)
    Serve {
        #[arg(long, default_value_t = 4000)]
        port: u16,
    },
    /// Log in against the configured identities and print the session token
    Login { username: String, password: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = AppCli::parse();
    utils::logging::init(args.verbose);

    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Some(Commands::Login { username, password }) => {
            let state = AppState::new(Arc::new(config));
            let payload = state.policy.login(&username, &password)?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        Some(Commands::Serve { port }) => {
            info!(version = vault_panel::VERSION, "starting vault API on port {port}");
            local_api::serve(config, port).await?;
        }
        None => {
            info!(version = vault_panel::VERSION, "starting vault API on port 4000");
            local_api::serve(config, 4000).await?;
        }
    }

    Ok(())
}
