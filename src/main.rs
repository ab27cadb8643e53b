use clap::{Parser, Subcommand};
use imified::{BotClient, Config, commands};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imified", about = "Talk to users through an IMified bot")]
struct Cli {
    /// Config file (defaults to ~/.config/imified/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message to one or more users
    Send {
        message: String,
        /// Userkey to deliver to; repeat for several
        #[arg(long)]
        to: Vec<String>,
        /// Screen name on --network instead of a userkey
        #[arg(long, requires = "network")]
        user: Option<String>,
        #[arg(long)]
        network: Option<String>,
    },
    /// List the bot's users
    Users {
        /// Jabber, AIM, MSN, Yahoo, Gtalk, Twitter or SMS
        #[arg(long)]
        network: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Send a message to every user of the bot
    Broadcast { message: String },
    /// Show the configuration, or a single key
    Config { key: Option<String> },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_ref())?;
    let mut stdout = std::io::stdout();

    if let Commands::Config { key } = &cli.command {
        return commands::run_config(&config, key.as_deref(), &mut stdout);
    }

    let client = BotClient::new(config)?;
    match cli.command {
        Commands::Send {
            message,
            to,
            user,
            network,
        } => {
            let recipient = commands::build_recipient(&to, user.as_deref(), network.as_deref())?;
            commands::run_send(&client, &message, recipient, &mut stdout).await
        }
        Commands::Users { network, json } => {
            commands::run_users(&client, network.as_deref(), json, &mut stdout).await
        }
        Commands::Broadcast { message } => {
            commands::run_broadcast(&client, &message, &mut stdout).await
        }
        Commands::Config { .. } => Ok(()),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(run(cli)) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
