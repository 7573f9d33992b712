use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use escape_roomba::application::messaging::EventDispatcher;
use escape_roomba::application::services::thread_manager::DEFAULT_HISTORY_SCAN_LIMIT;
use escape_roomba::application::services::{EventLogger, ThreadManager};
use escape_roomba::infrastructure::adapters::discord;
use escape_roomba::infrastructure::config::{Config, DEFAULT_CONFIG_PATH};
use escape_roomba::infrastructure::logging;

#[derive(Parser)]
#[command(name = "escape-roomba")]
#[command(about = "Discord bot that spins 🧵 reactions off into thread channels", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Bot token (overrides environment and config)
    #[arg(short, long, global = true)]
    token: Option<String>,

    /// Enable debug logging for the bot
    #[arg(long, global = true)]
    debug: bool,

    /// Enable debug logging for the Discord client library
    #[arg(long, global = true)]
    debug_discord: bool,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Log in and report connection and server events
    #[command(alias = "run_bot")]
    RunBot,
    /// Log in and manage 🧵 thread channels
    #[command(alias = "thread_bot")]
    ThreadBot,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::RunBot | Commands::ThreadBot => run_bot(&cli),
        Commands::Version => {
            println!("escape-roomba v{}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Commands::InitConfig => init_config(),
    }
}

fn run_bot(cli: &Cli) -> ExitCode {
    // Logging flags may come from the config file, so load it first.
    let loaded = Config::load_or_default(&cli.config);
    let flags = loaded.as_ref().map(|c| c.logging.clone()).unwrap_or_default();
    let debug = cli.debug || flags.debug;
    if let Err(e) = logging::init(debug, cli.debug_discord || flags.debug_discord) {
        eprintln!("{}", e);
    }

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(target: "bot", "Failed to load {}: {}", cli.config, e);
            return ExitCode::FAILURE;
        }
    };

    // Checked before any connection attempt.
    let token = match config.resolve_token(cli.token.as_deref()) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(target: "bot", "{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(Arc::new(EventLogger::new(debug)));
    if cli.command == Commands::ThreadBot {
        let limit = u8::try_from(config.threads.history_scan_limit).unwrap_or(DEFAULT_HISTORY_SCAN_LIMIT);
        let threads = ThreadManager::new().with_history_scan_limit(limit);
        dispatcher.register(Arc::new(threads));
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(target: "bot", "Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(target: "bot", "Starting escape-roomba v{}", env!("CARGO_PKG_VERSION"));
    let intents = discord::intents(config.bot.message_content);
    match rt.block_on(discord::run(&token, intents, dispatcher)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(target: "bot", "{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_config() -> ExitCode {
    match Config::default().to_yaml() {
        Ok(yaml) => {
            println!("{}", yaml);
            println!("\nSave this to {} and adjust as needed.", DEFAULT_CONFIG_PATH);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
