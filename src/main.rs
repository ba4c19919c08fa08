//! covgate CLI entry point.

use anyhow::Result;
use clap::Parser;

use covgate::cli::{self, commands, Cli, Commands};
use covgate::domain::models::LoggingConfig;
use covgate::infrastructure::config::ConfigLoader;
use covgate::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    // The logger guard is dropped inside `run`, flushing file output before exit.
    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => cli::handle_error(err, json),
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let Cli {
        command,
        json,
        config: config_file,
    } = cli;

    match command {
        // Runs without the layered config so a broken file can be replaced.
        Commands::Init(args) => {
            let _logger = LoggerImpl::init(&LoggingConfig::default())?;
            commands::init::execute(args, json).await
        }
        command => {
            let figment = command.configure(ConfigLoader::figment(config_file.as_deref()));
            let config = ConfigLoader::extract(&figment)?;
            let _logger = LoggerImpl::init(&config.logging)?;

            match command {
                Commands::Check(args) => commands::check::execute(args, &config, json).await,
                Commands::Snapshot(args) => commands::snapshot::execute(args, &config, json).await,
                Commands::Audit(args) => commands::audit::execute(args, &config, json).await,
                Commands::Init(args) => commands::init::execute(args, json).await,
            }
        }
    }
}
