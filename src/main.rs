use std::str::FromStr;

use clap::Parser;
use log::{error, LevelFilter};

use synovm::cli::{error_report, Cli, Commands};
use synovm::config::{self, Settings};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // init logger
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::from_str(&cli.log_level).unwrap_or(LevelFilter::Warn)
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let config_path = match cli.config {
        Some(path) => path,
        None => match config::default_path() {
            Ok(path) => path,
            Err(e) => {
                error!("Failed to locate config file: {}", e);
                eprintln!("Error: failed to locate config file: {}", e);
                std::process::exit(1);
            }
        },
    };

    let settings = match Settings::load_with_env(&config_path) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load config: {}", e);
            eprintln!("Error: failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::List(cmd) => cmd.execute(&settings).await,
        Commands::Create(cmd) => cmd.execute(&settings).await,
        Commands::Start(cmd) => cmd.start(&settings).await,
        Commands::Stop(cmd) => cmd.stop(&settings).await,
        Commands::Restart(cmd) => cmd.restart(&settings).await,
        Commands::Status(cmd) => cmd.execute(&settings).await,
        Commands::Delete(cmd) => cmd.execute(&settings).await,
        Commands::Template(cmd) => cmd.execute(&settings).await,
        Commands::Config(cmd) => cmd.execute(&config_path, &settings),
        Commands::Version(cmd) => cmd.execute(),
        Commands::Doctor(cmd) => cmd.execute(&settings).await,
        Commands::ApiCheck(cmd) => cmd.execute(&settings).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("{}", error_report(&e));
        std::process::exit(1);
    }
}
