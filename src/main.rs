use clap::Parser;
use kbadmin::cli::{Cli, handle_command};
use kbadmin::logger::setup_logging;
use kbadmin::traits::{ConfigProvider, DefaultConfigProvider};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let provider = DefaultConfigProvider {
        path: cli.config.clone(),
    };
    let mut config = provider.load_config().unwrap_or_else(|e| {
        eprintln!("Failed to load config: {}", e);
        std::process::exit(1);
    });

    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    // Keep the guard alive so file logs are flushed
    let _guard = setup_logging(&config);

    tracing::debug!("Backend: {}", config.backend.base_url);

    if let Err(e) = handle_command(cli.command, config, cli.config).await {
        tracing::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
