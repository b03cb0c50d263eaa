use clap::Parser;
use suspense::cli::{Cli, Commands};
use suspense::types::config::Config;
use suspense::SuspenseResult;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> SuspenseResult<()> {
    let cli = Cli::parse();

    // Load configuration first (no logging yet)
    let (config, load_error) = if cli.config.exists() {
        match Config::load(&cli.config) {
            Ok(config) => (config, None),
            Err(error) => (Config::default_config(), Some(error)),
        }
    } else {
        (Config::default_config(), None)
    };

    // CLI flags take precedence over config
    let log_level = if cli.quiet {
        "error".to_string()
    } else if cli.verbose {
        "debug".to_string()
    } else {
        config.general.log_level.clone()
    };

    let filter = EnvFilter::from_default_env().add_directive(
        format!("suspense={}", log_level)
            .parse()
            .unwrap_or_else(|_| LevelFilter::INFO.into()),
    );

    if config.general.log_format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    match &load_error {
        Some(error) => tracing::warn!(
            "Ignoring configuration at {}: {}",
            cli.config.display(),
            error
        ),
        None => tracing::debug!("Configuration loaded from: {}", cli.config.display()),
    }

    match cli.command {
        Commands::Init { path } => {
            suspense::cli::commands::init(path).await?;
        }
        Commands::Config => {
            if let Some(error) = load_error {
                return Err(error);
            }
            suspense::cli::commands::config_cmd(&cli.config, &config).await?;
        }
        Commands::Demo(args) => {
            suspense::cli::commands::demo(args, &config).await?;
        }
        Commands::Version => {
            suspense::cli::commands::version();
        }
    }

    Ok(())
}
