//! Main entry point for rtube CLI

use clap::Parser;
use rtube::cli::{commands, Args, OutputFormatter, VerbosityLevel};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbosity_level())?;

    debug!("Starting rtube with args: {:?}", args);

    let formatter = OutputFormatter::new(args.verbosity_level());
    if let Err(error) = commands::run(&args, &formatter).await {
        formatter.error(&format!("{:#}", error));
        std::process::exit(1);
    }

    Ok(())
}

/// Initialize logging system. `RUST_LOG` wins over the verbosity flags.
fn init_logging(verbosity: VerbosityLevel) -> anyhow::Result<()> {
    let default_level = match verbosity {
        VerbosityLevel::Quiet => "error",
        VerbosityLevel::Normal => "info",
        VerbosityLevel::Verbose => "debug",
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init()?;

    Ok(())
}
