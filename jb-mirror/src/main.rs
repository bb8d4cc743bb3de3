mod api;
mod args;
mod cache;
mod compat;
mod config;
mod digest;
mod error;
mod reconcile;
mod sync;
mod tracker;

use clap::Parser as _;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::args::MirrorArgs;
use crate::config::Config;
use crate::error::MirrorError;
use crate::sync::MirrorProcessor;

fn main() {
    let args = MirrorArgs::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("JB_MIRROR_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build() {
        Ok(v) => v.block_on(async_main(args)),
        Err(err) => {
            tracing::error!("Failed to create tokio runtime: {:?}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = result {
        tracing::error!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn async_main(args: MirrorArgs) -> Result<(), MirrorError> {
    tracing::trace!("args = {:#?}", args);

    let config = Config::load(&args.config)?;
    let mut processor = MirrorProcessor::new(&args)?;

    tracing::info!("Starting JetBrains product and plugins mirror...");
    processor.run(&config).await?;
    tracing::info!("JetBrains product and plugins mirror finished.");

    Ok(())
}
