//! `popgate` binary.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use popgate::{Config, listener, logging};

/// POP3 gateway in front of an IMAP server.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file.
    #[arg(short, long, default_value = "popgate.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("load {}", args.config.display()))?;

    logging::init(&config.log.filter);

    listener::run(config).await
}
