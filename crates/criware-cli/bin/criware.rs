//! criware binary entry point.
//!
//! Parses arguments, initializes logging and runs the selected command.
//! `RUST_LOG` takes precedence over `--log-level`.

use anyhow::Result;
use criware_cli::{Cli, commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::from_args();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    commands::run(&cli)
}
