#![forbid(unsafe_code)]
#![warn(
    unused,
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs
)]

//! Binary entrypoint that runs one LTA tape worker until shutdown.

use clap::{Parser, ValueEnum};
use lta_app::{AppResult, run_app};
use lta_config::Component;

/// Worker kinds selectable at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ComponentArg {
    /// Copy staged bundle archives onto HPSS.
    #[value(alias = "nersc-mover")]
    Writer,
    /// Verify tape copies and record them in the File Catalog.
    #[value(alias = "nersc-verifier")]
    Verifier,
}

impl From<ComponentArg> for Component {
    fn from(value: ComponentArg) -> Self {
        match value {
            ComponentArg::Writer => Self::Writer,
            ComponentArg::Verifier => Self::Verifier,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "lta-app",
    about = "Long Term Archive tape worker for HPSS at NERSC"
)]
struct Cli {
    /// Which worker to run.
    #[arg(value_enum, env = "LTA_COMPONENT")]
    component: ComponentArg,
}

/// Parses the worker kind and blocks until it exits.
#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    run_app(cli.component.into()).await
}
