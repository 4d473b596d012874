//! SAP OData CLI - discover and query SAP OData services.
//!
//! Responsibilities:
//! - Parse command-line arguments and environment variables.
//! - Build a configured client and execute commands via the shared library.
//! - Print results as JSON and exit with a structured code.
//!
//! Does NOT handle:
//! - Discovery, resolution, or query logic (see `crates/client`).
//!
//! Invariants:
//! - `load_dotenv()` runs BEFORE CLI parsing so `.env` can provide clap
//!   env-var defaults.

mod args;
mod dispatch;
mod error;

use clap::Parser;
use secrecy::SecretString;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use args::Cli;
use dispatch::run_command;
use error::{ExitCode, exit_code_for};
use sap_odata_client::SapClient;
use sap_odata_config::ConfigLoader;

#[tokio::main]
async fn main() {
    // Load .env BEFORE parsing so clap env defaults can read .env values.
    let _ = ConfigLoader::new().load_dotenv();

    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ConfigLoader::new()
        .base_url(cli.base_url.clone())
        .username(cli.username.clone())
        .password(cli.password.clone().map(|p| SecretString::new(p.into())))
        .skip_verify(cli.skip_verify.then_some(true))
        .timeout(cli.timeout.map(std::time::Duration::from_secs))
        .load();
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(ExitCode::UsageError.as_i32());
        }
    };

    let client = match SapClient::from_config(&config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to build client: {e}");
            std::process::exit(ExitCode::UsageError.as_i32());
        }
    };

    let exit_code = match run_command(cli.command, &client, cli.pretty).await {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            eprintln!("{e:#}");
            exit_code_for(&e)
        }
    };

    std::process::exit(exit_code.as_i32());
}
