//! CLI argument definitions and parsing.
//!
//! Responsibilities:
//! - Define the CLI structure using clap derive macros.
//! - Parse command-line arguments and environment variables.
//!
//! Non-responsibilities:
//! - Does not execute commands (see `dispatch` module).
//! - Does not handle config loading (see `main`).

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sap-odata")]
#[command(about = "Discover and query SAP OData services from the command line", long_about = None)]
#[command(version)]
#[command(
    after_help = "Examples:\n  sap-odata discover\n  sap-odata entity-sets API_SALES_ORDER_SRV\n  sap-odata resolve 'billing documents'\n  sap-odata query 'sales orders' --filter 'Customer eq ACME' --top 10\n  sap-odata test-connection\n"
)]
pub struct Cli {
    /// Base URL of the SAP system (e.g., https://sap.example.com:44300)
    #[arg(short, long, global = true, env = "SAP_URL")]
    pub base_url: Option<String>,

    /// Username for basic authentication
    #[arg(short, long, global = true, env = "SAP_USERNAME")]
    pub username: Option<String>,

    /// Password for basic authentication
    #[arg(short, long, global = true, env = "SAP_PASSWORD")]
    pub password: Option<String>,

    /// Connection timeout in seconds
    #[arg(long, global = true, env = "SAP_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Skip TLS certificate verification (for self-signed certificates)
    #[arg(long, global = true, env = "SAP_SKIP_VERIFY")]
    pub skip_verify: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enumerate services and entity sets of the system
    Discover {
        /// Bypass the cached snapshot and re-run discovery
        #[arg(long)]
        refresh: bool,
    },

    /// List discovered services
    Services,

    /// List entity sets of one service
    EntitySets {
        /// Technical service name (e.g., API_SALES_ORDER_SRV)
        service: String,
    },

    /// Resolve a free-form hint to a concrete entity set
    Resolve {
        /// Hint to resolve (e.g., 'billing documents')
        hint: String,

        /// Restrict candidates to one service
        #[arg(short, long)]
        service: Option<String>,
    },

    /// Resolve a hint and query the matched entity set
    Query {
        /// Hint naming the entity set (e.g., 'sales orders')
        hint: String,

        /// Restrict candidates to one service
        #[arg(short, long)]
        service: Option<String>,

        /// Filter expression 'Field op value'; ops: eq ne gt ge lt le contains
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Comma-separated list of fields to select
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,

        /// Maximum number of rows to request per page
        #[arg(short, long)]
        top: Option<usize>,

        /// Number of rows to skip
        #[arg(long)]
        skip: Option<usize>,

        /// Sort expression (e.g., 'Amount desc')
        #[arg(short, long)]
        order_by: Option<String>,

        /// Follow server pagination until exhausted (subject to limits)
        #[arg(long)]
        all: bool,
    },

    /// Run layered connection diagnostics against the system
    TestConnection,
}
