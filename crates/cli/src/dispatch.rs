//! Command execution.
//!
//! Takes parsed arguments plus a built client and runs the requested
//! operation, printing results as JSON to stdout.

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde_json::Value;

use sap_odata_client::{Filter, FilterOp, QueryOutcome, QuerySpec, SapClient};

use crate::args::Commands;

pub async fn run_command(command: Commands, client: &SapClient, pretty: bool) -> anyhow::Result<()> {
    match command {
        Commands::Discover { refresh } => {
            let report = if refresh {
                client.refresh().await?
            } else {
                client.discover().await?
            };
            print_json(&report, pretty)
        }
        Commands::Services => {
            let services = client.services().await?;
            print_json(&services, pretty)
        }
        Commands::EntitySets { service } => {
            let sets = client.entity_sets(&service).await?;
            print_json(&sets, pretty)
        }
        Commands::Resolve { hint, service } => {
            let result = client.resolve(&hint, service.as_deref()).await?;
            print_json(&result, pretty)
        }
        Commands::Query {
            hint,
            service,
            filters,
            select,
            top,
            skip,
            order_by,
            all,
        } => {
            let spec = QuerySpec {
                filters: filters
                    .iter()
                    .map(|raw| parse_filter(raw))
                    .collect::<anyhow::Result<Vec<_>>>()?,
                select,
                top,
                skip,
                order_by,
                fetch_all: all,
            };
            let outcome = client.smart_query(&hint, service.as_deref(), &spec).await?;
            if let QueryOutcome::Ambiguous { ref hint, ref candidates } = outcome {
                eprintln!(
                    "Hint '{hint}' is ambiguous between {} entity sets; narrow it or pass --service.",
                    candidates.len()
                );
            }
            print_json(&outcome, pretty)
        }
        Commands::TestConnection => {
            let report = client.test_connection().await;
            print_json(&report, pretty)?;
            if !report.healthy {
                return Err(anyhow!("connection check failed"));
            }
            Ok(())
        }
    }
}

/// Parse a filter expression of the form `Field op value`, e.g.
/// `Customer eq ACME` or `Amount gt 100`. The value is typed by shape:
/// numbers and booleans parse as such, everything else is a string.
fn parse_filter(raw: &str) -> anyhow::Result<Filter> {
    let mut parts = raw.splitn(3, ' ');
    let (Some(field), Some(op), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(anyhow!(
            "invalid filter '{raw}': expected 'Field op value' (e.g. 'Customer eq ACME')"
        ));
    };

    let op = FilterOp::parse(op)
        .ok_or_else(|| anyhow!("invalid filter operator '{op}' in '{raw}'"))?;

    let value = if let Ok(n) = value.parse::<i64>() {
        Value::from(n)
    } else if let Ok(f) = value.parse::<f64>() {
        Value::from(f)
    } else if let Ok(b) = value.parse::<bool>() {
        Value::from(b)
    } else {
        Value::from(value.trim_matches('\'').to_string())
    };

    Ok(Filter {
        field: field.to_string(),
        op,
        value,
    })
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("failed to serialize output")?;
    println!("{rendered}");
    Ok(())
}
