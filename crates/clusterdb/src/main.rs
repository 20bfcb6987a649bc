mod cli;
mod config;
mod demo;
mod output;
mod storage;

use anyhow::Result;
use clap::Parser;
use clusterdb_core::{Device, KeyStrategy, MemoryStore, RecordStore, Store};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    cli::{Backend, Cli, Commands, OutputFormat, Scheme},
    config::Config,
    output::{format_output, format_report},
    storage::DynamoDbStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clusterdb=info,clusterdb_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env();

    match cli.backend {
        Backend::Memory => {
            tracing::info!("using in-memory store");
            execute(MemoryStore::new(), cli.command, cli.format, &config).await
        }
        Backend::Dynamodb => {
            let aws = config.aws();
            tracing::info!(endpoint = %aws.target_display(), "using DynamoDB");
            let store = DynamoDbStore::from_config(&aws).await;
            execute(store, cli.command, cli.format, &config).await
        }
    }
}

async fn execute<S: Store + Clone>(
    store: S,
    command: Commands,
    format: OutputFormat,
    config: &Config,
) -> Result<()> {
    match command {
        Commands::Demo => {
            let report = demo::run(store, config).await?;
            match format {
                OutputFormat::Json => println!("{}", format_output(&report, format)),
                OutputFormat::Pretty => println!("{}", format_report(&report)),
            }
            report.ensure_success()?;
        }
        Commands::CreateTable { scheme, table } => {
            let (strategy, default_table) = match scheme {
                Scheme::Dedicated => (KeyStrategy::Dedicated, &config.device_table),
                Scheme::Shared => (config.shared_strategy()?, &config.shared_table),
            };
            let records = RecordStore::new(store, strategy).with_readiness(config.readiness());
            let spec = records
                .table_spec::<Device>(table.unwrap_or_else(|| default_table.clone()))
                .with_throughput(config.throughput());

            records.create_table_if_absent(&spec).await?;
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    format_output(
                        &serde_json::json!({
                            "table": spec.name,
                            "partition_attr": spec.partition_attr,
                            "sort_attr": spec.sort_attr,
                            "status": "active",
                        }),
                        format
                    )
                ),
                OutputFormat::Pretty => println!(
                    "Table {} is active ({} / {})",
                    spec.name, spec.partition_attr, spec.sort_attr
                ),
            }
        }
        Commands::DeleteTable { table } => {
            RecordStore::new(store, KeyStrategy::Dedicated)
                .delete_table(&table)
                .await?;
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    format_output(
                        &serde_json::json!({ "table": table, "deleted": true }),
                        format
                    )
                ),
                OutputFormat::Pretty => println!("Deleted table {table}"),
            }
        }
    }
    Ok(())
}
