//! CLI command definitions.

use clap::{Parser, Subcommand, ValueEnum};

/// Conditional record store for cluster devices, services and config files.
#[derive(Debug, Parser)]
#[command(name = "clusterdb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Storage backend.
    #[arg(long, env = "CLUSTERDB_BACKEND", default_value = "dynamodb")]
    pub backend: Backend,

    /// Output format.
    #[arg(long, default_value = "pretty")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Storage backend options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// AWS DynamoDB (or DynamoDB Local via `AWS_ENDPOINT_URL`).
    Dynamodb,
    /// Process-local store; nothing survives the run.
    Memory,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Raw JSON output.
    Json,
    /// Human-readable output.
    #[default]
    Pretty,
}

/// Table key layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scheme {
    /// Keyed by the device's own attributes (`ClusterName` / `DeviceName`).
    Dedicated,
    /// Prefixed partition key shared by every record type.
    Shared,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the CRUD exercise on a dedicated table, then on a shared table.
    Demo,
    /// Create a table and wait until it is active.
    CreateTable {
        /// Key layout of the new table.
        #[arg(long, value_enum)]
        scheme: Scheme,
        /// Table name; defaults to the configured table for the scheme.
        #[arg(long)]
        table: Option<String>,
    },
    /// Delete a table.
    DeleteTable {
        /// Table name.
        #[arg(long)]
        table: String,
    },
}
