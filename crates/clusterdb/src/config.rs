use std::{env, time::Duration};

use clusterdb_core::key::{TABLE_PARTITION_KEY, TABLE_SORT_KEY};
use clusterdb_core::{
    ConfigFile, Device, KeyStrategy, PrefixRegistry, ReadinessPolicy, Record, Service,
    SharedTable, Throughput,
};

use crate::storage::AwsConfig;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// AWS region (default: "us-west-1")
    pub region: String,
    /// Custom DynamoDB endpoint, e.g. DynamoDB Local (default: none)
    pub endpoint_url: Option<String>,
    /// Table keyed by the device's own attributes (default: "test-table")
    pub device_table: String,
    /// Table shared by all entities (default: "test-table2")
    pub shared_table: String,
    /// Provisioned read capacity for new tables (default: 1)
    pub read_capacity: i64,
    /// Provisioned write capacity for new tables (default: 1)
    pub write_capacity: i64,
    /// Seconds between table status polls (default: 2)
    pub poll_interval_secs: u64,
    /// Status polls before giving up on a new table (default: 60)
    pub poll_max_attempts: u32,
    /// Partition attribute of the shared table (default: "PartitionKey")
    pub partition_attr: String,
    /// Sort attribute of the shared table (default: "SortKey")
    pub sort_attr: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `AWS_REGION` - AWS region (default: "us-west-1")
    /// - `AWS_ENDPOINT_URL` - Custom endpoint URL (default: none)
    /// - `CLUSTERDB_DEVICE_TABLE` - Dedicated device table (default: "test-table")
    /// - `CLUSTERDB_SHARED_TABLE` - Shared table (default: "test-table2")
    /// - `CLUSTERDB_READ_CAPACITY` - Read capacity units (default: 1)
    /// - `CLUSTERDB_WRITE_CAPACITY` - Write capacity units (default: 1)
    /// - `CLUSTERDB_POLL_INTERVAL_SECS` - Table status poll interval (default: 2)
    /// - `CLUSTERDB_POLL_MAX_ATTEMPTS` - Table status polls (default: 60)
    /// - `CLUSTERDB_PARTITION_ATTR` - Shared partition attribute (default: "PartitionKey")
    /// - `CLUSTERDB_SORT_ATTR` - Shared sort attribute (default: "SortKey")
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Unparseable numbers and a zero poll budget fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let capacity = |name: &str| -> Option<i64> { lookup(name).and_then(|v| v.parse().ok()) };
        Self {
            region: lookup("AWS_REGION").unwrap_or_else(|| "us-west-1".to_string()),
            endpoint_url: lookup("AWS_ENDPOINT_URL").filter(|v| !v.is_empty()),
            device_table: lookup("CLUSTERDB_DEVICE_TABLE")
                .unwrap_or_else(|| "test-table".to_string()),
            shared_table: lookup("CLUSTERDB_SHARED_TABLE")
                .unwrap_or_else(|| "test-table2".to_string()),
            read_capacity: capacity("CLUSTERDB_READ_CAPACITY").unwrap_or(1),
            write_capacity: capacity("CLUSTERDB_WRITE_CAPACITY").unwrap_or(1),
            poll_interval_secs: lookup("CLUSTERDB_POLL_INTERVAL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
            poll_max_attempts: lookup("CLUSTERDB_POLL_MAX_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(60),
            partition_attr: lookup("CLUSTERDB_PARTITION_ATTR")
                .unwrap_or_else(|| TABLE_PARTITION_KEY.to_string()),
            sort_attr: lookup("CLUSTERDB_SORT_ATTR")
                .unwrap_or_else(|| TABLE_SORT_KEY.to_string()),
        }
    }

    /// AWS client settings.
    pub fn aws(&self) -> AwsConfig {
        AwsConfig {
            endpoint_url: self.endpoint_url.clone(),
            region: self.region.clone(),
        }
    }

    /// Capacity for newly created tables.
    pub fn throughput(&self) -> Throughput {
        Throughput::Provisioned {
            read: self.read_capacity,
            write: self.write_capacity,
        }
    }

    /// Budget for waiting on a new table.
    pub fn readiness(&self) -> ReadinessPolicy {
        ReadinessPolicy {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_attempts: self.poll_max_attempts,
        }
    }

    /// Shared-table strategy with every record type registered.
    pub fn shared_strategy(&self) -> clusterdb_core::Result<KeyStrategy> {
        let registry = PrefixRegistry::new([Device::ENTITY, Service::ENTITY, ConfigFile::ENTITY])?;
        Ok(KeyStrategy::Shared(
            SharedTable::new(registry).with_attributes(&self.partition_attr, &self.sort_attr),
        ))
    }
}
