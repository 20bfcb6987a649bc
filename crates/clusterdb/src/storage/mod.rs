//! Storage backends.
//!
//! The in-memory backend lives in `clusterdb_core::store`; this crate adds
//! the DynamoDB one.

pub mod dynamodb;

pub use dynamodb::{AwsConfig, DynamoDbStore};
