//! DynamoDB storage backend.
//!
//! Implements the `Store` trait from `clusterdb_core` using `aws-sdk-dynamodb`.
//! SDK types never leave this module: items are converted to `Item` and
//! errors to `DbError` at the boundary.

mod client;
mod conversions;
mod error;
mod store;

pub use client::AwsConfig;
pub use store::DynamoDbStore;
