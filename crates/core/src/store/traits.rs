use async_trait::async_trait;

use crate::error::Result;

use super::{DeleteRequest, GetOutput, GetRequest, PutRequest, TableSpec, TableStatus, WriteOutput};

/// A backing key-value store.
///
/// Implementations must translate every provider failure into
/// [`crate::DbError`] before returning. A failed condition check reports
/// `condition.violation(entity, id)` of the request's condition.
#[async_trait]
pub trait Store: Send + Sync {
    /// Writes an item, replacing any existing one with the same key.
    async fn put_item(&self, request: PutRequest) -> Result<WriteOutput>;

    /// Reads an item by primary key.
    async fn get_item(&self, request: GetRequest) -> Result<GetOutput>;

    /// Deletes an item by primary key. Deleting an absent key without a
    /// condition succeeds.
    async fn delete_item(&self, request: DeleteRequest) -> Result<WriteOutput>;

    /// Creates a table. Returns `AlreadyExists` if the table is present.
    async fn create_table(&self, spec: &TableSpec) -> Result<()>;

    /// Returns the table status, or `None` if the table does not exist.
    async fn describe_table(&self, table: &str) -> Result<Option<TableStatus>>;

    /// Deletes a table.
    async fn delete_table(&self, table: &str) -> Result<()>;
}
