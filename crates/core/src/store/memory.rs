//! In-memory store implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::error::{DbError, Result};
use crate::value::Item;

use super::{
    DeleteRequest, GetOutput, GetRequest, PutRequest, Store, TableSpec, TableStatus, WriteOutput,
};

/// In-memory backing store for tests and offline runs.
///
/// Follows the same conditional-write contract as a real backend. Every
/// operation takes the table lock for its full duration, so single-item
/// writes are atomic and racing creates on one key have exactly one winner.
/// Data is not persisted and is lost when the last clone is dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, MemoryTable>>>,
    injected: Arc<Mutex<VecDeque<DbError>>>,
    activation_polls: u32,
}

#[derive(Debug)]
struct MemoryTable {
    spec: TableSpec,
    status: TableStatus,
    polls_until_active: u32,
    items: HashMap<(String, String), Item>,
}

impl MemoryStore {
    /// Creates a new empty store. Tables become active immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// New tables report `Creating` for this many `describe_table` calls
    /// before turning `Active`. `u32::MAX` keeps them creating forever.
    pub fn with_activation_polls(mut self, polls: u32) -> Self {
        self.activation_polls = polls;
        self
    }

    /// Makes the next operation fail with `error` instead of running.
    pub async fn fail_next(&self, error: DbError) {
        self.injected.lock().await.push_back(error);
    }

    /// Number of items currently stored in a table.
    pub async fn item_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .await
            .get(table)
            .map(|t| t.items.len())
            .unwrap_or(0)
    }

    async fn take_injected(&self) -> Result<()> {
        match self.injected.lock().await.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl MemoryTable {
    fn key_of(&self, item: &Item) -> Result<(String, String)> {
        let part = |attr: &str| {
            item.get(attr)
                .and_then(|v| v.as_s())
                .map(|s| s.to_string())
                .ok_or_else(|| DbError::Internal {
                    code: "ValidationException".to_string(),
                    message: format!(
                        "The provided key element does not match the schema: missing {attr}"
                    ),
                })
        };
        Ok((
            part(self.spec.partition_attr.as_str())?,
            part(self.spec.sort_attr.as_str())?,
        ))
    }
}

fn usable_table<'a>(
    tables: &'a mut HashMap<String, MemoryTable>,
    name: &str,
) -> Result<&'a mut MemoryTable> {
    match tables.get_mut(name) {
        Some(table) if table.status == TableStatus::Active => Ok(table),
        _ => Err(DbError::NotFound {
            entity: "Table".to_string(),
            id: name.to_string(),
        }),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put_item(&self, request: PutRequest) -> Result<WriteOutput> {
        self.take_injected().await?;

        let mut tables = self.tables.write().await;
        let table = usable_table(&mut tables, &request.table)?;
        let key = table.key_of(&request.item)?;

        if let Some(condition) = &request.condition {
            if !condition.holds(table.items.get(&key)) {
                return Err(condition.violation(request.entity, &request.id));
            }
        }

        table.items.insert(key, request.item);
        Ok(WriteOutput {
            consumed_capacity: Some(1.0),
        })
    }

    async fn get_item(&self, request: GetRequest) -> Result<GetOutput> {
        self.take_injected().await?;

        let mut tables = self.tables.write().await;
        let table = usable_table(&mut tables, &request.table)?;
        let key = table.key_of(&request.key)?;

        Ok(GetOutput {
            item: table.items.get(&key).cloned(),
            consumed_capacity: Some(if request.consistent_read { 1.0 } else { 0.5 }),
        })
    }

    async fn delete_item(&self, request: DeleteRequest) -> Result<WriteOutput> {
        self.take_injected().await?;

        let mut tables = self.tables.write().await;
        let table = usable_table(&mut tables, &request.table)?;
        let key = table.key_of(&request.key)?;

        if let Some(condition) = &request.condition {
            if !condition.holds(table.items.get(&key)) {
                return Err(condition.violation(request.entity, &request.id));
            }
        }

        table.items.remove(&key);
        Ok(WriteOutput {
            consumed_capacity: Some(1.0),
        })
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<()> {
        self.take_injected().await?;

        let mut tables = self.tables.write().await;
        if tables.contains_key(&spec.name) {
            return Err(DbError::AlreadyExists {
                entity: "Table".to_string(),
                id: spec.name.clone(),
            });
        }

        let status = if self.activation_polls == 0 {
            TableStatus::Active
        } else {
            TableStatus::Creating
        };
        tables.insert(
            spec.name.clone(),
            MemoryTable {
                spec: spec.clone(),
                status,
                polls_until_active: self.activation_polls,
                items: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn describe_table(&self, table: &str) -> Result<Option<TableStatus>> {
        self.take_injected().await?;

        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(table) else {
            return Ok(None);
        };

        let status = table.status;
        if status == TableStatus::Creating && table.polls_until_active != u32::MAX {
            table.polls_until_active = table.polls_until_active.saturating_sub(1);
            if table.polls_until_active == 0 {
                table.status = TableStatus::Active;
            }
        }
        Ok(Some(status))
    }

    async fn delete_table(&self, table: &str) -> Result<()> {
        self.take_injected().await?;

        let mut tables = self.tables.write().await;
        if tables.remove(table).is_none() {
            return Err(DbError::NotFound {
                entity: "Table".to_string(),
                id: table.to_string(),
            });
        }
        Ok(())
    }
}
