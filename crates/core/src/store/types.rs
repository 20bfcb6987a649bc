use crate::condition::Condition;
use crate::key::{EntityType, KeyStrategy};
use crate::value::Item;

/// Capacity configuration for a new table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throughput {
    Provisioned { read: i64, write: i64 },
    OnDemand,
}

impl Default for Throughput {
    fn default() -> Self {
        Throughput::Provisioned { read: 1, write: 1 }
    }
}

/// Schema of a table: a string partition attribute and a string sort attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub partition_attr: String,
    pub sort_attr: String,
    pub throughput: Throughput,
}

impl TableSpec {
    pub fn new(
        name: impl Into<String>,
        partition_attr: impl Into<String>,
        sort_attr: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            partition_attr: partition_attr.into(),
            sort_attr: sort_attr.into(),
            throughput: Throughput::default(),
        }
    }

    /// Derives the key attributes from a key strategy.
    ///
    /// For a shared table the entity only selects the strategy's attribute
    /// names, which are the same for every registered entity.
    pub fn for_strategy(
        name: impl Into<String>,
        strategy: &KeyStrategy,
        entity: &EntityType,
    ) -> Self {
        let (partition_attr, sort_attr) = strategy.key_attributes(entity);
        Self::new(name, partition_attr, sort_attr)
    }

    pub fn with_throughput(mut self, throughput: Throughput) -> Self {
        self.throughput = throughput;
        self
    }
}

/// Lifecycle state of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Creating,
    Active,
    Updating,
    Deleting,
}

/// A single-item write.
#[derive(Debug, Clone, PartialEq)]
pub struct PutRequest {
    pub table: String,
    pub item: Item,
    pub condition: Option<Condition>,
    /// Entity name and key, used to describe condition violations.
    pub entity: &'static str,
    pub id: String,
}

/// A single-item read.
#[derive(Debug, Clone, PartialEq)]
pub struct GetRequest {
    pub table: String,
    pub key: Item,
    pub consistent_read: bool,
}

/// A single-item delete.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    pub table: String,
    pub key: Item,
    pub condition: Option<Condition>,
    pub entity: &'static str,
    pub id: String,
}

/// Result of a successful write.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WriteOutput {
    /// Capacity units consumed, when the backend reports them.
    pub consumed_capacity: Option<f64>,
}

/// Result of a successful read. `item` is `None` when the key is absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetOutput {
    pub item: Option<Item>,
    pub consumed_capacity: Option<f64>,
}
