//! Primary-key derivation.
//!
//! Two schemes are supported:
//!
//! - **Dedicated**: one table per entity type, keyed by the entity's own
//!   attribute names (e.g. `ClusterName` / `DeviceName`).
//! - **Shared**: many entity types in one table, keyed by `PartitionKey` /
//!   `SortKey`. The partition value is the entity prefix followed by the
//!   natural partition value, so types never collide.
//!
//! Key derivation is pure: no I/O, no side effects.

use std::fmt;

use crate::error::{DbError, Result};
use crate::value::{AttrValue, Item};

// ============================================================================
// Constants
// ============================================================================

pub const TABLE_PARTITION_KEY: &str = "PartitionKey";
pub const TABLE_SORT_KEY: &str = "SortKey";

pub const DEVICE_PREFIX: &str = "DeviceKey-";
pub const SERVICE_PREFIX: &str = "ServiceKey-";
pub const CONFIG_PREFIX: &str = "ConfigKey-";

// ============================================================================
// Entity types and natural keys
// ============================================================================

/// Static description of one record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityType {
    /// Human-readable name, used in errors and logs.
    pub name: &'static str,
    /// Partition-key prefix in a shared table.
    pub prefix: &'static str,
    /// Partition attribute in a dedicated table.
    pub partition_attr: &'static str,
    /// Sort attribute in a dedicated table.
    pub sort_attr: &'static str,
}

/// The natural identity of a record: a non-empty partition and sort value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    partition: String,
    sort: String,
}

impl NaturalKey {
    /// Creates a key, rejecting empty components.
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Result<Self> {
        let partition = partition.into();
        let sort = sort.into();
        if partition.is_empty() {
            return Err(DbError::InvalidArgument(
                "partition value must not be empty".to_string(),
            ));
        }
        if sort.is_empty() {
            return Err(DbError::InvalidArgument(
                "sort value must not be empty".to_string(),
            ));
        }
        Ok(Self { partition, sort })
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn sort(&self) -> &str {
        &self.sort
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition, self.sort)
    }
}

/// Generate the partition value for an entity in a shared table.
///
/// Pattern: `<prefix><partition>`, e.g. `DeviceKey-cluster1`
pub fn shared_partition_value(entity: &EntityType, partition: &str) -> String {
    format!("{}{}", entity.prefix, partition)
}

// ============================================================================
// Prefix registry
// ============================================================================

/// The set of entity types allowed in a shared table.
///
/// Construction guarantees every prefix is non-empty and that no prefix
/// equals or starts another one, so a stored partition value maps back to
/// exactly one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRegistry {
    entities: Vec<EntityType>,
}

impl PrefixRegistry {
    pub fn new(entities: impl IntoIterator<Item = EntityType>) -> Result<Self> {
        let mut registered: Vec<EntityType> = Vec::new();

        for entity in entities {
            if entity.prefix.is_empty() {
                return Err(DbError::InvalidArgument(format!(
                    "entity {} has an empty prefix",
                    entity.name
                )));
            }
            for existing in &registered {
                if existing.name == entity.name {
                    return Err(DbError::InvalidArgument(format!(
                        "entity {} registered twice",
                        entity.name
                    )));
                }
                if existing.prefix.starts_with(entity.prefix)
                    || entity.prefix.starts_with(existing.prefix)
                {
                    return Err(DbError::InvalidArgument(format!(
                        "prefix {:?} of {} conflicts with prefix {:?} of {}",
                        entity.prefix, entity.name, existing.prefix, existing.name
                    )));
                }
            }
            registered.push(entity);
        }

        Ok(Self {
            entities: registered,
        })
    }

    pub fn contains(&self, entity: &EntityType) -> bool {
        self.entities.iter().any(|e| e == entity)
    }

    /// Finds the entity whose prefix starts the given partition value.
    pub fn resolve(&self, partition_value: &str) -> Option<&EntityType> {
        self.entities
            .iter()
            .find(|e| partition_value.starts_with(e.prefix))
    }

    pub fn entities(&self) -> &[EntityType] {
        &self.entities
    }
}

// ============================================================================
// Key strategy
// ============================================================================

/// Key attribute names and registered entities of a shared table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedTable {
    pub partition_attr: String,
    pub sort_attr: String,
    registry: PrefixRegistry,
}

impl SharedTable {
    /// A shared table keyed by `PartitionKey` / `SortKey`.
    pub fn new(registry: PrefixRegistry) -> Self {
        Self {
            partition_attr: TABLE_PARTITION_KEY.to_string(),
            sort_attr: TABLE_SORT_KEY.to_string(),
            registry,
        }
    }

    /// Overrides the key attribute names.
    pub fn with_attributes(
        mut self,
        partition_attr: impl Into<String>,
        sort_attr: impl Into<String>,
    ) -> Self {
        self.partition_attr = partition_attr.into();
        self.sort_attr = sort_attr.into();
        self
    }

    pub fn registry(&self) -> &PrefixRegistry {
        &self.registry
    }

    fn ensure_registered(&self, entity: &EntityType) -> Result<()> {
        if self.registry.contains(entity) {
            Ok(())
        } else {
            Err(DbError::InvalidArgument(format!(
                "entity {} is not registered in the shared table",
                entity.name
            )))
        }
    }
}

/// How records map to primary keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStrategy {
    Dedicated,
    Shared(SharedTable),
}

impl KeyStrategy {
    /// Returns the `(partition, sort)` attribute names for an entity.
    pub fn key_attributes<'a>(&'a self, entity: &EntityType) -> (&'a str, &'a str) {
        match self {
            KeyStrategy::Dedicated => (entity.partition_attr, entity.sort_attr),
            KeyStrategy::Shared(table) => (&table.partition_attr, &table.sort_attr),
        }
    }

    /// Builds the primary-key attributes for a natural key.
    pub fn primary_key(&self, entity: &EntityType, key: &NaturalKey) -> Result<Item> {
        let mut item = Item::with_capacity(2);
        match self {
            KeyStrategy::Dedicated => {
                item.insert(
                    entity.partition_attr.to_string(),
                    AttrValue::S(key.partition().to_string()),
                );
                item.insert(
                    entity.sort_attr.to_string(),
                    AttrValue::S(key.sort().to_string()),
                );
            }
            KeyStrategy::Shared(table) => {
                table.ensure_registered(entity)?;
                item.insert(
                    table.partition_attr.clone(),
                    AttrValue::S(shared_partition_value(entity, key.partition())),
                );
                item.insert(
                    table.sort_attr.clone(),
                    AttrValue::S(key.sort().to_string()),
                );
            }
        }
        Ok(item)
    }

    /// Recovers the natural key from a stored item.
    pub fn natural_key(&self, entity: &EntityType, item: &Item) -> Result<NaturalKey> {
        let (partition_attr, sort_attr) = self.key_attributes(entity);
        let partition = key_string(item, partition_attr)?;
        let sort = key_string(item, sort_attr)?;

        let partition = match self {
            KeyStrategy::Dedicated => partition,
            KeyStrategy::Shared(table) => {
                table.ensure_registered(entity)?;
                partition
                    .strip_prefix(entity.prefix)
                    .map(|p| p.to_string())
                    .ok_or_else(|| {
                        DbError::InvalidRecord(format!(
                            "partition value {partition:?} does not belong to {}",
                            entity.name
                        ))
                    })?
            }
        };

        NaturalKey::new(partition, sort).map_err(|e| DbError::InvalidRecord(e.to_string()))
    }
}

fn key_string(item: &Item, attr: &str) -> Result<String> {
    item.get(attr)
        .and_then(|v| v.as_s())
        .map(|s| s.to_string())
        .ok_or_else(|| DbError::InvalidRecord(format!("missing key attribute: {attr}")))
}
