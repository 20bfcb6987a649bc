//! Conditional access layer.
//!
//! [`RecordStore`] turns typed records into conditional single-item requests
//! against a [`Store`]. Creates are guarded by `attribute_not_exists` on the
//! sort attribute, updates and checked deletes by `attribute_exists`, and
//! every read is strongly consistent.

use std::time::Duration;

use crate::condition::Condition;
use crate::error::{DbError, Result};
use crate::key::{KeyStrategy, NaturalKey};
use crate::record::Record;
use crate::store::{DeleteRequest, GetRequest, PutRequest, Store, TableSpec, TableStatus};
use crate::value::Item;

/// How long to wait for a new table to become active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_attempts: 60,
        }
    }
}

/// Record-level access to tables that share one key strategy.
///
/// Holds no locks; clone it freely across tasks when the store is `Clone`.
#[derive(Debug, Clone)]
pub struct RecordStore<S> {
    store: S,
    strategy: KeyStrategy,
    readiness: ReadinessPolicy,
}

impl<S: Store> RecordStore<S> {
    /// Creates a record store over an explicitly constructed backend.
    pub fn new(store: S, strategy: KeyStrategy) -> Self {
        Self {
            store,
            strategy,
            readiness: ReadinessPolicy::default(),
        }
    }

    pub fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn strategy(&self) -> &KeyStrategy {
        &self.strategy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Table schema this store expects for records of type `R`.
    pub fn table_spec<R: Record>(&self, name: impl Into<String>) -> TableSpec {
        TableSpec::for_strategy(name, &self.strategy, &R::ENTITY)
    }

    // ========================================================================
    // Table lifecycle
    // ========================================================================

    /// Creates the table unless it already exists, then waits until it is active.
    pub async fn create_table_if_absent(&self, spec: &TableSpec) -> Result<()> {
        match self.store.create_table(spec).await {
            Ok(()) => tracing::info!(table = %spec.name, "table created"),
            Err(DbError::AlreadyExists { .. }) => {
                tracing::info!(table = %spec.name, "table already exists")
            }
            Err(e) => {
                tracing::error!(table = %spec.name, error = %e, "failed to create table");
                return Err(e);
            }
        }

        self.wait_for_table_active(&spec.name).await
    }

    /// Polls the table status until it is `Active`.
    ///
    /// Polls at least once, even with a zero budget. Fails with `NotFound` as
    /// soon as the table is missing (e.g. it was being deleted), and with
    /// `Timeout` once the readiness budget is spent.
    pub async fn wait_for_table_active(&self, table: &str) -> Result<()> {
        let poll_interval = self.readiness.poll_interval;
        let max_attempts = self.readiness.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.store.describe_table(table).await? {
                Some(TableStatus::Active) => {
                    tracing::debug!(table, attempt, "table is active");
                    return Ok(());
                }
                None => {
                    tracing::warn!(table, attempt, "table disappeared while waiting");
                    return Err(DbError::NotFound {
                        entity: "Table".to_string(),
                        id: table.to_string(),
                    });
                }
                Some(status) => tracing::debug!(table, attempt, ?status, "table not active yet"),
            }
            if attempt < max_attempts {
                tokio::time::sleep(poll_interval).await;
            }
        }

        Err(DbError::Timeout(format!(
            "table {table} not active after {max_attempts} polls"
        )))
    }

    /// Deletes a table. Errors propagate unchanged.
    pub async fn delete_table(&self, table: &str) -> Result<()> {
        self.store
            .delete_table(table)
            .await
            .inspect_err(|e| tracing::error!(table, error = %e, "failed to delete table"))?;

        tracing::info!(table, "table deleted");
        Ok(())
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// Stores a new record. Fails with `AlreadyExists` if its key is taken.
    pub async fn create_record<R: Record>(&self, table: &str, record: &R) -> Result<()> {
        let key = record.natural_key()?;
        let condition = Condition::AttributeNotExists(self.sort_attr::<R>());
        self.put::<R>(table, record, &key, condition).await?;

        tracing::info!(table, entity = R::ENTITY.name, key = %key, "record created");
        Ok(())
    }

    /// Replaces an existing record. Fails with `ConditionFailed` if it is absent.
    pub async fn update_record<R: Record>(&self, table: &str, record: &R) -> Result<()> {
        let key = record.natural_key()?;
        let condition = Condition::AttributeExists(self.sort_attr::<R>());
        self.put::<R>(table, record, &key, condition).await?;

        tracing::info!(table, entity = R::ENTITY.name, key = %key, "record updated");
        Ok(())
    }

    /// Reads a record with a consistent read. Absence is `Ok(None)`.
    pub async fn get_record<R: Record>(&self, table: &str, key: &NaturalKey) -> Result<Option<R>> {
        let request = GetRequest {
            table: table.to_string(),
            key: self.strategy.primary_key(&R::ENTITY, key)?,
            consistent_read: true,
        };

        let output = self.store.get_item(request).await.inspect_err(|e| {
            tracing::warn!(table, entity = R::ENTITY.name, key = %key, error = %e, "get failed")
        })?;
        tracing::debug!(
            table,
            entity = R::ENTITY.name,
            key = %key,
            found = output.item.is_some(),
            consumed_capacity = ?output.consumed_capacity,
            "record read"
        );

        match output.item {
            Some(item) => self.decode::<R>(&item).map(Some),
            None => Ok(None),
        }
    }

    /// Deletes a record.
    ///
    /// With `require_exists` the delete fails with `ConditionFailed` when the
    /// key is absent; without it, deleting an absent key is a no-op.
    pub async fn delete_record<R: Record>(
        &self,
        table: &str,
        key: &NaturalKey,
        require_exists: bool,
    ) -> Result<()> {
        let request = DeleteRequest {
            table: table.to_string(),
            key: self.strategy.primary_key(&R::ENTITY, key)?,
            condition: require_exists.then(|| Condition::AttributeExists(self.sort_attr::<R>())),
            entity: R::ENTITY.name,
            id: key.to_string(),
        };

        let output = self.store.delete_item(request).await.inspect_err(|e| {
            tracing::warn!(
                table,
                entity = R::ENTITY.name,
                key = %key,
                require_exists,
                error = %e,
                "delete failed"
            )
        })?;

        tracing::info!(
            table,
            entity = R::ENTITY.name,
            key = %key,
            require_exists,
            consumed_capacity = ?output.consumed_capacity,
            "record deleted"
        );
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn sort_attr<R: Record>(&self) -> String {
        self.strategy.key_attributes(&R::ENTITY).1.to_string()
    }

    /// Payload attributes plus primary key. Key attributes win on a clash.
    fn encode<R: Record>(&self, record: &R, key: &NaturalKey) -> Result<Item> {
        let mut item = record.to_attributes();
        item.extend(self.strategy.primary_key(&R::ENTITY, key)?);
        Ok(item)
    }

    fn decode<R: Record>(&self, item: &Item) -> Result<R> {
        let key = self.strategy.natural_key(&R::ENTITY, item)?;
        R::from_attributes(key, item)
    }

    async fn put<R: Record>(
        &self,
        table: &str,
        record: &R,
        key: &NaturalKey,
        condition: Condition,
    ) -> Result<()> {
        let request = PutRequest {
            table: table.to_string(),
            item: self.encode(record, key)?,
            condition: Some(condition),
            entity: R::ENTITY.name,
            id: key.to_string(),
        };

        let output = self.store.put_item(request).await.inspect_err(|e| {
            tracing::warn!(table, entity = R::ENTITY.name, key = %key, error = %e, "put failed")
        })?;
        tracing::debug!(
            table,
            key = %key,
            consumed_capacity = ?output.consumed_capacity,
            "put succeeded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::key::{PrefixRegistry, SharedTable};
    use crate::record::{ConfigFile, Device, Service};
    use crate::store::MemoryStore;
    use crate::value::AttrValue;

    const DEVICE_TABLE: &str = "test-table";
    const SHARED_TABLE: &str = "test-table2";

    fn fast() -> ReadinessPolicy {
        ReadinessPolicy {
            poll_interval: Duration::from_millis(1),
            max_attempts: 5,
        }
    }

    async fn dedicated() -> RecordStore<MemoryStore> {
        let records = RecordStore::new(MemoryStore::new(), KeyStrategy::Dedicated);
        let spec = records.table_spec::<Device>(DEVICE_TABLE);
        records.create_table_if_absent(&spec).await.unwrap();
        records
    }

    async fn shared() -> RecordStore<MemoryStore> {
        let registry =
            PrefixRegistry::new([Device::ENTITY, Service::ENTITY, ConfigFile::ENTITY]).unwrap();
        let records = RecordStore::new(
            MemoryStore::new(),
            KeyStrategy::Shared(SharedTable::new(registry)),
        );
        let spec = records.table_spec::<Device>(SHARED_TABLE);
        records.create_table_if_absent(&spec).await.unwrap();
        records
    }

    fn device_key() -> NaturalKey {
        NaturalKey::new("cluster1", "device1").unwrap()
    }

    // ==================== Table lifecycle ====================

    #[tokio::test]
    async fn test_create_table_is_idempotent() {
        let records = dedicated().await;
        let spec = records.table_spec::<Device>(DEVICE_TABLE);

        records.create_table_if_absent(&spec).await.unwrap();
        records.create_table_if_absent(&spec).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_table_waits_until_active() {
        let store = MemoryStore::new().with_activation_polls(3);
        let records = RecordStore::new(store, KeyStrategy::Dedicated).with_readiness(fast());
        let spec = records.table_spec::<Device>(DEVICE_TABLE);

        records.create_table_if_absent(&spec).await.unwrap();

        let device = Device::new("cluster1", "device1", "service1");
        records.create_record(DEVICE_TABLE, &device).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_table_times_out() {
        let store = MemoryStore::new().with_activation_polls(u32::MAX);
        let records = RecordStore::new(store, KeyStrategy::Dedicated).with_readiness(fast());
        let spec = records.table_spec::<Device>(DEVICE_TABLE);

        let result = records.create_table_if_absent(&spec).await;
        assert!(matches!(result, Err(DbError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_zero_poll_budget_still_checks_once() {
        let readiness = ReadinessPolicy {
            poll_interval: Duration::from_millis(1),
            max_attempts: 0,
        };
        let records =
            RecordStore::new(MemoryStore::new(), KeyStrategy::Dedicated).with_readiness(readiness);
        let spec = records.table_spec::<Device>(DEVICE_TABLE);

        records.create_table_if_absent(&spec).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_missing_table_fails_fast() {
        let readiness = ReadinessPolicy {
            poll_interval: Duration::from_secs(60),
            max_attempts: 60,
        };
        let store = MemoryStore::new();
        let records = RecordStore::new(store, KeyStrategy::Dedicated).with_readiness(readiness);

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            records.wait_for_table_active("vanished"),
        )
        .await
        .unwrap();
        assert!(matches!(result, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_create_table_propagates_other_errors() {
        let store = MemoryStore::new();
        store
            .fail_next(DbError::Unavailable("connection reset".to_string()))
            .await;
        let records = RecordStore::new(store, KeyStrategy::Dedicated);
        let spec = records.table_spec::<Device>(DEVICE_TABLE);

        let result = records.create_table_if_absent(&spec).await;
        assert!(matches!(result, Err(DbError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_delete_table() {
        let records = dedicated().await;
        records.delete_table(DEVICE_TABLE).await.unwrap();

        let result = records.delete_table(DEVICE_TABLE).await;
        assert!(matches!(result, Err(DbError::NotFound { .. })));
    }

    // ==================== Dedicated scheme ====================

    #[tokio::test]
    async fn test_device_scenario() {
        let records = dedicated().await;
        let device = Device::new("cluster1", "device1", "service1");

        records.create_record(DEVICE_TABLE, &device).await.unwrap();

        let fetched: Device = records
            .get_record(DEVICE_TABLE, &device_key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.service_name, "service1");
        assert_eq!(fetched, device);

        records
            .delete_record::<Device>(DEVICE_TABLE, &device_key(), false)
            .await
            .unwrap();

        let result = records
            .delete_record::<Device>(DEVICE_TABLE, &device_key(), true)
            .await;
        assert!(matches!(result, Err(DbError::ConditionFailed { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let records = dedicated().await;
        let device = Device::new("cluster1", "device1", "service1");

        records.create_record(DEVICE_TABLE, &device).await.unwrap();

        let result = records.create_record(DEVICE_TABLE, &device).await;
        assert!(matches!(result, Err(DbError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_create_keeps_original() {
        let records = dedicated().await;
        let first = Device::new("cluster1", "device1", "service1");
        let second = Device::new("cluster1", "device1", "service2");

        records.create_record(DEVICE_TABLE, &first).await.unwrap();
        let _ = records.create_record(DEVICE_TABLE, &second).await;

        let fetched: Option<Device> = records
            .get_record(DEVICE_TABLE, &device_key())
            .await
            .unwrap();
        assert_eq!(fetched, Some(first));
    }

    #[tokio::test]
    async fn test_get_absent_is_none() {
        let records = dedicated().await;
        let fetched: Option<Device> = records
            .get_record(DEVICE_TABLE, &device_key())
            .await
            .unwrap();
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn test_delete_absent() {
        let records = dedicated().await;

        records
            .delete_record::<Device>(DEVICE_TABLE, &device_key(), false)
            .await
            .unwrap();

        let result = records
            .delete_record::<Device>(DEVICE_TABLE, &device_key(), true)
            .await;
        assert!(matches!(result, Err(DbError::ConditionFailed { .. })));
    }

    #[tokio::test]
    async fn test_delete_present_with_require_exists() {
        let records = dedicated().await;
        let device = Device::new("cluster1", "device1", "service1");
        records.create_record(DEVICE_TABLE, &device).await.unwrap();

        records
            .delete_record::<Device>(DEVICE_TABLE, &device_key(), true)
            .await
            .unwrap();

        let fetched: Option<Device> = records
            .get_record(DEVICE_TABLE, &device_key())
            .await
            .unwrap();
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn test_create_after_delete() {
        let records = dedicated().await;
        let device = Device::new("cluster1", "device1", "service1");

        records.create_record(DEVICE_TABLE, &device).await.unwrap();
        records
            .delete_record::<Device>(DEVICE_TABLE, &device_key(), true)
            .await
            .unwrap();
        records.create_record(DEVICE_TABLE, &device).await.unwrap();
    }

    #[tokio::test]
    async fn test_update() {
        let records = dedicated().await;
        let device = Device::new("cluster1", "device1", "service1");

        let result = records.update_record(DEVICE_TABLE, &device).await;
        assert!(matches!(result, Err(DbError::ConditionFailed { .. })));

        records.create_record(DEVICE_TABLE, &device).await.unwrap();

        let moved = Device::new("cluster1", "device1", "service2");
        records.update_record(DEVICE_TABLE, &moved).await.unwrap();

        let fetched: Device = records
            .get_record(DEVICE_TABLE, &device_key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.service_name, "service2");
    }

    #[tokio::test]
    async fn test_empty_key_rejected_before_store() {
        let records = dedicated().await;
        let device = Device::new("", "device1", "service1");

        let result = records.create_record(DEVICE_TABLE, &device).await;
        assert!(matches!(result, Err(DbError::InvalidArgument(_))));
        assert_eq!(records.store().item_count(DEVICE_TABLE).await, 0);
    }

    #[tokio::test]
    async fn test_missing_table_is_not_found() {
        let records = RecordStore::new(MemoryStore::new(), KeyStrategy::Dedicated);
        let device = Device::new("cluster1", "device1", "service1");

        let result = records.create_record("missing", &device).await;
        assert!(matches!(result, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_store_errors_are_returned() {
        let records = dedicated().await;
        records
            .store()
            .fail_next(DbError::Throttled("rate exceeded".to_string()))
            .await;

        let result: Result<Option<Device>> = records.get_record(DEVICE_TABLE, &device_key()).await;
        let err = result.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_stored_item_shape() {
        let records = dedicated().await;
        let device = Device::new("cluster1", "device1", "service1");
        records.create_record(DEVICE_TABLE, &device).await.unwrap();

        let output = records
            .store()
            .get_item(GetRequest {
                table: DEVICE_TABLE.to_string(),
                key: KeyStrategy::Dedicated
                    .primary_key(&Device::ENTITY, &device_key())
                    .unwrap(),
                consistent_read: true,
            })
            .await
            .unwrap();

        let item = output.item.unwrap();
        assert_eq!(item.len(), 3);
        assert_eq!(item["ClusterName"], AttrValue::S("cluster1".into()));
        assert_eq!(item["DeviceName"], AttrValue::S("device1".into()));
        assert_eq!(item["ServiceName"], AttrValue::S("service1".into()));
    }

    // ==================== Shared scheme ====================

    #[tokio::test]
    async fn test_shared_device_scenario() {
        let records = shared().await;
        let device = Device::new("cluster1", "device1", "service1");

        records.create_record(SHARED_TABLE, &device).await.unwrap();

        let fetched: Option<Device> = records
            .get_record(SHARED_TABLE, &device_key())
            .await
            .unwrap();
        assert_eq!(fetched, Some(device));

        records
            .delete_record::<Device>(SHARED_TABLE, &device_key(), false)
            .await
            .unwrap();
        let result = records
            .delete_record::<Device>(SHARED_TABLE, &device_key(), true)
            .await;
        assert!(matches!(result, Err(DbError::ConditionFailed { .. })));
    }

    #[tokio::test]
    async fn test_shared_prefix_isolation() {
        let records = shared().await;
        let device = Device::new("cluster1", "same", "service1");
        let service = Service::new("cluster1", "same");
        let key = NaturalKey::new("cluster1", "same").unwrap();

        records.create_record(SHARED_TABLE, &device).await.unwrap();
        records.create_record(SHARED_TABLE, &service).await.unwrap();
        assert_eq!(records.store().item_count(SHARED_TABLE).await, 2);

        let fetched_device: Option<Device> = records.get_record(SHARED_TABLE, &key).await.unwrap();
        let fetched_service: Option<Service> =
            records.get_record(SHARED_TABLE, &key).await.unwrap();
        assert_eq!(fetched_device, Some(device));
        assert_eq!(fetched_service, Some(service));

        records
            .delete_record::<Device>(SHARED_TABLE, &key, true)
            .await
            .unwrap();
        let still_there: Option<Service> = records.get_record(SHARED_TABLE, &key).await.unwrap();
        assert!(still_there.is_some());
    }

    #[tokio::test]
    async fn test_shared_config_file_round_trip() {
        let records = shared().await;
        let service_uuid = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440001").unwrap();
        let file = ConfigFile::new(service_uuid, "redis.conf-1", "redis.conf", "maxmemory 256mb")
            .with_version(1)
            .with_attr("Shards", AttrValue::number(3));

        records.create_record(SHARED_TABLE, &file).await.unwrap();

        let key = NaturalKey::new(service_uuid.to_string(), "redis.conf-1").unwrap();
        let fetched: Option<ConfigFile> = records.get_record(SHARED_TABLE, &key).await.unwrap();
        assert_eq!(fetched, Some(file));
    }

    #[tokio::test]
    async fn test_config_file_with_malformed_attrs_is_invalid() {
        let records = shared().await;
        let service_uuid = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440001").unwrap();
        let key = NaturalKey::new(service_uuid.to_string(), "redis.conf-1").unwrap();

        let mut item = records
            .strategy()
            .primary_key(&ConfigFile::ENTITY, &key)
            .unwrap();
        item.insert("FileName".to_string(), AttrValue::from("redis.conf"));
        item.insert("Version".to_string(), AttrValue::number(1));
        item.insert("Content".to_string(), AttrValue::from("maxmemory 256mb"));
        item.insert("Attrs".to_string(), AttrValue::from("not-a-map"));
        records
            .store()
            .put_item(PutRequest {
                table: SHARED_TABLE.to_string(),
                item,
                condition: None,
                entity: ConfigFile::ENTITY.name,
                id: key.to_string(),
            })
            .await
            .unwrap();

        let result: Result<Option<ConfigFile>> = records.get_record(SHARED_TABLE, &key).await;
        assert!(matches!(result, Err(DbError::InvalidRecord(_))));
    }

    #[tokio::test]
    async fn test_unregistered_entity_rejected() {
        let registry = PrefixRegistry::new([Device::ENTITY]).unwrap();
        let records = RecordStore::new(
            MemoryStore::new(),
            KeyStrategy::Shared(SharedTable::new(registry)),
        );
        let spec = records.table_spec::<Device>(SHARED_TABLE);
        records.create_table_if_absent(&spec).await.unwrap();

        let result = records
            .create_record(SHARED_TABLE, &Service::new("cluster1", "svc"))
            .await;
        assert!(matches!(result, Err(DbError::InvalidArgument(_))));
    }

    // ==================== Concurrency ====================

    #[tokio::test]
    async fn test_racing_creates_have_one_winner() {
        let records = Arc::new(dedicated().await);

        let mut handles = Vec::new();
        for i in 0..16 {
            let records = Arc::clone(&records);
            handles.push(tokio::spawn(async move {
                let device = Device::new("cluster1", "device1", format!("service{i}"));
                records.create_record(DEVICE_TABLE, &device).await
            }));
        }

        let mut created = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => created += 1,
                Err(DbError::AlreadyExists { .. }) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(rejected, 15);
    }
}
