//! CRUD exercise against a dedicated device table and a shared table.
//!
//! Every step is recorded with its expected outcome. A step that does not
//! match is logged and the exercise carries on; table creation and deletion
//! failures abort it.

use clusterdb_core::{
    AttrValue, ConfigFile, Device, KeyStrategy, Record, RecordStore, Result, Service, Store,
    TableSpec,
};
use serde::Serialize;

use crate::config::Config;

const CLUSTER: &str = "cluster1";
const DEVICE: &str = "device1";
const SERVICE: &str = "service1";

/// Errors the exercise reports once it has finished.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("{count} demo step(s) did not match the expected outcome")]
    Mismatch { count: usize },
}

/// What a step actually did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Done,
    Found { record: serde_json::Value },
    Absent,
    Failed { kind: &'static str, error: String },
}

impl Outcome {
    /// Comparable label: `Done`, `Found`, `Absent`, or the error kind.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Done => "Done",
            Outcome::Found { .. } => "Found",
            Outcome::Absent => "Absent",
            Outcome::Failed { kind, .. } => *kind,
        }
    }
}

/// One recorded step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub table: String,
    pub action: String,
    pub expected: &'static str,
    pub matched: bool,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// All steps of a run, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DemoReport {
    pub steps: Vec<Step>,
}

impl DemoReport {
    pub fn mismatches(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| !s.matched)
    }

    /// Fails with [`ScenarioError::Mismatch`] if any step went unexpectedly.
    pub fn ensure_success(&self) -> std::result::Result<(), ScenarioError> {
        match self.mismatches().count() {
            0 => Ok(()),
            count => Err(ScenarioError::Mismatch { count }),
        }
    }

    fn write_step(
        &mut self,
        table: &str,
        action: &str,
        result: Result<()>,
        expected: &'static str,
    ) {
        let outcome = match result {
            Ok(()) => Outcome::Done,
            Err(e) => Outcome::Failed {
                kind: e.kind(),
                error: e.to_string(),
            },
        };
        let matched = outcome.label() == expected;
        self.push(table, action, expected, matched, outcome);
    }

    fn read_step<R>(
        &mut self,
        table: &str,
        action: &str,
        result: Result<Option<R>>,
        expected: Option<&R>,
    ) where
        R: Serialize + PartialEq,
    {
        let matched = match (&result, expected) {
            (Ok(Some(found)), Some(wanted)) => found == wanted,
            (Ok(None), None) => true,
            _ => false,
        };
        let outcome = match result {
            Ok(Some(record)) => Outcome::Found {
                record: serde_json::to_value(&record).unwrap_or_default(),
            },
            Ok(None) => Outcome::Absent,
            Err(e) => Outcome::Failed {
                kind: e.kind(),
                error: e.to_string(),
            },
        };
        let expected = if expected.is_some() { "Found" } else { "Absent" };
        self.push(table, action, expected, matched, outcome);
    }

    fn push(
        &mut self,
        table: &str,
        action: &str,
        expected: &'static str,
        matched: bool,
        outcome: Outcome,
    ) {
        if matched {
            tracing::info!(table, action, outcome = outcome.label(), "step");
        } else {
            tracing::error!(
                table,
                action,
                expected,
                outcome = outcome.label(),
                "step did not match the expected outcome"
            );
        }
        self.steps.push(Step {
            table: table.to_string(),
            action: action.to_string(),
            expected,
            matched,
            outcome,
        });
    }
}

/// Runs the exercise on the dedicated device table, then on the shared table.
///
/// Each table is created first and deleted at the end of its part.
pub async fn run<S: Store + Clone>(store: S, config: &Config) -> anyhow::Result<DemoReport> {
    let mut report = DemoReport::default();
    let device = Device::new(CLUSTER, DEVICE, SERVICE);

    let dedicated = RecordStore::new(store.clone(), KeyStrategy::Dedicated)
        .with_readiness(config.readiness());
    let spec = dedicated
        .table_spec::<Device>(&config.device_table)
        .with_throughput(config.throughput());
    with_table(&dedicated, &spec, async {
        exercise_device(&dedicated, &spec.name, &device, &mut report).await;
    })
    .await?;

    let shared =
        RecordStore::new(store, config.shared_strategy()?).with_readiness(config.readiness());
    let spec = shared
        .table_spec::<Device>(&config.shared_table)
        .with_throughput(config.throughput());
    with_table(&shared, &spec, async {
        exercise_device(&shared, &spec.name, &device, &mut report).await;
        exercise_isolation(&shared, &spec.name, &device, &mut report).await;
        exercise_config_file(&shared, &spec.name, &mut report).await;
    })
    .await?;

    Ok(report)
}

async fn with_table<S, F>(records: &RecordStore<S>, spec: &TableSpec, body: F) -> Result<()>
where
    S: Store,
    F: std::future::Future<Output = ()>,
{
    records.create_table_if_absent(spec).await?;
    body.await;
    records.delete_table(&spec.name).await
}

/// Create, duplicate create, read, update, unconditional and conditional deletes.
async fn exercise_device<S: Store>(
    records: &RecordStore<S>,
    table: &str,
    device: &Device,
    report: &mut DemoReport,
) {
    let key = match device.natural_key() {
        Ok(key) => key,
        Err(e) => return report.write_step(table, "build device key", Err(e), "Done"),
    };

    let result = records.create_record(table, device).await;
    report.write_step(table, "create device", result, "Done");

    let result = records.create_record(table, device).await;
    report.write_step(table, "create device again", result, "AlreadyExists");

    let result = records.get_record::<Device>(table, &key).await;
    report.read_step(table, "get device", result, Some(device));

    let moved = Device {
        service_name: format!("{}-moved", device.service_name),
        ..device.clone()
    };
    let result = records.update_record(table, &moved).await;
    report.write_step(table, "update device", result, "Done");

    let result = records.get_record::<Device>(table, &key).await;
    report.read_step(table, "get updated device", result, Some(&moved));

    let result = records.delete_record::<Device>(table, &key, false).await;
    report.write_step(table, "delete device", result, "Done");

    let result = records.delete_record::<Device>(table, &key, true).await;
    report.write_step(table, "delete device if exists", result, "ConditionFailed");

    let result = records.get_record::<Device>(table, &key).await;
    report.read_step(table, "get deleted device", result, None);

    let result = records.update_record(table, device).await;
    report.write_step(table, "update deleted device", result, "ConditionFailed");
}

/// A service sharing the device's natural key lives beside it untouched.
async fn exercise_isolation<S: Store>(
    records: &RecordStore<S>,
    table: &str,
    device: &Device,
    report: &mut DemoReport,
) {
    let service = Service::new(&device.cluster_name, &device.device_name);
    let (device_key, service_key) = match (device.natural_key(), service.natural_key()) {
        (Ok(d), Ok(s)) => (d, s),
        (Err(e), _) | (_, Err(e)) => {
            return report.write_step(table, "build isolation keys", Err(e), "Done")
        }
    };

    let result = records.create_record(table, &service).await;
    report.write_step(table, "create service with device key", result, "Done");

    let result = records.create_record(table, device).await;
    report.write_step(table, "create device beside service", result, "Done");

    let result = records.delete_record::<Device>(table, &device_key, true).await;
    report.write_step(table, "delete device if exists", result, "Done");

    let result = records.get_record::<Service>(table, &service_key).await;
    report.read_step(table, "get service after device delete", result, Some(&service));

    let result = records.delete_record::<Service>(table, &service_key, true).await;
    report.write_step(table, "delete service if exists", result, "Done");
}

/// Versioned config file: create, read, bump version, delete.
async fn exercise_config_file<S: Store>(
    records: &RecordStore<S>,
    table: &str,
    report: &mut DemoReport,
) {
    let owner = Service::new(CLUSTER, SERVICE);
    let file = ConfigFile::new(owner.service_uuid, "file1", "service1.conf", "replicas=3")
        .with_version(1)
        .with_attr("Mode", AttrValue::from("0644"));
    let key = match file.natural_key() {
        Ok(key) => key,
        Err(e) => return report.write_step(table, "build config file key", Err(e), "Done"),
    };

    let result = records.create_record(table, &file).await;
    report.write_step(table, "create config file", result, "Done");

    let result = records.get_record::<ConfigFile>(table, &key).await;
    report.read_step(table, "get config file", result, Some(&file));

    let bumped = ConfigFile {
        version: file.version + 1,
        content: "replicas=5".to_string(),
        ..file.clone()
    };
    let result = records.update_record(table, &bumped).await;
    report.write_step(table, "update config file", result, "Done");

    let result = records.get_record::<ConfigFile>(table, &key).await;
    report.read_step(table, "get updated config file", result, Some(&bumped));

    let result = records.delete_record::<ConfigFile>(table, &key, true).await;
    report.write_step(table, "delete config file if exists", result, "Done");
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use clusterdb_core::{DbError, MemoryStore};

    use super::*;

    fn fast_config() -> Config {
        let vars = HashMap::from([
            ("CLUSTERDB_POLL_INTERVAL_SECS".to_string(), "0".to_string()),
            ("CLUSTERDB_POLL_MAX_ATTEMPTS".to_string(), "5".to_string()),
        ]);
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[tokio::test]
    async fn test_demo_matches_every_step() {
        let store = MemoryStore::new().with_activation_polls(2);
        let config = fast_config();

        let report = run(store.clone(), &config).await.unwrap();

        assert!(
            report.ensure_success().is_ok(),
            "{:#?}",
            report.mismatches().collect::<Vec<_>>()
        );
        assert!(report.steps.iter().any(|s| s.table == "test-table"));
        assert!(report.steps.iter().any(|s| s.table == "test-table2"));

        // Both tables are gone afterwards.
        assert_eq!(store.describe_table("test-table").await.unwrap(), None);
        assert_eq!(store.describe_table("test-table2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_create_reports_already_exists() {
        let report = run(MemoryStore::new(), &fast_config()).await.unwrap();

        let duplicate = report
            .steps
            .iter()
            .find(|s| s.action == "create device again")
            .unwrap();
        assert_eq!(duplicate.outcome.label(), "AlreadyExists");
        assert!(duplicate.matched);
    }

    #[tokio::test]
    async fn test_table_creation_failure_aborts() {
        let store = MemoryStore::new();
        store
            .fail_next(DbError::Unavailable("service unavailable".to_string()))
            .await;

        let result = run(store, &fast_config()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_table_never_active_times_out() {
        let store = MemoryStore::new().with_activation_polls(u32::MAX);

        let err = run(store, &fast_config()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::Timeout(_))
        ));
    }

    #[test]
    fn test_mismatch_is_reported() {
        let mut report = DemoReport::default();
        report.write_step("t", "create device", Ok(()), "Done");
        report.write_step("t", "create device again", Ok(()), "AlreadyExists");

        assert_eq!(report.mismatches().count(), 1);
        assert!(matches!(
            report.ensure_success(),
            Err(ScenarioError::Mismatch { count: 1 })
        ));
    }

    #[test]
    fn test_step_serializes_flat() {
        let mut report = DemoReport::default();
        report.read_step::<Device>("t", "get device", Ok(None), None);

        let json = serde_json::to_value(&report.steps[0]).unwrap();
        assert_eq!(json["status"], "absent");
        assert_eq!(json["expected"], "Absent");
        assert_eq!(json["matched"], true);
    }
}
