//! DynamoDB store implementation.
//!
//! Implements [`Store`] from `clusterdb_core` on top of `aws-sdk-dynamodb`.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
    ProvisionedThroughput, ReturnConsumedCapacity, ScalarAttributeType,
    TableStatus as SdkTableStatus,
};
use aws_sdk_dynamodb::Client;

use clusterdb_core::store::{DeleteRequest, GetOutput, GetRequest, PutRequest, WriteOutput};
use clusterdb_core::{
    Condition, DbError, Result, RetryPolicy, Store, TableSpec, TableStatus, Throughput,
};

use super::client::{create_client, AwsConfig};
use super::conversions::{from_item, to_item};
use super::error::{map_build_error, map_sdk_error, Context};

/// DynamoDB-backed [`Store`].
///
/// Unconditional requests are retried on throttling and transient failures.
/// Conditional writes run once: a retried write whose first attempt landed
/// would report a spurious condition failure.
#[derive(Debug, Clone)]
pub struct DynamoDbStore {
    client: Client,
    retry: RetryPolicy,
}

impl DynamoDbStore {
    /// Creates a store from an explicitly constructed client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    /// Creates a store with a client built from `config`.
    pub async fn from_config(config: &AwsConfig) -> Self {
        Self::new(create_client(config).await)
    }

    fn policy_for(&self, condition: Option<&Condition>) -> RetryPolicy {
        match condition {
            Some(_) => RetryPolicy::none(),
            None => self.retry,
        }
    }
}

fn capacity_units(consumed: Option<&aws_sdk_dynamodb::types::ConsumedCapacity>) -> Option<f64> {
    consumed.and_then(|c| c.capacity_units())
}

fn condition_parts(
    condition: Option<&Condition>,
) -> (Option<String>, Option<HashMap<String, String>>) {
    match condition {
        Some(c) => (Some(c.expression()), Some(c.attribute_names())),
        None => (None, None),
    }
}

fn status_from_sdk(status: Option<&SdkTableStatus>) -> TableStatus {
    match status {
        Some(SdkTableStatus::Active) => TableStatus::Active,
        Some(SdkTableStatus::Creating) => TableStatus::Creating,
        Some(SdkTableStatus::Deleting) => TableStatus::Deleting,
        // Updating, archival states and unknown values are all "not usable yet".
        _ => TableStatus::Updating,
    }
}

#[async_trait]
impl Store for DynamoDbStore {
    async fn put_item(&self, request: PutRequest) -> Result<WriteOutput> {
        let client = &self.client;
        let item = to_item(&request.item);
        let (expression, names) = condition_parts(request.condition.as_ref());
        let context = Context::Item {
            table: &request.table,
            entity: request.entity,
            id: &request.id,
            condition: request.condition.as_ref(),
        };
        let (table, item, expression, names) = (&request.table, &item, &expression, &names);

        let output = self
            .policy_for(request.condition.as_ref())
            .run(move || async move {
                client
                    .put_item()
                    .table_name(table)
                    .set_item(Some(item.clone()))
                    .set_condition_expression(expression.clone())
                    .set_expression_attribute_names(names.clone())
                    .return_consumed_capacity(ReturnConsumedCapacity::Total)
                    .send()
                    .await
                    .map_err(|e| map_sdk_error(e, &context))
            })
            .await?;

        Ok(WriteOutput {
            consumed_capacity: capacity_units(output.consumed_capacity()),
        })
    }

    async fn get_item(&self, request: GetRequest) -> Result<GetOutput> {
        let client = &self.client;
        let key: HashMap<String, AttributeValue> = to_item(&request.key);
        let context = Context::Table {
            table: &request.table,
        };
        let (table, key, consistent) = (&request.table, &key, request.consistent_read);

        let output = self
            .retry
            .run(move || async move {
                client
                    .get_item()
                    .table_name(table)
                    .set_key(Some(key.clone()))
                    .consistent_read(consistent)
                    .return_consumed_capacity(ReturnConsumedCapacity::Total)
                    .send()
                    .await
                    .map_err(|e| map_sdk_error(e, &context))
            })
            .await?;

        let item = output.item().map(from_item).transpose()?;
        Ok(GetOutput {
            item,
            consumed_capacity: capacity_units(output.consumed_capacity()),
        })
    }

    async fn delete_item(&self, request: DeleteRequest) -> Result<WriteOutput> {
        let client = &self.client;
        let key = to_item(&request.key);
        let (expression, names) = condition_parts(request.condition.as_ref());
        let context = Context::Item {
            table: &request.table,
            entity: request.entity,
            id: &request.id,
            condition: request.condition.as_ref(),
        };
        let (table, key, expression, names) = (&request.table, &key, &expression, &names);

        let output = self
            .policy_for(request.condition.as_ref())
            .run(move || async move {
                client
                    .delete_item()
                    .table_name(table)
                    .set_key(Some(key.clone()))
                    .set_condition_expression(expression.clone())
                    .set_expression_attribute_names(names.clone())
                    .return_consumed_capacity(ReturnConsumedCapacity::Total)
                    .send()
                    .await
                    .map_err(|e| map_sdk_error(e, &context))
            })
            .await?;

        Ok(WriteOutput {
            consumed_capacity: capacity_units(output.consumed_capacity()),
        })
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<()> {
        let key_schema = vec![
            KeySchemaElement::builder()
                .attribute_name(&spec.partition_attr)
                .key_type(KeyType::Hash)
                .build()
                .map_err(map_build_error)?,
            KeySchemaElement::builder()
                .attribute_name(&spec.sort_attr)
                .key_type(KeyType::Range)
                .build()
                .map_err(map_build_error)?,
        ];
        let attribute_definitions = vec![
            AttributeDefinition::builder()
                .attribute_name(&spec.partition_attr)
                .attribute_type(ScalarAttributeType::S)
                .build()
                .map_err(map_build_error)?,
            AttributeDefinition::builder()
                .attribute_name(&spec.sort_attr)
                .attribute_type(ScalarAttributeType::S)
                .build()
                .map_err(map_build_error)?,
        ];

        let mut builder = self
            .client
            .create_table()
            .table_name(&spec.name)
            .set_key_schema(Some(key_schema))
            .set_attribute_definitions(Some(attribute_definitions));

        builder = match spec.throughput {
            Throughput::Provisioned { read, write } => builder
                .billing_mode(BillingMode::Provisioned)
                .provisioned_throughput(
                    ProvisionedThroughput::builder()
                        .read_capacity_units(read)
                        .write_capacity_units(write)
                        .build()
                        .map_err(map_build_error)?,
                ),
            Throughput::OnDemand => builder.billing_mode(BillingMode::PayPerRequest),
        };

        tracing::debug!(
            table = %spec.name,
            partition_attr = %spec.partition_attr,
            sort_attr = %spec.sort_attr,
            throughput = ?spec.throughput,
            "creating table"
        );

        builder.send().await.map_err(|e| {
            map_sdk_error(
                e,
                &Context::CreateTable {
                    table: &spec.name,
                },
            )
        })?;
        Ok(())
    }

    async fn describe_table(&self, table: &str) -> Result<Option<TableStatus>> {
        let client = &self.client;
        let context = Context::Table { table };

        let result = self
            .retry
            .run(move || async move {
                client
                    .describe_table()
                    .table_name(table)
                    .send()
                    .await
                    .map_err(|e| map_sdk_error(e, &context))
            })
            .await;

        match result {
            Ok(output) => {
                let status = output.table().and_then(|t| t.table_status());
                Ok(Some(status_from_sdk(status)))
            }
            Err(DbError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn delete_table(&self, table: &str) -> Result<()> {
        let client = &self.client;
        let context = Context::Table { table };

        self.retry
            .run(move || async move {
                client
                    .delete_table()
                    .table_name(table)
                    .send()
                    .await
                    .map_err(|e| map_sdk_error(e, &context))
            })
            .await?;
        Ok(())
    }
}
