//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `DbError` from `clusterdb_core`. Nothing from the
//! SDK error types escapes this module.

use std::error::Error;
use std::fmt::Debug;

use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use clusterdb_core::{Condition, DbError};

/// What the failed request was doing. A few codes mean different things
/// depending on the operation.
#[derive(Debug, Clone, Copy)]
pub enum Context<'a> {
    Item {
        table: &'a str,
        entity: &'a str,
        id: &'a str,
        condition: Option<&'a Condition>,
    },
    CreateTable {
        table: &'a str,
    },
    Table {
        table: &'a str,
    },
}

impl Context<'_> {
    fn table(&self) -> &str {
        match self {
            Context::Item { table, .. }
            | Context::CreateTable { table }
            | Context::Table { table } => table,
        }
    }
}

/// Classify a DynamoDB service error code. Total: unknown codes are `Internal`.
pub fn classify(code: &str, message: &str, context: &Context<'_>) -> DbError {
    match code {
        "ConditionalCheckFailedException" => match context {
            Context::Item {
                entity,
                id,
                condition: Some(condition),
                ..
            } => condition.violation(entity, id),
            Context::Item { entity, id, .. } => DbError::ConditionFailed {
                entity: entity.to_string(),
                id: id.to_string(),
            },
            _ => DbError::ConditionFailed {
                entity: "Table".to_string(),
                id: context.table().to_string(),
            },
        },
        "ResourceInUseException" => match context {
            Context::CreateTable { table } => DbError::AlreadyExists {
                entity: "Table".to_string(),
                id: table.to_string(),
            },
            _ => DbError::Unavailable(format!("table {} is busy: {message}", context.table())),
        },
        "ResourceNotFoundException" => DbError::NotFound {
            entity: "Table".to_string(),
            id: context.table().to_string(),
        },
        "ProvisionedThroughputExceededException"
        | "RequestLimitExceeded"
        | "ThrottlingException"
        | "LimitExceededException" => DbError::Throttled(format!("{code}: {message}")),
        "InternalServerError"
        | "ServiceUnavailable"
        | "TransactionConflictException"
        | "TransactionInProgressException" => DbError::Unavailable(format!("{code}: {message}")),
        _ => DbError::Internal {
            code: code.to_string(),
            message: message.to_string(),
        },
    }
}

/// Map any SDK error to `DbError`.
///
/// Service errors go through [`classify`]. Timeouts, dispatch failures and
/// unparseable responses are `Unavailable`; request construction failures
/// are `Internal`.
pub fn map_sdk_error<E, R>(err: SdkError<E, R>, context: &Context<'_>) -> DbError
where
    E: ProvideErrorMetadata + Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    let detail = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::ServiceError(service) => {
            let inner = service.err();
            classify(
                inner.code().unwrap_or("Unknown"),
                inner.message().unwrap_or(&detail),
                context,
            )
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            DbError::Unavailable(detail)
        }
        _ => DbError::Internal {
            code: "ClientError".to_string(),
            message: detail,
        },
    }
}

/// Map an SDK builder error (missing required field) to `DbError`.
pub fn map_build_error(err: impl std::fmt::Display) -> DbError {
    DbError::Internal {
        code: "BuildError".to_string(),
        message: err.to_string(),
    }
}
