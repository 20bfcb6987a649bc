//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between `AttributeValue` maps and the
//! provider-neutral `Item`. Testable in isolation without DynamoDB access.

use std::collections::{BTreeMap, HashMap};

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use clusterdb_core::{AttrValue, DbError, Item, Result};

/// Convert an `AttrValue` to a DynamoDB `AttributeValue`.
pub fn to_attribute_value(value: &AttrValue) -> AttributeValue {
    match value {
        AttrValue::S(s) => AttributeValue::S(s.clone()),
        AttrValue::N(n) => AttributeValue::N(n.clone()),
        AttrValue::B(b) => AttributeValue::B(Blob::new(b.clone())),
        AttrValue::Bool(b) => AttributeValue::Bool(*b),
        AttrValue::Null => AttributeValue::Null(true),
        AttrValue::Ss(ss) => AttributeValue::Ss(ss.clone()),
        AttrValue::L(list) => AttributeValue::L(list.iter().map(to_attribute_value).collect()),
        AttrValue::M(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute_value(v)))
                .collect(),
        ),
    }
}

/// Convert a DynamoDB `AttributeValue` to an `AttrValue`.
///
/// Number and binary sets have no counterpart and are rejected.
pub fn from_attribute_value(value: &AttributeValue) -> Result<AttrValue> {
    Ok(match value {
        AttributeValue::S(s) => AttrValue::S(s.clone()),
        AttributeValue::N(n) => AttrValue::N(n.clone()),
        AttributeValue::B(b) => AttrValue::B(b.as_ref().to_vec()),
        AttributeValue::Bool(b) => AttrValue::Bool(*b),
        AttributeValue::Null(_) => AttrValue::Null,
        AttributeValue::Ss(ss) => AttrValue::Ss(ss.clone()),
        AttributeValue::L(list) => AttrValue::L(
            list.iter()
                .map(from_attribute_value)
                .collect::<Result<Vec<_>>>()?,
        ),
        AttributeValue::M(map) => AttrValue::M(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), from_attribute_value(v)?)))
                .collect::<Result<BTreeMap<_, _>>>()?,
        ),
        AttributeValue::Ns(_) => {
            return Err(DbError::InvalidRecord(
                "number sets are not supported".to_string(),
            ))
        }
        AttributeValue::Bs(_) => {
            return Err(DbError::InvalidRecord(
                "binary sets are not supported".to_string(),
            ))
        }
        other => {
            return Err(DbError::InvalidRecord(format!(
                "unknown attribute type: {other:?}"
            )))
        }
    })
}

/// Convert an `Item` to a DynamoDB item.
pub fn to_item(item: &Item) -> HashMap<String, AttributeValue> {
    item.iter()
        .map(|(k, v)| (k.clone(), to_attribute_value(v)))
        .collect()
}

/// Convert a DynamoDB item to an `Item`.
pub fn from_item(item: &HashMap<String, AttributeValue>) -> Result<Item> {
    item.iter()
        .map(|(k, v)| Ok((k.clone(), from_attribute_value(v)?)))
        .collect()
}
