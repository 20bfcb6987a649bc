//! Attribute values and items.
//!
//! Provider-neutral mirror of the wire representation used by partitioned
//! key-value stores: an item is a map from attribute name to a tagged value.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};

/// A single tagged attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrValue {
    /// UTF-8 string.
    S(String),
    /// Number, kept in its decimal string form.
    N(String),
    /// Binary blob.
    B(Vec<u8>),
    Bool(bool),
    Null,
    /// String set.
    Ss(Vec<String>),
    L(Vec<AttrValue>),
    M(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    /// Builds a number value from anything that prints as a decimal.
    pub fn number(n: impl ToString) -> Self {
        AttrValue::N(n.to_string())
    }

    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttrValue::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_n(&self) -> Option<&str> {
        match self {
            AttrValue::N(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_m(&self) -> Option<&BTreeMap<String, AttrValue>> {
        match self {
            AttrValue::M(m) => Some(m),
            _ => None,
        }
    }

    /// Name of the wire tag, used in decode error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::S(_) => "S",
            AttrValue::N(_) => "N",
            AttrValue::B(_) => "B",
            AttrValue::Bool(_) => "BOOL",
            AttrValue::Null => "NULL",
            AttrValue::Ss(_) => "SS",
            AttrValue::L(_) => "L",
            AttrValue::M(_) => "M",
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::S(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::S(s)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

/// One stored item.
pub type Item = HashMap<String, AttrValue>;

/// Get a required string attribute.
pub fn get_string(item: &Item, key: &str) -> Result<String> {
    match item.get(key) {
        Some(AttrValue::S(s)) => Ok(s.clone()),
        Some(other) => Err(DbError::InvalidRecord(format!(
            "field {key} has type {}, expected S",
            other.type_name()
        ))),
        None => Err(DbError::InvalidRecord(format!("missing field: {key}"))),
    }
}

/// Get a required number attribute, parsed into `T`.
pub fn get_number<T>(item: &Item, key: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = item
        .get(key)
        .and_then(|v| v.as_n())
        .ok_or_else(|| DbError::InvalidRecord(format!("missing or invalid number: {key}")))?;
    raw.parse::<T>()
        .map_err(|e| DbError::InvalidRecord(format!("invalid number {key}={raw}: {e}")))
}

/// Get an optional map attribute. Present with another type is an error.
pub fn get_optional_map(item: &Item, key: &str) -> Result<Option<BTreeMap<String, AttrValue>>> {
    match item.get(key) {
        Some(AttrValue::M(map)) => Ok(Some(map.clone())),
        Some(other) => Err(DbError::InvalidRecord(format!(
            "field {key} has type {}, expected M",
            other.type_name()
        ))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_string_missing_field() {
        let item = Item::new();
        assert!(matches!(
            get_string(&item, "missing"),
            Err(DbError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_get_string_wrong_type() {
        let mut item = Item::new();
        item.insert("Version".to_string(), AttrValue::number(3));

        let err = get_string(&item, "Version").unwrap_err();
        assert_eq!(
            err,
            DbError::InvalidRecord("field Version has type N, expected S".to_string())
        );
    }

    #[test]
    fn test_get_optional_map() {
        let mut item = Item::new();
        assert_eq!(get_optional_map(&item, "Attrs").unwrap(), None);

        let map = BTreeMap::from([("Mode".to_string(), AttrValue::from("0644"))]);
        item.insert("Attrs".to_string(), AttrValue::M(map.clone()));
        assert_eq!(get_optional_map(&item, "Attrs").unwrap(), Some(map));
    }

    #[test]
    fn test_get_optional_map_wrong_type() {
        let mut item = Item::new();
        item.insert("Attrs".to_string(), AttrValue::from("not-a-map"));

        let err = get_optional_map(&item, "Attrs").unwrap_err();
        assert_eq!(
            err,
            DbError::InvalidRecord("field Attrs has type S, expected M".to_string())
        );
    }

    #[test]
    fn test_get_number() {
        let mut item = Item::new();
        item.insert("Version".to_string(), AttrValue::number(42u64));
        item.insert("Bad".to_string(), AttrValue::N("4x".to_string()));

        assert_eq!(get_number::<u64>(&item, "Version").unwrap(), 42);
        assert!(get_number::<u64>(&item, "Bad").is_err());
        assert!(get_number::<u64>(&item, "Missing").is_err());
    }

    #[test]
    fn test_serialized_shape_is_tagged() {
        let value = AttrValue::S("cluster1".to_string());
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"S":"cluster1"}"#);
    }
}
