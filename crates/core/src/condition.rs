//! Existence predicates attached to writes.

use std::collections::HashMap;

use crate::error::DbError;

/// Placeholder used for the attribute name inside rendered expressions.
pub const ATTR_PLACEHOLDER: &str = "#k";

/// A single-attribute existence condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Holds when the attribute is present on the stored item.
    AttributeExists(String),
    /// Holds when the attribute is absent (i.e. the item does not exist).
    AttributeNotExists(String),
}

impl Condition {
    pub fn attribute(&self) -> &str {
        match self {
            Condition::AttributeExists(a) | Condition::AttributeNotExists(a) => a,
        }
    }

    /// Renders the condition with the attribute name behind a placeholder.
    ///
    /// Pattern: `attribute_not_exists(#k)`
    pub fn expression(&self) -> String {
        match self {
            Condition::AttributeExists(_) => format!("attribute_exists({ATTR_PLACEHOLDER})"),
            Condition::AttributeNotExists(_) => {
                format!("attribute_not_exists({ATTR_PLACEHOLDER})")
            }
        }
    }

    /// Placeholder-to-name bindings for [`Condition::expression`].
    pub fn attribute_names(&self) -> HashMap<String, String> {
        HashMap::from([(ATTR_PLACEHOLDER.to_string(), self.attribute().to_string())])
    }

    /// Evaluates the condition against the current stored item, if any.
    pub fn holds(&self, current: Option<&crate::value::Item>) -> bool {
        let present = current.is_some_and(|item| item.contains_key(self.attribute()));
        match self {
            Condition::AttributeExists(_) => present,
            Condition::AttributeNotExists(_) => !present,
        }
    }

    /// The error a failed check of this condition means for the caller.
    pub fn violation(&self, entity: &str, id: &str) -> DbError {
        match self {
            Condition::AttributeNotExists(_) => DbError::AlreadyExists {
                entity: entity.to_string(),
                id: id.to_string(),
            },
            Condition::AttributeExists(_) => DbError::ConditionFailed {
                entity: entity.to_string(),
                id: id.to_string(),
            },
        }
    }
}
