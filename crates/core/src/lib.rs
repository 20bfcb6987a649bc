//! Provider-agnostic record store core.
//!
//! Typed records are mapped to primary keys by a [`KeyStrategy`], encoded
//! into [`Item`]s, and written through a [`Store`] with existence conditions
//! by the [`RecordStore`] access layer. Backend failures arrive as the closed
//! [`DbError`] taxonomy.

pub mod access;
pub mod condition;
pub mod error;
pub mod key;
pub mod record;
pub mod retry;
pub mod store;
pub mod value;

pub use access::{ReadinessPolicy, RecordStore};
pub use condition::Condition;
pub use error::{DbError, Result};
pub use key::{EntityType, KeyStrategy, NaturalKey, PrefixRegistry, SharedTable};
pub use record::{ConfigFile, Device, Record, Service};
pub use retry::RetryPolicy;
pub use store::{MemoryStore, Store, TableSpec, TableStatus, Throughput};
pub use value::{AttrValue, Item};
