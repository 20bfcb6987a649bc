//! Domain records and their attribute codecs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DbError, Result};
use crate::key::{EntityType, NaturalKey, CONFIG_PREFIX, DEVICE_PREFIX, SERVICE_PREFIX};
use crate::value::{get_number, get_optional_map, get_string, AttrValue, Item};

// ============================================================================
// Attribute names
// ============================================================================

pub const CLUSTER_NAME: &str = "ClusterName";
pub const DEVICE_NAME: &str = "DeviceName";
pub const SERVICE_NAME: &str = "ServiceName";
pub const SERVICE_UUID: &str = "ServiceUUID";
pub const FILE_ID: &str = "FileID";
pub const FILE_NAME: &str = "FileName";
pub const FILE_VERSION: &str = "Version";
pub const FILE_CONTENT: &str = "Content";
pub const FILE_ATTRS: &str = "Attrs";

/// A typed entity that can be stored in a table.
///
/// The codec only deals with payload attributes. Key attributes are added
/// and interpreted by [`crate::key::KeyStrategy`].
pub trait Record: Sized + Send + Sync {
    const ENTITY: EntityType;

    /// The record's identity.
    fn natural_key(&self) -> Result<NaturalKey>;

    /// Payload attributes, without key attributes.
    fn to_attributes(&self) -> Item;

    /// Rebuilds the record from its decoded key and the stored item.
    fn from_attributes(key: NaturalKey, item: &Item) -> Result<Self>;
}

// ============================================================================
// Device
// ============================================================================

/// A storage device attached to a service in a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub cluster_name: String,
    pub device_name: String,
    pub service_name: String,
}

impl Device {
    pub fn new(
        cluster_name: impl Into<String>,
        device_name: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            device_name: device_name.into(),
            service_name: service_name.into(),
        }
    }
}

impl Record for Device {
    const ENTITY: EntityType = EntityType {
        name: "Device",
        prefix: DEVICE_PREFIX,
        partition_attr: CLUSTER_NAME,
        sort_attr: DEVICE_NAME,
    };

    fn natural_key(&self) -> Result<NaturalKey> {
        NaturalKey::new(&self.cluster_name, &self.device_name)
    }

    fn to_attributes(&self) -> Item {
        Item::from([(
            SERVICE_NAME.to_string(),
            AttrValue::S(self.service_name.clone()),
        )])
    }

    fn from_attributes(key: NaturalKey, item: &Item) -> Result<Self> {
        Ok(Self {
            cluster_name: key.partition().to_string(),
            device_name: key.sort().to_string(),
            service_name: get_string(item, SERVICE_NAME)?,
        })
    }
}

// ============================================================================
// Service
// ============================================================================

/// A service registered in a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub cluster_name: String,
    pub service_name: String,
    pub service_uuid: Uuid,
}

impl Service {
    /// Creates a service with a fresh UUID.
    pub fn new(cluster_name: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            service_name: service_name.into(),
            service_uuid: Uuid::new_v4(),
        }
    }

    /// Sets a specific UUID (useful for testing).
    pub fn with_uuid(mut self, service_uuid: Uuid) -> Self {
        self.service_uuid = service_uuid;
        self
    }
}

impl Record for Service {
    const ENTITY: EntityType = EntityType {
        name: "Service",
        prefix: SERVICE_PREFIX,
        partition_attr: CLUSTER_NAME,
        sort_attr: SERVICE_NAME,
    };

    fn natural_key(&self) -> Result<NaturalKey> {
        NaturalKey::new(&self.cluster_name, &self.service_name)
    }

    fn to_attributes(&self) -> Item {
        Item::from([(
            SERVICE_UUID.to_string(),
            AttrValue::S(self.service_uuid.to_string()),
        )])
    }

    fn from_attributes(key: NaturalKey, item: &Item) -> Result<Self> {
        let raw = get_string(item, SERVICE_UUID)?;
        let service_uuid = Uuid::parse_str(&raw)
            .map_err(|e| DbError::InvalidRecord(format!("invalid {SERVICE_UUID} {raw}: {e}")))?;

        Ok(Self {
            cluster_name: key.partition().to_string(),
            service_name: key.sort().to_string(),
            service_uuid,
        })
    }
}

// ============================================================================
// ConfigFile
// ============================================================================

/// A versioned configuration file owned by a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub service_uuid: Uuid,
    pub file_id: String,
    pub file_name: String,
    pub version: u64,
    pub content: String,
    /// Free-form attributes; omitted from the item when empty.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, AttrValue>,
}

impl ConfigFile {
    pub fn new(
        service_uuid: Uuid,
        file_id: impl Into<String>,
        file_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            service_uuid,
            file_id: file_id.into(),
            file_name: file_name.into(),
            version: 0,
            content: content.into(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }
}

impl Record for ConfigFile {
    const ENTITY: EntityType = EntityType {
        name: "ConfigFile",
        prefix: CONFIG_PREFIX,
        partition_attr: SERVICE_UUID,
        sort_attr: FILE_ID,
    };

    fn natural_key(&self) -> Result<NaturalKey> {
        NaturalKey::new(self.service_uuid.to_string(), &self.file_id)
    }

    fn to_attributes(&self) -> Item {
        let mut item = Item::new();
        item.insert(FILE_NAME.to_string(), AttrValue::S(self.file_name.clone()));
        item.insert(FILE_VERSION.to_string(), AttrValue::number(self.version));
        item.insert(FILE_CONTENT.to_string(), AttrValue::S(self.content.clone()));
        if !self.attrs.is_empty() {
            item.insert(FILE_ATTRS.to_string(), AttrValue::M(self.attrs.clone()));
        }
        item
    }

    fn from_attributes(key: NaturalKey, item: &Item) -> Result<Self> {
        let service_uuid = Uuid::parse_str(key.partition()).map_err(|e| {
            DbError::InvalidRecord(format!("invalid {SERVICE_UUID} {}: {e}", key.partition()))
        })?;

        Ok(Self {
            service_uuid,
            file_id: key.sort().to_string(),
            file_name: get_string(item, FILE_NAME)?,
            version: get_number(item, FILE_VERSION)?,
            content: get_string(item, FILE_CONTENT)?,
            attrs: get_optional_map(item, FILE_ATTRS)?.unwrap_or_default(),
        })
    }
}
