use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MirrorError;

/// The remote collections mirrored into the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Products,
    Picklists,
    Warehouses,
    Users,
    Suppliers,
    Batches,
}

impl EntityType {
    pub const ALL: [EntityType; 6] = [
        EntityType::Products,
        EntityType::Picklists,
        EntityType::Warehouses,
        EntityType::Users,
        EntityType::Suppliers,
        EntityType::Batches,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Products => "products",
            EntityType::Picklists => "picklists",
            EntityType::Warehouses => "warehouses",
            EntityType::Users => "users",
            EntityType::Suppliers => "suppliers",
            EntityType::Batches => "batches",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| MirrorError::Validation(format!("unknown entity type: {s}")))
    }
}
