//! Config entity: a named set of variables snapshotted onto executions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use weir_core::ConfigSet;

use crate::error::DbError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConfigEntity {
    pub id: String,

    pub name: String,

    pub variables: Value,

    pub created_at: DateTime<Utc>,
}

impl ConfigEntity {
    pub fn from_config(config: &ConfigSet) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            variables: Value::Object(config.variables.clone()),
            created_at: config.created_at.unwrap_or_else(Utc::now),
        }
    }

    pub fn into_config(self) -> Result<ConfigSet, DbError> {
        let variables: Map<String, Value> = match self.variables {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(DbError::InvalidData(format!(
                    "variables must be an object, got {other}"
                )))
            }
        };
        Ok(ConfigSet {
            id: self.id,
            name: self.name,
            variables,
            created_at: Some(self.created_at),
        })
    }
}
