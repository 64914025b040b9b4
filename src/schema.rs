//! Schema descriptors
//!
//! A tablet's schema is bound into its metadata when the metadata is first
//! created and checked again every time the metadata is loaded. Column values
//! are stored as opaque bytes by the storage layer; the schema only names and
//! types them.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabletError};

/// Physical type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Int32,
    Int64,
    String,
    Binary,
    Timestamp,
}

/// A single column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Ordered column list; the first `num_key_columns` columns form the row key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnSchema>,
    num_key_columns: usize,
}

impl Schema {
    /// Build a schema, validating the key prefix and column names.
    pub fn new(columns: Vec<ColumnSchema>, num_key_columns: usize) -> Result<Self> {
        if num_key_columns == 0 || num_key_columns > columns.len() {
            return Err(TabletError::Schema(format!(
                "invalid key column count {} for {} columns",
                num_key_columns,
                columns.len()
            )));
        }

        for (i, col) in columns.iter().enumerate() {
            if col.name.is_empty() {
                return Err(TabletError::Schema(format!("column {} has no name", i)));
            }
            if i < num_key_columns && col.nullable {
                return Err(TabletError::Schema(format!(
                    "key column '{}' cannot be nullable",
                    col.name
                )));
            }
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(TabletError::Schema(format!(
                    "duplicate column name '{}'",
                    col.name
                )));
            }
        }

        Ok(Self {
            columns,
            num_key_columns,
        })
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn num_key_columns(&self) -> usize {
        self.num_key_columns
    }

    pub fn key_columns(&self) -> &[ColumnSchema] {
        &self.columns[..self.num_key_columns]
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Schema of the demo "twitter" tablet that the server can seed its catalog
/// with.
pub fn twitter_demo_schema() -> Schema {
    let columns = vec![
        ColumnSchema::new("tweet_id", DataType::Int64),
        ColumnSchema::new("text", DataType::String),
        ColumnSchema::new("source", DataType::String),
        ColumnSchema::new("created_at", DataType::Timestamp),
        ColumnSchema::new("user_id", DataType::Int64),
        ColumnSchema::new("user_name", DataType::String),
        ColumnSchema::new("user_description", DataType::String).nullable(),
        ColumnSchema::new("user_location", DataType::String).nullable(),
        ColumnSchema::new("user_followers_count", DataType::Int32),
        ColumnSchema::new("user_friends_count", DataType::Int32),
        ColumnSchema::new("user_image_url", DataType::String).nullable(),
    ];

    // tweet_id is a single non-nullable key column, so this cannot fail
    Schema {
        columns,
        num_key_columns: 1,
    }
}

/// Two-column schema: a binary key and a binary value
pub fn key_value_schema() -> Schema {
    Schema {
        columns: vec![
            ColumnSchema::new("key", DataType::Binary),
            ColumnSchema::new("value", DataType::Binary).nullable(),
        ],
        num_key_columns: 1,
    }
}
