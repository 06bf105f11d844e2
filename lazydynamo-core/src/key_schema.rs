//! Key schema resolution and continuation-token sanitization

use crate::error::KeySchemaError;
use crate::value::Record;
use std::fmt;

/// Role of a key attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// `HASH`
    Partition,
    /// `RANGE`
    Sort,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Partition => f.write_str("HASH"),
            KeyType::Sort => f.write_str("RANGE"),
        }
    }
}

/// One element of a table description's key schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub key_type: KeyType,
}

impl KeySchemaElement {
    pub fn partition(name: impl Into<String>) -> Self {
        Self {
            attribute_name: name.into(),
            key_type: KeyType::Partition,
        }
    }

    pub fn sort(name: impl Into<String>) -> Self {
        Self {
            attribute_name: name.into(),
            key_type: KeyType::Sort,
        }
    }
}

/// Resolved primary key of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    pub partition_key: String,
    pub sort_key: Option<String>,
}

impl KeySchema {
    pub fn new(partition_key: impl Into<String>, sort_key: Option<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key,
        }
    }

    /// Iterate the key attribute names, partition key first
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.partition_key.as_str()).chain(self.sort_key.as_deref())
    }

    /// Keep only the key attributes of `raw`
    ///
    /// Unknown attributes are dropped and missing ones are not an error.
    pub fn sanitize_token(&self, raw: Option<&Record>) -> Option<Record> {
        let raw = raw?;
        Some(
            self.attribute_names()
                .filter_map(|name| raw.get(name).map(|v| (name.to_string(), v.clone())))
                .collect(),
        )
    }
}

/// Resolve a table's key schema from its description elements
pub fn resolve_key_schema(elements: &[KeySchemaElement]) -> Result<KeySchema, KeySchemaError> {
    let mut partition = None;
    let mut sort = None;

    for element in elements {
        let slot = match element.key_type {
            KeyType::Partition => &mut partition,
            KeyType::Sort => &mut sort,
        };
        if slot.is_some() {
            return Err(KeySchemaError::DuplicateKey {
                key_type: element.key_type,
            });
        }
        *slot = Some(element.attribute_name.clone());
    }

    let partition_key = partition.ok_or(KeySchemaError::MissingPartitionKey)?;
    Ok(KeySchema {
        partition_key,
        sort_key: sort,
    })
}

/// Free-function form of [`KeySchema::sanitize_token`]
pub fn sanitize_token(raw: Option<&Record>, schema: &KeySchema) -> Option<Record> {
    schema.sanitize_token(raw)
}
