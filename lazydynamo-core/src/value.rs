//! Typed attribute values and their normalization to plain documents
//!
//! A [`Record`] as read from the table service is a map of [`TypedValue`]s.
//! [`normalize`] turns it into a [`Document`]: a JSON-compatible tree in which
//! numbers remain decimal strings and binaries remain raw bytes. Choosing a
//! binary encoding happens only when a document is rendered with
//! [`Document::to_json`].

use crate::error::SerializationError;
use base64::Engine as _;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// One record as returned by a scan page
pub type Record = BTreeMap<String, TypedValue>;

/// A typed attribute value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    String(String),
    /// Decimal string exactly as the service sent it
    Number(String),
    Bool(bool),
    Null,
    Binary(Vec<u8>),
    List(Vec<TypedValue>),
    Map(BTreeMap<String, TypedValue>),
    StringSet(Vec<String>),
    NumberSet(Vec<String>),
    BinarySet(Vec<Vec<u8>>),
    /// A wire type this client does not understand; carries the type tag
    Unsupported(String),
}

impl TypedValue {
    /// Short type tag as used on the wire (`S`, `N`, `M`, ...)
    pub fn type_name(&self) -> &str {
        match self {
            TypedValue::String(_) => "S",
            TypedValue::Number(_) => "N",
            TypedValue::Bool(_) => "BOOL",
            TypedValue::Null => "NULL",
            TypedValue::Binary(_) => "B",
            TypedValue::List(_) => "L",
            TypedValue::Map(_) => "M",
            TypedValue::StringSet(_) => "SS",
            TypedValue::NumberSet(_) => "NS",
            TypedValue::BinarySet(_) => "BS",
            TypedValue::Unsupported(tag) => tag,
        }
    }
}

/// Plain JSON-compatible tree produced by [`normalize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Document {
    Null,
    Bool(bool),
    Number(String),
    String(String),
    Binary(Vec<u8>),
    List(Vec<Document>),
    Map(BTreeMap<String, Document>),
}

/// How binary values are rendered to JSON
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BinaryEncoding {
    /// Standard base64 string
    #[default]
    Base64,
    /// Array of byte values
    Bytes,
}

impl std::str::FromStr for BinaryEncoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base64" => Ok(BinaryEncoding::Base64),
            "bytes" => Ok(BinaryEncoding::Bytes),
            other => Err(format!(
                "unknown binary encoding '{other}' (expected 'base64' or 'bytes')"
            )),
        }
    }
}

impl std::fmt::Display for BinaryEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryEncoding::Base64 => f.write_str("base64"),
            BinaryEncoding::Bytes => f.write_str("bytes"),
        }
    }
}

impl Document {
    /// Render to a `serde_json::Value`
    ///
    /// Numbers are emitted as JSON strings so no precision is lost.
    pub fn to_json(&self, encoding: BinaryEncoding) -> JsonValue {
        match self {
            Document::Null => JsonValue::Null,
            Document::Bool(b) => JsonValue::Bool(*b),
            Document::Number(n) => JsonValue::String(n.clone()),
            Document::String(s) => JsonValue::String(s.clone()),
            Document::Binary(bytes) => binary_to_json(bytes, encoding),
            Document::List(items) => {
                JsonValue::Array(items.iter().map(|d| d.to_json(encoding)).collect())
            }
            Document::Map(entries) => JsonValue::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json(encoding)))
                    .collect(),
            ),
        }
    }
}

fn binary_to_json(bytes: &[u8], encoding: BinaryEncoding) -> JsonValue {
    match encoding {
        BinaryEncoding::Base64 => {
            JsonValue::String(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
        BinaryEncoding::Bytes => JsonValue::Array(bytes.iter().map(|b| (*b).into()).collect()),
    }
}

/// Normalize one record into a [`Document::Map`]
///
/// Sets become lists in their received order. Fails on the first
/// [`TypedValue::Unsupported`] found at any depth.
pub fn normalize(record: &Record) -> Result<Document, SerializationError> {
    let mut out = BTreeMap::new();
    for (name, value) in record {
        out.insert(name.clone(), normalize_value(value, name)?);
    }
    Ok(Document::Map(out))
}

fn normalize_value(value: &TypedValue, path: &str) -> Result<Document, SerializationError> {
    Ok(match value {
        TypedValue::String(s) => Document::String(s.clone()),
        TypedValue::Number(n) => Document::Number(n.clone()),
        TypedValue::Bool(b) => Document::Bool(*b),
        TypedValue::Null => Document::Null,
        TypedValue::Binary(bytes) => Document::Binary(bytes.clone()),
        TypedValue::List(items) => Document::List(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| normalize_value(v, &format!("{path}[{i}]")))
                .collect::<Result<_, _>>()?,
        ),
        TypedValue::Map(entries) => {
            let mut out = BTreeMap::new();
            for (k, v) in entries {
                out.insert(k.clone(), normalize_value(v, &format!("{path}.{k}"))?);
            }
            Document::Map(out)
        }
        TypedValue::StringSet(items) => {
            Document::List(items.iter().cloned().map(Document::String).collect())
        }
        TypedValue::NumberSet(items) => {
            Document::List(items.iter().cloned().map(Document::Number).collect())
        }
        TypedValue::BinarySet(items) => {
            Document::List(items.iter().cloned().map(Document::Binary).collect())
        }
        TypedValue::Unsupported(tag) => {
            return Err(SerializationError::UnsupportedType {
                path: path.to_string(),
                type_name: tag.clone(),
            })
        }
    })
}

/// Serialize records to compact JSON lines, dropping the ones that fail
pub fn records_to_rows(records: &[Record], encoding: BinaryEncoding) -> Vec<String> {
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        match normalize(record) {
            Ok(doc) => rows.push(doc.to_json(encoding).to_string()),
            Err(e) => tracing::warn!(error = %e, "dropping record that could not be serialized"),
        }
    }
    rows
}
