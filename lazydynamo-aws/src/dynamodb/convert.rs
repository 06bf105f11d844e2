//! Conversion between SDK attribute values and core typed values

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use lazydynamo_core::{Record, TypedValue};
use std::collections::HashMap;

/// Type tag reported for attribute values this SDK version cannot name
pub const UNKNOWN_TYPE: &str = "UNKNOWN";

pub fn from_attribute_value(value: &AttributeValue) -> TypedValue {
    match value {
        AttributeValue::S(s) => TypedValue::String(s.clone()),
        AttributeValue::N(n) => TypedValue::Number(n.clone()),
        AttributeValue::Bool(b) => TypedValue::Bool(*b),
        AttributeValue::Null(_) => TypedValue::Null,
        AttributeValue::B(blob) => TypedValue::Binary(blob.as_ref().to_vec()),
        AttributeValue::L(items) => TypedValue::List(items.iter().map(from_attribute_value).collect()),
        AttributeValue::M(map) => TypedValue::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), from_attribute_value(v)))
                .collect(),
        ),
        AttributeValue::Ss(items) => TypedValue::StringSet(items.clone()),
        AttributeValue::Ns(items) => TypedValue::NumberSet(items.clone()),
        AttributeValue::Bs(items) => {
            TypedValue::BinarySet(items.iter().map(|b| b.as_ref().to_vec()).collect())
        }
        _ => TypedValue::Unsupported(UNKNOWN_TYPE.to_string()),
    }
}

/// `None` for [`TypedValue::Unsupported`], which has no wire form
pub fn to_attribute_value(value: &TypedValue) -> Option<AttributeValue> {
    Some(match value {
        TypedValue::String(s) => AttributeValue::S(s.clone()),
        TypedValue::Number(n) => AttributeValue::N(n.clone()),
        TypedValue::Bool(b) => AttributeValue::Bool(*b),
        TypedValue::Null => AttributeValue::Null(true),
        TypedValue::Binary(bytes) => AttributeValue::B(Blob::new(bytes.clone())),
        TypedValue::List(items) => AttributeValue::L(
            items
                .iter()
                .map(to_attribute_value)
                .collect::<Option<Vec<_>>>()?,
        ),
        TypedValue::Map(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| to_attribute_value(v).map(|v| (k.clone(), v)))
                .collect::<Option<HashMap<_, _>>>()?,
        ),
        TypedValue::StringSet(items) => AttributeValue::Ss(items.clone()),
        TypedValue::NumberSet(items) => AttributeValue::Ns(items.clone()),
        TypedValue::BinarySet(items) => {
            AttributeValue::Bs(items.iter().cloned().map(Blob::new).collect())
        }
        TypedValue::Unsupported(_) => return None,
    })
}

pub fn item_to_record(item: &HashMap<String, AttributeValue>) -> Record {
    item.iter()
        .map(|(k, v)| (k.clone(), from_attribute_value(v)))
        .collect()
}

/// Attributes that cannot be expressed on the wire are skipped
pub fn record_to_item(record: &Record) -> HashMap<String, AttributeValue> {
    record
        .iter()
        .filter_map(|(k, v)| to_attribute_value(v).map(|v| (k.clone(), v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazydynamo_core::{normalize, BinaryEncoding};

    fn nested_item() -> HashMap<String, AttributeValue> {
        let mut inner = HashMap::new();
        inner.insert("qty".to_string(), AttributeValue::N("3".into()));
        inner.insert(
            "codes".to_string(),
            AttributeValue::Ss(vec!["b".into(), "a".into()]),
        );

        let mut item = HashMap::new();
        item.insert("pk".to_string(), AttributeValue::S("order#1".into()));
        item.insert(
            "price".to_string(),
            AttributeValue::N("19.990000000000000001".into()),
        );
        item.insert("gift".to_string(), AttributeValue::Bool(false));
        item.insert("note".to_string(), AttributeValue::Null(true));
        item.insert(
            "raw".to_string(),
            AttributeValue::B(Blob::new(vec![0xde, 0xad])),
        );
        item.insert(
            "lines".to_string(),
            AttributeValue::L(vec![AttributeValue::M(inner)]),
        );
        item.insert(
            "weights".to_string(),
            AttributeValue::Ns(vec!["1".into(), "2.5".into()]),
        );
        item.insert(
            "chunks".to_string(),
            AttributeValue::Bs(vec![Blob::new(vec![1u8])]),
        );
        item
    }

    #[test]
    fn test_item_to_record_all_types() {
        let record = item_to_record(&nested_item());
        assert_eq!(record["pk"], TypedValue::String("order#1".into()));
        assert_eq!(
            record["price"],
            TypedValue::Number("19.990000000000000001".into())
        );
        assert_eq!(record["gift"], TypedValue::Bool(false));
        assert_eq!(record["note"], TypedValue::Null);
        assert_eq!(record["raw"], TypedValue::Binary(vec![0xde, 0xad]));
        assert_eq!(
            record["weights"],
            TypedValue::NumberSet(vec!["1".into(), "2.5".into()])
        );
        assert_eq!(record["chunks"], TypedValue::BinarySet(vec![vec![1]]));

        let TypedValue::List(lines) = &record["lines"] else {
            panic!("expected list");
        };
        let TypedValue::Map(line) = &lines[0] else {
            panic!("expected map");
        };
        assert_eq!(
            line["codes"],
            TypedValue::StringSet(vec!["b".into(), "a".into()])
        );
    }

    #[test]
    fn test_converted_item_normalizes() {
        let json = normalize(&item_to_record(&nested_item()))
            .unwrap()
            .to_json(BinaryEncoding::Base64);
        assert_eq!(json["price"], "19.990000000000000001");
        assert_eq!(json["raw"], "3q0=");
        assert_eq!(json["lines"][0]["qty"], "3");
    }

    #[test]
    fn test_record_round_trips_to_item() {
        let item = nested_item();
        assert_eq!(record_to_item(&item_to_record(&item)), item);
    }

    #[test]
    fn test_unsupported_is_skipped_on_the_wire() {
        let mut record = Record::new();
        record.insert("pk".into(), TypedValue::String("a".into()));
        record.insert("odd".into(), TypedValue::Unsupported("XX".into()));
        let item = record_to_item(&record);
        assert_eq!(item.len(), 1);
        assert!(item.contains_key("pk"));
    }
}
