//! Tagged attribute values as they appear in item documents.
//!
//! DynamoDB serializes each attribute as a single-key object whose key names
//! the value kind, e.g. `{"S": "Bike"}` or `{"N": "300"}`. These conversions
//! map that wire shape onto the SDK's typed `AttributeValue` and back, plus
//! the table-to-directive mapping used by batch writes.

use aws_sdk_dynamodb::error::BuildError;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{AttributeValue, DeleteRequest, PutRequest, WriteRequest};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Attribute value must be a single-key tagged object, got: {0}")]
    MalformedAttribute(Value),
    #[error("Unknown attribute value tag: {0}")]
    UnknownTag(String),
    #[error("Invalid payload for attribute tag {tag}: {value}")]
    InvalidTagPayload { tag: String, value: Value },
    #[error("Base64 decoding failed: {source}")]
    Base64 {
        #[source]
        source: base64::DecodeError,
    },
    #[error("Item must be a JSON object, got: {0}")]
    ItemNotAnObject(Value),
    #[error("Write directive must name PutRequest or DeleteRequest: {0}")]
    UnknownWriteDirective(Value),
    #[error("Request items must map table names to directive lists, got: {0}")]
    MalformedRequestItems(Value),
    #[error("Unsupported attribute value variant")]
    UnsupportedVariant,
    #[error("Request construction failed: {source}")]
    Build {
        #[source]
        source: BuildError,
    },
}

/// Converts one tagged JSON value into the SDK representation.
pub fn attribute_value_from_json(value: &Value) -> Result<AttributeValue, Error> {
    let object = value
        .as_object()
        .filter(|object| object.len() == 1)
        .ok_or_else(|| Error::MalformedAttribute(value.clone()))?;
    let (tag, payload) = match object.iter().next() {
        Some(entry) => entry,
        None => return Err(Error::MalformedAttribute(value.clone())),
    };

    let invalid = || Error::InvalidTagPayload {
        tag: tag.clone(),
        value: payload.clone(),
    };

    match tag.as_str() {
        "S" => payload
            .as_str()
            .map(|s| AttributeValue::S(s.to_string()))
            .ok_or_else(invalid),
        // Numbers travel as strings on the wire, but accept JSON numbers too.
        "N" => match payload {
            Value::String(s) => Ok(AttributeValue::N(s.clone())),
            Value::Number(n) => Ok(AttributeValue::N(n.to_string())),
            _ => Err(invalid()),
        },
        "BOOL" => payload.as_bool().map(AttributeValue::Bool).ok_or_else(invalid),
        "NULL" => payload.as_bool().map(AttributeValue::Null).ok_or_else(invalid),
        "B" => {
            let encoded = payload.as_str().ok_or_else(invalid)?;
            let bytes = B64
                .decode(encoded)
                .map_err(|source| Error::Base64 { source })?;
            Ok(AttributeValue::B(Blob::new(bytes)))
        }
        "SS" => string_list(payload)
            .map(AttributeValue::Ss)
            .ok_or_else(invalid),
        "NS" => number_list(payload)
            .map(AttributeValue::Ns)
            .ok_or_else(invalid),
        "BS" => {
            let encoded = string_list(payload).ok_or_else(invalid)?;
            let mut blobs = Vec::with_capacity(encoded.len());
            for entry in encoded {
                let bytes = B64
                    .decode(entry)
                    .map_err(|source| Error::Base64 { source })?;
                blobs.push(Blob::new(bytes));
            }
            Ok(AttributeValue::Bs(blobs))
        }
        "L" => {
            let entries = payload.as_array().ok_or_else(invalid)?;
            let mut list = Vec::with_capacity(entries.len());
            for entry in entries {
                list.push(attribute_value_from_json(entry)?);
            }
            Ok(AttributeValue::L(list))
        }
        "M" => Ok(AttributeValue::M(item_from_json(payload)?)),
        other => Err(Error::UnknownTag(other.to_string())),
    }
}

fn string_list(payload: &Value) -> Option<Vec<String>> {
    payload
        .as_array()?
        .iter()
        .map(|entry| entry.as_str().map(str::to_string))
        .collect()
}

fn number_list(payload: &Value) -> Option<Vec<String>> {
    payload
        .as_array()?
        .iter()
        .map(|entry| match entry {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

/// Converts one SDK attribute value back into its tagged JSON shape.
pub fn attribute_value_to_json(value: &AttributeValue) -> Result<Value, Error> {
    let json = match value {
        AttributeValue::S(s) => json!({"S": s}),
        AttributeValue::N(n) => json!({"N": n}),
        AttributeValue::Bool(b) => json!({"BOOL": b}),
        AttributeValue::Null(b) => json!({"NULL": b}),
        AttributeValue::B(blob) => json!({"B": B64.encode(blob.as_ref())}),
        AttributeValue::Ss(values) => json!({"SS": values}),
        AttributeValue::Ns(values) => json!({"NS": values}),
        AttributeValue::Bs(blobs) => json!({
            "BS": blobs
                .iter()
                .map(|blob| B64.encode(blob.as_ref()))
                .collect::<Vec<_>>()
        }),
        AttributeValue::L(values) => {
            let list = values
                .iter()
                .map(attribute_value_to_json)
                .collect::<Result<Vec<_>, _>>()?;
            json!({"L": list})
        }
        AttributeValue::M(map) => json!({"M": item_to_json(map)?}),
        _ => return Err(Error::UnsupportedVariant),
    };
    Ok(json)
}

/// Converts a JSON object of tagged attributes into an item map.
pub fn item_from_json(value: &Value) -> Result<HashMap<String, AttributeValue>, Error> {
    let object = value
        .as_object()
        .ok_or_else(|| Error::ItemNotAnObject(value.clone()))?;
    object
        .iter()
        .map(|(name, tagged)| Ok((name.clone(), attribute_value_from_json(tagged)?)))
        .collect()
}

/// Converts an item map back into a JSON object of tagged attributes.
pub fn item_to_json(item: &HashMap<String, AttributeValue>) -> Result<Value, Error> {
    let mut object = Map::new();
    for (name, value) in item {
        object.insert(name.clone(), attribute_value_to_json(value)?);
    }
    Ok(Value::Object(object))
}

/// Converts a batch-write payload (table name to directive list) into the
/// SDK's request-items map.
pub fn request_items_from_json(
    value: &Value,
) -> Result<HashMap<String, Vec<WriteRequest>>, Error> {
    let tables = value
        .as_object()
        .ok_or_else(|| Error::MalformedRequestItems(value.clone()))?;

    let mut request_items = HashMap::with_capacity(tables.len());
    for (table, directives) in tables {
        let directives = directives
            .as_array()
            .ok_or_else(|| Error::MalformedRequestItems(value.clone()))?;
        let mut requests = Vec::with_capacity(directives.len());
        for directive in directives {
            requests.push(write_request_from_json(directive)?);
        }
        request_items.insert(table.clone(), requests);
    }
    Ok(request_items)
}

fn write_request_from_json(directive: &Value) -> Result<WriteRequest, Error> {
    let object = directive
        .as_object()
        .filter(|object| object.len() == 1)
        .ok_or_else(|| Error::UnknownWriteDirective(directive.clone()))?;

    let builder = if let Some(put) = object.get("PutRequest") {
        let item = put
            .get("Item")
            .ok_or_else(|| Error::UnknownWriteDirective(directive.clone()))?;
        WriteRequest::builder().put_request(
            PutRequest::builder()
                .set_item(Some(item_from_json(item)?))
                .build()
                .map_err(|source| Error::Build { source })?,
        )
    } else if let Some(delete) = object.get("DeleteRequest") {
        let key = delete
            .get("Key")
            .ok_or_else(|| Error::UnknownWriteDirective(directive.clone()))?;
        WriteRequest::builder().delete_request(
            DeleteRequest::builder()
                .set_key(Some(item_from_json(key)?))
                .build()
                .map_err(|source| Error::Build { source })?,
        )
    } else {
        return Err(Error::UnknownWriteDirective(directive.clone()));
    };

    Ok(builder.build())
}

/// Converts a request-items map (e.g. the service's unprocessed-items reply)
/// back into the payload shape, unchanged in content.
pub fn request_items_to_json(
    items: &HashMap<String, Vec<WriteRequest>>,
) -> Result<Value, Error> {
    let mut tables = Map::new();
    for (table, requests) in items {
        let mut directives = Vec::with_capacity(requests.len());
        for request in requests {
            if let Some(put) = request.put_request() {
                directives.push(json!({"PutRequest": {"Item": item_to_json(put.item())?}}));
            } else if let Some(delete) = request.delete_request() {
                directives.push(json!({"DeleteRequest": {"Key": item_to_json(delete.key())?}}));
            }
        }
        tables.insert(table.clone(), Value::Array(directives));
    }
    Ok(Value::Object(tables))
}
