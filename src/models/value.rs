use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::errors::ProbeError;

/// Document fields keyed by field name
pub type Fields = BTreeMap<String, FieldValue>;

/// A single Firestore field value.
///
/// The REST API tags every value with its type (`stringValue`,
/// `integerValue`, ...). `to_wire`/`from_wire` convert to and from that
/// representation, `to_json` gives the plain view printed to the console.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Timestamp(DateTime<Utc>),
    String(String),
    Array(Vec<FieldValue>),
    Map(Fields),
}

impl FieldValue {
    pub fn to_wire(&self) -> Value {
        match self {
            FieldValue::Null => json!({ "nullValue": null }),
            FieldValue::Boolean(b) => json!({ "booleanValue": b }),
            // int64 travels as a decimal string
            FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
            FieldValue::Double(d) => json!({ "doubleValue": d }),
            FieldValue::Timestamp(ts) => {
                json!({ "timestampValue": ts.to_rfc3339_opts(SecondsFormat::Micros, true) })
            }
            FieldValue::String(s) => json!({ "stringValue": s }),
            FieldValue::Array(values) => {
                let values: Vec<Value> = values.iter().map(FieldValue::to_wire).collect();
                json!({ "arrayValue": { "values": values } })
            }
            FieldValue::Map(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
        }
    }

    pub fn from_wire(value: &Value) -> Result<Self, ProbeError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ProbeError::invalid_response(format!("field value is not an object: {}", value)))?;

        let (kind, inner) = obj
            .iter()
            .next()
            .ok_or_else(|| ProbeError::invalid_response("empty field value"))?;

        match kind.as_str() {
            "nullValue" => Ok(FieldValue::Null),
            "booleanValue" => inner
                .as_bool()
                .map(FieldValue::Boolean)
                .ok_or_else(|| ProbeError::invalid_response("booleanValue is not a bool")),
            "integerValue" => {
                // Accept both the documented string form and bare numbers
                let parsed = match inner {
                    Value::String(s) => s.parse::<i64>().ok(),
                    Value::Number(n) => n.as_i64(),
                    _ => None,
                };
                parsed
                    .map(FieldValue::Integer)
                    .ok_or_else(|| ProbeError::invalid_response(format!("invalid integerValue: {}", inner)))
            }
            "doubleValue" => inner
                .as_f64()
                .map(FieldValue::Double)
                .ok_or_else(|| ProbeError::invalid_response(format!("invalid doubleValue: {}", inner))),
            "timestampValue" => {
                let raw = inner
                    .as_str()
                    .ok_or_else(|| ProbeError::invalid_response("timestampValue is not a string"))?;
                DateTime::parse_from_rfc3339(raw)
                    .map(|ts| FieldValue::Timestamp(ts.with_timezone(&Utc)))
                    .map_err(|e| ProbeError::invalid_response(format!("invalid timestampValue '{}': {}", raw, e)))
            }
            "stringValue" | "bytesValue" | "referenceValue" => inner
                .as_str()
                .map(|s| FieldValue::String(s.to_string()))
                .ok_or_else(|| ProbeError::invalid_response(format!("{} is not a string", kind))),
            "geoPointValue" => {
                let mut point = Fields::new();
                for axis in ["latitude", "longitude"] {
                    let coord = inner.get(axis).and_then(Value::as_f64).unwrap_or(0.0);
                    point.insert(axis.to_string(), FieldValue::Double(coord));
                }
                Ok(FieldValue::Map(point))
            }
            "arrayValue" => {
                // An empty array comes back as `{"arrayValue": {}}`
                let values = match inner.get("values") {
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(FieldValue::from_wire)
                        .collect::<Result<Vec<_>, _>>()?,
                    _ => Vec::new(),
                };
                Ok(FieldValue::Array(values))
            }
            "mapValue" => match inner.get("fields") {
                Some(fields) => Ok(FieldValue::Map(decode_fields(fields)?)),
                None => Ok(FieldValue::Map(Fields::new())),
            },
            other => Err(ProbeError::invalid_response(format!("unsupported field type '{}'", other))),
        }
    }

    /// Plain JSON view; timestamps render as RFC 3339 strings.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Integer(i) => json!(i),
            FieldValue::Double(d) => json!(d),
            FieldValue::Timestamp(ts) => Value::String(ts.to_rfc3339_opts(SecondsFormat::Micros, true)),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Array(values) => Value::Array(values.iter().map(FieldValue::to_json).collect()),
            FieldValue::Map(fields) => fields_to_json(fields),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FieldValue::String(s),
            Value::Array(items) => FieldValue::Array(items.into_iter().map(FieldValue::from).collect()),
            Value::Object(map) => {
                FieldValue::Map(map.into_iter().map(|(k, v)| (k, FieldValue::from(v))).collect())
            }
        }
    }
}

pub fn encode_fields(fields: &Fields) -> Value {
    let map: Map<String, Value> = fields
        .iter()
        .map(|(name, value)| (name.clone(), value.to_wire()))
        .collect();
    Value::Object(map)
}

pub fn decode_fields(wire: &Value) -> Result<Fields, ProbeError> {
    let obj = wire
        .as_object()
        .ok_or_else(|| ProbeError::invalid_response("document fields are not an object"))?;

    obj.iter()
        .map(|(name, value)| Ok((name.clone(), FieldValue::from_wire(value)?)))
        .collect()
}

pub fn fields_to_json(fields: &Fields) -> Value {
    let map: Map<String, Value> = fields
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect();
    Value::Object(map)
}
