use crate::error::{AttributeError, LoadError, json_kind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const TYPE_KEY: &str = "type";
pub const ID_KEY: &str = "id";
pub const SOURCE_KEY: &str = "source";
pub const TARGET_KEY: &str = "target";
pub const COMPOSITE_KEY: &str = "composite";

/// One persisted figure: a flat, insertion-ordered key/value mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

/// A `{ node, port }` pair naming a port on another figure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub node: String,
    pub port: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Source,
    Target,
}

impl Endpoint {
    pub fn key(self) -> &'static str {
        match self {
            Self::Source => SOURCE_KEY,
            Self::Target => TARGET_KEY,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Record {
    pub fn new(type_name: &str, id: &str) -> Self {
        let mut map = Map::new();
        map.insert(TYPE_KEY.to_string(), Value::String(type_name.to_string()));
        map.insert(ID_KEY.to_string(), Value::String(id.to_string()));
        Self(map)
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn type_name(&self) -> Result<&str, LoadError> {
        self.required_str(TYPE_KEY)
    }

    pub fn id(&self) -> Result<&str, LoadError> {
        self.required_str(ID_KEY)
    }

    /// Best-effort label for diagnostics; never fails.
    pub fn type_hint(&self) -> &str {
        self.0.get(TYPE_KEY).and_then(Value::as_str).unwrap_or("<missing>")
    }

    pub fn id_hint(&self) -> &str {
        self.0.get(ID_KEY).and_then(Value::as_str).unwrap_or("<missing>")
    }

    pub fn composite(&self) -> Option<Result<&str, LoadError>> {
        let value = self.0.get(COMPOSITE_KEY)?;
        Some(value.as_str().ok_or_else(|| {
            LoadError::MalformedRecord(format!(
                "'{COMPOSITE_KEY}' must be a string, got {}",
                json_kind(value)
            ))
        }))
    }

    pub fn endpoint(&self, endpoint: Endpoint) -> Option<Result<PortRef, LoadError>> {
        let value = self.0.get(endpoint.key())?;
        Some(PortRef::from_value(endpoint, value))
    }

    fn required_str(&self, key: &str) -> Result<&str, LoadError> {
        match self.0.get(key) {
            Some(Value::String(value)) => Ok(value),
            Some(other) => Err(LoadError::MalformedRecord(format!(
                "'{key}' must be a string, got {}",
                json_kind(other)
            ))),
            None => Err(LoadError::MalformedRecord(format!("missing '{key}'"))),
        }
    }

    // ── Typed attribute access ──────────────────────────────────────────
    // `Ok(None)` means the key is absent (or null); a present value of the
    // wrong kind is an error the figure reports back to the loader.

    pub fn f32_attr(&self, key: &str) -> Result<Option<f32>, AttributeError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(num)) => num
                .as_f64()
                .map(|value| Some(value as f32))
                .ok_or_else(|| AttributeError::invalid(key, num, "not representable as f32")),
            Some(other) => Err(AttributeError::wrong_type(key, "number", other)),
        }
    }

    pub fn str_attr(&self, key: &str) -> Result<Option<&str>, AttributeError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value)),
            Some(other) => Err(AttributeError::wrong_type(key, "string", other)),
        }
    }

    pub fn bool_attr(&self, key: &str) -> Result<Option<bool>, AttributeError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(value)) => Ok(Some(*value)),
            Some(other) => Err(AttributeError::wrong_type(key, "boolean", other)),
        }
    }

    pub fn array_attr(&self, key: &str) -> Result<Option<&Vec<Value>>, AttributeError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(other) => Err(AttributeError::wrong_type(key, "array", other)),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.0)
    }
}

impl TryFrom<Value> for Record {
    type Error = LoadError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(LoadError::MalformedRecord(format!(
                "expected an object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

impl PortRef {
    pub fn new(node: &str, port: &str) -> Self {
        Self {
            node: node.to_string(),
            port: port.to_string(),
        }
    }

    fn from_value(endpoint: Endpoint, value: &Value) -> Result<Self, LoadError> {
        let malformed = || {
            LoadError::MalformedRecord(format!(
                "'{endpoint}' must be an object with string 'node' and 'port' keys"
            ))
        };
        let object = value.as_object().ok_or_else(malformed)?;
        let node = object.get("node").and_then(Value::as_str).ok_or_else(malformed)?;
        let port = object.get("port").and_then(Value::as_str).ok_or_else(malformed)?;
        Ok(Self::new(node, port))
    }
}

impl From<PortRef> for Value {
    fn from(port: PortRef) -> Self {
        serde_json::json!({ "node": port.node, "port": port.port })
    }
}

/// The ordered record sequence of one persisted diagram.
///
/// Entries are kept as raw JSON values so that a single element which is not an
/// object fails on its own instead of rejecting the whole document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    entries: Vec<Value>,
}

impl Document {
    pub fn parse(input: &str) -> Result<Self, LoadError> {
        let value = match serde_json::from_str::<Value>(input) {
            Ok(value) => value,
            Err(strict) => match json5::from_str::<Value>(input) {
                Ok(value) => value,
                Err(_) => return Err(LoadError::MalformedDocument(strict.to_string())),
            },
        };
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, LoadError> {
        match value {
            Value::Array(entries) => Ok(Self { entries }),
            other => Err(LoadError::MalformedDocument(format!(
                "expected an array of records, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        Self {
            entries: records.into_iter().map(Value::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Value] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Value> {
        self.entries
    }
}

/// Anything `Reader::unmarshal` accepts as a document.
pub trait IntoDocument {
    fn into_document(self) -> Result<Document, LoadError>;
}

impl IntoDocument for Document {
    fn into_document(self) -> Result<Document, LoadError> {
        Ok(self)
    }
}

impl IntoDocument for &str {
    fn into_document(self) -> Result<Document, LoadError> {
        Document::parse(self)
    }
}

impl IntoDocument for String {
    fn into_document(self) -> Result<Document, LoadError> {
        Document::parse(&self)
    }
}

impl IntoDocument for &String {
    fn into_document(self) -> Result<Document, LoadError> {
        Document::parse(self)
    }
}

impl IntoDocument for Value {
    fn into_document(self) -> Result<Document, LoadError> {
        Document::from_value(self)
    }
}

impl IntoDocument for Vec<Record> {
    fn into_document(self) -> Result<Document, LoadError> {
        Ok(Document::from_records(self))
    }
}
