// src/params.rs

use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::ExecutionId;

/// The `type` discriminator of an input/output entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamKind {
    File,
    Data,
    Basic,
    /// `list:data` or `list:data:<qualifier>`
    DataList(Option<String>),
    /// Any other discriminator, kept verbatim.
    Other(String),
}

impl ParamKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "file" => ParamKind::File,
            "data" => ParamKind::Data,
            "basic" => ParamKind::Basic,
            "list:data" => ParamKind::DataList(None),
            other => match other.strip_prefix("list:data:") {
                Some(qualifier) => ParamKind::DataList(Some(qualifier.to_string())),
                None => ParamKind::Other(other.to_string()),
            },
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, ParamKind::Data | ParamKind::DataList(_))
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::File => f.write_str("file"),
            ParamKind::Data => f.write_str("data"),
            ParamKind::Basic => f.write_str("basic"),
            ParamKind::DataList(None) => f.write_str("list:data"),
            ParamKind::DataList(Some(q)) => write!(f, "list:data:{q}"),
            ParamKind::Other(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for ParamKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ParamKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ParamKind::parse(&raw))
    }
}

/// One `{name, type, value}` entry of an Execution's `input` or `output`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    #[serde(default)]
    pub value: Value,
}

impl Param {
    pub fn new(name: impl Into<String>, kind: ParamKind, value: Value) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
        }
    }

    pub fn file(name: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::File, Value::String(file_name.into()))
    }

    pub fn data(name: impl Into<String>, execution_id: ExecutionId) -> Self {
        Self::new(name, ParamKind::Data, Value::from(execution_id))
    }

    pub fn basic(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, ParamKind::Basic, value.into())
    }

    /// Execution ids referenced by a `data`/`list:data` entry, in order.
    /// Accepts integers or integer strings; anything else is ignored.
    pub fn referenced_ids(&self) -> Vec<ExecutionId> {
        if !self.kind.is_data() {
            return Vec::new();
        }
        match &self.value {
            Value::Array(items) => items.iter().filter_map(id_from_value).collect(),
            single => id_from_value(single).into_iter().collect(),
        }
    }

    /// File name carried by this entry: a plain string for `file` inputs, or
    /// the `file` key of an object-shaped output value.
    pub fn file_name(&self) -> Option<&str> {
        match (&self.kind, &self.value) {
            (ParamKind::File, Value::String(name)) => Some(name),
            (_, Value::Object(map)) => map.get("file").and_then(Value::as_str),
            _ => None,
        }
    }
}

fn id_from_value(value: &Value) -> Option<ExecutionId> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|v| ExecutionId::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A bare file name: exactly one normal path component, so no separators,
/// no `..` and no root.
pub fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!((components.next(), components.next()), (Some(Component::Normal(_)), None))
}

/// Empty or blank text decodes to an empty list.
pub fn parse_params(raw: &str) -> Result<Vec<Param>, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
}

pub fn params_to_json(params: &[Param]) -> Result<String, serde_json::Error> {
    serde_json::to_string(params)
}

/// First output whose value is file-shaped (`{"file": ...}`).
pub fn first_file_output(outputs: &[Param]) -> Option<&str> {
    outputs
        .iter()
        .filter(|p| matches!(p.value, Value::Object(_)))
        .find_map(Param::file_name)
}
