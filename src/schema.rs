//! Raw schema entries and document loading
//!
//! A schema document is a YAML sequence of single-key maps, one document per
//! kind:
//!
//! ```yaml
//! - enum:
//!     name: FlightMode
//!     list: [Idle, Hover, Cruise]
//! - struct:
//!     name: Vector3
//!     members:
//!       - { name: xyz, type: "float[3]" }
//! - class:
//!     name: PoseReport
//!     inherit: { name: BusObject }
//! ```
//!
//! Documents are loaded as untyped values so the validator can report every
//! shape problem at once; only validated entries are converted to the typed
//! `Raw*` structures below.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CompileError, Result};

/// The three entity kinds a schema document can describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    Enum,
    Struct,
    /// Bus messages, spelled `class` in schema documents
    Message,
}

impl SchemaKind {
    pub const ALL: [SchemaKind; 3] = [SchemaKind::Message, SchemaKind::Enum, SchemaKind::Struct];

    /// The key wrapping each entry in a schema document
    pub fn key(&self) -> &'static str {
        match self {
            SchemaKind::Enum => "enum",
            SchemaKind::Struct => "struct",
            SchemaKind::Message => "class",
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaKind::Enum => write!(f, "enum"),
            SchemaKind::Struct => write!(f, "struct"),
            SchemaKind::Message => write!(f, "message"),
        }
    }
}

/// Parent reference (`inherit: { name: ... }`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Inherit {
    pub name: String,
}

/// Default value of a member, as written in the schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Bool(b) => write!(f, "{}", b),
            DefaultValue::Int(i) => write!(f, "{}", i),
            DefaultValue::Float(x) => write!(f, "{:?}", x),
            DefaultValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A struct or message member before array parsing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMember {
    pub name: String,
    /// Bare type name or `Type[N]`
    #[serde(rename = "type")]
    pub type_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
}

/// An `enum` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawEnum {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Explicit storage type, e.g. `uint16_t`
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    pub list: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elaboration_list: Option<Vec<String>>,
}

/// A `struct` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawStruct {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherit: Option<Inherit>,
    #[serde(default)]
    pub members: Vec<RawMember>,
}

/// A `class` (bus message) entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMessage {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherit: Option<Inherit>,
    #[serde(default)]
    pub members: Vec<RawMember>,
}

impl RawMessage {
    pub fn parent(&self) -> Option<&str> {
        self.inherit.as_ref().map(|i| i.name.as_str())
    }
}

impl RawStruct {
    pub fn parent(&self) -> Option<&str> {
        self.inherit.as_ref().map(|i| i.name.as_str())
    }
}

/// An untyped schema document, as loaded from disk
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    pub kind: SchemaKind,
    /// Where the document came from (for diagnostics)
    pub source: String,
    pub entries: Vec<Value>,
}

impl SchemaDocument {
    /// Load a YAML schema document.
    ///
    /// A document that is not a sequence is kept as a single malformed entry so
    /// the validator reports it alongside every other shape error.
    pub fn load(kind: SchemaKind, path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| CompileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(kind, path.display().to_string(), &content).map_err(|e| match e {
            CompileError::YamlValue(source) => CompileError::Yaml {
                path: PathBuf::from(path),
                source,
            },
            other => other,
        })
    }

    /// Parse a document from YAML text
    pub fn from_yaml_str(kind: SchemaKind, source: impl Into<String>, yaml: &str) -> Result<Self> {
        let parsed: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let value = serde_json::to_value(parsed)?;
        let entries = match value {
            Value::Array(entries) => entries,
            other => vec![other],
        };
        Ok(Self {
            kind,
            source: source.into(),
            entries,
        })
    }

    /// Entry names in declaration order (entries without a string name are skipped)
    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|entry| entry_name(self.kind, entry))
            .map(str::to_string)
            .collect()
    }

    /// Typed view of a validated document
    pub fn typed<T: for<'de> Deserialize<'de>>(&self) -> Result<Vec<T>> {
        self.entries
            .iter()
            .map(|entry| {
                let inner = entry.get(self.kind.key()).cloned().unwrap_or(Value::Null);
                serde_json::from_value(inner).map_err(CompileError::from)
            })
            .collect()
    }
}

/// The `name` of an entry, if it has one
pub fn entry_name(kind: SchemaKind, entry: &Value) -> Option<&str> {
    entry.get(kind.key())?.get("name")?.as_str()
}

/// The three typed documents of a schema set, after validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaSet {
    pub enums: Vec<RawEnum>,
    pub structs: Vec<RawStruct>,
    pub messages: Vec<RawMessage>,
}
