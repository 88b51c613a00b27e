//! Error types for the schema compiler

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::schema::SchemaKind;
use crate::validate::ValidationReport;

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;

/// Schema compiler errors
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Schema documents failed shape validation:\n{0}")]
    InvalidShape(ValidationReport),

    #[error("{kind} schema contains duplicate entries: {}", names.join(", "))]
    DuplicateNames { kind: SchemaKind, names: Vec<String> },

    #[error("'{name}' is declared both as {first} and as {second}")]
    CrossKindCollision {
        name: String,
        first: SchemaKind,
        second: SchemaKind,
    },

    #[error("Invalid array size for {entity}::{member}: expecting an integer > 0 (no sign), got '{received}'")]
    InvalidArrayLength {
        entity: String,
        member: String,
        received: String,
    },

    #[error("Invalid data type for {entity}::{member}, received: {received}")]
    UnresolvedType {
        entity: String,
        member: String,
        received: String,
    },

    #[error("Invalid default for {entity}::{member}: '{received}' does not fit type {expected}")]
    InvalidDefault {
        entity: String,
        member: String,
        expected: String,
        received: String,
    },

    #[error("{kind} {entity} inherits from unknown {kind} '{parent}'")]
    UnknownParent {
        kind: SchemaKind,
        entity: String,
        parent: String,
    },

    #[error("Message {entity} does not inherit from the root message {root}")]
    NotABusMessage { entity: String, root: String },

    #[error("{kind} inheritance cycle: {}", entities.join(" -> "))]
    InheritanceCycle {
        kind: SchemaKind,
        entities: Vec<String>,
    },

    #[error("Include dependency cycle: {}", files.join(" -> "))]
    DependencyCycle { files: Vec<String> },

    #[error("Enumerate {entity} has duplicate entries in enumerate list: {}", values.join(", "))]
    DuplicateEnumValues { entity: String, values: Vec<String> },

    #[error("Enumerate {entity} declares reserved enumerator '{value}'")]
    ReservedEnumerator { entity: String, value: String },

    #[error("Enumerate {entity} defined {list} with {got} entries, which does not match list length {expected}")]
    ListLengthMismatch {
        entity: String,
        list: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Expecting fixed-width integer enumerate type (u/int<8,16,32,64>_t) for {entity} but got {received}")]
    InvalidEnumType { entity: String, received: String },

    #[error("Enumerate {entity} type does not fit list: {count} entries (Count = {}) need at least {required} but got {declared}", count + 1)]
    EnumTypeTooSmall {
        entity: String,
        count: usize,
        required: String,
        declared: String,
    },

    #[error("{entity} declares member '{member}' more than once")]
    DuplicateMember { entity: String, member: String },

    #[error("Output file {path} would be generated by both {first} and {second}")]
    FileCollision {
        path: String,
        first: String,
        second: String,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Malformed manifest: {0}")]
    Manifest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlValue(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid CRC polynomial '{0}': expecting 0x followed by a leading 1 and 32 hex bits")]
    InvalidPolynomial(String),
}

/// Errors collected while running a compiler pass.
///
/// Passes keep going after the first error so a single run reports every
/// problem; the pass result is only `Ok` when nothing was collected.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<CompileError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: CompileError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.errors.extend(other.errors);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<CompileError> {
        self.errors
    }

    /// `Ok(value)` when no errors were collected
    pub fn into_result<T>(self, value: T) -> std::result::Result<T, Diagnostics> {
        if self.has_errors() {
            Err(self)
        } else {
            Ok(value)
        }
    }
}

impl From<CompileError> for Diagnostics {
    fn from(error: CompileError) -> Self {
        Self { errors: vec![error] }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "ERROR! {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}
