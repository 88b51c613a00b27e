//! Schema Validator
//!
//! Checks the shape of every raw entry against a fixed model per kind and
//! detects duplicate names. Cross-references are not checked here; that is the
//! linker's job.
//!
//! Shape errors are batched: every entry of every document is checked and the
//! full report is returned before anything decides to abort.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{CompileError, Result};
use crate::schema::{entry_name, SchemaDocument, SchemaKind};

/// Shape errors for a single entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryErrors {
    /// Index of the entry within its document
    pub index: usize,
    /// Entry name, when it has one
    pub name: Option<String>,
    pub errors: Vec<String>,
}

/// Shape validation result for one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReport {
    pub kind: SchemaKind,
    pub source: String,
    pub entries: Vec<EntryErrors>,
}

impl DocumentReport {
    pub fn is_valid(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shape validation result for a whole schema set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub documents: Vec<DocumentReport>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.documents.iter().all(DocumentReport::is_valid)
    }

    pub fn error_count(&self) -> usize {
        self.documents
            .iter()
            .flat_map(|d| &d.entries)
            .map(|e| e.errors.len())
            .sum()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for doc in &self.documents {
            let status = if doc.is_valid() { "valid" } else { "invalid" };
            writeln!(f, "   {}: {}", doc.source, status)?;
            for entry in &doc.entries {
                match &entry.name {
                    Some(name) => writeln!(f, "     entry #{} ({}):", entry.index, name)?,
                    None => writeln!(f, "     entry #{}:", entry.index)?,
                }
                for error in &entry.errors {
                    writeln!(f, "       - {}", error)?;
                }
            }
        }
        Ok(())
    }
}

/// Validates raw entries against the per-kind shape models
pub struct ShapeValidator {
    models: HashMap<SchemaKind, JSONSchema>,
}

impl ShapeValidator {
    pub fn new() -> Result<Self> {
        let mut models = HashMap::new();
        for kind in SchemaKind::ALL {
            let model = shape_model(kind);
            let compiled = JSONSchema::options()
                .with_draft(Draft::Draft7)
                .compile(&model)
                .map_err(|e| CompileError::Manifest(format!("invalid {} shape model: {}", kind, e)))?;
            models.insert(kind, compiled);
        }
        Ok(Self { models })
    }

    /// Check every entry of `entries` against the shape for `kind`.
    ///
    /// Returns `(ok, errors-per-entry)`; only entries with errors are listed.
    pub fn validate(&self, kind: SchemaKind, entries: &[Value]) -> (bool, Vec<EntryErrors>) {
        let Some(model) = self.models.get(&kind) else {
            return (false, Vec::new());
        };

        let mut report = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            if let Err(errors) = model.validate(entry) {
                let errors: Vec<String> = errors
                    .map(|e| {
                        let path = e.instance_path.to_string();
                        if path.is_empty() {
                            e.to_string()
                        } else {
                            format!("{}: {}", path, e)
                        }
                    })
                    .collect();
                report.push(EntryErrors {
                    index,
                    name: entry_name(kind, entry).map(str::to_string),
                    errors,
                });
            }
        }
        (report.is_empty(), report)
    }

    /// Validate whole documents, collecting every error
    pub fn validate_documents(&self, documents: &[&SchemaDocument]) -> ValidationReport {
        let documents = documents
            .iter()
            .map(|doc| {
                let (ok, entries) = self.validate(doc.kind, &doc.entries);
                debug!(source = %doc.source, ok, "shape checked");
                DocumentReport {
                    kind: doc.kind,
                    source: doc.source.clone(),
                    entries,
                }
            })
            .collect();
        ValidationReport { documents }
    }
}

/// Names occurring more than once, sorted
pub fn duplicate_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            duplicates.insert(name.to_string());
        }
    }
    duplicates.into_iter().collect()
}

/// Fail if any name occurs more than once within `kind`
pub fn check_duplicates<'a>(kind: SchemaKind, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let names = duplicate_names(names);
    if names.is_empty() {
        Ok(())
    } else {
        Err(CompileError::DuplicateNames { kind, names })
    }
}

/// Fail if a name is declared in more than one kind.
///
/// Member types are resolved by name alone, so a name shared between kinds
/// would be ambiguous.
pub fn check_cross_kind_collisions(enums: &[&str], structs: &[&str], messages: &[&str]) -> Result<()> {
    let tables = [
        (SchemaKind::Enum, enums),
        (SchemaKind::Struct, structs),
        (SchemaKind::Message, messages),
    ];
    for (i, (first_kind, first)) in tables.iter().enumerate() {
        for (second_kind, second) in &tables[i + 1..] {
            if let Some(name) = first.iter().find(|name| second.contains(name)) {
                return Err(CompileError::CrossKindCollision {
                    name: name.to_string(),
                    first: *first_kind,
                    second: *second_kind,
                });
            }
        }
    }
    Ok(())
}

fn members_model() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "additionalProperties": false,
            "required": ["name", "type"],
            "properties": {
                "name": { "type": "string" },
                "type": { "type": "string" },
                "default": { "type": ["boolean", "number", "string"] }
            }
        }
    })
}

fn composite_model() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["name"],
        "properties": {
            "name": { "type": "string" },
            "namespace": { "type": "string" },
            "inherit": {
                "type": "object",
                "additionalProperties": false,
                "required": ["name"],
                "properties": { "name": { "type": "string" } }
            },
            "members": members_model()
        }
    })
}

fn string_list() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

/// JSON-Schema model for one entry of `kind`
pub fn shape_model(kind: SchemaKind) -> Value {
    let body = match kind {
        SchemaKind::Message | SchemaKind::Struct => composite_model(),
        SchemaKind::Enum => json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["name", "list"],
            "properties": {
                "name": { "type": "string" },
                "namespace": { "type": "string" },
                "type": { "type": "string" },
                "list": string_list(),
                "brief_list": string_list(),
                "elaboration_list": string_list()
            }
        }),
    };
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": [kind.key()],
        "properties": { kind.key(): body }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(yaml: &str, kind: SchemaKind) -> Vec<Value> {
        SchemaDocument::from_yaml_str(kind, "inline", yaml).unwrap().entries
    }

    #[test]
    fn test_valid_entries() {
        let validator = ShapeValidator::new().unwrap();
        let enums = entries(
            "- enum: { name: Mode, list: [A, B], brief_list: [a, b] }",
            SchemaKind::Enum,
        );
        let (ok, errors) = validator.validate(SchemaKind::Enum, &enums);
        assert!(ok);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_collects_all_shape_errors() {
        let validator = ShapeValidator::new().unwrap();
        let structs = entries(
            r#"
- struct: { name: Good }
- struct: { members: [ { name: x } ] }
- struct: { name: Typo, memebers: [] }
"#,
            SchemaKind::Struct,
        );
        let (ok, errors) = validator.validate(SchemaKind::Struct, &structs);
        assert!(!ok);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].index, 1);
        assert!(errors[0].name.is_none());
        // missing struct name and missing member type
        assert!(errors[0].errors.len() >= 2);
        assert_eq!(errors[1].name.as_deref(), Some("Typo"));
    }

    #[test]
    fn test_wrong_wrapper_key_is_rejected() {
        let validator = ShapeValidator::new().unwrap();
        let messages = entries("- struct: { name: NotAMessage }", SchemaKind::Message);
        let (ok, _) = validator.validate(SchemaKind::Message, &messages);
        assert!(!ok);
    }

    #[test]
    fn test_duplicate_names() {
        assert_eq!(duplicate_names(["A", "B", "A", "C", "B"]), vec!["A", "B"]);
        assert!(check_duplicates(SchemaKind::Enum, ["A", "B"]).is_ok());
        assert!(matches!(
            check_duplicates(SchemaKind::Enum, ["Mode", "Mode"]),
            Err(CompileError::DuplicateNames { kind: SchemaKind::Enum, .. })
        ));
    }

    #[test]
    fn test_cross_kind_collision() {
        assert!(check_cross_kind_collisions(&["Mode"], &["Pose"], &["Report"]).is_ok());
        let err = check_cross_kind_collisions(&["Pose"], &["Pose"], &[]).unwrap_err();
        assert!(matches!(
            err,
            CompileError::CrossKindCollision { first: SchemaKind::Enum, second: SchemaKind::Struct, .. }
        ));
    }
}
