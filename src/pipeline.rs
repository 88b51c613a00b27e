//! Compiler pipeline
//!
//! load -> validate -> synthesize -> link. Nothing here writes a file: the
//! result is either a frozen [`LinkedManifest`] or every diagnostic that
//! prevented one. Emission is driven separately by [`crate::codegen::Generator`],
//! which can only be built from a successful link.

use tracing::{info, warn};

use crate::config::CompilerConfig;
use crate::error::{CompileError, Diagnostics, Result};
use crate::link::link;
use crate::model::LinkedManifest;
use crate::schema::{SchemaDocument, SchemaKind, SchemaSet};
use crate::synth::Synthesizer;
use crate::validate::{check_cross_kind_collisions, check_duplicates, ShapeValidator};

/// The three input documents of one compilation
#[derive(Debug, Clone)]
pub struct SchemaDocuments {
    pub messages: SchemaDocument,
    pub enums: SchemaDocument,
    pub structs: SchemaDocument,
}

impl SchemaDocuments {
    /// Load the documents named by the `input` section
    pub fn load(config: &CompilerConfig) -> Result<Self> {
        Ok(Self {
            messages: SchemaDocument::load(SchemaKind::Message, &config.input.messages)?,
            enums: SchemaDocument::load(SchemaKind::Enum, &config.input.enums)?,
            structs: SchemaDocument::load(SchemaKind::Struct, &config.input.structs)?,
        })
    }

    pub fn from_yaml(messages: &str, enums: &str, structs: &str) -> Result<Self> {
        Ok(Self {
            messages: SchemaDocument::from_yaml_str(SchemaKind::Message, "messages", messages)?,
            enums: SchemaDocument::from_yaml_str(SchemaKind::Enum, "enums", enums)?,
            structs: SchemaDocument::from_yaml_str(SchemaKind::Struct, "structs", structs)?,
        })
    }

    /// Documents in validation order
    pub fn all(&self) -> [&SchemaDocument; 3] {
        [&self.messages, &self.enums, &self.structs]
    }
}

/// Load and compile the configured schema documents
pub fn compile(config: &CompilerConfig) -> std::result::Result<LinkedManifest, Diagnostics> {
    let documents = SchemaDocuments::load(config)?;
    compile_documents(&documents, config)
}

/// Compile already-loaded documents
pub fn compile_documents(
    documents: &SchemaDocuments,
    config: &CompilerConfig,
) -> std::result::Result<LinkedManifest, Diagnostics> {
    let validator = ShapeValidator::new()?;
    let report = validator.validate_documents(&documents.all());
    for doc in &report.documents {
        if doc.is_valid() {
            info!(source = %doc.source, "valid");
        } else {
            warn!(source = %doc.source, entries = doc.entries.len(), "invalid");
        }
    }
    if !report.is_valid() {
        return Err(CompileError::InvalidShape(report).into());
    }

    let set = SchemaSet {
        enums: documents.enums.typed()?,
        structs: documents.structs.typed()?,
        messages: documents.messages.typed()?,
    };
    check_names(&set)?;
    info!("schemas validated");

    let synth = Synthesizer::new(config)?.synthesize(&set)?;
    info!("schemas synthesized");

    let manifest = link(&synth, config)?;
    info!(fingerprint = %manifest.fingerprint()?, "schemas linked");
    Ok(manifest)
}

/// Abort on the first name clash, within or across kinds
fn check_names(set: &SchemaSet) -> Result<()> {
    let enums: Vec<&str> = set.enums.iter().map(|e| e.name.as_str()).collect();
    let structs: Vec<&str> = set.structs.iter().map(|s| s.name.as_str()).collect();
    let messages: Vec<&str> = set.messages.iter().map(|m| m.name.as_str()).collect();

    check_duplicates(SchemaKind::Message, messages.iter().copied())?;
    check_duplicates(SchemaKind::Enum, enums.iter().copied())?;
    check_duplicates(SchemaKind::Struct, structs.iter().copied())?;
    check_cross_kind_collisions(&enums, &structs, &messages)
}
