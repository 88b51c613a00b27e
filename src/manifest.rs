//! Persisted manifest
//!
//! The linked model is saved as four YAML files by
//! [`crate::codegen::manifest::ManifestBackend`], the authoritative compiled
//! artifact for downstream tools. [`expected_output_files`] reads them back to
//! list every header a generation run produces.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use walkdir::WalkDir;

use crate::error::{CompileError, Result};
use crate::model::{EnumDef, LinkedManifest, MessageDef, MessageHandling, StructDef};

pub const MESSAGES_FILE: &str = "bus_object_schema_final.yaml";
pub const STRUCTS_FILE: &str = "structs_schema_final.yaml";
pub const ENUMS_FILE: &str = "enumerates_schema_final.yaml";
pub const MSG_HANDLING_FILE: &str = "msg_handling_schema_final.yaml";

/// Every file a manifest directory must hold
pub const MANIFEST_FILES: [&str; 4] = [MESSAGES_FILE, STRUCTS_FILE, ENUMS_FILE, MSG_HANDLING_FILE];

/// Read a persisted manifest back
pub fn read_manifest(manifest_dir: &Path) -> Result<LinkedManifest> {
    if !manifest_dir.is_dir() {
        return Err(CompileError::Manifest(format!(
            "manifest directory does not exist, try running code generation (looked in {})",
            manifest_dir.display()
        )));
    }

    let found = WalkDir::new(manifest_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count();
    if found != MANIFEST_FILES.len() {
        return Err(CompileError::Manifest(format!(
            "expected to find exactly {} manifest files, instead found {}",
            MANIFEST_FILES.len(),
            found
        )));
    }

    let messages: Vec<MessageDef> = read_yaml(&manifest_dir.join(MESSAGES_FILE))?;
    let structs: Vec<StructDef> = read_yaml(&manifest_dir.join(STRUCTS_FILE))?;
    let enums: Vec<EnumDef> = read_yaml(&manifest_dir.join(ENUMS_FILE))?;
    let message_handling: MessageHandling = read_yaml(&manifest_dir.join(MSG_HANDLING_FILE))?;

    Ok(LinkedManifest {
        enums,
        structs,
        messages,
        message_handling,
    })
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|source| CompileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| CompileError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Absolute paths of every header described by the manifest, sorted and
/// de-duplicated
pub fn expected_output_files(manifest_dir: &Path, include_dir: &Path) -> Result<Vec<PathBuf>> {
    let manifest = read_manifest(manifest_dir)?;
    let root = if include_dir.is_absolute() {
        include_dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(include_dir)
    };

    let files: BTreeSet<PathBuf> = manifest
        .messages
        .iter()
        .map(|m| &m.file)
        .chain(manifest.enums.iter().map(|e| &e.file))
        .chain(manifest.structs.iter().map(|s| &s.file))
        .chain(std::iter::once(&manifest.message_handling.message_id.file))
        .chain(manifest.message_handling.messages.iter().map(|m| &m.file))
        .map(|f| root.join(f.file_path()))
        .collect();

    Ok(files.into_iter().collect())
}
