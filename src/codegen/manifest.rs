//! Manifest persistence
//!
//! Saves the linked model as the four manifest files read back by
//! [`crate::manifest`], plus the enum conversion maps used by runtime
//! utilities:
//!
//! - `enum_to_value.yaml`: enum name -> enumerator -> value
//! - `enum_to_string.yaml`: enum name -> enumerators, indexed by value

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};

use crate::error::Result;
use crate::manifest::{ENUMS_FILE, MESSAGES_FILE, MSG_HANDLING_FILE, STRUCTS_FILE};
use crate::model::{EnumDef, LinkedManifest, MessageDef, StructDef};

use super::{Backend, EmitContext};

pub const ENUM_TO_VALUE_FILE: &str = "enum_to_value.yaml";
pub const ENUM_TO_STRING_FILE: &str = "enum_to_string.yaml";

#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestBackend;

impl ManifestBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for ManifestBackend {
    fn name(&self) -> &str {
        "manifest"
    }

    fn emit_enums(&self, ctx: &mut EmitContext, enums: &[EnumDef]) -> Result<()> {
        let path = ctx.manifest_dir().join(ENUMS_FILE);
        ctx.write(path, &serde_yaml::to_string(enums)?)
    }

    fn emit_structs(&self, ctx: &mut EmitContext, structs: &[StructDef]) -> Result<()> {
        let path = ctx.manifest_dir().join(STRUCTS_FILE);
        ctx.write(path, &serde_yaml::to_string(structs)?)
    }

    fn emit_messages(&self, ctx: &mut EmitContext, messages: &[MessageDef]) -> Result<()> {
        let path = ctx.manifest_dir().join(MESSAGES_FILE);
        ctx.write(path, &serde_yaml::to_string(messages)?)
    }

    fn auxiliary(&self, ctx: &mut EmitContext, manifest: &LinkedManifest) -> Result<()> {
        let path = ctx.manifest_dir().join(MSG_HANDLING_FILE);
        ctx.write(path, &serde_yaml::to_string(&manifest.message_handling)?)?;

        let path = ctx.utility_dir().join(ENUM_TO_VALUE_FILE);
        ctx.write(path, &serde_yaml::to_string(&enum_to_value(&manifest.enums))?)?;

        let path = ctx.utility_dir().join(ENUM_TO_STRING_FILE);
        ctx.write(path, &serde_yaml::to_string(&enum_to_string(&manifest.enums))?)
    }
}

/// Enumerator values per enum, in enumerator order
pub fn enum_to_value(enums: &[EnumDef]) -> BTreeMap<&str, Mapping> {
    enums
        .iter()
        .map(|def| {
            let values: Mapping = def
                .enumerators()
                .into_iter()
                .map(|(name, value)| (Value::from(name), Value::from(value)))
                .collect();
            (def.name.as_str(), values)
        })
        .collect()
}

/// Enumerator names per enum; the index of each name is its value
pub fn enum_to_string(enums: &[EnumDef]) -> BTreeMap<&str, Vec<&str>> {
    enums
        .iter()
        .map(|def| {
            let names = def.enumerators().into_iter().map(|(name, _)| name).collect();
            (def.name.as_str(), names)
        })
        .collect()
}
