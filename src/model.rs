//! Linked schema model
//!
//! These are the frozen, fully resolved definitions handed to backends. They
//! are produced by the linker and never mutated afterwards.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::schema::DefaultValue;

/// Numeric primitive member types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumericType {
    #[serde(rename = "uint8_t")]
    U8,
    #[serde(rename = "uint16_t")]
    U16,
    #[serde(rename = "uint32_t")]
    U32,
    #[serde(rename = "uint64_t")]
    U64,
    #[serde(rename = "int8_t")]
    I8,
    #[serde(rename = "int16_t")]
    I16,
    #[serde(rename = "int32_t")]
    I32,
    #[serde(rename = "int64_t")]
    I64,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "double")]
    Double,
    #[serde(rename = "bool")]
    Bool,
}

impl NumericType {
    pub fn parse(token: &str) -> Option<Self> {
        let ty = match token {
            "uint8_t" => NumericType::U8,
            "uint16_t" => NumericType::U16,
            "uint32_t" => NumericType::U32,
            "uint64_t" => NumericType::U64,
            "int8_t" => NumericType::I8,
            "int16_t" => NumericType::I16,
            "int32_t" => NumericType::I32,
            "int64_t" => NumericType::I64,
            "float" => NumericType::Float,
            "double" => NumericType::Double,
            "bool" => NumericType::Bool,
            _ => return None,
        };
        Some(ty)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NumericType::U8 => "uint8_t",
            NumericType::U16 => "uint16_t",
            NumericType::U32 => "uint32_t",
            NumericType::U64 => "uint64_t",
            NumericType::I8 => "int8_t",
            NumericType::I16 => "int16_t",
            NumericType::I32 => "int32_t",
            NumericType::I64 => "int64_t",
            NumericType::Float => "float",
            NumericType::Double => "double",
            NumericType::Bool => "bool",
        }
    }

    /// Encoded size in bytes
    pub fn size(&self) -> usize {
        match self {
            NumericType::U8 | NumericType::I8 | NumericType::Bool => 1,
            NumericType::U16 | NumericType::I16 => 2,
            NumericType::U32 | NumericType::I32 | NumericType::Float => 4,
            NumericType::U64 | NumericType::I64 | NumericType::Double => 8,
        }
    }

    /// Inclusive value range, for fixed-width integers only
    pub fn integer_range(&self) -> Option<(i128, i128)> {
        let bits = self.integer_bits()?;
        let range = match self {
            NumericType::I8 | NumericType::I16 | NumericType::I32 | NumericType::I64 => {
                (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
            }
            _ => (0, (1i128 << bits) - 1),
        };
        Some(range)
    }

    /// Bit width, for fixed-width integers only
    pub fn integer_bits(&self) -> Option<u32> {
        match self {
            NumericType::U8 | NumericType::I8 => Some(8),
            NumericType::U16 | NumericType::I16 => Some(16),
            NumericType::U32 | NumericType::I32 => Some(32),
            NumericType::U64 | NumericType::I64 => Some(64),
            NumericType::Float | NumericType::Double | NumericType::Bool => None,
        }
    }
}

impl fmt::Display for NumericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File metadata synthesized for every entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    /// File identifier, e.g. `pose_report_message`
    pub name: String,
    /// Path relative to the include root, without extension
    pub path: String,
    pub extension: String,
    pub include_guard: String,
    /// Included files (`path + extension` of dependencies), first-seen order
    #[serde(default)]
    pub includes: Vec<String>,
}

impl FileMeta {
    /// `path + extension`
    pub fn file_path(&self) -> String {
        format!("{}{}", self.path, self.extension)
    }

    pub(crate) fn add_include(&mut self, include: String) {
        if !self.includes.contains(&include) {
            self.includes.push(include);
        }
    }
}

/// An enumerate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Storage type (an integer `NumericType`)
    pub storage: NumericType,
    /// Declared enumerators, in order
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elaboration_list: Option<Vec<String>>,
    pub file: FileMeta,
}

impl EnumDef {
    /// Reserved first enumerator
    pub const UNKNOWN: &'static str = "Unknown";
    /// Reserved trailing sentinel
    pub const COUNT: &'static str = "Count";

    /// All enumerators with their values: `Unknown = 0`, the declared values
    /// from 1, then `Count = N + 1`
    pub fn enumerators(&self) -> Vec<(&str, u64)> {
        let mut out = Vec::with_capacity(self.values.len() + 2);
        out.push((Self::UNKNOWN, 0));
        for (i, value) in self.values.iter().enumerate() {
            out.push((value.as_str(), i as u64 + 1));
        }
        out.push((Self::COUNT, self.values.len() as u64 + 1));
        out
    }

    /// Value of a declared enumerator
    pub fn value_of(&self, enumerator: &str) -> Option<u64> {
        self.values
            .iter()
            .position(|v| v == enumerator)
            .map(|i| i as u64 + 1)
    }
}

/// What a member's type resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "numeric")]
pub enum MemberKind {
    Numeric(NumericType),
    Enum,
    Struct,
}

/// A resolved member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDef {
    pub name: String,
    /// Type name with any array suffix stripped
    #[serde(rename = "type")]
    pub type_name: String,
    /// 0 for scalars
    #[serde(default)]
    pub array_len: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    pub kind: MemberKind,
    /// Namespace of the enum or struct the type resolved to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_namespace: Option<String>,
}

impl MemberDef {
    pub fn is_array(&self) -> bool {
        self.array_len > 0
    }
}

/// A plain structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Resolved parent; `None` only for the universal root struct
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_namespace: Option<String>,
    pub members: Vec<MemberDef>,
    pub file: FileMeta,
    /// Set when this struct is the implicit twin of a message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twin_of: Option<String>,
}

/// A bus message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Parent message; `None` only for the abstract root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_namespace: Option<String>,
    pub members: Vec<MemberDef>,
    pub file: FileMeta,
    /// Another message inherits from this one
    pub has_children: bool,
    /// Name of the twin struct; `None` only for the abstract root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twin: Option<String>,
}

impl MessageDef {
    pub fn is_root(&self) -> bool {
        self.twin.is_none()
    }
}

/// Message-handling view: the id registry plus every concrete message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHandling {
    pub message_id: EnumDef,
    pub messages: Vec<MessageDef>,
}

/// The fully linked schema set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedManifest {
    /// Declared enums, then the message-id registry
    pub enums: Vec<EnumDef>,
    /// Declared structs, then message twins
    pub structs: Vec<StructDef>,
    /// Messages in declaration order, including the root
    pub messages: Vec<MessageDef>,
    pub message_handling: MessageHandling,
}

impl LinkedManifest {
    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enums.iter().find(|e| e.name == name)
    }

    pub fn struct_def(&self, name: &str) -> Option<&StructDef> {
        self.structs.iter().find(|s| s.name == name)
    }

    pub fn message_def(&self, name: &str) -> Option<&MessageDef> {
        self.messages.iter().find(|m| m.name == name)
    }

    /// Messages excluding the abstract root
    pub fn concrete_messages(&self) -> impl Iterator<Item = &MessageDef> {
        self.messages.iter().filter(|m| !m.is_root())
    }

    /// Registry value of a concrete message
    pub fn message_id(&self, name: &str) -> Option<u64> {
        self.message_handling.message_id.value_of(name)
    }

    /// Every file a generated file includes, directly or transitively
    pub fn transitive_includes(&self, file_path: &str) -> BTreeSet<String> {
        let direct: HashMap<String, &[String]> = self
            .enums
            .iter()
            .map(|e| &e.file)
            .chain(self.structs.iter().map(|s| &s.file))
            .chain(self.messages.iter().map(|m| &m.file))
            .map(|f| (f.file_path(), f.includes.as_slice()))
            .collect();

        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = direct
            .get(file_path)
            .map(|incs| incs.iter().map(String::as_str).collect())
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            if seen.insert(next.to_string()) {
                if let Some(incs) = direct.get(next) {
                    stack.extend(incs.iter().map(String::as_str));
                }
            }
        }
        seen
    }

    /// SHA-256 of the canonical JSON serialisation
    pub fn fingerprint(&self) -> Result<String> {
        let canonical = serde_json::to_vec(self)?;
        Ok(format!("{:x}", Sha256::digest(&canonical)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> FileMeta {
        FileMeta {
            name: path.rsplit('/').next().unwrap().to_string(),
            path: path.to_string(),
            extension: ".h".to_string(),
            include_guard: String::new(),
            includes: Vec::new(),
        }
    }

    #[test]
    fn test_enumerators() {
        let def = EnumDef {
            name: "MessageId".to_string(),
            namespace: None,
            storage: NumericType::U16,
            values: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            brief_list: None,
            elaboration_list: None,
            file: file("common_msg/enums/message_id"),
        };
        assert_eq!(
            def.enumerators(),
            vec![("Unknown", 0), ("A", 1), ("B", 2), ("C", 3), ("Count", 4)]
        );
        assert_eq!(def.value_of("B"), Some(2));
        assert_eq!(def.value_of("Unknown"), None);
    }

    #[test]
    fn test_add_include_dedups() {
        let mut meta = file("common_msg/structs/pose");
        meta.add_include("a.h".to_string());
        meta.add_include("b.h".to_string());
        meta.add_include("a.h".to_string());
        assert_eq!(meta.includes, vec!["a.h", "b.h"]);
    }

    #[test]
    fn test_numeric_type_parse() {
        assert_eq!(NumericType::parse("uint16_t"), Some(NumericType::U16));
        assert_eq!(NumericType::parse("double"), Some(NumericType::Double));
        assert_eq!(NumericType::parse("Vector3"), None);
        assert_eq!(NumericType::Float.integer_bits(), None);
        assert_eq!(NumericType::I32.size(), 4);
    }

    #[test]
    fn test_integer_range() {
        assert_eq!(NumericType::I8.integer_range(), Some((-128, 127)));
        assert_eq!(NumericType::U8.integer_range(), Some((0, 255)));
        assert_eq!(NumericType::U64.integer_range(), Some((0, u64::MAX as i128)));
        assert_eq!(NumericType::Double.integer_range(), None);
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let registry = EnumDef {
            name: "MessageId".to_string(),
            namespace: None,
            storage: NumericType::U16,
            values: Vec::new(),
            brief_list: None,
            elaboration_list: None,
            file: file("common_msg/enums/message_id"),
        };
        let mut manifest = LinkedManifest {
            enums: vec![registry.clone()],
            structs: Vec::new(),
            messages: Vec::new(),
            message_handling: MessageHandling {
                message_id: registry,
                messages: Vec::new(),
            },
        };
        let fingerprint = manifest.fingerprint().unwrap();
        assert_eq!(fingerprint.len(), 64);
        assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(manifest.fingerprint().unwrap(), fingerprint);

        manifest.enums[0].storage = NumericType::U8;
        assert_ne!(manifest.fingerprint().unwrap(), fingerprint);
    }

    #[test]
    fn test_member_kind_serialization() {
        let yaml = serde_yaml::to_string(&MemberKind::Numeric(NumericType::Float)).unwrap();
        assert!(yaml.contains("numeric"));
        let back: MemberKind = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, MemberKind::Numeric(NumericType::Float));
    }
}
