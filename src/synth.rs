//! Metadata Synthesizer
//!
//! Per-entity derived values, computed before linking:
//! - file identifiers and include guards
//! - enum storage widths
//! - array lengths parsed out of member type tokens
//! - the implicit twin struct of every concrete message
//! - the `MessageId` registry
//!
//! Every error is collected; the pass fails only after all entities have
//! been processed.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use tracing::debug;

use crate::config::{CompilerConfig, LayoutConfig, ModelConfig};
use crate::error::{CompileError, Diagnostics};
use crate::model::{EnumDef, FileMeta, NumericType};
use crate::names::{file_name, include_guard};
use crate::schema::{DefaultValue, RawEnum, RawMember, SchemaKind, SchemaSet};
use crate::validate::{check_cross_kind_collisions, duplicate_names};

/// A member with its array suffix parsed, not yet type-resolved
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDraft {
    pub name: String,
    pub type_name: String,
    pub array_len: usize,
    pub default: Option<DefaultValue>,
}

/// A struct or message awaiting linking
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeDraft {
    pub name: String,
    pub namespace: Option<String>,
    /// Parent as declared
    pub parent: Option<String>,
    pub members: Vec<MemberDraft>,
    pub file: FileMeta,
    /// For twin structs, the message they mirror
    pub twin_of: Option<String>,
}

/// Output of the synthesis pass
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesized {
    /// Declared enums followed by the message-id registry
    pub enums: Vec<EnumDef>,
    /// Declared structs followed by message twins
    pub structs: Vec<CompositeDraft>,
    pub messages: Vec<CompositeDraft>,
}

impl Synthesized {
    pub fn registry(&self, model: &ModelConfig) -> Option<&EnumDef> {
        self.enums.iter().rev().find(|e| e.name == model.message_id_enum)
    }
}

/// Smallest unsigned type that can index `count` enumerators
pub fn minimum_storage(count: usize) -> NumericType {
    let count = count as u64;
    if count < 0xFF {
        NumericType::U8
    } else if count < 0xFFFF {
        NumericType::U16
    } else if count < 0xFFFF_FFFF {
        NumericType::U32
    } else {
        NumericType::U64
    }
}

pub struct Synthesizer<'a> {
    layout: &'a LayoutConfig,
    model: &'a ModelConfig,
    array_pattern: Regex,
}

impl<'a> Synthesizer<'a> {
    pub fn new(config: &'a CompilerConfig) -> Result<Self, CompileError> {
        Ok(Self {
            layout: &config.layout,
            model: &config.model,
            array_pattern: Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*\[([+\-A-Za-z0-9_]*)\]\s*$")?,
        })
    }

    pub fn synthesize(&self, schemas: &SchemaSet) -> Result<Synthesized, Diagnostics> {
        let mut diagnostics = Diagnostics::new();

        let mut messages = Vec::with_capacity(schemas.messages.len());
        let mut twins = Vec::new();
        let mut registry_values = Vec::new();

        for raw in &schemas.messages {
            let members = self.members(&raw.name, &raw.members, &mut diagnostics);
            let file = self.file_meta(
                &self.layout.messages,
                &format!("{}{}", file_name(&raw.name), self.model.message_file_suffix),
            );

            if raw.name != self.model.root_message {
                registry_values.push(raw.name.clone());
                twins.push(CompositeDraft {
                    name: raw.name.clone(),
                    namespace: raw.namespace.clone(),
                    parent: raw.parent().map(str::to_string),
                    members: members.clone(),
                    file: self.file_meta(&self.layout.structs, &file_name(&raw.name)),
                    twin_of: Some(raw.name.clone()),
                });
            }

            messages.push(CompositeDraft {
                name: raw.name.clone(),
                namespace: raw.namespace.clone(),
                parent: raw.parent().map(str::to_string),
                members,
                file,
                twin_of: None,
            });
        }

        let mut structs = Vec::with_capacity(schemas.structs.len() + twins.len());
        for raw in &schemas.structs {
            structs.push(CompositeDraft {
                name: raw.name.clone(),
                namespace: raw.namespace.clone(),
                parent: raw.parent().map(str::to_string),
                members: self.members(&raw.name, &raw.members, &mut diagnostics),
                file: self.file_meta(&self.layout.structs, &file_name(&raw.name)),
                twin_of: None,
            });
        }
        structs.extend(twins);

        let registry = RawEnum {
            name: self.model.message_id_enum.clone(),
            namespace: None,
            storage: Some(self.model.message_id_type.clone()),
            list: registry_values,
            brief_list: None,
            elaboration_list: None,
        };
        let enums: Vec<EnumDef> = schemas
            .enums
            .iter()
            .chain(std::iter::once(&registry))
            .filter_map(|raw| self.enum_def(raw, &mut diagnostics))
            .collect();

        for (kind, names) in [
            (SchemaKind::Enum, enums.iter().map(|e| e.name.as_str()).collect::<Vec<_>>()),
            (SchemaKind::Struct, structs.iter().map(|s| s.name.as_str()).collect()),
        ] {
            let names = duplicate_names(names);
            if !names.is_empty() {
                diagnostics.push(CompileError::DuplicateNames { kind, names });
            }
        }

        // the registry is not visible to the pre-synthesis name checks
        let enum_names: Vec<&str> = enums.iter().map(|e| e.name.as_str()).collect();
        let struct_names: Vec<&str> = schemas.structs.iter().map(|s| s.name.as_str()).collect();
        let message_names: Vec<&str> = schemas.messages.iter().map(|m| m.name.as_str()).collect();
        if let Err(e) = check_cross_kind_collisions(&enum_names, &struct_names, &message_names) {
            diagnostics.push(e);
        }

        check_file_collisions(&enums, &structs, &messages, &mut diagnostics);

        debug!(
            enums = enums.len(),
            structs = structs.len(),
            messages = messages.len(),
            "metadata synthesized"
        );

        diagnostics.into_result(Synthesized {
            enums,
            structs,
            messages,
        })
    }

    fn file_meta(&self, dir: &str, name: &str) -> FileMeta {
        let path = format!("{}{}", dir, name);
        FileMeta {
            name: name.to_string(),
            include_guard: include_guard(&path),
            path,
            extension: self.layout.header_extension.clone(),
            includes: Vec::new(),
        }
    }

    fn members(&self, entity: &str, raw: &[RawMember], diagnostics: &mut Diagnostics) -> Vec<MemberDraft> {
        let mut seen = HashSet::new();
        let mut members = Vec::with_capacity(raw.len());
        for member in raw {
            if !seen.insert(member.name.as_str()) {
                diagnostics.push(CompileError::DuplicateMember {
                    entity: entity.to_string(),
                    member: member.name.clone(),
                });
            }
            match self.parse_member_type(entity, member) {
                Ok((type_name, array_len)) => members.push(MemberDraft {
                    name: member.name.clone(),
                    type_name,
                    array_len,
                    default: member.default.clone(),
                }),
                Err(e) => diagnostics.push(e),
            }
        }
        members
    }

    /// Split `Type[N]` into `("Type", N)`; scalars have length 0.
    ///
    /// `N` must be an unsigned integer literal greater than zero.
    pub fn parse_member_type(&self, entity: &str, member: &RawMember) -> Result<(String, usize), CompileError> {
        let token = member.type_token.as_str();
        let Some(bracket) = token.find('[') else {
            return Ok((token.trim().to_string(), 0));
        };

        let invalid = |received: &str| CompileError::InvalidArrayLength {
            entity: entity.to_string(),
            member: member.name.clone(),
            received: received.to_string(),
        };

        // exactly one `[N]` suffix, nothing after it
        let captures = self
            .array_pattern
            .captures(token)
            .ok_or_else(|| invalid(&token[bracket..]))?;
        let base = captures.get(1).map_or("", |m| m.as_str());
        let len_token = captures.get(2).map_or("", |m| m.as_str());

        if len_token.is_empty() || !len_token.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid(len_token));
        }
        let array_len: usize = len_token.parse().map_err(|_| invalid(len_token))?;
        if array_len == 0 {
            return Err(invalid(len_token));
        }

        Ok((base.to_string(), array_len))
    }

    fn enum_def(&self, raw: &RawEnum, diagnostics: &mut Diagnostics) -> Option<EnumDef> {
        let before = diagnostics.len();
        let count = raw.list.len();
        let required = minimum_storage(count);

        let storage = match raw.storage.as_deref() {
            None => required,
            Some(declared) => match NumericType::parse(declared).filter(|t| t.integer_bits().is_some()) {
                None => {
                    diagnostics.push(CompileError::InvalidEnumType {
                        entity: raw.name.clone(),
                        received: declared.to_string(),
                    });
                    required
                }
                Some(ty) => {
                    // `Count` is the largest value the type has to hold
                    let fits = ty.integer_range().is_some_and(|(_, max)| count as i128 + 1 <= max);
                    if !fits {
                        diagnostics.push(CompileError::EnumTypeTooSmall {
                            entity: raw.name.clone(),
                            count,
                            required: required.to_string(),
                            declared: declared.to_string(),
                        });
                    }
                    ty
                }
            },
        };

        let duplicates = duplicate_names(raw.list.iter().map(String::as_str));
        if !duplicates.is_empty() {
            diagnostics.push(CompileError::DuplicateEnumValues {
                entity: raw.name.clone(),
                values: duplicates,
            });
        }

        for reserved in [EnumDef::UNKNOWN, EnumDef::COUNT] {
            if raw.list.iter().any(|v| v == reserved) {
                diagnostics.push(CompileError::ReservedEnumerator {
                    entity: raw.name.clone(),
                    value: reserved.to_string(),
                });
            }
        }

        for (list, values) in [
            ("brief_list", &raw.brief_list),
            ("elaboration_list", &raw.elaboration_list),
        ] {
            if let Some(values) = values {
                if values.len() != count {
                    diagnostics.push(CompileError::ListLengthMismatch {
                        entity: raw.name.clone(),
                        list,
                        expected: count,
                        got: values.len(),
                    });
                }
            }
        }

        if diagnostics.len() > before {
            return None;
        }

        Some(EnumDef {
            name: raw.name.clone(),
            namespace: raw.namespace.clone(),
            storage,
            values: raw.list.clone(),
            brief_list: raw.brief_list.clone(),
            elaboration_list: raw.elaboration_list.clone(),
            file: self.file_meta(&self.layout.enums, &file_name(&raw.name)),
        })
    }
}

/// Two entities must never generate the same file
fn check_file_collisions(
    enums: &[EnumDef],
    structs: &[CompositeDraft],
    messages: &[CompositeDraft],
    diagnostics: &mut Diagnostics,
) {
    let mut owners: BTreeMap<String, String> = BTreeMap::new();
    let files = enums
        .iter()
        .map(|e| (format!("enum {}", e.name), &e.file))
        .chain(structs.iter().map(|s| (format!("struct {}", s.name), &s.file)))
        .chain(messages.iter().map(|m| (format!("message {}", m.name), &m.file)));

    for (owner, file) in files {
        let path = file.file_path();
        match owners.get(&path) {
            // same-name duplicates are reported as duplicate names instead
            Some(first) if first == &owner => {}
            Some(first) => diagnostics.push(CompileError::FileCollision {
                path,
                first: first.clone(),
                second: owner,
            }),
            None => {
                owners.insert(path, owner);
            }
        }
    }
}
