//! Python `construct` Emitter
//!
//! One module per enum, struct and message under `enums/`, `structs/` and
//! `msgs/`, for parsing and building wire bytes from Python.
//!
//! Inheritance is flattened: a definition lists its ancestors' members first.
//! The root message becomes the wire envelope that switches on the message id
//! and closes with the CRC.

use std::collections::BTreeSet;
use std::iter::successors;
use std::path::PathBuf;

use crate::checksum::Polynomial;
use crate::config::{CompilerConfig, ModelConfig};
use crate::error::Result;
use crate::model::{EnumDef, LinkedManifest, MemberDef, MemberKind, MessageDef, NumericType, StructDef};
use crate::schema::DefaultValue;

use super::{Backend, EmitContext};

pub const ENUMS_PACKAGE: &str = "enums";
pub const STRUCTS_PACKAGE: &str = "structs";
pub const MSGS_PACKAGE: &str = "msgs";

/// Renders the manifest as Python `construct` definitions
#[derive(Debug, Clone)]
pub struct ConstructBackend {
    model: ModelConfig,
    polynomial: Polynomial,
}

impl ConstructBackend {
    pub fn new(config: &CompilerConfig) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            polynomial: Polynomial::parse(&config.crc.polynomial)?,
        })
    }
}

impl Backend for ConstructBackend {
    fn name(&self) -> &str {
        "python"
    }

    fn emit_enums(&self, ctx: &mut EmitContext, enums: &[EnumDef]) -> Result<()> {
        for def in enums {
            let path = module_path(ctx, ENUMS_PACKAGE, &def.name);
            ctx.write(path, &emit_enum(def))?;
        }
        Ok(())
    }

    fn emit_structs(&self, ctx: &mut EmitContext, structs: &[StructDef]) -> Result<()> {
        for def in structs {
            let path = module_path(ctx, STRUCTS_PACKAGE, &def.name);
            ctx.write(path, &emit_composite(&def.name, &struct_members(def, structs)))?;
        }
        Ok(())
    }

    fn emit_messages(&self, ctx: &mut EmitContext, messages: &[MessageDef]) -> Result<()> {
        for def in messages {
            let module = if def.is_root() {
                let concrete: Vec<&MessageDef> = messages.iter().filter(|m| !m.is_root()).collect();
                emit_envelope(def, &concrete, &self.model.message_id_enum, self.polynomial)
            } else {
                emit_composite(&def.name, &message_members(def, messages))
            };
            let path = module_path(ctx, MSGS_PACKAGE, &def.name);
            ctx.write(path, &module)?;
        }
        Ok(())
    }

    fn auxiliary(&self, ctx: &mut EmitContext, _manifest: &LinkedManifest) -> Result<()> {
        for package in [ENUMS_PACKAGE, STRUCTS_PACKAGE, MSGS_PACKAGE] {
            let path = ctx.python_dir().join(package).join("__init__.py");
            ctx.write(path, "")?;
        }
        Ok(())
    }
}

fn module_path(ctx: &EmitContext, package: &str, name: &str) -> PathBuf {
    ctx.python_dir().join(package).join(format!("{}.py", name))
}

// =============================================================================
// Inheritance flattening
// =============================================================================

/// Members of `def` and every ancestor struct, root first
pub fn struct_members<'a>(def: &'a StructDef, structs: &'a [StructDef]) -> Vec<&'a MemberDef> {
    let lookup = |name: &str| structs.iter().find(|s| s.name == name);
    // linked chains are acyclic; `take` bounds a malformed one
    let mut chain: Vec<&StructDef> = successors(Some(def), |d| d.parent.as_deref().and_then(lookup))
        .take(structs.len().max(1))
        .collect();
    chain.reverse();
    chain.into_iter().flat_map(|d| d.members.iter()).collect()
}

/// Members of `def` and its ancestors, excluding the root message whose
/// members belong to the envelope
pub fn message_members<'a>(def: &'a MessageDef, messages: &'a [MessageDef]) -> Vec<&'a MemberDef> {
    let lookup = |name: &str| messages.iter().find(|m| m.name == name);
    let mut chain: Vec<&MessageDef> = successors(Some(def), |d| d.parent.as_deref().and_then(lookup))
        .take(messages.len().max(1))
        .filter(|m| !m.is_root())
        .collect();
    chain.reverse();
    chain.into_iter().flat_map(|d| d.members.iter()).collect()
}

// =============================================================================
// Shared pieces
// =============================================================================

fn usage_comment(name: &str) -> String {
    format!(
        "# To deserialize from a byte array into a dict:\n\
         # msg_dict = {name}.parse(byte_array)\n\
         #\n\
         # To serialize a dict into a byte array:\n\
         # byte_array = {name}.build(msg_dict)\n"
    )
}

fn push_imports(output: &mut String, imports: &BTreeSet<String>) {
    for import in imports {
        output.push_str(import);
        output.push('\n');
    }
    output.push('\n');
}

pub fn construct_type(ty: NumericType) -> &'static str {
    match ty {
        NumericType::I8 => "construct.Int8sl",
        NumericType::I16 => "construct.Int16sl",
        NumericType::I32 => "construct.Int32sl",
        NumericType::I64 => "construct.Int64sl",
        NumericType::U8 => "construct.Int8ul",
        NumericType::U16 => "construct.Int16ul",
        NumericType::U32 => "construct.Int32ul",
        NumericType::U64 => "construct.Int64ul",
        NumericType::Float => "construct.Float32l",
        NumericType::Double => "construct.Float64l",
        NumericType::Bool => "construct.Flag",
    }
}

fn member_import(member: &MemberDef) -> Option<String> {
    let package = match member.kind {
        MemberKind::Enum => ENUMS_PACKAGE,
        MemberKind::Struct => STRUCTS_PACKAGE,
        MemberKind::Numeric(_) => return None,
    };
    Some(format!("from ..{}.{} import {}", package, member.type_name, member.type_name))
}

fn default_literal(member: &MemberDef, value: &DefaultValue) -> String {
    match (member.kind, value) {
        (MemberKind::Enum, DefaultValue::Text(enumerator)) => format!("{}.{}", member.type_name, enumerator),
        (_, DefaultValue::Bool(true)) => "True".to_string(),
        (_, DefaultValue::Bool(false)) => "False".to_string(),
        (MemberKind::Numeric(NumericType::Float | NumericType::Double), DefaultValue::Int(i)) => {
            format!("{:?}", *i as f64)
        }
        (_, value) => value.to_string(),
    }
}

/// `construct` expression for one member, defaults and arrays included
pub fn member_construct(member: &MemberDef) -> String {
    let base = match member.kind {
        MemberKind::Numeric(ty) => construct_type(ty).to_string(),
        MemberKind::Enum | MemberKind::Struct => member.type_name.clone(),
    };
    let element = match &member.default {
        Some(value) => format!("construct.Default({}, {})", base, default_literal(member, value)),
        None => base,
    };
    if member.is_array() {
        format!("construct.Array({}, {})", member.array_len, element)
    } else {
        element
    }
}

fn push_fields(output: &mut String, imports: &mut BTreeSet<String>, members: &[&MemberDef], indent: &str) {
    for member in members {
        output.push_str(&format!("{}\"{}\" / {},\n", indent, member.name, member_construct(member)));
        if let Some(import) = member_import(member) {
            imports.insert(import);
        }
    }
}

// =============================================================================
// Modules
// =============================================================================

pub fn emit_enum(def: &EnumDef) -> String {
    let mut output = String::new();
    output.push_str("import construct\n\n");
    output.push_str(&usage_comment(&def.name));
    output.push('\n');
    output.push_str(&format!("{} = construct.Enum({},\n", def.name, construct_type(def.storage)));

    let elaborations = def.elaboration_list.as_deref().unwrap_or_default();
    for (enumerator, value) in def.enumerators() {
        let note = def
            .value_of(enumerator)
            .and_then(|v| elaborations.get(v as usize - 1));
        match note {
            Some(note) => output.push_str(&format!("    {}={},  # {}\n", enumerator, value, note)),
            None => output.push_str(&format!("    {}={},\n", enumerator, value)),
        }
    }
    output.push_str(")\n");
    output
}

/// A struct, or a concrete message body
pub fn emit_composite(name: &str, members: &[&MemberDef]) -> String {
    let mut imports = BTreeSet::from(["import construct".to_string()]);
    let mut body = String::new();
    body.push_str(&usage_comment(name));
    body.push('\n');
    body.push_str(&format!("{} = construct.Struct(\n", name));
    push_fields(&mut body, &mut imports, members, "    ");
    body.push_str(")\n");

    let mut output = String::new();
    push_imports(&mut output, &imports);
    output.push_str(&body);
    output
}

/// The root message: id, root members, the id-selected body, then the CRC
pub fn emit_envelope(root: &MessageDef, messages: &[&MessageDef], message_id: &str, poly: Polynomial) -> String {
    let mut imports = BTreeSet::from([
        "import construct".to_string(),
        "import crcmod".to_string(),
        format!("from ..{}.{} import {}", ENUMS_PACKAGE, message_id, message_id),
    ]);
    for message in messages {
        imports.insert(format!("from ..{}.{} import {}", MSGS_PACKAGE, message.name, message.name));
    }

    let mut body = String::new();
    body.push_str(&usage_comment(&root.name));
    body.push('\n');
    body.push_str(&format!(
        "crc_func = crcmod.mkCrcFun(0x{:X}, initCrc=0, xorOut=0xFFFFFFFF, rev=False)\n\n",
        poly.explicit()
    ));
    body.push_str(&format!("{} = construct.Struct(\n", root.name));
    body.push_str("    \"fields\" / construct.RawCopy(construct.Struct(\n");
    body.push_str(&format!("        \"id\" / {},\n", message_id));
    let root_members: Vec<&MemberDef> = root.members.iter().collect();
    push_fields(&mut body, &mut imports, &root_members, "        ");
    body.push_str("        \"msg\" / construct.Switch(construct.this.id, {\n");
    for message in messages {
        body.push_str(&format!("            {}.{}: {},\n", message_id, message.name, message.name));
    }
    body.push_str("        }),\n    )),\n");
    body.push_str("    \"crc\" / construct.Checksum(construct.Int32ul,\n");
    body.push_str("        lambda data: crc_func(data),\n");
    body.push_str("        construct.this.fields.data),\n");
    body.push_str(")\n");

    let mut output = String::new();
    push_imports(&mut output, &imports);
    output.push_str(&body);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileMeta;

    fn file(path: &str) -> FileMeta {
        FileMeta {
            name: path.rsplit('/').next().unwrap().to_string(),
            path: path.to_string(),
            extension: ".h".to_string(),
            include_guard: String::new(),
            includes: Vec::new(),
        }
    }

    fn member(name: &str, ty: &str, array_len: usize, kind: MemberKind, default: Option<DefaultValue>) -> MemberDef {
        MemberDef {
            name: name.to_string(),
            type_name: ty.to_string(),
            array_len,
            default,
            kind,
            type_namespace: None,
        }
    }

    fn structure(name: &str, parent: Option<&str>, members: Vec<MemberDef>) -> StructDef {
        StructDef {
            name: name.to_string(),
            namespace: None,
            parent: parent.map(str::to_string),
            parent_namespace: None,
            members,
            file: file(&format!("common_msg/structs/{}", name)),
            twin_of: None,
        }
    }

    fn message(name: &str, parent: Option<&str>, members: Vec<MemberDef>) -> MessageDef {
        MessageDef {
            name: name.to_string(),
            namespace: None,
            parent: parent.map(str::to_string),
            parent_namespace: None,
            members,
            file: file(&format!("common_msg/{}_message", name)),
            has_children: false,
            twin: parent.map(|_| name.to_string()),
        }
    }

    #[test]
    fn test_emit_enum() {
        let def = EnumDef {
            name: "FlightMode".to_string(),
            namespace: Some("bus".to_string()),
            storage: NumericType::I16,
            values: vec!["Idle".to_string(), "Hover".to_string()],
            brief_list: None,
            elaboration_list: Some(vec!["motors disarmed".to_string(), "holding position".to_string()]),
            file: file("common_msg/enums/flight_mode"),
        };
        let module = emit_enum(&def);
        assert!(module.starts_with("import construct\n\n# To deserialize"));
        assert!(module.contains("# msg_dict = FlightMode.parse(byte_array)\n"));
        assert!(module.contains(
            "FlightMode = construct.Enum(construct.Int16sl,\n    Unknown=0,\n    Idle=1,  # motors disarmed\n"
        ));
        assert!(module.contains("    Count=3,\n)\n"));
    }

    #[test]
    fn test_member_construct() {
        let samples = member("samples", "uint16_t", 8, MemberKind::Numeric(NumericType::U16), None);
        assert_eq!(member_construct(&samples), "construct.Array(8, construct.Int16ul)");

        let gain = member("gain", "float", 0, MemberKind::Numeric(NumericType::Float), Some(DefaultValue::Int(1)));
        assert_eq!(member_construct(&gain), "construct.Default(construct.Float32l, 1.0)");

        let active = member("active", "bool", 0, MemberKind::Numeric(NumericType::Bool), Some(DefaultValue::Bool(true)));
        assert_eq!(member_construct(&active), "construct.Default(construct.Flag, True)");

        let mode = member("mode", "FlightMode", 0, MemberKind::Enum, Some(DefaultValue::Text("Idle".to_string())));
        assert_eq!(member_construct(&mode), "construct.Default(FlightMode, FlightMode.Idle)");
    }

    #[test]
    fn test_struct_inheritance_is_flattened() {
        let structs = vec![
            structure("BusObjectStruct", None, vec![]),
            structure(
                "Motion",
                Some("BusObjectStruct"),
                vec![member("xyz", "float", 3, MemberKind::Numeric(NumericType::Float), None)],
            ),
            structure(
                "Attitude",
                Some("Motion"),
                vec![member("mode", "FlightMode", 0, MemberKind::Enum, None)],
            ),
        ];
        let members = struct_members(&structs[2], &structs);
        let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["xyz", "mode"]);

        let module = emit_composite("Attitude", &members);
        assert!(module.starts_with("from ..enums.FlightMode import FlightMode\nimport construct\n\n"));
        assert!(module.contains(
            "Attitude = construct.Struct(\n    \"xyz\" / construct.Array(3, construct.Float32l),\n    \"mode\" / FlightMode,\n)\n"
        ));
    }

    #[test]
    fn test_root_members_stay_in_envelope() {
        let timestamp = member("timestamp_us", "uint64_t", 0, MemberKind::Numeric(NumericType::U64), None);
        let messages = vec![
            message("BusObject", None, vec![timestamp]),
            message(
                "PoseReport",
                Some("BusObject"),
                vec![member("position", "Vector3", 0, MemberKind::Struct, None)],
            ),
            message(
                "ExtendedPoseReport",
                Some("PoseReport"),
                vec![member("speed", "float", 0, MemberKind::Numeric(NumericType::Float), None)],
            ),
        ];
        let names: Vec<&str> = message_members(&messages[2], &messages)
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["position", "speed"]);

        let concrete: Vec<&MessageDef> = messages.iter().filter(|m| !m.is_root()).collect();
        let envelope = emit_envelope(&messages[0], &concrete, "MessageId", Polynomial::DEFAULT);
        assert!(envelope.contains("from ..msgs.ExtendedPoseReport import ExtendedPoseReport\n"));
        assert!(envelope.contains("from ..enums.MessageId import MessageId\n"));
        assert!(envelope.contains("crcmod.mkCrcFun(0x1F1922815, initCrc=0, xorOut=0xFFFFFFFF, rev=False)"));
        assert!(envelope.contains(
            "        \"id\" / MessageId,\n        \"timestamp_us\" / construct.Int64ul,\n        \"msg\" / construct.Switch("
        ));
        assert!(envelope.contains("            MessageId.PoseReport: PoseReport,\n"));
        assert!(envelope.contains("construct.this.fields.data),\n)\n"));
    }
}
