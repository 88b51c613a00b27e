//! C++ Header Emitter
//!
//! One header per enum, struct and message, plus the message-handling
//! interfaces, their conformance unit test and the CRC calculator.
//!
//! Emitters only read the linked model; type names, file paths, include lists
//! and guards are all decided before generation.

use std::path::PathBuf;

use crate::checksum::{generate_table, render_cpp_table, Crc32, Polynomial, TableMethod, REFERENCE_BUFFER};
use crate::config::{CompilerConfig, LayoutConfig, ModelConfig};
use crate::error::Result;
use crate::model::{EnumDef, FileMeta, LinkedManifest, MemberDef, MemberKind, MessageDef, NumericType, StructDef};
use crate::schema::DefaultValue;

use super::{Backend, EmitContext};

const GENERATED_NOTICE: &str = "/// @note autogenerated by busgen, do not edit\n";

pub const MSG_HANDLER_FILE: &str = "msg_handler.h";
pub const MSG_DECODER_FILE: &str = "msg_decoder.h";
pub const MSG_HANDLING_UT_FILE: &str = "msg_handling_ut.cc";
pub const CRC_CALCULATOR_FILE: &str = "c_crc_calculator.h";

/// Renders the manifest as C++ headers
#[derive(Debug, Clone)]
pub struct CppBackend {
    layout: LayoutConfig,
    model: ModelConfig,
    polynomial: Polynomial,
}

impl CppBackend {
    pub fn new(config: &CompilerConfig) -> Result<Self> {
        Ok(Self {
            layout: config.layout.clone(),
            model: config.model.clone(),
            polynomial: Polynomial::parse(&config.crc.polynomial)?,
        })
    }

    fn msg_handling_path(&self, file: &str) -> String {
        format!("{}{}", self.layout.msg_handling, file)
    }

    fn crc_path(&self) -> String {
        format!("{}{}", self.layout.crc, CRC_CALCULATOR_FILE)
    }

    fn registry_include(&self) -> String {
        format!(
            "{}{}{}",
            self.layout.enums,
            crate::names::file_name(&self.model.message_id_enum),
            self.layout.header_extension
        )
    }
}

impl Backend for CppBackend {
    fn name(&self) -> &str {
        "cpp"
    }

    fn emit_enums(&self, ctx: &mut EmitContext, enums: &[EnumDef]) -> Result<()> {
        for def in enums {
            let path = header_path(ctx, &def.file);
            ctx.write(path, &emit_enum(def))?;
        }
        Ok(())
    }

    fn emit_structs(&self, ctx: &mut EmitContext, structs: &[StructDef]) -> Result<()> {
        for def in structs {
            let path = header_path(ctx, &def.file);
            ctx.write(path, &emit_struct(def))?;
        }
        Ok(())
    }

    fn emit_messages(&self, ctx: &mut EmitContext, messages: &[MessageDef]) -> Result<()> {
        for def in messages {
            let header = if def.is_root() {
                emit_root_message(def, &self.model, &self.registry_include())
            } else {
                emit_message(def, &self.model, &self.registry_include())
            };
            let path = header_path(ctx, &def.file);
            ctx.write(path, &header)?;
        }
        Ok(())
    }

    fn auxiliary(&self, ctx: &mut EmitContext, manifest: &LinkedManifest) -> Result<()> {
        let handling = &manifest.message_handling;

        let handler = emit_msg_handler(handling.messages.as_slice(), &self.msg_handling_path(MSG_HANDLER_FILE));
        let path = ctx.cpp_include_dir().join(self.msg_handling_path(MSG_HANDLER_FILE));
        ctx.write(path, &handler)?;

        let root = manifest.messages.iter().find(|m| m.is_root());
        let decoder = emit_msg_decoder(
            handling.messages.as_slice(),
            root,
            &self.model,
            &self.msg_handling_path(MSG_DECODER_FILE),
            &self.msg_handling_path(MSG_HANDLER_FILE),
            &self.registry_include(),
        );
        let path = ctx.cpp_include_dir().join(self.msg_handling_path(MSG_DECODER_FILE));
        ctx.write(path, &decoder)?;

        let table = generate_table(self.polynomial, TableMethod::Library);
        let crc = emit_crc_calculator(self.polynomial, &table, &self.crc_path());
        let path = ctx.cpp_include_dir().join(self.crc_path());
        ctx.write(path, &crc)?;

        let reference = Crc32::with_table(table).checksum(&REFERENCE_BUFFER);
        let unit_test = emit_msg_handling_ut(
            &handling.message_id,
            handling.messages.as_slice(),
            &self.msg_handling_path(MSG_DECODER_FILE),
            &self.crc_path(),
            reference,
        );
        let path = ctx.cpp_unit_tests_dir().join(MSG_HANDLING_UT_FILE);
        ctx.write(path, &unit_test)
    }
}

fn header_path(ctx: &EmitContext, file: &FileMeta) -> PathBuf {
    ctx.cpp_include_dir().join(file.file_path())
}

/// Class name generated for a message
pub fn message_class(name: &str) -> String {
    format!("{}Message", name)
}

fn qualified(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{}::{}", ns, name),
        None => name.to_string(),
    }
}

// =============================================================================
// Shared pieces
// =============================================================================

fn open_header(output: &mut String, guard: &str, brief: &str) {
    output.push_str(&format!("#ifndef {}\n#define {}\n\n", guard, guard));
    output.push_str(&format!("/// @file\n/// @brief {}\n", brief));
    output.push_str(GENERATED_NOTICE);
    output.push('\n');
}

fn close_header(output: &mut String, guard: &str) {
    output.push_str(&format!("\n#endif  // {}\n", guard));
}

fn push_includes<'a>(output: &mut String, system: &[&str], local: impl IntoIterator<Item = &'a String>) {
    for header in system {
        output.push_str(&format!("#include <{}>\n", header));
    }
    for header in local {
        output.push_str(&format!("#include \"{}\"\n", header));
    }
    output.push('\n');
}

fn open_namespace(output: &mut String, namespace: Option<&str>) {
    if let Some(ns) = namespace {
        output.push_str(&format!("namespace {} {{\n\n", ns));
    }
}

fn close_namespace(output: &mut String, namespace: Option<&str>) {
    if let Some(ns) = namespace {
        output.push_str(&format!("\n}}  // namespace {}\n", ns));
    }
}

fn member_type(member: &MemberDef) -> String {
    match member.kind {
        MemberKind::Numeric(ty) => ty.as_str().to_string(),
        MemberKind::Enum | MemberKind::Struct => qualified(member.type_namespace.as_deref(), &member.type_name),
    }
}

// defaults are checked against the member type when linking
fn default_literal(member: &MemberDef, value: &DefaultValue) -> String {
    match (member.kind, value) {
        (MemberKind::Enum, DefaultValue::Text(enumerator)) => format!("{}::{}", member_type(member), enumerator),
        (MemberKind::Numeric(NumericType::Float), DefaultValue::Float(x)) => format!("{:?}f", x),
        (MemberKind::Numeric(NumericType::Float), DefaultValue::Int(i)) => format!("{}.0f", i),
        (_, value) => value.to_string(),
    }
}

fn emit_member(output: &mut String, member: &MemberDef, indent: &str) {
    let ty = member_type(member);
    let init = match &member.default {
        Some(value) => {
            let literal = default_literal(member, value);
            if member.is_array() {
                vec![literal; member.array_len].join(", ")
            } else {
                literal
            }
        }
        None => String::new(),
    };
    if member.is_array() {
        output.push_str(&format!("{}{} {}[{}]{{{}}};\n", indent, ty, member.name, member.array_len, init));
    } else {
        output.push_str(&format!("{}{} {}{{{}}};\n", indent, ty, member.name, init));
    }
}

// =============================================================================
// Enum Emission
// =============================================================================

pub fn emit_enum(def: &EnumDef) -> String {
    let mut output = String::new();
    let guard = &def.file.include_guard;
    open_header(&mut output, guard, &format!("{} enumerate", def.name));
    push_includes(&mut output, &["cstdint"], &def.file.includes);
    open_namespace(&mut output, def.namespace.as_deref());

    output.push_str(&format!("enum class {} : {} {{\n", def.name, def.storage));
    for (enumerator, value) in def.enumerators() {
        if let Some(index) = def.values.iter().position(|v| v == enumerator) {
            if let Some(brief) = def.brief_list.as_ref().and_then(|b| b.get(index)) {
                output.push_str(&format!("  /// @brief {}\n", brief));
            }
            if let Some(details) = def.elaboration_list.as_ref().and_then(|e| e.get(index)) {
                output.push_str(&format!("  /// @details {}\n", details));
            }
        }
        output.push_str(&format!("  {} = {},\n", enumerator, value));
    }
    output.push_str("};\n");

    close_namespace(&mut output, def.namespace.as_deref());
    close_header(&mut output, guard);
    output
}

// =============================================================================
// Struct Emission
// =============================================================================

pub fn emit_struct(def: &StructDef) -> String {
    let mut output = String::new();
    let guard = &def.file.include_guard;
    open_header(&mut output, guard, &format!("{} structure", def.name));
    push_includes(&mut output, &["cstdint"], &def.file.includes);
    open_namespace(&mut output, def.namespace.as_deref());

    if let Some(message) = &def.twin_of {
        output.push_str(&format!("/// @brief plain data of {}\n", message_class(message)));
    }
    match &def.parent {
        Some(parent) => output.push_str(&format!(
            "struct {} : public {} {{\n",
            def.name,
            qualified(def.parent_namespace.as_deref(), parent)
        )),
        None => output.push_str(&format!("struct {} {{\n", def.name)),
    }
    for member in &def.members {
        emit_member(&mut output, member, "  ");
    }
    output.push_str("};\n");

    close_namespace(&mut output, def.namespace.as_deref());
    close_header(&mut output, guard);
    output
}

// =============================================================================
// Message Emission
// =============================================================================

/// The abstract base every bus message derives from
pub fn emit_root_message(def: &MessageDef, model: &ModelConfig, registry_include: &str) -> String {
    let mut output = String::new();
    let guard = &def.file.include_guard;
    let class = message_class(&def.name);
    open_header(&mut output, guard, &format!("{} abstract bus message", def.name));

    let mut includes = vec![registry_include.to_string()];
    includes.extend(def.file.includes.iter().cloned());
    push_includes(&mut output, &["cstdint"], &includes);
    open_namespace(&mut output, def.namespace.as_deref());

    output.push_str(&format!("class {} {{\n public:\n", class));
    output.push_str(&format!("  virtual ~{}() = default;\n\n", class));
    output.push_str(&format!("  virtual ::{} GetId() const = 0;\n", model.message_id_enum));
    if !def.members.is_empty() {
        output.push('\n');
    }
    for member in &def.members {
        emit_member(&mut output, member, "  ");
    }
    output.push_str("};\n");

    close_namespace(&mut output, def.namespace.as_deref());
    close_header(&mut output, guard);
    output
}

pub fn emit_message(def: &MessageDef, model: &ModelConfig, registry_include: &str) -> String {
    let mut output = String::new();
    let guard = &def.file.include_guard;
    let class = message_class(&def.name);
    let parent = qualified(
        def.parent_namespace.as_deref(),
        &message_class(def.parent.as_deref().unwrap_or(&model.root_message)),
    );
    let twin = qualified(def.namespace.as_deref(), def.twin.as_deref().unwrap_or(&def.name));
    // the registry always lives in the global namespace
    let id = format!("::{}", model.message_id_enum);
    open_header(&mut output, guard, &format!("{} bus message", def.name));

    let mut includes = def.file.includes.clone();
    if !includes.iter().any(|i| i == registry_include) {
        includes.push(registry_include.to_string());
    }
    push_includes(&mut output, &["cstdint"], &includes);
    open_namespace(&mut output, def.namespace.as_deref());

    let finality = if def.has_children { "" } else { " final" };
    output.push_str(&format!("class {}{} : public {} {{\n public:\n", class, finality, parent));
    output.push_str(&format!("  static constexpr {} kId = {}::{};\n\n", id, id, def.name));
    output.push_str(&format!("  {} GetId() const override {{ return kId; }}\n\n", id));
    output.push_str(&format!("  {}& Data() {{ return data_; }}\n", twin));
    output.push_str(&format!("  const {}& Data() const {{ return data_; }}\n\n", twin));
    output.push_str(" private:\n");
    output.push_str(&format!("  {} data_{{}};\n", twin));
    output.push_str("};\n");

    close_namespace(&mut output, def.namespace.as_deref());
    close_header(&mut output, guard);
    output
}

// =============================================================================
// Auxiliary Emission
// =============================================================================

fn guard_for(path: &str) -> String {
    crate::names::include_guard(path.trim_end_matches(".h"))
}

pub fn emit_msg_handler(messages: &[MessageDef], path: &str) -> String {
    let mut output = String::new();
    let guard = guard_for(path);
    open_header(&mut output, &guard, "per-message handler interface");
    let includes: Vec<String> = messages.iter().map(|m| m.file.file_path()).collect();
    push_includes(&mut output, &[], &includes);

    output.push_str("class MsgHandler {\n public:\n");
    output.push_str("  virtual ~MsgHandler() = default;\n");
    for message in messages {
        let class = qualified(message.namespace.as_deref(), &message_class(&message.name));
        output.push_str(&format!("\n  virtual void Handle(const {}& msg) {{ (void)msg; }}\n", class));
    }
    output.push_str("};\n");

    close_header(&mut output, &guard);
    output
}

pub fn emit_msg_decoder(
    messages: &[MessageDef],
    root: Option<&MessageDef>,
    model: &ModelConfig,
    path: &str,
    handler_include: &str,
    registry_include: &str,
) -> String {
    let mut output = String::new();
    let guard = guard_for(path);
    open_header(&mut output, &guard, "dispatches bus messages by id");
    push_includes(
        &mut output,
        &[],
        [handler_include.to_string(), registry_include.to_string()].iter(),
    );

    let base = match root {
        Some(root) => qualified(root.namespace.as_deref(), &message_class(&root.name)),
        None => message_class(&model.root_message),
    };
    let id = &model.message_id_enum;

    output.push_str("class MsgDecoder {\n public:\n");
    output.push_str("  explicit MsgDecoder(MsgHandler& handler) : handler_(handler) {}\n\n");
    output.push_str("  /// @return false for ids without a message\n");
    output.push_str(&format!("  bool Dispatch(const {}& msg) {{\n", base));
    output.push_str("    switch (msg.GetId()) {\n");
    for message in messages {
        let class = qualified(message.namespace.as_deref(), &message_class(&message.name));
        output.push_str(&format!("      case {}::{}:\n", id, message.name));
        output.push_str(&format!("        handler_.Handle(static_cast<const {}&>(msg));\n", class));
        output.push_str("        return true;\n");
    }
    output.push_str("      default:\n        return false;\n    }\n  }\n\n");
    output.push_str(" private:\n  MsgHandler& handler_;\n};\n");

    close_header(&mut output, &guard);
    output
}

pub fn emit_crc_calculator(poly: Polynomial, table: &crate::checksum::CrcTable, path: &str) -> String {
    let mut output = String::new();
    let guard = guard_for(path);
    open_header(&mut output, &guard, &format!("CRC-32 for polynomial {}", poly));
    push_includes(&mut output, &["cstddef", "cstdint"], std::iter::empty());

    output.push_str("class CrcCalculator {\n public:\n");
    output.push_str("  static uint32_t Calculate(const uint8_t* data, size_t len) {\n");
    output.push_str("    uint32_t crc = kInitialCrc_;\n");
    output.push_str("    for (size_t i = 0; i < len; ++i) {\n");
    output.push_str("      crc = (crc << 8) ^ kCrc32LookupTable_[((crc >> 24) ^ data[i]) & 0xFF];\n");
    output.push_str("    }\n    return crc ^ kXorOutput_;\n  }\n\n");
    output.push_str(" private:\n");
    output.push_str("\tstatic constexpr uint32_t kInitialCrc_ = 0xFFFFFFFF;\n");
    output.push_str("\tstatic constexpr uint32_t kXorOutput_ = 0xFFFFFFFF;\n\n");
    output.push_str(&render_cpp_table(poly, table));
    output.push_str("};\n");

    close_header(&mut output, &guard);
    output
}

pub fn emit_msg_handling_ut(
    registry: &EnumDef,
    messages: &[MessageDef],
    decoder_include: &str,
    crc_include: &str,
    reference_checksum: u32,
) -> String {
    let mut output = String::new();
    output.push_str(GENERATED_NOTICE);
    output.push('\n');
    output.push_str("#include <gtest/gtest.h>\n\n");
    output.push_str(&format!("#include \"{}\"\n", decoder_include));
    output.push_str(&format!("#include \"{}\"\n\n", crc_include));

    output.push_str("namespace {\n\nclass CountingHandler : public MsgHandler {\n public:\n");
    for message in messages {
        let class = qualified(message.namespace.as_deref(), &message_class(&message.name));
        output.push_str(&format!("  void Handle(const {}&) override {{ ++handled_; }}\n", class));
    }
    output.push_str("  int handled_ = 0;\n};\n\n}  // namespace\n");

    for message in messages {
        let class = qualified(message.namespace.as_deref(), &message_class(&message.name));
        let value = registry.value_of(&message.name).unwrap_or(0);
        output.push_str(&format!("\nTEST(MsgHandling, {}) {{\n", message.name));
        output.push_str(&format!("  {} msg;\n", class));
        output.push_str(&format!(
            "  EXPECT_EQ(static_cast<{}>(msg.GetId()), {}u);\n",
            registry.storage, value
        ));
        output.push_str("  CountingHandler handler;\n  MsgDecoder decoder(handler);\n");
        output.push_str("  EXPECT_TRUE(decoder.Dispatch(msg));\n");
        output.push_str("  EXPECT_EQ(handler.handled_, 1);\n}\n");
    }

    let bytes: Vec<String> = REFERENCE_BUFFER.iter().map(|b| format!("0x{:02X}", b)).collect();
    output.push_str("\nTEST(MsgHandling, CrcReferenceBuffer) {\n");
    output.push_str("  const uint8_t buf[] = {\n");
    for row in bytes.chunks(10) {
        output.push_str(&format!("      {},\n", row.join(", ")));
    }
    output.push_str("  };\n");
    output.push_str(&format!(
        "  EXPECT_EQ(CrcCalculator::Calculate(buf, sizeof(buf)), 0x{:08X}u);\n}}\n",
        reference_checksum
    ));
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, includes: &[&str]) -> FileMeta {
        FileMeta {
            name: path.rsplit('/').next().unwrap().to_string(),
            path: path.to_string(),
            extension: ".h".to_string(),
            include_guard: crate::names::include_guard(path),
            includes: includes.iter().map(|s| s.to_string()).collect(),
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

    #[test]
    fn test_emit_enum() {
        let def = EnumDef {
            name: "FlightMode".to_string(),
            namespace: Some("bus".to_string()),
            storage: NumericType::U8,
            values: vec!["Idle".to_string(), "Hover".to_string()],
            brief_list: Some(vec!["on the ground".to_string(), "in the air".to_string()]),
            elaboration_list: None,
            file: file("common_msg/enums/flight_mode", &[]),
        };
        let header = emit_enum(&def);
        assert!(header.starts_with("#ifndef INCLUDE_COMMON_MSG_ENUMS_FLIGHT_MODE_H_\n"));
        assert!(header.contains("namespace bus {"));
        assert!(header.contains("enum class FlightMode : uint8_t {\n  Unknown = 0,\n  /// @brief on the ground\n  Idle = 1,"));
        assert!(header.contains("  Count = 3,\n};"));
        assert!(header.trim_end().ends_with("#endif  // INCLUDE_COMMON_MSG_ENUMS_FLIGHT_MODE_H_"));
    }

    #[test]
    fn test_emit_struct() {
        let def = StructDef {
            name: "Pose".to_string(),
            namespace: None,
            parent: Some("BusObjectStruct".to_string()),
            parent_namespace: None,
            members: vec![
                member("xyz", "float", 3, MemberKind::Numeric(NumericType::Float), None),
                member("mode", "FlightMode", 0, MemberKind::Enum, Some(DefaultValue::Text("Idle".to_string()))),
                member("gain", "float", 0, MemberKind::Numeric(NumericType::Float), Some(DefaultValue::Float(0.5))),
            ],
            file: file(
                "common_msg/structs/pose",
                &["common_msg/structs/bus_object_struct.h", "common_msg/enums/flight_mode.h"],
            ),
            twin_of: None,
        };
        let header = emit_struct(&def);
        assert!(header.contains("#include \"common_msg/structs/bus_object_struct.h\"\n"));
        assert!(header.contains("struct Pose : public BusObjectStruct {\n"));
        assert!(header.contains("  float xyz[3]{};\n"));
        assert!(header.contains("  FlightMode mode{FlightMode::Idle};\n"));
        assert!(header.contains("  float gain{0.5f};\n"));
    }

    #[test]
    fn test_emit_message() {
        let model = ModelConfig::default();
        let def = MessageDef {
            name: "PoseReport".to_string(),
            namespace: None,
            parent: Some("BusObject".to_string()),
            parent_namespace: None,
            members: Vec::new(),
            file: file(
                "common_msg/pose_report_message",
                &["common_msg/bus_object_message.h", "common_msg/structs/pose_report.h"],
            ),
            has_children: false,
            twin: Some("PoseReport".to_string()),
        };
        let header = emit_message(&def, &model, "common_msg/enums/message_id.h");
        assert!(header.contains("#include \"common_msg/enums/message_id.h\"\n"));
        assert!(header.contains("class PoseReportMessage final : public BusObjectMessage {"));
        assert!(header.contains("static constexpr ::MessageId kId = ::MessageId::PoseReport;"));
        assert!(header.contains("  PoseReport data_{};"));
    }

    #[test]
    fn test_references_are_namespace_qualified() {
        let model = ModelConfig::default();
        let mut mode = member("mode", "FlightMode", 0, MemberKind::Enum, Some(DefaultValue::Text("Idle".to_string())));
        mode.type_namespace = Some("bus".to_string());
        let def = StructDef {
            name: "Attitude".to_string(),
            namespace: None,
            parent: Some("Motion".to_string()),
            parent_namespace: Some("nav".to_string()),
            members: vec![mode],
            file: file("common_msg/structs/attitude", &[]),
            twin_of: None,
        };
        let header = emit_struct(&def);
        assert!(header.contains("struct Attitude : public nav::Motion {\n"));
        assert!(header.contains("  bus::FlightMode mode{bus::FlightMode::Idle};\n"));

        let message = MessageDef {
            name: "Detail".to_string(),
            namespace: Some("nav".to_string()),
            parent: Some("Report".to_string()),
            parent_namespace: Some("nav".to_string()),
            members: Vec::new(),
            file: file("common_msg/detail_message", &[]),
            has_children: false,
            twin: Some("Detail".to_string()),
        };
        let header = emit_message(&message, &model, "common_msg/enums/message_id.h");
        assert!(header.contains("class DetailMessage final : public nav::ReportMessage {"));
        assert!(header.contains("  nav::Detail data_{};"));
    }

    #[test]
    fn test_emit_crc_calculator() {
        let table = generate_table(Polynomial::DEFAULT, TableMethod::Masked);
        let header = emit_crc_calculator(Polynomial::DEFAULT, &table, "common_msg/crc/c_crc_calculator.h");
        assert!(header.starts_with("#ifndef INCLUDE_COMMON_MSG_CRC_C_CRC_CALCULATOR_H_"));
        assert!(header.contains("kCrc32LookupTable_[256]"));
        assert!(header.contains("class CrcCalculator {"));
    }
}
