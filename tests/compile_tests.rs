//! Compile Tests
//!
//! End-to-end validate -> synthesize -> link over the fixture schema set, and
//! the fatal error classes a broken schema set must produce.

use busgen::{
    compile_documents, CompileError, CompilerConfig, Diagnostics, LinkedManifest, MemberKind, NumericType,
    SchemaDocuments, SchemaKind,
};

const MESSAGES: &str = include_str!("fixtures/schemas/bus_object_schema.yaml");
const ENUMS: &str = include_str!("fixtures/schemas/enumerates_schema.yaml");
const STRUCTS: &str = include_str!("fixtures/schemas/structs_schema.yaml");

fn compile_yaml(messages: &str, enums: &str, structs: &str) -> Result<LinkedManifest, Diagnostics> {
    let documents = SchemaDocuments::from_yaml(messages, enums, structs).unwrap();
    compile_documents(&documents, &CompilerConfig::default())
}

fn compile_fixture() -> LinkedManifest {
    compile_yaml(MESSAGES, ENUMS, STRUCTS).unwrap()
}

fn first_error(result: Result<LinkedManifest, Diagnostics>) -> CompileError {
    result.unwrap_err().into_errors().into_iter().next().unwrap()
}

// =============================================================================
// Valid schema set
// =============================================================================

#[test]
fn test_fixture_compiles() {
    let manifest = compile_fixture();

    let enums: Vec<&str> = manifest.enums.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(enums, vec!["FlightMode", "FaultCode", "MessageId"]);

    let structs: Vec<&str> = manifest.structs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        structs,
        vec![
            "BusObjectStruct",
            "Vector3",
            "Attitude",
            "PoseReport",
            "FaultReport",
            "Heartbeat",
            "ExtendedPoseReport",
        ]
    );
    assert_eq!(manifest.messages.len(), 5);
}

#[test]
fn test_linking_is_deterministic() {
    let first = compile_fixture();
    let second = compile_fixture();
    assert_eq!(first, second);
    assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

#[test]
fn test_message_id_registry() {
    let manifest = compile_fixture();
    let registry = &manifest.message_handling.message_id;
    assert_eq!(registry.storage, NumericType::U16);
    assert_eq!(
        registry.enumerators(),
        vec![
            ("Unknown", 0),
            ("PoseReport", 1),
            ("FaultReport", 2),
            ("Heartbeat", 3),
            ("ExtendedPoseReport", 4),
            ("Count", 5),
        ]
    );
    assert_eq!(manifest.message_id("BusObject"), None);

    let handled: Vec<&str> = manifest
        .message_handling
        .messages
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    assert_eq!(handled, vec!["PoseReport", "FaultReport", "Heartbeat", "ExtendedPoseReport"]);
}

#[test]
fn test_enum_metadata() {
    let manifest = compile_fixture();
    let mode = manifest.enum_def("FlightMode").unwrap();
    assert_eq!(mode.storage, NumericType::U8);
    assert_eq!(mode.file.path, "common_msg/enums/flight_mode");
    assert_eq!(mode.file.include_guard, "INCLUDE_COMMON_MSG_ENUMS_FLIGHT_MODE_H_");

    let fault = manifest.enum_def("FaultCode").unwrap();
    assert_eq!(fault.storage, NumericType::U16);
}

#[test]
fn test_struct_inheritance_is_normalized() {
    let manifest = compile_fixture();
    assert_eq!(manifest.struct_def("BusObjectStruct").unwrap().parent, None);
    // no parent declared
    assert_eq!(
        manifest.struct_def("Vector3").unwrap().parent.as_deref(),
        Some("BusObjectStruct")
    );
    // parent declared as the root message
    let attitude = manifest.struct_def("Attitude").unwrap();
    assert_eq!(attitude.parent.as_deref(), Some("BusObjectStruct"));
    assert_eq!(
        attitude.file.includes,
        vec!["common_msg/structs/bus_object_struct.h", "common_msg/enums/flight_mode.h"]
    );
}

#[test]
fn test_twin_structs_mirror_messages() {
    let manifest = compile_fixture();
    for message in manifest.concrete_messages() {
        let twin = manifest.struct_def(message.twin.as_deref().unwrap()).unwrap();
        assert_eq!(twin.twin_of.as_deref(), Some(message.name.as_str()));
        assert_eq!(twin.members, message.members, "twin of {}", message.name);
    }
    assert!(manifest.message_def("BusObject").unwrap().is_root());
    assert!(manifest.struct_def("BusObject").is_none());
}

#[test]
fn test_member_resolution() {
    let manifest = compile_fixture();
    let extended = manifest.message_def("ExtendedPoseReport").unwrap();
    assert_eq!(extended.parent.as_deref(), Some("PoseReport"));
    assert_eq!(extended.members[0].kind, MemberKind::Struct);
    assert_eq!(extended.members[1].kind, MemberKind::Numeric(NumericType::U16));
    assert_eq!(extended.members[1].array_len, 8);
    assert_eq!(extended.members[1].type_name, "uint16_t");

    let pose = manifest.message_def("PoseReport").unwrap();
    assert!(pose.has_children);
    assert_eq!(
        pose.file.includes,
        vec![
            "common_msg/bus_object_message.h",
            "common_msg/structs/pose_report.h",
            "common_msg/structs/vector3.h",
            "common_msg/structs/attitude.h",
        ]
    );

    let heartbeat = manifest.message_def("Heartbeat").unwrap();
    assert!(heartbeat.members.is_empty());
    assert!(heartbeat.file.includes.contains(&"common_msg/structs/heartbeat.h".to_string()));

    let closure = manifest.transitive_includes(&extended.file.file_path());
    assert!(closure.contains("common_msg/enums/flight_mode.h"));
    assert!(closure.contains("common_msg/structs/bus_object_struct.h"));
}

// =============================================================================
// Width sizing
// =============================================================================

#[test]
fn test_large_enum_uses_16_bits() {
    let values: Vec<String> = (0..300).map(|i| format!("V{}", i)).collect();
    let enums = format!("{}- enum:\n    name: Big\n    list: [{}]\n", ENUMS, values.join(", "));
    let manifest = compile_yaml(MESSAGES, &enums, STRUCTS).unwrap();
    assert_eq!(manifest.enum_def("Big").unwrap().storage, NumericType::U16);
}

#[test]
fn test_explicit_width_too_small() {
    let values: Vec<String> = (0..300).map(|i| format!("V{}", i)).collect();
    let enums = format!("- enum:\n    name: Big\n    type: uint8_t\n    list: [{}]\n", values.join(", "));
    match first_error(compile_yaml(MESSAGES, &enums, STRUCTS)) {
        CompileError::EnumTypeTooSmall { entity, count, required, declared } => {
            assert_eq!(entity, "Big");
            assert_eq!(count, 300);
            assert_eq!(required, "uint16_t");
            assert_eq!(declared, "uint8_t");
        }
        other => panic!("expected EnumTypeTooSmall, got {:?}", other),
    }
}

#[test]
fn test_signed_width_too_small() {
    let values: Vec<String> = (0..200).map(|i| format!("V{}", i)).collect();
    let enums = format!("- enum:\n    name: Signed\n    type: int8_t\n    list: [{}]\n", values.join(", "));
    match first_error(compile_yaml(MESSAGES, &enums, STRUCTS)) {
        CompileError::EnumTypeTooSmall { entity, count, declared, .. } => {
            assert_eq!(entity, "Signed");
            assert_eq!(count, 200);
            assert_eq!(declared, "int8_t");
        }
        other => panic!("expected EnumTypeTooSmall, got {:?}", other),
    }
}

// =============================================================================
// Fatal errors
// =============================================================================

#[test]
fn test_shape_errors_are_batched() {
    let enums = include_str!("fixtures/shape_errors.yaml");
    match first_error(compile_yaml(MESSAGES, enums, STRUCTS)) {
        CompileError::InvalidShape(report) => {
            assert!(report.documents[0].is_valid());
            let enums = &report.documents[1];
            assert_eq!(enums.kind, SchemaKind::Enum);
            let indices: Vec<usize> = enums.entries.iter().map(|e| e.index).collect();
            assert_eq!(indices, vec![0, 1, 2, 3]);
            assert!(report.documents[2].is_valid());
            assert!(report.to_string().contains("enums: invalid"));
        }
        other => panic!("expected InvalidShape, got {:?}", other),
    }
}

#[test]
fn test_invalid_array_lengths() {
    for bad in ["float[0]", "float[-1]", "float[x]", "float[3][4]", "float[3]junk"] {
        let structs = format!(
            "{}- struct:\n    name: Samples\n    members:\n      - {{ name: data, type: \"{}\" }}\n",
            STRUCTS, bad
        );
        match first_error(compile_yaml(MESSAGES, ENUMS, &structs)) {
            CompileError::InvalidArrayLength { entity, member, .. } => {
                assert_eq!(entity, "Samples");
                assert_eq!(member, "data");
            }
            other => panic!("expected InvalidArrayLength for {}, got {:?}", bad, other),
        }
    }
}

#[test]
fn test_duplicate_enums_abort() {
    let enums = format!("{}- enum:\n    name: FlightMode\n    list: [Other]\n", ENUMS);
    let err = compile_yaml(MESSAGES, &enums, STRUCTS).unwrap_err();
    assert_eq!(err.len(), 1);
    assert!(matches!(
        &err.errors()[0],
        CompileError::DuplicateNames { kind: SchemaKind::Enum, names } if names == &vec!["FlightMode".to_string()]
    ));
}

#[test]
fn test_cross_kind_collision() {
    let enums = format!("{}- enum:\n    name: Vector3\n    list: [X, Y, Z]\n", ENUMS);
    match first_error(compile_yaml(MESSAGES, &enums, STRUCTS)) {
        CompileError::CrossKindCollision { name, first, second } => {
            assert_eq!(name, "Vector3");
            assert_eq!(first, SchemaKind::Enum);
            assert_eq!(second, SchemaKind::Struct);
        }
        other => panic!("expected CrossKindCollision, got {:?}", other),
    }
}

#[test]
fn test_struct_named_like_registry() {
    let structs = format!("{}- struct:\n    name: MessageId\n", STRUCTS);
    match first_error(compile_yaml(MESSAGES, ENUMS, &structs)) {
        CompileError::CrossKindCollision { name, first, second } => {
            assert_eq!(name, "MessageId");
            assert_eq!(first, SchemaKind::Enum);
            assert_eq!(second, SchemaKind::Struct);
        }
        other => panic!("expected CrossKindCollision, got {:?}", other),
    }
}

#[test]
fn test_file_collision() {
    let structs = format!("{}- struct:\n    name: IMUData\n- struct:\n    name: ImuData\n", STRUCTS);
    match first_error(compile_yaml(MESSAGES, ENUMS, &structs)) {
        CompileError::FileCollision { path, first, second } => {
            assert_eq!(path, "common_msg/structs/imu_data.h");
            assert_eq!(first, "struct IMUData");
            assert_eq!(second, "struct ImuData");
        }
        other => panic!("expected FileCollision, got {:?}", other),
    }
}

#[test]
fn test_reserved_enumerator() {
    let enums = format!("{}- enum:\n    name: Phase\n    list: [Unknown, Armed]\n", ENUMS);
    assert!(matches!(
        first_error(compile_yaml(MESSAGES, &enums, STRUCTS)),
        CompileError::ReservedEnumerator { entity, value } if entity == "Phase" && value == "Unknown"
    ));
}

#[test]
fn test_mismatched_brief_list() {
    let enums = "- enum:\n    name: Phase\n    list: [Armed, Disarmed]\n    brief_list: [only one]\n";
    assert!(matches!(
        first_error(compile_yaml(MESSAGES, enums, STRUCTS)),
        CompileError::ListLengthMismatch { expected: 2, got: 1, .. }
    ));
}

#[test]
fn test_mismatched_elaboration_list() {
    let enums = "- enum:\n    name: Phase\n    list: [Armed, Disarmed]\n    elaboration_list: [only one]\n";
    assert!(matches!(
        first_error(compile_yaml(MESSAGES, enums, STRUCTS)),
        CompileError::ListLengthMismatch { list: "elaboration_list", expected: 2, got: 1, .. }
    ));
}

#[test]
fn test_unresolved_member_type() {
    let messages = format!(
        "{}- class:\n    name: Broken\n    inherit: {{ name: BusObject }}\n    members:\n      - {{ name: blob, type: Blob }}\n",
        MESSAGES
    );
    let err = compile_yaml(&messages, ENUMS, STRUCTS).unwrap_err();
    // reported once, on the message rather than its twin
    assert_eq!(err.len(), 1);
    match &err.errors()[0] {
        CompileError::UnresolvedType { entity, member, received } => {
            assert_eq!(entity, "Broken");
            assert_eq!(member, "blob");
            assert_eq!(received, "Blob");
        }
        other => panic!("expected UnresolvedType, got {:?}", other),
    }
}

#[test]
fn test_message_without_root_is_rejected() {
    let messages = format!("{}- class:\n    name: Stray\n", MESSAGES);
    assert!(matches!(
        first_error(compile_yaml(&messages, ENUMS, STRUCTS)),
        CompileError::NotABusMessage { entity, root } if entity == "Stray" && root == "BusObject"
    ));
}

#[test]
fn test_message_inheritance_cycle() {
    let messages = format!(
        "{}- class:\n    name: Ping\n    inherit: {{ name: Pong }}\n- class:\n    name: Pong\n    inherit: {{ name: Ping }}\n",
        MESSAGES
    );
    let err = compile_yaml(&messages, ENUMS, STRUCTS).unwrap_err();
    assert_eq!(err.len(), 1);
    match &err.errors()[0] {
        CompileError::InheritanceCycle { kind, entities } => {
            assert_eq!(*kind, SchemaKind::Message);
            assert_eq!(entities, &vec!["Ping".to_string(), "Pong".to_string()]);
        }
        other => panic!("expected InheritanceCycle, got {:?}", other),
    }
}

#[test]
fn test_link_errors_are_collected() {
    let structs = format!(
        "{}- struct:\n    name: A\n    inherit: {{ name: Ghost }}\n- struct:\n    name: B\n    members:\n      - {{ name: c, type: Nope }}\n",
        STRUCTS
    );
    let err = compile_yaml(MESSAGES, ENUMS, &structs).unwrap_err();
    assert_eq!(err.len(), 2);
    assert!(matches!(err.errors()[0], CompileError::UnknownParent { .. }));
    assert!(matches!(err.errors()[1], CompileError::UnresolvedType { .. }));
    assert!(err.to_string().starts_with("ERROR! "));
}
