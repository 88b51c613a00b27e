//! busgen
//!
//! An interface-definition compiler for bus messages. Three YAML schema
//! documents (enumerates, structs, and bus messages) are validated, linked into
//! a single resolved model, and handed to code-generation backends.
//!
//! ## Pipeline
//!
//! ```text
//! schema documents
//!   -> validate   shape check per entry, duplicate and cross-kind names
//!   -> synth      file identifiers, enum widths, arrays, twins, MessageId
//!   -> link       parents, member types, includes, cycle checks
//!   -> LinkedManifest (frozen)
//!   -> Generator  CppBackend, ConstructBackend, ManifestBackend
//! ```
//!
//! Everything up to the `LinkedManifest` is free of I/O beyond reading the
//! inputs, and collects every error it finds. Generation only starts from a
//! successful link, so a failed compile writes nothing.
//!
//! The [`checksum`] module holds the CRC-32 engine used to frame messages on
//! the wire, with independent table derivations that must agree.

pub mod checksum;
pub mod codegen;
pub mod config;
pub mod error;
pub mod link;
pub mod manifest;
pub mod model;
pub mod names;
pub mod pipeline;
pub mod schema;
pub mod synth;
pub mod validate;

pub use checksum::{Crc32, Polynomial, TableMethod};
pub use config::CompilerConfig;
pub use error::{CompileError, Diagnostics, Result};
pub use model::{EnumDef, LinkedManifest, MemberDef, MemberKind, MessageDef, NumericType, StructDef};
pub use pipeline::{compile, compile_documents, SchemaDocuments};
pub use schema::SchemaKind;
