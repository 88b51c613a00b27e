//! Semantic Linker
//!
//! Resolves every cross-reference in a synthesized schema set:
//!
//! 1. Inheritance: each struct and message is linked to its parent of the same
//!    kind. Structs without a parent (or naming the root message) fall back to
//!    the universal root struct. Concrete messages must reach the root message.
//! 2. Member types: each member is resolved to a numeric primitive, an enum, or
//!    a struct (message twins included), in that order.
//!
//! Every resolved reference adds the referenced file to the owner's include
//! list. Inheritance and include graphs are checked for cycles with petgraph.
//! All link errors are collected before the pass fails.

use std::collections::{HashMap, HashSet};

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::config::{CompilerConfig, ModelConfig};
use crate::error::{CompileError, Diagnostics};
use crate::model::{
    EnumDef, FileMeta, LinkedManifest, MemberDef, MemberKind, MessageDef, MessageHandling, NumericType, StructDef,
};
use crate::schema::{DefaultValue, SchemaKind};
use crate::synth::{CompositeDraft, MemberDraft, Synthesized};

/// A resolved reference
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Symbol<'a> {
    Primitive(NumericType),
    Enum(&'a EnumDef),
    Struct(&'a CompositeDraft),
    Message(&'a CompositeDraft),
}

impl<'a> Symbol<'a> {
    /// Namespace the symbol is declared in
    pub fn namespace(&self) -> Option<&'a str> {
        match self {
            Symbol::Primitive(_) => None,
            Symbol::Enum(e) => e.namespace.as_deref(),
            Symbol::Struct(s) | Symbol::Message(s) => s.namespace.as_deref(),
        }
    }

    /// File a reference to this symbol includes
    pub fn file(&self) -> Option<&'a FileMeta> {
        match self {
            Symbol::Primitive(_) => None,
            Symbol::Enum(e) => Some(&e.file),
            Symbol::Struct(s) | Symbol::Message(s) => Some(&s.file),
        }
    }
}

/// Every named entity, keyed by (kind, name)
#[derive(Debug, Default)]
pub struct SymbolTable<'a> {
    symbols: HashMap<SchemaKind, HashMap<&'a str, Symbol<'a>>>,
}

impl<'a> SymbolTable<'a> {
    pub fn build(synth: &'a Synthesized) -> Self {
        let mut table = Self::default();
        for def in &synth.enums {
            table.insert(SchemaKind::Enum, &def.name, Symbol::Enum(def));
        }
        for draft in &synth.structs {
            table.insert(SchemaKind::Struct, &draft.name, Symbol::Struct(draft));
        }
        for draft in &synth.messages {
            table.insert(SchemaKind::Message, &draft.name, Symbol::Message(draft));
        }
        table
    }

    // first declaration wins
    fn insert(&mut self, kind: SchemaKind, name: &'a str, symbol: Symbol<'a>) {
        self.symbols.entry(kind).or_default().entry(name).or_insert(symbol);
    }

    pub fn lookup(&self, kind: SchemaKind, name: &str) -> Option<Symbol<'a>> {
        self.symbols.get(&kind)?.get(name).copied()
    }

    /// Resolve a member type: numeric primitive, then enum, then struct
    pub fn resolve_type(&self, type_name: &str) -> Option<Symbol<'a>> {
        if let Some(ty) = NumericType::parse(type_name) {
            return Some(Symbol::Primitive(ty));
        }
        self.lookup(SchemaKind::Enum, type_name)
            .or_else(|| self.lookup(SchemaKind::Struct, type_name))
    }
}

/// Link a synthesized schema set into the frozen manifest
pub fn link(synth: &Synthesized, config: &CompilerConfig) -> Result<LinkedManifest, Diagnostics> {
    Linker::new(synth, &config.model).link()
}

pub struct Linker<'a> {
    synth: &'a Synthesized,
    model: &'a ModelConfig,
    symbols: SymbolTable<'a>,
}

impl<'a> Linker<'a> {
    pub fn new(synth: &'a Synthesized, model: &'a ModelConfig) -> Self {
        Self {
            synth,
            model,
            symbols: SymbolTable::build(synth),
        }
    }

    pub fn link(&self) -> Result<LinkedManifest, Diagnostics> {
        let mut diagnostics = Diagnostics::new();

        let structs: Vec<StructDef> = self
            .synth
            .structs
            .iter()
            .map(|draft| self.link_struct(draft, &mut diagnostics))
            .collect();
        let messages = self.link_messages(&mut diagnostics);

        self.check_bus_messages(&messages, &mut diagnostics);
        // an inheritance cycle is always an include cycle too; report it once
        if self.check_inheritance_cycles(&structs, &messages, &mut diagnostics) {
            check_include_cycles(&self.synth.enums, &structs, &messages, &mut diagnostics);
        }

        let Some(message_id) = self.synth.registry(self.model).cloned() else {
            diagnostics.push(CompileError::Manifest(format!(
                "{} registry was not synthesized",
                self.model.message_id_enum
            )));
            return Err(diagnostics);
        };

        let message_handling = MessageHandling {
            message_id,
            messages: messages.iter().filter(|m| !m.is_root()).cloned().collect(),
        };

        debug!(
            structs = structs.len(),
            messages = messages.len(),
            "schemas linked"
        );

        diagnostics.into_result(LinkedManifest {
            enums: self.synth.enums.clone(),
            structs,
            messages,
            message_handling,
        })
    }

    fn link_struct(&self, draft: &CompositeDraft, diagnostics: &mut Diagnostics) -> StructDef {
        let mut file = draft.file.clone();
        let parent = self.struct_parent(draft, diagnostics);
        let parent_symbol = parent.as_deref().and_then(|p| self.symbols.lookup(SchemaKind::Struct, p));
        if let Some(parent_file) = parent_symbol.and_then(|p| p.file()) {
            file.add_include(parent_file.file_path());
        }

        // twin members are reported through their message
        let report = draft.twin_of.is_none();
        let members = self.resolve_members(&draft.name, &draft.members, &mut file, report, diagnostics);

        StructDef {
            name: draft.name.clone(),
            namespace: draft.namespace.clone(),
            parent,
            parent_namespace: parent_symbol.and_then(|p| p.namespace()).map(str::to_string),
            members,
            file,
            twin_of: draft.twin_of.clone(),
        }
    }

    /// Resolved parent struct name; `None` only for the root struct
    fn struct_parent(&self, draft: &CompositeDraft, diagnostics: &mut Diagnostics) -> Option<String> {
        let declared = draft
            .parent
            .as_deref()
            .filter(|parent| *parent != self.model.root_message);

        let parent = match declared {
            None if draft.name == self.model.root_struct => return None,
            None => self.model.root_struct.as_str(),
            Some(parent) => parent,
        };

        if self.symbols.lookup(SchemaKind::Struct, parent).is_none() {
            // a twin's missing parent message is reported on the message itself
            if draft.twin_of.is_none() || parent == self.model.root_struct {
                diagnostics.push(CompileError::UnknownParent {
                    kind: SchemaKind::Struct,
                    entity: draft.name.clone(),
                    parent: parent.to_string(),
                });
            }
        }
        Some(parent.to_string())
    }

    fn link_messages(&self, diagnostics: &mut Diagnostics) -> Vec<MessageDef> {
        let parents: HashSet<&str> = self
            .synth
            .messages
            .iter()
            .filter_map(|m| m.parent.as_deref())
            .collect();

        let mut messages = Vec::with_capacity(self.synth.messages.len());
        for draft in &self.synth.messages {
            let mut file = draft.file.clone();

            let parent_symbol = draft
                .parent
                .as_deref()
                .and_then(|p| self.symbols.lookup(SchemaKind::Message, p));
            if let Some(parent) = draft.parent.as_deref() {
                match parent_symbol.and_then(|s| s.file()) {
                    Some(parent_file) => file.add_include(parent_file.file_path()),
                    None => diagnostics.push(CompileError::UnknownParent {
                        kind: SchemaKind::Message,
                        entity: draft.name.clone(),
                        parent: parent.to_string(),
                    }),
                }
            }

            let twin = if draft.name == self.model.root_message {
                None
            } else {
                if let Some(twin_file) = self
                    .symbols
                    .lookup(SchemaKind::Struct, &draft.name)
                    .and_then(|s| s.file())
                {
                    file.add_include(twin_file.file_path());
                }
                Some(draft.name.clone())
            };

            let members = self.resolve_members(&draft.name, &draft.members, &mut file, true, diagnostics);

            messages.push(MessageDef {
                name: draft.name.clone(),
                namespace: draft.namespace.clone(),
                parent: draft.parent.clone(),
                parent_namespace: parent_symbol.and_then(|p| p.namespace()).map(str::to_string),
                members,
                file,
                has_children: parents.contains(draft.name.as_str()),
                twin,
            });
        }
        messages
    }

    fn resolve_members(
        &self,
        owner: &str,
        drafts: &[MemberDraft],
        file: &mut FileMeta,
        report: bool,
        diagnostics: &mut Diagnostics,
    ) -> Vec<MemberDef> {
        let mut members = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let symbol = self.symbols.resolve_type(&draft.type_name);
            let kind = match symbol {
                Some(Symbol::Primitive(ty)) => MemberKind::Numeric(ty),
                Some(Symbol::Enum(def)) => {
                    file.add_include(def.file.file_path());
                    MemberKind::Enum
                }
                Some(Symbol::Struct(def)) => {
                    file.add_include(def.file.file_path());
                    MemberKind::Struct
                }
                Some(Symbol::Message(_)) | None => {
                    if report {
                        diagnostics.push(CompileError::UnresolvedType {
                            entity: owner.to_string(),
                            member: draft.name.clone(),
                            received: draft.type_name.clone(),
                        });
                    }
                    continue;
                }
            };
            if let (Some(value), Some(symbol)) = (&draft.default, symbol) {
                if report && !default_fits(symbol, value) {
                    diagnostics.push(CompileError::InvalidDefault {
                        entity: owner.to_string(),
                        member: draft.name.clone(),
                        expected: draft.type_name.clone(),
                        received: value.to_string(),
                    });
                }
            }
            members.push(MemberDef {
                name: draft.name.clone(),
                type_name: draft.type_name.clone(),
                array_len: draft.array_len,
                default: draft.default.clone(),
                kind,
                type_namespace: symbol.and_then(|s| s.namespace()).map(str::to_string),
            });
        }
        members
    }

    /// Every concrete message must inherit, directly or not, from the root
    fn check_bus_messages(&self, messages: &[MessageDef], diagnostics: &mut Diagnostics) {
        let parent_of: HashMap<&str, Option<&str>> = messages
            .iter()
            .map(|m| (m.name.as_str(), m.parent.as_deref()))
            .collect();
        let root = self.model.root_message.as_str();

        for message in messages.iter().filter(|m| m.name != root) {
            let mut seen = HashSet::new();
            let mut current = message.name.as_str();
            while current != root && seen.insert(current) {
                match parent_of.get(current) {
                    Some(Some(parent)) => current = parent,
                    Some(None) => {
                        diagnostics.push(CompileError::NotABusMessage {
                            entity: message.name.clone(),
                            root: root.to_string(),
                        });
                        break;
                    }
                    // unknown parent, already reported
                    None => break,
                }
            }
        }
    }

    /// Returns `true` when neither hierarchy has a cycle
    fn check_inheritance_cycles(
        &self,
        structs: &[StructDef],
        messages: &[MessageDef],
        diagnostics: &mut Diagnostics,
    ) -> bool {
        let before = diagnostics.len();

        let twins: HashSet<&str> = structs
            .iter()
            .filter(|s| s.twin_of.is_some())
            .map(|s| s.name.as_str())
            .collect();
        let struct_cycles = find_cycles(
            structs.iter().map(|s| s.name.as_str()),
            structs
                .iter()
                .filter_map(|s| Some((s.name.as_str(), s.parent.as_deref()?))),
        );
        for entities in struct_cycles {
            // twin cycles mirror message cycles
            if entities.iter().all(|e| twins.contains(e.as_str())) {
                continue;
            }
            diagnostics.push(CompileError::InheritanceCycle {
                kind: SchemaKind::Struct,
                entities,
            });
        }

        let message_cycles = find_cycles(
            messages.iter().map(|m| m.name.as_str()),
            messages
                .iter()
                .filter_map(|m| Some((m.name.as_str(), m.parent.as_deref()?))),
        );
        for entities in message_cycles {
            diagnostics.push(CompileError::InheritanceCycle {
                kind: SchemaKind::Message,
                entities,
            });
        }

        diagnostics.len() == before
    }
}

/// A default must be a literal of the member's type; enum defaults name a
/// declared enumerator. Struct members take no default.
fn default_fits(symbol: Symbol<'_>, value: &DefaultValue) -> bool {
    match (symbol, value) {
        (Symbol::Primitive(NumericType::Bool), DefaultValue::Bool(_)) => true,
        (Symbol::Primitive(NumericType::Float | NumericType::Double), DefaultValue::Int(_) | DefaultValue::Float(_)) => {
            true
        }
        (Symbol::Primitive(ty), DefaultValue::Int(i)) => ty
            .integer_range()
            .is_some_and(|(min, max)| (min..=max).contains(&i128::from(*i))),
        (Symbol::Enum(def), DefaultValue::Text(enumerator)) => def.value_of(enumerator).is_some(),
        _ => false,
    }
}

/// Generated files must not include themselves, even transitively
fn check_include_cycles(
    enums: &[EnumDef],
    structs: &[StructDef],
    messages: &[MessageDef],
    diagnostics: &mut Diagnostics,
) {
    let files: Vec<(String, &[String])> = enums
        .iter()
        .map(|e| &e.file)
        .chain(structs.iter().map(|s| &s.file))
        .chain(messages.iter().map(|m| &m.file))
        .map(|f| (f.file_path(), f.includes.as_slice()))
        .collect();

    let cycles = find_cycles(
        files.iter().map(|(path, _)| path.as_str()),
        files
            .iter()
            .flat_map(|(path, includes)| includes.iter().map(move |inc| (path.as_str(), inc.as_str()))),
    );
    for files in cycles {
        diagnostics.push(CompileError::DependencyCycle { files });
    }
}

/// Strongly connected components with a cycle, nodes in declaration order
fn find_cycles<'n>(
    nodes: impl IntoIterator<Item = &'n str>,
    edges: impl IntoIterator<Item = (&'n str, &'n str)>,
) -> Vec<Vec<String>> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();
    for node in nodes {
        index.entry(node).or_insert_with(|| graph.add_node(node));
    }
    for (from, to) in edges {
        if let (Some(&a), Some(&b)) = (index.get(from), index.get(to)) {
            graph.add_edge(a, b, ());
        }
    }

    let mut cycles: Vec<Vec<NodeIndex>> = kosaraju_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .map(|mut scc| {
            scc.sort();
            scc
        })
        .collect();
    cycles.sort();

    cycles
        .into_iter()
        .map(|scc| scc.into_iter().map(|i| graph[i].to_string()).collect())
        .collect()
}
