//! Code Generation
//!
//! Drives pluggable backends over a finished [`LinkedManifest`].
//!
//! Architecture:
//! - Backend: four emission hooks (enums, structs, messages, auxiliary)
//! - EmitContext: the rendering handle; resolves output directories, writes
//!   files and records what was written
//! - Generator: backends in registration order, run sequentially
//!
//! A `Generator` can only be built from a linked manifest, so a failed compile
//! never reaches a backend.

pub mod construct;
pub mod cpp;
pub mod manifest;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::CompilerConfig;
use crate::error::Result;
use crate::model::{EnumDef, LinkedManifest, MessageDef, StructDef};

pub use construct::ConstructBackend;
pub use cpp::CppBackend;
pub use manifest::ManifestBackend;

// =============================================================================
// EmitContext
// =============================================================================

/// Output handle passed to every backend hook
#[derive(Debug, Clone)]
pub struct EmitContext {
    manifest_dir: PathBuf,
    cpp_include_dir: PathBuf,
    cpp_unit_tests_dir: PathBuf,
    utility_dir: PathBuf,
    python_dir: PathBuf,
    dry_run: bool,
    written: Vec<PathBuf>,
}

impl EmitContext {
    pub fn new(config: &CompilerConfig) -> Self {
        Self {
            manifest_dir: config.manifest_dir(),
            cpp_include_dir: config.cpp_include_dir(),
            cpp_unit_tests_dir: config.cpp_unit_tests_dir(),
            utility_dir: config.utility_dir(),
            python_dir: config.python_dir(),
            dry_run: false,
            written: Vec::new(),
        }
    }

    /// Record paths without touching the filesystem
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn manifest_dir(&self) -> &Path {
        &self.manifest_dir
    }

    pub fn cpp_include_dir(&self) -> &Path {
        &self.cpp_include_dir
    }

    pub fn cpp_unit_tests_dir(&self) -> &Path {
        &self.cpp_unit_tests_dir
    }

    pub fn utility_dir(&self) -> &Path {
        &self.utility_dir
    }

    pub fn python_dir(&self) -> &Path {
        &self.python_dir
    }

    /// Write `contents` to `path`, creating parent directories
    pub fn write(&mut self, path: PathBuf, contents: &str) -> Result<()> {
        if self.dry_run {
            info!("   - would write {}", path.display());
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, contents)?;
            info!("   - {}", path.display());
        }
        self.written.push(path);
        Ok(())
    }

    /// Every path written (or, in dry-run, that would have been)
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

// =============================================================================
// Backend
// =============================================================================

/// A consumer of the linked manifest.
///
/// Hooks receive read-only views and may write any files through the context.
pub trait Backend {
    fn name(&self) -> &str;

    fn emit_enums(&self, ctx: &mut EmitContext, enums: &[EnumDef]) -> Result<()>;

    fn emit_structs(&self, ctx: &mut EmitContext, structs: &[StructDef]) -> Result<()>;

    fn emit_messages(&self, ctx: &mut EmitContext, messages: &[MessageDef]) -> Result<()>;

    /// Everything that needs the whole model
    fn auxiliary(&self, ctx: &mut EmitContext, manifest: &LinkedManifest) -> Result<()>;
}

// =============================================================================
// Generator
// =============================================================================

/// Runs registered backends over a frozen manifest
pub struct Generator {
    manifest: LinkedManifest,
    backends: Vec<Box<dyn Backend>>,
}

impl Generator {
    pub fn new(manifest: LinkedManifest) -> Self {
        Self {
            manifest,
            backends: Vec::new(),
        }
    }

    pub fn register(&mut self, backend: impl Backend + 'static) -> &mut Self {
        self.backends.push(Box::new(backend));
        self
    }

    pub fn with_backend(mut self, backend: impl Backend + 'static) -> Self {
        self.register(backend);
        self
    }

    pub fn manifest(&self) -> &LinkedManifest {
        &self.manifest
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Run every backend in registration order
    pub fn run(&self, ctx: &mut EmitContext) -> Result<()> {
        for backend in &self.backends {
            info!("Generating {} output", backend.name());
            backend.emit_enums(ctx, &self.manifest.enums)?;
            backend.emit_structs(ctx, &self.manifest.structs)?;
            backend.emit_messages(ctx, &self.manifest.messages)?;
            backend.auxiliary(ctx, &self.manifest)?;
            debug!(backend = backend.name(), files = ctx.written().len(), "backend finished");
        }
        Ok(())
    }
}
