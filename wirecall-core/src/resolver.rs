//! # Descriptor Resolver
//!
//! Turns a directory of `.proto` sources into binary type descriptors by
//! driving one schema-compiler subprocess per file.
//!
//! Contract, per scan:
//! 1. Recursively enumerate `.proto` files under the root, skipping known
//!    non-source subtrees (vendored dependency caches, VCS metadata).
//! 2. Fingerprint the discovered sources; an unchanged fingerprint returns
//!    the previous report without invoking the compiler at all.
//! 3. Per file, sequentially: build the search-path list (detected schema
//!    root, the file's own directory, the scan root, registered well-known
//!    include paths), reject import cycles with a named ancestor chain, then
//!    compile with imports included and map each descriptor name back to its
//!    on-disk source.
//!
//! A compiler failure on one file is recorded against that file only; the
//! scan always continues with the remaining files.
pub mod imports;
pub mod protoc;
pub mod well_known;

use crate::model::{Schema, builder::build_schema};
use prost_reflect::DescriptorPool;
use prost_types::FileDescriptorSet;
use protoc::{Protoc, SchemaCompiler};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;
use well_known::WellKnownRegistry;

/// Subtrees never scanned for sources.
const SKIP_DIRS: &[&str] = &[".git", "node_modules", "vendor", "target", ".cache"];

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to read scan root '{path}': {source}")]
    RootUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failure of a single file; never fatal to the surrounding scan.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("schema compiler failed:\n{stderr}")]
    Compiler { stderr: String },
    #[error("circular import detected: {}", format_chain(.chain))]
    CircularImport { chain: Vec<PathBuf> },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("compiler produced an undecodable descriptor set: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("compiler produced an invalid descriptor set: {0}")]
    Descriptor(#[from] prost_reflect::DescriptorError),
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A registered scan root with its discovered sources and content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSource {
    pub root: PathBuf,
    pub files: Vec<PathBuf>,
    /// SHA-256 over the sorted (relative path, bytes) pairs; recomputed on
    /// every scan, used to skip redundant recompilation.
    pub fingerprint: String,
}

impl SchemaSource {
    /// Enumerates the `.proto` files under `root` and fingerprints them.
    pub fn discover(root: &Path) -> Result<Self, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::RootUnreadable {
                path: root.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "not a readable directory",
                ),
            });
        }

        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| {
                !entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIP_DIRS.contains(&name))
            })
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|ext| ext == "proto")
            })
            .map(|entry| entry.into_path())
            .collect();
        files.sort();

        let mut hasher = Sha256::new();
        for file in &files {
            let relative = file.strip_prefix(root).unwrap_or(file);
            hasher.update(relative.to_string_lossy().as_bytes());
            match std::fs::read(file) {
                Ok(bytes) => hasher.update(&bytes),
                // Unreadable files still participate in the fingerprint so
                // a later successful read changes it.
                Err(err) => hasher.update(err.kind().to_string().as_bytes()),
            }
        }
        let fingerprint = hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect();

        Ok(Self {
            root: root.to_path_buf(),
            files,
            fingerprint,
        })
    }
}

/// Everything produced for one successfully compiled source file.
#[derive(Debug, Clone)]
pub struct CompiledProto {
    pub proto_path: PathBuf,
    /// Self-contained set: the file plus its transitive imports.
    pub file_set: FileDescriptorSet,
    /// Descriptor file names mapped back to the real files on disk, found by
    /// probing each search root. Compiler-bundled well-known files have no
    /// on-disk counterpart and are absent.
    pub resolved_files: Vec<(String, PathBuf)>,
    pub schema: Schema,
}

/// Per-file outcome; the aggregate result of a scan is a list of these, not
/// a single pass/fail.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<CompiledProto, FileError>,
}

#[derive(Debug)]
pub struct ScanReport {
    pub source: SchemaSource,
    pub outcomes: Vec<FileOutcome>,
}

impl ScanReport {
    pub fn compiled(&self) -> impl Iterator<Item = &CompiledProto> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &FileError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.path.as_path(), e)))
    }
}

/// Compiles scan roots into descriptor sets, caching by content fingerprint.
pub struct DescriptorResolver<C = Protoc> {
    compiler: C,
    well_known: WellKnownRegistry,
    cache: HashMap<PathBuf, Arc<ScanReport>>,
}

impl DescriptorResolver<Protoc> {
    pub fn new(well_known: WellKnownRegistry) -> Self {
        Self::with_compiler(Protoc::from_env(), well_known)
    }
}

impl<C: SchemaCompiler> DescriptorResolver<C> {
    pub fn with_compiler(compiler: C, well_known: WellKnownRegistry) -> Self {
        Self {
            compiler,
            well_known,
            cache: HashMap::new(),
        }
    }

    pub fn well_known(&self) -> &WellKnownRegistry {
        &self.well_known
    }

    /// Scans `root`, compiling each discovered file sequentially.
    ///
    /// Rescanning an unchanged root returns the cached report without any
    /// compiler invocation.
    pub fn scan(&mut self, root: &Path) -> Result<Arc<ScanReport>, ScanError> {
        let source = SchemaSource::discover(root)?;

        if let Some(cached) = self.cache.get(root)
            && cached.source.fingerprint == source.fingerprint
        {
            tracing::debug!(root = %root.display(), "sources unchanged, reusing compiled descriptors");
            return Ok(cached.clone());
        }

        let outcomes: Vec<FileOutcome> = source
            .files
            .iter()
            .map(|file| FileOutcome {
                path: file.clone(),
                result: self.compile_file(file, root),
            })
            .collect();

        for outcome in &outcomes {
            if let Err(err) = &outcome.result {
                tracing::warn!(file = %outcome.path.display(), error = %err, "proto failed to compile");
            }
        }

        let report = Arc::new(ScanReport { source, outcomes });
        self.cache.insert(root.to_path_buf(), report.clone());
        Ok(report)
    }

    fn compile_file(&self, file: &Path, scan_root: &Path) -> Result<CompiledProto, FileError> {
        let search_paths = self.search_paths(file, scan_root);

        imports::check_import_cycle(file, &search_paths)?;

        let file_set = self.compiler.compile(file, &search_paths)?;
        let resolved_files = map_descriptor_names(&file_set, &search_paths, &self.well_known);

        let pool = DescriptorPool::from_file_descriptor_set(file_set.clone())?;
        let schema = build_schema(&pool, &self.well_known);

        Ok(CompiledProto {
            proto_path: file.to_path_buf(),
            file_set,
            resolved_files,
            schema,
        })
    }

    /// Search paths for one file: detected schema root, the file's own
    /// directory, the scan root, then every well-known include path.
    fn search_paths(&self, file: &Path, scan_root: &Path) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        let mut push = |path: PathBuf| {
            if !paths.contains(&path) {
                paths.push(path);
            }
        };

        if let Some(root) = detect_schema_root(file) {
            push(root);
        }
        if let Some(dir) = file.parent() {
            push(dir.to_path_buf());
        }
        push(scan_root.to_path_buf());
        for path in self.well_known.include_paths() {
            push(path.clone());
        }
        paths
    }
}

/// Maps each descriptor file name back to a real file on disk by trying
/// every search root in order. Well-known files come from the compiler's
/// bundled copies and have no on-disk counterpart to map.
fn map_descriptor_names(
    file_set: &FileDescriptorSet,
    search_paths: &[PathBuf],
    well_known: &WellKnownRegistry,
) -> Vec<(String, PathBuf)> {
    file_set
        .file
        .iter()
        .filter_map(|fd| {
            let name = fd.name.clone()?;
            if well_known.owns_proto_path(Path::new(&name)) {
                return None;
            }
            let path = search_paths
                .iter()
                .map(|root| root.join(&name))
                .find(|candidate| candidate.is_file())?;
            Some((name, path))
        })
        .collect()
}

/// Package-directory heuristic: a file declaring `package a.b;` that sits
/// under `.../a/b/` has the ancestor above `a` as its schema root, which is
/// the directory imports of its siblings are written relative to.
fn detect_schema_root(file: &Path) -> Option<PathBuf> {
    let source = std::fs::read_to_string(file).ok()?;
    let package = source.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("package")?.trim();
        Some(rest.strip_suffix(';')?.trim().to_string())
    })?;

    let mut dir = file.parent()?.to_path_buf();
    for segment in package.rsplit('.') {
        if dir.file_name()?.to_str()? != segment {
            return None;
        }
        dir = dir.parent()?.to_path_buf();
    }
    Some(dir)
}
