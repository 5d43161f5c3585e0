//! Import-cycle detection.
//!
//! Runs before each compile: a depth-first walk over the file's `import`
//! statements, resolved against the same search paths the compiler will use.
//! A file reappearing among its own ancestors fails immediately with the
//! full chain; a visited set bounds the walk so nothing ever recurses
//! without limit.
//!
//! This walk exists only to produce a precise circular-import diagnostic.
//! The dependency information attached to a schema always comes from the
//! compiler's descriptor output, never from this textual pass.
use super::FileError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Fails with [`FileError::CircularImport`] if `file` participates in an
/// import cycle reachable through `search_paths`.
pub(crate) fn check_import_cycle(file: &Path, search_paths: &[PathBuf]) -> Result<(), FileError> {
    let identity = file.canonicalize()?;
    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    visit(&identity, search_paths, &mut chain, &mut visited)
}

fn visit(
    file: &PathBuf,
    search_paths: &[PathBuf],
    chain: &mut Vec<PathBuf>,
    visited: &mut HashSet<PathBuf>,
) -> Result<(), FileError> {
    if chain.contains(file) {
        let mut cycle = chain.clone();
        cycle.push(file.clone());
        return Err(FileError::CircularImport { chain: cycle });
    }
    if !visited.insert(file.clone()) {
        // Fully explored through another branch.
        return Ok(());
    }

    chain.push(file.clone());
    let source = std::fs::read_to_string(file)?;
    for import in parse_imports(&source) {
        // Imports that resolve nowhere are left for the compiler to report.
        if let Some(dependency) = resolve_import(&import, search_paths) {
            visit(&dependency, search_paths, chain, visited)?;
        }
    }
    chain.pop();
    Ok(())
}

/// Extracts the import paths declared in a `.proto` source.
pub(crate) fn parse_imports(source: &str) -> Vec<String> {
    source
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("import")?.trim_start();
            let rest = rest
                .strip_prefix("public")
                .or_else(|| rest.strip_prefix("weak"))
                .unwrap_or(rest)
                .trim_start();
            let rest = rest.strip_prefix('"')?;
            let end = rest.find('"')?;
            Some(rest[..end].to_string())
        })
        .collect()
}

fn resolve_import(import: &str, search_paths: &[PathBuf]) -> Option<PathBuf> {
    search_paths
        .iter()
        .map(|root| root.join(import))
        .find(|candidate| candidate.is_file())
        .and_then(|candidate| candidate.canonicalize().ok())
}
