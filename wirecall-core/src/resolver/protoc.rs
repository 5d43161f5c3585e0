//! The external schema-compiler contract.
//!
//! Each source file is compiled by one blocking `protoc` invocation asking
//! for a self-contained binary descriptor set: `--descriptor_set_out` into a
//! temporary file, `--include_imports` so transitive dependencies land in the
//! same set, one `-I` per search directory, and the target file last. A
//! non-zero exit code plus the captured diagnostic text is the failure
//! payload for that file.
use super::FileError;
use prost::Message;
use prost_types::FileDescriptorSet;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Compiles one interface-definition source into a descriptor set.
///
/// The seam exists so the resolver can be exercised without a real compiler
/// on the path (tests wrap [`Protoc`] with a counting shim).
pub trait SchemaCompiler {
    fn compile(
        &self,
        proto: &Path,
        search_paths: &[PathBuf],
    ) -> Result<FileDescriptorSet, FileError>;
}

/// The `protoc` binary, located via the `PROTOC` environment variable or the
/// `PATH` (the prost-build convention).
#[derive(Debug, Clone)]
pub struct Protoc {
    binary: PathBuf,
}

impl Protoc {
    pub fn from_env() -> Self {
        let binary = std::env::var_os("PROTOC")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("protoc"));
        Self { binary }
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for Protoc {
    fn default() -> Self {
        Self::from_env()
    }
}

impl SchemaCompiler for Protoc {
    fn compile(
        &self,
        proto: &Path,
        search_paths: &[PathBuf],
    ) -> Result<FileDescriptorSet, FileError> {
        let out = tempfile::NamedTempFile::new()?;

        let mut command = Command::new(&self.binary);
        command
            .arg(format!("--descriptor_set_out={}", out.path().display()))
            .arg("--include_imports");
        for path in search_paths {
            command.arg("-I").arg(path);
        }
        command.arg(proto);

        let output = command.output()?;
        if !output.status.success() {
            return Err(FileError::Compiler {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let bytes = std::fs::read(out.path())?;
        Ok(FileDescriptorSet::decode(bytes.as_slice())?)
    }
}
