//! # Well-Known Type Registry
//!
//! A process-wide (but explicitly owned) registry of standard, widely reused
//! message shapes such as `google.protobuf.Timestamp`. It is built once at
//! startup and injected wherever well-known types matter — the resolver
//! merges its include paths into every compile's search list, and the model
//! builder tags fields of registered types distinctly so a consumer can
//! special-case them (e.g. render a date-time picker).
//!
//! There is no implicit global state: callers construct
//! [`WellKnownRegistry::standard`] and pass it down.
use std::path::{Path, PathBuf};

/// A named, pre-resolved message shape with the include path that satisfies
/// its import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WellKnownType {
    /// Fully qualified type name, e.g. `google.protobuf.Timestamp`.
    pub full_name: String,
    /// Import path projects use for it, e.g. `google/protobuf/timestamp.proto`.
    pub proto_path: String,
}

impl WellKnownType {
    pub fn new(full_name: impl Into<String>, proto_path: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            proto_path: proto_path.into(),
        }
    }
}

/// Registry of well-known types plus extra include directories that resolve
/// their imports without requiring every scanned project to vendor them.
#[derive(Debug, Clone, Default)]
pub struct WellKnownRegistry {
    types: Vec<WellKnownType>,
    include_paths: Vec<PathBuf>,
}

impl WellKnownRegistry {
    /// The standard `google.protobuf` set.
    ///
    /// `protoc` resolves these imports from its bundled copies, so no include
    /// path is registered for them; paths are only added for additional
    /// shared types via [`add_include_path`](Self::add_include_path).
    pub fn standard() -> Self {
        let types = [
            ("google.protobuf.Timestamp", "google/protobuf/timestamp.proto"),
            ("google.protobuf.Duration", "google/protobuf/duration.proto"),
            ("google.protobuf.Empty", "google/protobuf/empty.proto"),
            ("google.protobuf.Any", "google/protobuf/any.proto"),
            ("google.protobuf.Struct", "google/protobuf/struct.proto"),
            ("google.protobuf.Value", "google/protobuf/struct.proto"),
            ("google.protobuf.ListValue", "google/protobuf/struct.proto"),
            ("google.protobuf.FieldMask", "google/protobuf/field_mask.proto"),
            ("google.protobuf.DoubleValue", "google/protobuf/wrappers.proto"),
            ("google.protobuf.FloatValue", "google/protobuf/wrappers.proto"),
            ("google.protobuf.Int64Value", "google/protobuf/wrappers.proto"),
            ("google.protobuf.UInt64Value", "google/protobuf/wrappers.proto"),
            ("google.protobuf.Int32Value", "google/protobuf/wrappers.proto"),
            ("google.protobuf.UInt32Value", "google/protobuf/wrappers.proto"),
            ("google.protobuf.BoolValue", "google/protobuf/wrappers.proto"),
            ("google.protobuf.StringValue", "google/protobuf/wrappers.proto"),
            ("google.protobuf.BytesValue", "google/protobuf/wrappers.proto"),
        ];
        Self {
            types: types
                .into_iter()
                .map(|(name, path)| WellKnownType::new(name, path))
                .collect(),
            include_paths: Vec::new(),
        }
    }

    /// Registers an additional shared type.
    pub fn register(&mut self, ty: WellKnownType) {
        if !self.contains(&ty.full_name) {
            self.types.push(ty);
        }
    }

    /// Adds a directory whose contents satisfy well-known imports.
    pub fn add_include_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.include_paths.contains(&path) {
            self.include_paths.push(path);
        }
    }

    pub fn include_paths(&self) -> &[PathBuf] {
        &self.include_paths
    }

    pub fn types(&self) -> &[WellKnownType] {
        &self.types
    }

    pub fn contains(&self, full_name: &str) -> bool {
        self.types.iter().any(|t| t.full_name == full_name)
    }

    /// Whether a descriptor file path belongs to a registered well-known
    /// type (these never map back to a scanned source file).
    pub fn owns_proto_path(&self, proto_path: &Path) -> bool {
        let Some(path) = proto_path.to_str() else {
            return false;
        };
        self.types.iter().any(|t| t.proto_path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_set_knows_timestamp() {
        let registry = WellKnownRegistry::standard();
        assert!(registry.contains("google.protobuf.Timestamp"));
        assert!(!registry.contains("echo.EchoRequest"));
    }

    #[test]
    fn register_is_idempotent() {
        let mut registry = WellKnownRegistry::standard();
        let before = registry.types().len();
        registry.register(WellKnownType::new(
            "google.protobuf.Timestamp",
            "google/protobuf/timestamp.proto",
        ));
        assert_eq!(registry.types().len(), before);
    }
}
