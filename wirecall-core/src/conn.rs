//! # Connection Profiles & Headers
//!
//! A [`ConnectionProfile`] names a target server: host, port, TLS settings,
//! schema-source flag, and default headers. Profiles are plain serde data so
//! a store or UI can persist them; the engine itself never persists anything.
//!
//! [`ConnectionManager`](manager::ConnectionManager) owns the live channels,
//! one per profile at most.
pub mod manager;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The well-known secure-HTTPS port; dialing it always uses TLS, even when
/// the profile did not ask for it.
pub const HTTPS_PORT: u16 = 443;

/// A named target against which calls are issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub tls: bool,
    /// Optional CA certificate (PEM) used to verify the server.
    #[serde(default)]
    pub ca_certificate: Option<PathBuf>,
    /// Schema source for this profile: live reflection when `true`,
    /// locally compiled descriptors otherwise.
    #[serde(default)]
    pub reflection: bool,
    /// Headers attached to every call on this profile, subject to the merge
    /// policy of [`HeaderSet::merged_with`].
    #[serde(default)]
    pub default_headers: HeaderSet,
}

impl ConnectionProfile {
    /// A plaintext profile using live reflection.
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            tls: false,
            ca_certificate: None,
            reflection: true,
            default_headers: HeaderSet::default(),
        }
    }

    /// Plaintext by default; TLS when requested or when the target is the
    /// well-known HTTPS port.
    pub fn wants_tls(&self) -> bool {
        self.tls || self.port == HTTPS_PORT
    }

    pub fn uri(&self) -> String {
        let scheme = if self.wants_tls() { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

/// An ordered set of header key/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeaderSet(Vec<(String, String)>);

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, String)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Merges per-call headers over these defaults, key by key.
    ///
    /// Policy, applied uniformly everywhere headers meet: defaults keep
    /// their order; an override with a matching key (ASCII case-insensitive,
    /// header keys are case-insensitive on the wire) replaces that value in
    /// place; override keys not present in the defaults append in their own
    /// order. Overrides never drop unrelated defaults.
    pub fn merged_with(&self, overrides: &HeaderSet) -> HeaderSet {
        let mut merged = self.0.clone();
        for (key, value) in &overrides.0 {
            match merged.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
                Some(existing) => existing.1 = value.clone(),
                None => merged.push((key.clone(), value.clone())),
            }
        }
        HeaderSet(merged)
    }
}

impl From<Vec<(String, String)>> for HeaderSet {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }
}

impl FromIterator<(String, String)> for HeaderSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn merge_overrides_matching_keys_and_appends_new_ones() {
        let defaults = headers(&[("authorization", "Bearer abc"), ("x-env", "staging")]);
        let overrides = headers(&[("x-env", "prod"), ("x-trace", "1")]);

        let merged = defaults.merged_with(&overrides);

        assert_eq!(
            merged,
            headers(&[
                ("authorization", "Bearer abc"),
                ("x-env", "prod"),
                ("x-trace", "1"),
            ])
        );
    }

    #[test]
    fn merge_is_case_insensitive_on_keys() {
        let defaults = headers(&[("X-Env", "staging")]);
        let merged = defaults.merged_with(&headers(&[("x-env", "prod")]));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.iter().next().unwrap().1, "prod");
    }

    #[test]
    fn empty_overrides_keep_defaults_intact() {
        let defaults = headers(&[("authorization", "Bearer abc")]);
        assert_eq!(defaults.merged_with(&HeaderSet::new()), defaults);
    }

    #[test]
    fn https_port_forces_tls() {
        let mut profile = ConnectionProfile::new("prod", "api.example.com", 443);
        assert!(!profile.tls);
        assert!(profile.wants_tls());
        assert_eq!(profile.uri(), "https://api.example.com:443");

        profile.port = 50051;
        assert!(!profile.wants_tls());
        assert_eq!(profile.uri(), "http://api.example.com:50051");

        profile.tls = true;
        assert!(profile.wants_tls());
    }
}
