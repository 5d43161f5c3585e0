//! # Connection Manager
//!
//! Owns at most one live transport channel per profile. The state machine
//! per profile is Disconnected → Connecting → Ready, or Connecting → Failed;
//! `connect` on a Ready profile is a no-op returning the existing channel.
//!
//! The connection table sits behind one read-write lock: lookups take the
//! read path, connect/disconnect/replace take the exclusive path. The lock
//! guards only the bookkeeping — a cloned `Channel` is safe for concurrent
//! in-flight calls and is never used under the lock. The lock is likewise
//! never held across the dial await; a per-profile guard mutex serializes
//! dials so concurrent `connect` calls on one profile share a single
//! attempt.
use super::ConnectionProfile;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};

/// Every dial phase is bounded by this.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection failures, kept distinct per phase: a dial that timed out, a
/// dial the transport rejected, and a transport that connected but never
/// became ready are three different diagnoses.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("invalid endpoint '{uri}': {source}")]
    InvalidEndpoint {
        uri: String,
        source: tonic::transport::Error,
    },
    #[error("failed to read CA certificate '{path}': {source}")]
    CaCertificate {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TLS configuration for '{uri}': {source}")]
    Tls {
        uri: String,
        source: tonic::transport::Error,
    },
    #[error("server '{uri}' unreachable: {source}")]
    Unreachable {
        uri: String,
        source: tonic::transport::Error,
    },
    #[error("timed out dialing '{uri}' after {timeout:?}")]
    DialTimeout { uri: String, timeout: Duration },
    #[error("connected to '{uri}' but the channel never became ready within {timeout:?}")]
    NeverReady { uri: String, timeout: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Failed,
}

enum Slot {
    Connecting,
    Ready(Channel),
    Failed(String),
}

/// One transport connection per configured profile.
pub struct ConnectionManager {
    connections: RwLock<HashMap<String, Slot>>,
    // Serializes dials per profile: concurrent `connect` calls on the same
    // name share one attempt instead of racing two transports.
    dial_guards: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    dial_timeout: Duration,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::with_dial_timeout(DIAL_TIMEOUT)
    }

    pub fn with_dial_timeout(dial_timeout: Duration) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            dial_guards: Mutex::new(HashMap::new()),
            dial_timeout,
        }
    }

    /// Connects the profile, or returns the existing channel when already
    /// Ready. A failed attempt leaves the profile in the Failed state; a
    /// later `connect` is a fresh, caller-initiated attempt — nothing here
    /// retries on its own.
    pub async fn connect(&self, profile: &ConnectionProfile) -> Result<Channel, ConnectError> {
        if let Some(channel) = self.channel(&profile.name).await {
            return Ok(channel);
        }

        let guard = {
            let mut guards = self.dial_guards.lock().await;
            Arc::clone(guards.entry(profile.name.clone()).or_default())
        };
        let _dialing = guard.lock().await;

        // A concurrent connect may have finished while we queued for the
        // guard; a Failed slot left by one stays a fresh attempt here.
        if let Some(channel) = self.channel(&profile.name).await {
            return Ok(channel);
        }

        self.connections
            .write()
            .await
            .insert(profile.name.clone(), Slot::Connecting);

        tracing::debug!(profile = %profile.name, uri = %profile.uri(), "dialing");
        let dialed = self.dial(profile).await;

        let mut table = self.connections.write().await;
        match dialed {
            Ok(channel) => {
                table.insert(profile.name.clone(), Slot::Ready(channel.clone()));
                Ok(channel)
            }
            Err(err) => {
                table.insert(profile.name.clone(), Slot::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    /// Drops the profile's connection, if any. Idempotent.
    pub async fn disconnect(&self, profile_name: &str) {
        self.connections.write().await.remove(profile_name);
        self.dial_guards.lock().await.remove(profile_name);
    }

    /// The live channel for a Ready profile.
    pub async fn channel(&self, profile_name: &str) -> Option<Channel> {
        match self.connections.read().await.get(profile_name) {
            Some(Slot::Ready(channel)) => Some(channel.clone()),
            _ => None,
        }
    }

    pub async fn state(&self, profile_name: &str) -> ConnectionState {
        match self.connections.read().await.get(profile_name) {
            None => ConnectionState::Disconnected,
            Some(Slot::Connecting) => ConnectionState::Connecting,
            Some(Slot::Ready(_)) => ConnectionState::Ready,
            Some(Slot::Failed(_)) => ConnectionState::Failed,
        }
    }

    /// The failure message for a Failed profile.
    pub async fn failure(&self, profile_name: &str) -> Option<String> {
        match self.connections.read().await.get(profile_name) {
            Some(Slot::Failed(message)) => Some(message.clone()),
            _ => None,
        }
    }

    async fn dial(&self, profile: &ConnectionProfile) -> Result<Channel, ConnectError> {
        let uri = profile.uri();
        let mut endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|source| ConnectError::InvalidEndpoint {
                uri: uri.clone(),
                source,
            })?
            .connect_timeout(self.dial_timeout);

        if profile.wants_tls() {
            let mut tls = ClientTlsConfig::new().with_native_roots();
            if let Some(path) = &profile.ca_certificate {
                let pem =
                    std::fs::read(path).map_err(|source| ConnectError::CaCertificate {
                        path: path.clone(),
                        source,
                    })?;
                tls = tls.ca_certificate(Certificate::from_pem(pem));
            }
            endpoint = endpoint
                .tls_config(tls)
                .map_err(|source| ConnectError::Tls {
                    uri: uri.clone(),
                    source,
                })?;
        }

        let started = Instant::now();
        let channel = match tokio::time::timeout(self.dial_timeout, endpoint.connect()).await {
            Err(_) => {
                return Err(ConnectError::DialTimeout {
                    uri,
                    timeout: self.dial_timeout,
                });
            }
            Ok(Err(source)) => return Err(ConnectError::Unreachable { uri, source }),
            Ok(Ok(channel)) => channel,
        };

        // The transport dialed; now wait until the channel actually accepts
        // requests, bounded by whatever remains of the same timeout.
        let remaining = self.dial_timeout.saturating_sub(started.elapsed());
        let mut grpc = tonic::client::Grpc::new(channel.clone());
        match tokio::time::timeout(remaining, grpc.ready()).await {
            Ok(Ok(())) => Ok(channel),
            Ok(Err(_)) | Err(_) => Err(ConnectError::NeverReady {
                uri,
                timeout: self.dial_timeout,
            }),
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
