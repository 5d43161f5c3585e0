//! Test-only echo service for the `wirecall-core` integration suite.
//!
//! Provides the generated server trait for all four streaming shapes plus
//! the compiled [`FILE_DESCRIPTOR_SET`], so tests can drive the dynamic
//! client against a known schema. Not published, not for production.

pub mod pb {
    include!(concat!(env!("OUT_DIR"), "/echo.rs"));
}

pub use pb::echo_service_server::{EchoService, EchoServiceServer};
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("descriptors");
