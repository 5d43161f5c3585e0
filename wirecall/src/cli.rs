//! # CLI
//!
//! The command-line surface of `wirecall`, defined with `clap`.
//!
//! Parsing also performs input validation: targets must be `host:port`,
//! endpoints `package.Service/Method`, headers `key:value`, bodies JSON.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use wirecall_core::conn::ConnectionProfile;

#[derive(Parser)]
#[command(name = "wirecall", version, about = "Dynamic gRPC client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile every .proto file under a directory and print the schemas
    ///
    /// Each file is compiled independently; a file that fails to compile is
    /// reported and does not stop the rest of the scan.
    Scan {
        /// Directory to scan recursively for .proto files
        dir: PathBuf,
    },

    /// List the services a server exposes over reflection
    List {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Describe a service: its methods and their message shapes
    Describe {
        #[command(flatten)]
        target: TargetArgs,

        /// Fully qualified service name (e.g. my.package.Service)
        service: String,
    },

    /// Call a gRPC method with a JSON body
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// wirecall call localhost:50051 my.pkg.Service/Method --body '{"key": "value"}'
    /// ```
    Call {
        #[command(flatten)]
        target: TargetArgs,

        /// Endpoint (package.Service/Method)
        #[arg(value_parser = parse_endpoint)]
        endpoint: (String, String),

        /// JSON body (object for unary, array for streaming)
        #[arg(long, value_parser = parse_body)]
        body: serde_json::Value,

        /// Extra header as 'key:value'; repeatable
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Path to a compiled descriptor set (.bin), used instead of reflection
        #[arg(long)]
        descriptor_set: Option<PathBuf>,

        /// Directory of .proto sources to compile, used instead of reflection
        #[arg(long, conflicts_with = "descriptor_set")]
        proto_dir: Option<PathBuf>,
    },
}

/// Flags shared by every command that dials a server.
#[derive(Args)]
pub struct TargetArgs {
    /// Server address as host:port
    #[arg(value_parser = parse_target)]
    pub target: (String, u16),

    /// Use TLS even on a port other than 443
    #[arg(long)]
    pub tls: bool,

    /// CA certificate (PEM) used to verify the server
    #[arg(long)]
    pub ca_cert: Option<PathBuf>,
}

impl TargetArgs {
    pub fn profile(&self) -> ConnectionProfile {
        let (host, port) = self.target.clone();
        let mut profile = ConnectionProfile::new("cli", host, port);
        profile.tls = self.tls;
        profile.ca_certificate = self.ca_cert.clone();
        profile
    }
}

fn parse_target(value: &str) -> Result<(String, u16), String> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("Invalid target '{value}'. Expected 'host:port'"))?;

    if host.trim().is_empty() {
        return Err("Host cannot be empty".to_string());
    }

    let port = port
        .parse::<u16>()
        .map_err(|_| format!("Invalid port '{port}'"))?;

    Ok((host.to_string(), port))
}

fn parse_endpoint(value: &str) -> Result<(String, String), String> {
    let (service, method) = value.split_once('/').ok_or_else(|| {
        format!("Invalid endpoint format: '{value}'. Expected 'package.Service/Method'")
    })?;

    if service.trim().is_empty() || method.trim().is_empty() {
        return Err("Service and Method names cannot be empty".to_string());
    }

    Ok((service.to_string(), method.to_string()))
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| "Format must be 'key:value'".to_string())
}

fn parse_body(value: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(value).map_err(|e| format!("Invalid JSON: {e}"))
}
