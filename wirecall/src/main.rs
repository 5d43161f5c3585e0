//! # Wirecall CLI Entry Point
//!
//! The main executable for the Wirecall tool. This file drives the
//! application lifecycle:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`].
//! 2. **Connection**: Dials the target server through `wirecall_core`'s
//!    connection manager.
//! 3. **Execution**: Resolves a schema (local compilation, a descriptor set
//!    file, or server reflection) and delegates the call to the invoker.
//! 4. **Presentation**: Formats and prints the resulting data or error
//!    status to standard output/error.

mod cli;
mod formatter;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands, TargetArgs};
use formatter::{FormattedString, GenericError, ServiceList};
use prost_reflect::DescriptorPool;
use std::path::{Path, PathBuf};
use std::process;
use wirecall_core::conn::ConnectionProfile;
use wirecall_core::conn::manager::ConnectionManager;
use wirecall_core::invoke::{CallError, CallReply, CallRequest, Invoker};
use wirecall_core::reflection::client::ReflectionClient;
use wirecall_core::resolver::DescriptorResolver;
use wirecall_core::resolver::well_known::WellKnownRegistry;
use wirecall_core::tonic::transport::Channel;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    match args.command {
        Commands::Scan { dir } => run_scan(&dir),
        Commands::List { target } => run_list(&target).await,
        Commands::Describe { target, service } => run_describe(&target, &service).await,
        Commands::Call {
            target,
            endpoint,
            body,
            headers,
            descriptor_set,
            proto_dir,
        } => {
            let (service, method) = endpoint;
            run_call(&target, service, method, body, headers, descriptor_set, proto_dir).await
        }
    }
}

async fn connect_or_exit(profile: &ConnectionProfile) -> Channel {
    let manager = ConnectionManager::new();
    match manager.connect(profile).await {
        Ok(channel) => channel,
        Err(err) => {
            eprintln!(
                "{}",
                FormattedString::from(GenericError("Connection Error:", err))
            );
            process::exit(1);
        }
    }
}

fn run_scan(dir: &Path) -> anyhow::Result<()> {
    let mut resolver = DescriptorResolver::new(WellKnownRegistry::standard());
    let report = resolver
        .scan(dir)
        .with_context(|| format!("failed to scan '{}'", dir.display()))?;

    for compiled in report.compiled() {
        println!("{}:", compiled.proto_path.display());
        for service in &compiled.schema.services {
            println!("{}", FormattedString::from(service));
        }
    }

    for (path, error) in report.failures() {
        eprintln!(
            "{}",
            FormattedString::from(GenericError(
                "Failed to compile:",
                format!("{}: {error}", path.display()),
            ))
        );
    }
    Ok(())
}

async fn run_list(target: &TargetArgs) -> anyhow::Result<()> {
    let channel = connect_or_exit(&target.profile()).await;
    let mut client = ReflectionClient::new(channel);

    match client.list_services().await {
        Ok(services) => println!("{}", FormattedString::from(ServiceList(services))),
        Err(err) => {
            eprintln!(
                "{}",
                FormattedString::from(GenericError("Reflection Failed:", err))
            );
            process::exit(1);
        }
    }
    Ok(())
}

async fn run_describe(target: &TargetArgs, service: &str) -> anyhow::Result<()> {
    let channel = connect_or_exit(&target.profile()).await;
    let mut client = ReflectionClient::new(channel);

    match client.service_schema(service).await {
        Ok(service) => println!("{}", FormattedString::from(&service)),
        Err(err) => {
            eprintln!(
                "{}",
                FormattedString::from(GenericError("Symbol Lookup Failed:", err))
            );
            process::exit(1);
        }
    }
    Ok(())
}

async fn run_call(
    target: &TargetArgs,
    service: String,
    method: String,
    body: serde_json::Value,
    headers: Vec<(String, String)>,
    descriptor_set: Option<PathBuf>,
    proto_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let profile = target.profile();
    let channel = connect_or_exit(&profile).await;

    let pool = match (descriptor_set, proto_dir) {
        (Some(path), _) => pool_from_descriptor_set(&path)?,
        (None, Some(dir)) => pool_from_proto_dir(&dir, &service)?,
        (None, None) => {
            let mut reflection = ReflectionClient::new(channel.clone());
            match reflection.descriptor_pool_for_symbol(&service).await {
                Ok(pool) => pool,
                Err(err) => {
                    eprintln!(
                        "{}",
                        FormattedString::from(GenericError("Symbol Lookup Failed:", err))
                    );
                    process::exit(1);
                }
            }
        }
    };

    let request = CallRequest {
        service,
        method,
        body,
        headers: headers.into(),
    };

    let mut invoker = Invoker::with_default_headers(channel, profile.default_headers);
    match invoker.call(&pool, request).await {
        Ok(CallReply::Unary(value)) => println!("{}", FormattedString::from(value)),
        Ok(CallReply::Stream(values)) => {
            for value in values {
                println!("{}", FormattedString::from(value));
            }
        }
        Err(CallError::Rpc(status)) => println!("{}", FormattedString::from(status)),
        Err(err) => {
            eprintln!(
                "{}",
                FormattedString::from(GenericError("Call Failed:", err))
            );
            process::exit(1);
        }
    }
    Ok(())
}

fn pool_from_descriptor_set(path: &Path) -> anyhow::Result<DescriptorPool> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read descriptor set '{}'", path.display()))?;
    DescriptorPool::decode(bytes.as_slice())
        .with_context(|| format!("invalid descriptor set '{}'", path.display()))
}

fn pool_from_proto_dir(dir: &Path, service: &str) -> anyhow::Result<DescriptorPool> {
    let mut resolver = DescriptorResolver::new(WellKnownRegistry::standard());
    let report = resolver
        .scan(dir)
        .with_context(|| format!("failed to scan '{}'", dir.display()))?;

    let compiled = report
        .compiled()
        .find(|c| c.schema.service(service).is_some())
        .with_context(|| {
            format!("no .proto file under '{}' defines service '{service}'", dir.display())
        })?;

    DescriptorPool::from_file_descriptor_set(compiled.file_set.clone())
        .with_context(|| format!("invalid descriptors compiled from '{}'", dir.display()))
}
