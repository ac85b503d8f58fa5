use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use netservice_core::{
    ClosureDelegate, NetworkService, ServiceConfig, ServiceDescriptor, ServiceKey, ServiceType,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::signal;
use tracing::{error, info, warn};

/// NetService - publish and discover services on the local network
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Advertise a service on the local network
    Publish {
        /// Service type: http, tcp:<profile> or udp:<profile>
        #[arg(short = 't', long = "type", default_value = "http")]
        service_type: String,

        /// Instance name to advertise
        #[arg(short, long)]
        name: String,

        /// Port to advertise
        #[arg(short, long)]
        port: u16,

        /// DNS-SD domain
        #[arg(short, long, default_value = "local.")]
        domain: String,
    },

    /// Browse for services of a type
    Browse {
        /// Service type: http, tcp:<profile> or udp:<profile>
        #[arg(short = 't', long = "type", default_value = "http")]
        service_type: String,

        /// DNS-SD domain
        #[arg(short, long, default_value = "local.")]
        domain: String,

        /// Do not resolve discovered services automatically
        #[arg(long)]
        no_resolve: bool,

        /// Print registry updates as JSON lines
        #[arg(long)]
        json: bool,
    },
}

/// A discovered service as kept in the client-side registry
#[derive(Debug, Clone, Serialize)]
struct RegistryEntry {
    name: String,
    regtype: String,
    domain: String,
    address: Option<String>,
    port: Option<u16>,
    last_seen_at: DateTime<Utc>,
}

impl RegistryEntry {
    fn from_descriptor(service: &ServiceDescriptor) -> Self {
        Self {
            name: service.name.clone(),
            regtype: service.regtype.clone(),
            domain: service.domain.clone(),
            address: None,
            port: None,
            last_seen_at: Utc::now(),
        }
    }
}

type Registry = Arc<Mutex<HashMap<ServiceKey, RegistryEntry>>>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "netservice=info,netservice_core=info".into()),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Command::Publish {
            service_type,
            name,
            port,
            domain,
        } => run_publish(&service_type, &name, port, domain).await,
        Command::Browse {
            service_type,
            domain,
            no_resolve,
            json,
        } => run_browse(&service_type, domain, no_resolve, json).await,
    }
}

async fn run_publish(service_type: &str, name: &str, port: u16, domain: String) -> Result<()> {
    let service_type = parse_service_type(service_type)?;
    let config = ServiceConfig {
        domain,
        ..Default::default()
    };
    let service = NetworkService::with_config(config)?;

    let mut delegate = ClosureDelegate::new();
    delegate.did_publish = Some(Box::new(|s| {
        info!(service = %s.key(), "advertisement is up");
    }));
    delegate.did_not_publish = Some(Box::new(|s| {
        error!(service = %s.key(), "advertisement failed");
    }));
    service.set_delegate(Box::new(delegate));

    service.start_publish_service(&service_type, name, port);
    info!(name, port, "publishing, press Ctrl-C to stop");

    signal::ctrl_c().await?;
    service.stop_publish();
    service.shutdown();
    Ok(())
}

async fn run_browse(service_type: &str, domain: String, no_resolve: bool, json: bool) -> Result<()> {
    let service_type = parse_service_type(service_type)?;
    let config = ServiceConfig {
        domain,
        auto_resolve: !no_resolve,
        ..Default::default()
    };
    let service = NetworkService::with_config(config)?;

    let registry: Registry = Arc::new(Mutex::new(HashMap::new()));

    let mut delegate = ClosureDelegate::new();
    let reg = registry.clone();
    delegate.did_find = Some(Box::new(move |s, _more, _started| {
        let mut reg = reg.lock().unwrap();
        let entry = reg
            .entry(s.key())
            .or_insert_with(|| RegistryEntry::from_descriptor(s));
        entry.last_seen_at = Utc::now();
        report("found", entry, json);
    }));
    let reg = registry.clone();
    delegate.did_resolve = Some(Box::new(move |s, address| {
        let mut reg = reg.lock().unwrap();
        // Update in place: a re-resolved service refreshes its address
        let entry = reg
            .entry(s.key())
            .or_insert_with(|| RegistryEntry::from_descriptor(s));
        entry.address = Some(address.to_string());
        entry.port = s.port;
        entry.last_seen_at = Utc::now();
        report("resolved", entry, json);
    }));
    delegate.did_not_resolve = Some(Box::new(|s| {
        warn!(service = %s.key(), "resolution failed");
    }));
    service.set_delegate(Box::new(delegate));

    service.start_browse_service(&service_type);
    info!(
        regtype = %service_type.to_service_string(),
        resolve = !no_resolve,
        "browsing, press Ctrl-C to stop"
    );

    signal::ctrl_c().await?;
    service.stop_browse();
    service.shutdown();
    Ok(())
}

fn parse_service_type(s: &str) -> Result<ServiceType> {
    if s == "http" {
        return Ok(ServiceType::Http);
    }
    if let Some(profile) = s.strip_prefix("tcp:") {
        return Ok(ServiceType::Tcp(profile.to_string()));
    }
    if let Some(profile) = s.strip_prefix("udp:") {
        return Ok(ServiceType::Udp(profile.to_string()));
    }
    anyhow::bail!("unknown service type '{s}', expected http, tcp:<profile> or udp:<profile>")
}

fn report(event: &str, entry: &RegistryEntry, json: bool) {
    if json {
        #[derive(Serialize)]
        struct Line<'a> {
            event: &'a str,
            #[serde(flatten)]
            entry: &'a RegistryEntry,
        }
        match serde_json::to_string(&Line { event, entry }) {
            Ok(line) => println!("{line}"),
            Err(e) => error!(error = %e, "failed to serialize registry entry"),
        }
    } else if let (Some(address), Some(port)) = (&entry.address, entry.port) {
        println!("{event} {} at {address}:{port}", entry.name);
    } else {
        println!("{event} {}", entry.name);
    }
}
