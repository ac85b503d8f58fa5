//! mDNS/DNS-SD orchestration for local network services
//!
//! This crate lets a process advertise itself as a named, typed, ported
//! service on the local network, browse for services of a given type, and
//! resolve discovered services to a connectable numeric address. The
//! packet-level protocol work is delegated to a discovery stack (the `mdns-sd`
//! daemon in production, RFC 6762/6763); this crate is the orchestration on
//! top of it:
//!
//! 1. One publish session and one browse session per orchestrator, each
//!    independently startable and stoppable, replaced on restart
//! 2. A registry of resolves in flight so every resolve settles exactly once
//! 3. Normalization of the stack's verbose callback surface into a single
//!    delegate notification contract
//! 4. An auto-resolve mode that transparently resolves every discovered
//!    service
//!
//! All state is in memory and scoped to the orchestrator's lifetime.
//!
//! # Example
//!
//! ```no_run
//! use netservice_core::{ClosureDelegate, NetworkService, ServiceType};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = NetworkService::new()?;
//!
//!     let mut delegate = ClosureDelegate::new();
//!     delegate.did_resolve = Some(Box::new(|service, address| {
//!         println!("{} is at {}", service.name, address);
//!     }));
//!     service.set_delegate(Box::new(delegate));
//!
//!     service.set_auto_resolve(true);
//!     service.start_browse_service(&ServiceType::Http);
//!
//!     tokio::signal::ctrl_c().await?;
//!     Ok(())
//! }
//! ```

pub mod addr;
pub mod config;
pub mod delegate;
pub mod error;
pub mod mdns;
pub mod service;
pub mod stack;
pub mod tracker;
pub mod types;

// Re-export commonly used types for convenience
pub use addr::{extract_address, AddressError, RawAddress};
pub use config::ServiceConfig;
pub use delegate::{ClosureDelegate, NetworkServiceDelegate, NoopDelegate};
pub use error::{NetServiceError, Result};
pub use mdns::MdnsStack;
pub use service::NetworkService;
pub use stack::{DiscoveryStack, StackEvent};
pub use tracker::ResolveTracker;
pub use types::{ServiceDescriptor, ServiceKey, ServiceType, DEFAULT_DOMAIN};
