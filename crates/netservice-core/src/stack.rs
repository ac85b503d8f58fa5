//! Interface to the platform discovery stack
//!
//! The actual multicast protocol work (record construction, conflict
//! resolution, packet scheduling) is delegated to an external collaborator.
//! [`DiscoveryStack`] captures the surface the orchestrator needs: intent
//! registration plus a stream of raw asynchronous events. [`MdnsStack`](crate::MdnsStack)
//! is the production implementation; tests substitute scripted stacks.

use crate::error::Result;
use crate::types::ServiceDescriptor;
use async_channel::Receiver;
use std::time::Duration;

/// Raw event emitted by the discovery stack
///
/// This mirrors the verbose callback surface of platform discovery daemons.
/// The orchestrator normalizes these into delegate notifications; events
/// without a corresponding notification are logged and dropped.
#[derive(Debug, Clone)]
pub enum StackEvent {
    /// Advertisement is about to be registered
    WillPublish { service: ServiceDescriptor },

    /// Advertisement was registered with the daemon
    DidPublish { service: ServiceDescriptor },

    /// Advertisement was rejected
    DidNotPublish {
        service: ServiceDescriptor,
        reason: String,
    },

    /// A browse session started searching
    SearchStarted { regtype: String },

    /// A browse session stopped searching
    SearchStopped { regtype: String },

    /// A service instance appeared while browsing
    DidFind {
        service: ServiceDescriptor,
        more_coming: bool,
    },

    /// A service instance disappeared while browsing
    DidRemove {
        service: ServiceDescriptor,
        more_coming: bool,
    },

    /// Resolution of a service is about to begin
    WillResolve { service: ServiceDescriptor },

    /// Resolution produced address records; the descriptor carries the
    /// resolved port and raw addresses
    DidResolveAddress { service: ServiceDescriptor },

    /// Resolution failed or timed out
    DidNotResolve {
        service: ServiceDescriptor,
        reason: String,
    },

    /// A publish or resolve session was stopped externally
    DidStop { service: ServiceDescriptor },
}

/// The external discovery collaborator
///
/// Every method registers intent and returns immediately; outcomes arrive on
/// the [`events`](DiscoveryStack::events) channel. An `Err` return reports a
/// submission the daemon rejected outright.
pub trait DiscoveryStack: Send + Sync {
    /// Begins advertising the service; the descriptor must carry a port
    fn publish(&self, service: &ServiceDescriptor) -> Result<()>;

    /// Stops advertising the service
    fn stop_publish(&self, service: &ServiceDescriptor) -> Result<()>;

    /// Begins browsing for the type on the domain
    fn browse(&self, domain: &str, regtype: &str) -> Result<()>;

    /// Stops browsing for the type on the domain
    fn stop_browse(&self, domain: &str, regtype: &str) -> Result<()>;

    /// Begins resolving the service, giving up after `timeout`
    fn resolve(&self, service: &ServiceDescriptor, timeout: Duration) -> Result<()>;

    /// Returns the raw event stream
    ///
    /// All events for one stack instance are delivered on this single
    /// channel; the orchestrator drains it serially.
    fn events(&self) -> Receiver<StackEvent>;
}
