//! Network service orchestrator
//!
//! [`NetworkService`] owns at most one publish session and one browse
//! session, tracks resolves in flight, and translates the discovery stack's
//! raw event stream into delegate notifications. Each instance runs a single
//! pump task that processes commands and stack events serially, so sessions
//! and the tracker are mutated from exactly one execution context. Handles
//! are cheap clones; their methods never block, they flip the synchronous
//! state flags and enqueue a command for the pump.

use crate::addr::extract_address;
use crate::config::ServiceConfig;
use crate::delegate::{NetworkServiceDelegate, NoopDelegate};
use crate::error::{NetServiceError, Result};
use crate::mdns::MdnsStack;
use crate::stack::{DiscoveryStack, StackEvent};
use crate::tracker::ResolveTracker;
use crate::types::{ServiceDescriptor, ServiceType};
use async_channel::{Receiver, Sender};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Requests enqueued by handles and applied by the pump
enum Command {
    StartPublish {
        service: ServiceDescriptor,
    },
    StopPublish,
    StartBrowse {
        domain: String,
        regtype: String,
    },
    StopBrowse,
    StartResolve {
        service: ServiceDescriptor,
        timeout: Duration,
    },
    SetDelegate {
        delegate: Box<dyn NetworkServiceDelegate>,
    },
}

/// The single active advertisement
struct PublishSession {
    service: ServiceDescriptor,
}

/// The single active search
struct BrowseSession {
    domain: String,
    regtype: String,
}

/// Orchestrates publish, browse and resolve over the discovery stack
///
/// Cloning yields another handle to the same instance. Failures reported by
/// the stack are surfaced through the delegate and never poison the
/// orchestrator; every operation can be started again afterwards.
#[derive(Clone)]
pub struct NetworkService {
    commands: Sender<Command>,
    config: ServiceConfig,
    publishing: Arc<AtomicBool>,
    browsing: Arc<AtomicBool>,
    auto_resolve: Arc<AtomicBool>,
    tasks: Arc<DashMap<String, JoinHandle<()>>>,
}

impl NetworkService {
    /// Creates an orchestrator over the mDNS daemon with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ServiceConfig::default())
    }

    /// Creates an orchestrator over the mDNS daemon
    pub fn with_config(config: ServiceConfig) -> Result<Self> {
        config.validate().map_err(NetServiceError::InvalidConfig)?;
        let stack = MdnsStack::with_capacity(config.event_capacity)?;
        Ok(Self::with_stack(config, Arc::new(stack)))
    }

    /// Creates an orchestrator over a caller-supplied discovery stack
    pub fn with_stack(config: ServiceConfig, stack: Arc<dyn DiscoveryStack>) -> Self {
        let (commands, command_rx) = async_channel::bounded(config.event_capacity);
        let publishing = Arc::new(AtomicBool::new(false));
        let browsing = Arc::new(AtomicBool::new(false));
        let auto_resolve = Arc::new(AtomicBool::new(config.auto_resolve));

        let events = stack.events();
        let pump = EventPump {
            stack,
            config: config.clone(),
            delegate: Box::new(NoopDelegate),
            tracker: ResolveTracker::new(),
            publish: None,
            browse: None,
            publishing: publishing.clone(),
            browsing: browsing.clone(),
            auto_resolve: auto_resolve.clone(),
        };

        let tasks = Arc::new(DashMap::new());
        tasks.insert(
            "pump".to_string(),
            tokio::spawn(pump.run(command_rx, events)),
        );

        Self {
            commands,
            config,
            publishing,
            browsing,
            auto_resolve,
            tasks,
        }
    }

    /// Attaches the delegate, replacing any previous one
    ///
    /// Replacement has no effect on sessions already in flight.
    pub fn set_delegate(&self, delegate: Box<dyn NetworkServiceDelegate>) {
        self.send(Command::SetDelegate { delegate });
    }

    // Publish

    /// Starts advertising the service, replacing any active advertisement
    pub fn start_publish(&self, service: ServiceDescriptor) {
        self.publishing.store(true, Ordering::SeqCst);
        self.send(Command::StartPublish { service });
    }

    /// Starts advertising on the configured domain
    pub fn start_publish_service(&self, service_type: &ServiceType, name: &str, port: u16) {
        let service =
            ServiceDescriptor::new(self.config.domain.clone(), service_type, name).with_port(port);
        self.start_publish(service);
    }

    /// Stops the active advertisement; a no-op when idle
    pub fn stop_publish(&self) {
        self.publishing.store(false, Ordering::SeqCst);
        self.send(Command::StopPublish);
    }

    pub fn is_publishing(&self) -> bool {
        self.publishing.load(Ordering::SeqCst)
    }

    // Browse

    /// Starts searching for services of the type, replacing any active search
    pub fn start_browse(&self, domain: impl Into<String>, service_type: &ServiceType) {
        self.browsing.store(true, Ordering::SeqCst);
        self.send(Command::StartBrowse {
            domain: domain.into(),
            regtype: service_type.to_service_string(),
        });
    }

    /// Starts searching on the configured domain
    pub fn start_browse_service(&self, service_type: &ServiceType) {
        self.start_browse(self.config.domain.clone(), service_type);
    }

    /// Stops the active search; a no-op when idle
    pub fn stop_browse(&self) {
        self.browsing.store(false, Ordering::SeqCst);
        self.send(Command::StopBrowse);
    }

    pub fn is_browsing(&self) -> bool {
        self.browsing.load(Ordering::SeqCst)
    }

    // Resolve

    /// Begins resolving the service with the configured timeout
    ///
    /// Re-issuing while a resolve for the same service identity is in flight
    /// is ignored.
    pub fn start_resolve(&self, service: ServiceDescriptor) {
        self.start_resolve_with_timeout(service, self.config.resolve_timeout());
    }

    /// Begins resolving the service, giving up after `timeout`
    pub fn start_resolve_with_timeout(&self, service: ServiceDescriptor, timeout: Duration) {
        self.send(Command::StartResolve { service, timeout });
    }

    /// Resolves every discovered service automatically when enabled
    pub fn set_auto_resolve(&self, enabled: bool) {
        self.auto_resolve.store(enabled, Ordering::SeqCst);
    }

    pub fn is_auto_resolve_enabled(&self) -> bool {
        self.auto_resolve.load(Ordering::SeqCst)
    }

    /// Stops active sessions and ends the pump
    ///
    /// Dropping every handle has the same effect.
    pub fn shutdown(&self) {
        self.commands.close();
    }

    fn send(&self, command: Command) {
        if let Err(e) = self.commands.try_send(command) {
            warn!(error = %e, "orchestrator command dropped");
        }
    }
}

/// Pump state, owned by the spawned task
struct EventPump {
    stack: Arc<dyn DiscoveryStack>,
    config: ServiceConfig,
    delegate: Box<dyn NetworkServiceDelegate>,
    tracker: ResolveTracker,
    publish: Option<PublishSession>,
    browse: Option<BrowseSession>,
    publishing: Arc<AtomicBool>,
    browsing: Arc<AtomicBool>,
    auto_resolve: Arc<AtomicBool>,
}

impl EventPump {
    async fn run(mut self, commands: Receiver<Command>, events: Receiver<StackEvent>) {
        loop {
            // Commands drain ahead of stack events so an enqueued request
            // (attach delegate, start a session) is in effect before the
            // next event is interpreted
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Ok(command) => self.handle_command(command),
                    // Every handle dropped, or explicit shutdown
                    Err(_) => break,
                },
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event),
                    // Discovery stack went away
                    Err(_) => break,
                },
            }
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(session) = self.publish.take() {
            let _ = self.stack.stop_publish(&session.service);
            self.publishing.store(false, Ordering::SeqCst);
        }
        if let Some(session) = self.browse.take() {
            let _ = self.stack.stop_browse(&session.domain, &session.regtype);
            self.browsing.store(false, Ordering::SeqCst);
        }
        debug!("orchestrator pump stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartPublish { service } => {
                // Explicit stop-then-start keeps the replacement auditable
                if let Some(previous) = self.publish.take() {
                    if let Err(e) = self.stack.stop_publish(&previous.service) {
                        debug!(service = %previous.service.key(), error = %e,
                            "stopping replaced advertisement failed");
                    }
                }

                debug!(service = %service.key(), "publishing service");
                match self.stack.publish(&service) {
                    Ok(()) => {
                        self.publish = Some(PublishSession { service });
                        self.publishing.store(true, Ordering::SeqCst);
                    }
                    Err(e) => {
                        warn!(service = %service.key(), error = %e, "publish submission failed");
                        self.publishing.store(false, Ordering::SeqCst);
                        self.delegate.did_not_publish(&service);
                    }
                }
            }

            Command::StopPublish => {
                if let Some(session) = self.publish.take() {
                    if let Err(e) = self.stack.stop_publish(&session.service) {
                        debug!(error = %e, "stop publish reported an error");
                    }
                }
                self.publishing.store(false, Ordering::SeqCst);
            }

            Command::StartBrowse { domain, regtype } => {
                if let Some(previous) = self.browse.take() {
                    if let Err(e) = self.stack.stop_browse(&previous.domain, &previous.regtype) {
                        debug!(error = %e, "stopping replaced browse failed");
                    }
                }

                debug!(domain = %domain, regtype = %regtype, "browsing for services");
                match self.stack.browse(&domain, &regtype) {
                    Ok(()) => {
                        self.browse = Some(BrowseSession { domain, regtype });
                        self.browsing.store(true, Ordering::SeqCst);
                    }
                    Err(e) => {
                        warn!(domain = %domain, regtype = %regtype, error = %e,
                            "browse submission failed");
                        self.browsing.store(false, Ordering::SeqCst);
                    }
                }
            }

            Command::StopBrowse => {
                if let Some(session) = self.browse.take() {
                    if let Err(e) = self.stack.stop_browse(&session.domain, &session.regtype) {
                        debug!(error = %e, "stop browse reported an error");
                    }
                }
                self.browsing.store(false, Ordering::SeqCst);
            }

            Command::StartResolve { service, timeout } => {
                self.start_resolve(service, timeout);
            }

            Command::SetDelegate { delegate } => {
                self.delegate = delegate;
            }
        }
    }

    fn start_resolve(&mut self, service: ServiceDescriptor, timeout: Duration) {
        let key = service.key();
        if self.tracker.contains(&key) {
            debug!(service = %key, "resolve already in flight, ignored");
            return;
        }

        match self.stack.resolve(&service, timeout) {
            Ok(()) => {
                self.tracker.add(key);
            }
            Err(e) => {
                warn!(service = %key, error = %e, "resolve submission failed");
                self.delegate.did_not_resolve(&service);
            }
        }
    }

    fn handle_event(&mut self, event: StackEvent) {
        match event {
            StackEvent::WillPublish { service } => {
                self.delegate.will_publish(&service);
            }

            StackEvent::DidPublish { service } => {
                if self.publish.is_some() {
                    self.publishing.store(true, Ordering::SeqCst);
                }
                self.delegate.did_publish(&service);
            }

            StackEvent::DidNotPublish { service, reason } => {
                warn!(service = %service.key(), reason = %reason, "service did not publish");
                self.publish = None;
                self.publishing.store(false, Ordering::SeqCst);
                self.delegate.did_not_publish(&service);
            }

            StackEvent::SearchStarted { regtype } => {
                debug!(regtype = %regtype, "search started");
            }

            StackEvent::SearchStopped { regtype } => {
                debug!(regtype = %regtype, "search stopped");
            }

            StackEvent::DidFind {
                service,
                more_coming,
            } => {
                let auto = self.auto_resolve.load(Ordering::SeqCst);
                if auto {
                    self.start_resolve(service.clone(), self.config.resolve_timeout());
                }
                self.delegate.did_find(&service, more_coming, auto);
            }

            StackEvent::DidRemove { service, .. } => {
                debug!(service = %service.key(), "service removed");
            }

            StackEvent::WillResolve { service } => {
                self.delegate.will_resolve(&service);
            }

            StackEvent::DidResolveAddress { service } => {
                match extract_address(&service.addresses) {
                    Ok(address) => self.delegate.did_resolve(&service, &address),
                    Err(e) => {
                        warn!(service = %service.key(), error = %e, "address extraction failed");
                        self.delegate.failed_to_extract_address(&service);
                    }
                }
                // Tracker mutation is the last step; a delegate re-issuing a
                // resolve from this notification goes through the command
                // queue and sees the entry cleared
                self.tracker.remove(&service.key());
            }

            StackEvent::DidNotResolve { service, reason } => {
                debug!(service = %service.key(), reason = %reason, "service did not resolve");
                self.delegate.did_not_resolve(&service);
                self.tracker.remove(&service.key());
            }

            StackEvent::DidStop { service } => {
                self.delegate.did_stop(&service);
                self.tracker.remove(&service.key());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullStack {
        // Held so the event channel stays open for the pump
        _event_tx: Sender<StackEvent>,
        event_rx: Receiver<StackEvent>,
    }

    impl NullStack {
        fn new() -> Self {
            let (event_tx, event_rx) = async_channel::bounded(16);
            Self {
                _event_tx: event_tx,
                event_rx,
            }
        }
    }

    impl DiscoveryStack for NullStack {
        fn publish(&self, _service: &ServiceDescriptor) -> Result<()> {
            Ok(())
        }

        fn stop_publish(&self, _service: &ServiceDescriptor) -> Result<()> {
            Ok(())
        }

        fn browse(&self, _domain: &str, _regtype: &str) -> Result<()> {
            Ok(())
        }

        fn stop_browse(&self, _domain: &str, _regtype: &str) -> Result<()> {
            Ok(())
        }

        fn resolve(&self, _service: &ServiceDescriptor, _timeout: Duration) -> Result<()> {
            Ok(())
        }

        fn events(&self) -> Receiver<StackEvent> {
            self.event_rx.clone()
        }
    }

    fn orchestrator() -> NetworkService {
        NetworkService::with_stack(ServiceConfig::default(), Arc::new(NullStack::new()))
    }

    #[tokio::test]
    async fn test_initial_state() {
        let service = orchestrator();
        assert!(!service.is_publishing());
        assert!(!service.is_browsing());
        assert!(!service.is_auto_resolve_enabled());
    }

    #[tokio::test]
    async fn test_publish_flips_state() {
        let service = orchestrator();
        service.start_publish_service(&ServiceType::Http, "Test Service", 1234);
        assert!(service.is_publishing());

        service.stop_publish();
        assert!(!service.is_publishing());
    }

    #[tokio::test]
    async fn test_browse_flips_state() {
        let service = orchestrator();
        service.start_browse_service(&ServiceType::Http);
        assert!(service.is_browsing());

        service.stop_browse();
        assert!(!service.is_browsing());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_when_idle() {
        let service = orchestrator();
        service.stop_publish();
        service.stop_browse();
        service.stop_publish();

        assert!(!service.is_publishing());
        assert!(!service.is_browsing());
    }

    #[tokio::test]
    async fn test_auto_resolve_toggle() {
        let service = orchestrator();
        service.set_auto_resolve(true);
        assert!(service.is_auto_resolve_enabled());

        service.set_auto_resolve(false);
        assert!(!service.is_auto_resolve_enabled());
    }

    #[tokio::test]
    async fn test_config_carries_auto_resolve_default() {
        let config = ServiceConfig {
            auto_resolve: true,
            ..Default::default()
        };
        let service = NetworkService::with_stack(config, Arc::new(NullStack::new()));
        assert!(service.is_auto_resolve_enabled());
    }
}
