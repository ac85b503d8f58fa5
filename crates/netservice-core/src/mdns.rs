//! mDNS implementation of the discovery stack
//!
//! Adapts the `mdns-sd` daemon to the [`DiscoveryStack`] interface. The
//! daemon resolves services continuously while a browse is active, so this
//! adapter keeps a cache of resolved records and answers targeted resolve
//! requests from it; a resolve that cannot be answered before its timeout is
//! reported as failed. `mdns-sd` has no coalescing hint, so `more_coming` is
//! always `false`.

use crate::addr::RawAddress;
use crate::error::{NetServiceError, Result};
use crate::stack::{DiscoveryStack, StackEvent};
use crate::types::ServiceDescriptor;
use async_channel::{Receiver, Sender};
use dashmap::DashMap;
use mdns_sd::{ServiceDaemon, ServiceEvent as MdnsEvent, ServiceInfo};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Maximum number of events to buffer in the channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Discovery stack backed by the `mdns-sd` daemon
pub struct MdnsStack {
    /// mDNS service daemon
    daemon: Arc<ServiceDaemon>,

    /// Event channel sender
    event_tx: Sender<StackEvent>,

    /// Event channel receiver (for the orchestrator)
    event_rx: Receiver<StackEvent>,

    /// Resolved records observed while browsing (keyed by full service name)
    resolved: Arc<DashMap<String, ServiceDescriptor>>,

    /// Resolve requests awaiting a record (keyed by full service name)
    pending: Arc<DashMap<String, ServiceDescriptor>>,

    /// Background task handles
    tasks: Arc<DashMap<String, JoinHandle<()>>>,
}

impl MdnsStack {
    /// Creates a stack with the default event channel capacity
    pub fn new() -> Result<Self> {
        Self::with_capacity(EVENT_CHANNEL_CAPACITY)
    }

    /// Creates a stack with the given event channel capacity
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let daemon = ServiceDaemon::new().map_err(|e| {
            NetServiceError::DaemonInitFailed(format!("failed to create mDNS daemon: {}", e))
        })?;

        let (event_tx, event_rx) = async_channel::bounded(capacity);

        Ok(Self {
            daemon: Arc::new(daemon),
            event_tx,
            event_rx,
            resolved: Arc::new(DashMap::new()),
            pending: Arc::new(DashMap::new()),
            tasks: Arc::new(DashMap::new()),
        })
    }

    fn emit(&self, event: StackEvent) {
        emit(&self.event_tx, event);
    }
}

impl DiscoveryStack for MdnsStack {
    fn publish(&self, service: &ServiceDescriptor) -> Result<()> {
        let port = service.port.ok_or_else(|| NetServiceError::PublishFailed {
            name: service.name.clone(),
            reason: "descriptor has no port".to_string(),
        })?;

        let ty_domain = format!("{}{}", service.regtype, service.domain);
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());
        let host_name = format!("{}.local.", host);

        self.emit(StackEvent::WillPublish {
            service: service.clone(),
        });

        let info = ServiceInfo::new(
            &ty_domain,
            &service.name,
            &host_name,
            "",
            port,
            HashMap::<String, String>::new(),
        )
        .map(|info| info.enable_addr_auto());

        let registered = match info {
            Ok(info) => self.daemon.register(info).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match registered {
            Ok(()) => {
                debug!(service = %service.key(), "advertisement registered");
                self.emit(StackEvent::DidPublish {
                    service: service.clone(),
                });
            }
            Err(reason) => {
                warn!(service = %service.key(), reason, "advertisement rejected");
                self.emit(StackEvent::DidNotPublish {
                    service: service.clone(),
                    reason,
                });
            }
        }

        Ok(())
    }

    fn stop_publish(&self, service: &ServiceDescriptor) -> Result<()> {
        let fullname = service.full_name();
        match self.daemon.unregister(&fullname) {
            Ok(receiver) => {
                let event_tx = self.event_tx.clone();
                let service = service.clone();
                let task = tokio::spawn(async move {
                    // Wait for the daemon to confirm before reporting the stop
                    let _ = receiver.recv_async().await;
                    emit(&event_tx, StackEvent::DidStop { service });
                });
                self.tasks.insert(format!("unregister_{}", fullname), task);
            }
            Err(e) => {
                debug!(service = fullname, error = %e, "unregister skipped");
            }
        }
        Ok(())
    }

    fn browse(&self, domain: &str, regtype: &str) -> Result<()> {
        let ty_domain = format!("{}{}", regtype, domain);

        let receiver =
            self.daemon
                .browse(&ty_domain)
                .map_err(|e| NetServiceError::BrowseFailed {
                    service_type: ty_domain.clone(),
                    reason: e.to_string(),
                })?;

        let event_tx = self.event_tx.clone();
        let resolved = self.resolved.clone();
        let pending = self.pending.clone();
        let domain = domain.to_string();
        let regtype = regtype.to_string();
        let task_ty_domain = ty_domain.clone();

        let task = tokio::spawn(async move {
            while let Ok(event) = receiver.recv_async().await {
                match event {
                    MdnsEvent::SearchStarted(_) => {
                        emit(
                            &event_tx,
                            StackEvent::SearchStarted {
                                regtype: regtype.clone(),
                            },
                        );
                    }

                    MdnsEvent::ServiceFound(_, fullname) => {
                        let name = instance_name(&fullname, &task_ty_domain);
                        debug!(service = fullname, "service found");
                        emit(
                            &event_tx,
                            StackEvent::DidFind {
                                service: ServiceDescriptor {
                                    domain: domain.clone(),
                                    regtype: regtype.clone(),
                                    name,
                                    port: None,
                                    addresses: Vec::new(),
                                },
                                more_coming: false,
                            },
                        );
                    }

                    MdnsEvent::ServiceResolved(info) => {
                        debug!(
                            service = info.get_fullname(),
                            hostname = info.get_hostname(),
                            port = info.get_port(),
                            "service resolved"
                        );

                        let fullname = info.get_fullname().to_string();
                        let service =
                            convert_service_info(&info, &domain, &regtype, &task_ty_domain);
                        resolved.insert(fullname.clone(), service.clone());

                        if pending.remove(&fullname).is_some() {
                            emit(&event_tx, StackEvent::DidResolveAddress { service });
                        }
                    }

                    MdnsEvent::ServiceRemoved(_, fullname) => {
                        debug!(service = fullname, "service removed");
                        resolved.remove(&fullname);
                        let name = instance_name(&fullname, &task_ty_domain);
                        emit(
                            &event_tx,
                            StackEvent::DidRemove {
                                service: ServiceDescriptor {
                                    domain: domain.clone(),
                                    regtype: regtype.clone(),
                                    name,
                                    port: None,
                                    addresses: Vec::new(),
                                },
                                more_coming: false,
                            },
                        );
                    }

                    MdnsEvent::SearchStopped(_) => {
                        emit(
                            &event_tx,
                            StackEvent::SearchStopped {
                                regtype: regtype.clone(),
                            },
                        );
                    }

                    _ => {}
                }
            }
            debug!("browser task for {} stopped", task_ty_domain);
        });

        self.tasks.insert(format!("browser_{}", ty_domain), task);

        Ok(())
    }

    fn stop_browse(&self, domain: &str, regtype: &str) -> Result<()> {
        let ty_domain = format!("{}{}", regtype, domain);
        self.daemon
            .stop_browse(&ty_domain)
            .map_err(|e| NetServiceError::BrowseFailed {
                service_type: ty_domain,
                reason: e.to_string(),
            })
    }

    fn resolve(&self, service: &ServiceDescriptor, timeout: Duration) -> Result<()> {
        let fullname = service.full_name();

        self.emit(StackEvent::WillResolve {
            service: service.clone(),
        });

        self.pending.insert(fullname.clone(), service.clone());

        // Served from the browse cache when the record is already in; the
        // pending entry is registered first so a record arriving concurrently
        // settles the request exactly once
        if let Some(record) = self.resolved.get(&fullname) {
            let resolved = record.value().clone();
            drop(record);
            if self.pending.remove(&fullname).is_some() {
                self.emit(StackEvent::DidResolveAddress { service: resolved });
            }
            return Ok(());
        }

        let task_key = format!("resolve_{}", fullname);
        let event_tx = self.event_tx.clone();
        let pending = self.pending.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some((_, service)) = pending.remove(&fullname) {
                emit(
                    &event_tx,
                    StackEvent::DidNotResolve {
                        service,
                        reason: format!("resolve timed out after {:?}", timeout),
                    },
                );
            }
        });
        self.tasks.insert(task_key, task);

        Ok(())
    }

    fn events(&self) -> Receiver<StackEvent> {
        self.event_rx.clone()
    }
}

impl Drop for MdnsStack {
    fn drop(&mut self) {
        for entry in self.tasks.iter() {
            entry.value().abort();
        }
        let _ = self.daemon.shutdown();
    }
}

fn emit(event_tx: &Sender<StackEvent>, event: StackEvent) {
    if let Err(e) = event_tx.try_send(event) {
        warn!(error = %e, "failed to deliver stack event");
    }
}

/// Strips the type and domain suffix off a full service name
fn instance_name(fullname: &str, ty_domain: &str) -> String {
    fullname
        .strip_suffix(ty_domain)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(fullname)
        .to_string()
}

/// Converts an mdns-sd record into a resolved descriptor
fn convert_service_info(
    info: &ServiceInfo,
    domain: &str,
    regtype: &str,
    ty_domain: &str,
) -> ServiceDescriptor {
    let port = info.get_port();
    let mut ips: Vec<IpAddr> = info.get_addresses().iter().copied().collect();
    sort_addresses(&mut ips);

    let addresses = ips
        .into_iter()
        .map(|ip| RawAddress::from_socket_addr(SocketAddr::new(ip, port)))
        .collect();

    ServiceDescriptor {
        domain: domain.to_string(),
        regtype: regtype.to_string(),
        name: instance_name(info.get_fullname(), ty_domain),
        port: Some(port),
        addresses,
    }
}

/// Orders addresses IPv4 first so the single-address policy picks a
/// conventionally routable one
fn sort_addresses(ips: &mut [IpAddr]) {
    ips.sort_by_key(|ip| (ip.is_ipv6(), *ip));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_instance_name_strips_type_and_domain() {
        assert_eq!(
            instance_name("Test Service._http._tcp.local.", "_http._tcp.local."),
            "Test Service"
        );
    }

    #[test]
    fn test_instance_name_keeps_unrecognized_suffix() {
        assert_eq!(
            instance_name("weird-record", "_http._tcp.local."),
            "weird-record"
        );
    }

    #[test]
    fn test_sort_addresses_prefers_ipv4() {
        let mut ips = vec![
            IpAddr::V6(Ipv6Addr::LOCALHOST),
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5)),
        ];
        sort_addresses(&mut ips);
        assert!(ips[0].is_ipv4());
    }
}
