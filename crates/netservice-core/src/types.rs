//! Service descriptors and DNS-SD type strings

use crate::addr::RawAddress;
use std::fmt;

/// Default DNS-SD domain for the local network
pub const DEFAULT_DOMAIN: &str = "local.";

/// A DNS-SD service type
///
/// See <http://www.dns-sd.org/servicetypes.html> for registered types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceType {
    /// HTTP over TCP, alias for `Tcp("http")`
    Http,

    /// A TCP service with the given profile name (e.g. "ipp", "ssh")
    Tcp(String),

    /// A UDP service with the given profile name (e.g. "sleep-proxy")
    Udp(String),
}

impl ServiceType {
    /// Returns the wire-format service type string, e.g. `_http._tcp.`
    ///
    /// `Http` encodes exactly as `Tcp("http")` does.
    pub fn to_service_string(&self) -> String {
        match self {
            ServiceType::Http => ServiceType::Tcp("http".to_string()).to_service_string(),
            ServiceType::Tcp(name) => format!("_{}._tcp.", name),
            ServiceType::Udp(name) => format!("_{}._udp.", name),
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_service_string())
    }
}

/// A service record as seen by the discovery stack
///
/// `port` is populated once the service has been resolved or was constructed
/// for publishing; `addresses` holds the raw socket address records delivered
/// by the stack and stays empty until resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// DNS-SD domain, usually `local.`
    pub domain: String,

    /// Wire-format service type string, e.g. `_http._tcp.`
    pub regtype: String,

    /// Instance display name, e.g. `Living Room Printer`
    pub name: String,

    /// Service port, known once resolved or published
    pub port: Option<u16>,

    /// Raw resolved address records, empty until resolved
    pub addresses: Vec<RawAddress>,
}

impl ServiceDescriptor {
    /// Creates a descriptor for the given domain, type and instance name
    pub fn new(
        domain: impl Into<String>,
        service_type: &ServiceType,
        name: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            regtype: service_type.to_service_string(),
            name: name.into(),
            port: None,
            addresses: Vec::new(),
        }
    }

    /// Creates a descriptor on the default `local.` domain
    pub fn local(service_type: &ServiceType, name: impl Into<String>) -> Self {
        Self::new(DEFAULT_DOMAIN, service_type, name)
    }

    /// Sets the service port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Returns the structural identity of this service
    ///
    /// Two descriptors with the same domain, type and name refer to the same
    /// service regardless of their resolution state.
    pub fn key(&self) -> ServiceKey {
        ServiceKey {
            domain: self.domain.clone(),
            regtype: self.regtype.clone(),
            name: self.name.clone(),
        }
    }

    /// Returns the full service name, e.g. `Test Service._http._tcp.local.`
    pub fn full_name(&self) -> String {
        format!("{}.{}{}", self.name, self.regtype, self.domain)
    }
}

/// Structural identity of a service: domain + type + name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    pub domain: String,
    pub regtype: String,
    pub name: String,
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.name, self.regtype, self.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_is_alias_for_tcp_http() {
        assert_eq!(
            ServiceType::Http.to_service_string(),
            ServiceType::Tcp("http".to_string()).to_service_string()
        );
        assert_eq!(ServiceType::Http.to_service_string(), "_http._tcp.");
    }

    #[test]
    fn test_udp_service_string() {
        assert_eq!(
            ServiceType::Udp("sleep-proxy".to_string()).to_service_string(),
            "_sleep-proxy._udp."
        );
    }

    #[test]
    fn test_full_name() {
        let service = ServiceDescriptor::local(&ServiceType::Http, "Test Service");
        assert_eq!(service.full_name(), "Test Service._http._tcp.local.");
    }

    #[test]
    fn test_key_ignores_resolution_state() {
        let found = ServiceDescriptor::local(&ServiceType::Http, "Test Service");
        let resolved = found.clone().with_port(1234);

        assert_ne!(found, resolved);
        assert_eq!(found.key(), resolved.key());
    }

    #[test]
    fn test_display_matches_service_string() {
        let ty = ServiceType::Tcp("ipp".to_string());
        assert_eq!(ty.to_string(), "_ipp._tcp.");
    }
}
