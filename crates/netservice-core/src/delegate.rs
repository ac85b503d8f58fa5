//! Delegate notification contract
//!
//! The orchestrator reports every outcome through a single attached delegate.
//! Implementers override only the notifications they care about; every method
//! has a no-op default body. [`ClosureDelegate`] offers a callback slot per
//! notification for lightweight consumers and tests.

use crate::types::ServiceDescriptor;

/// Receives normalized notifications from a [`NetworkService`](crate::NetworkService)
///
/// All methods default to no-ops. Delegates may hold a clone of the owning
/// `NetworkService` and call back into it from any notification; such calls
/// are enqueued and processed after the current notification completes.
#[allow(unused_variables)]
pub trait NetworkServiceDelegate: Send {
    // Publish

    fn will_publish(&mut self, service: &ServiceDescriptor) {}

    fn did_publish(&mut self, service: &ServiceDescriptor) {}

    fn did_not_publish(&mut self, service: &ServiceDescriptor) {}

    // Browse

    fn did_find(&mut self, service: &ServiceDescriptor, more_coming: bool, did_start_resolve: bool) {
    }

    // Resolve

    fn will_resolve(&mut self, service: &ServiceDescriptor) {}

    fn did_resolve(&mut self, service: &ServiceDescriptor, address: &str) {}

    fn failed_to_extract_address(&mut self, service: &ServiceDescriptor) {}

    fn did_not_resolve(&mut self, service: &ServiceDescriptor) {}

    fn did_stop(&mut self, service: &ServiceDescriptor) {}
}

/// Delegate that never reacts; attached by default
#[derive(Debug, Default)]
pub struct NoopDelegate;

impl NetworkServiceDelegate for NoopDelegate {}

/// Callback invoked with the affected service
pub type ServiceCallback = Box<dyn FnMut(&ServiceDescriptor) + Send>;
/// Callback invoked on discovery with the `more_coming` and
/// `did_start_resolve` flags
pub type FindCallback = Box<dyn FnMut(&ServiceDescriptor, bool, bool) + Send>;
/// Callback invoked with the service and its numeric host address
pub type ResolveCallback = Box<dyn FnMut(&ServiceDescriptor, &str) + Send>;

/// Closure-based delegate with one optional slot per notification
///
/// Unset slots swallow their notification.
#[derive(Default)]
pub struct ClosureDelegate {
    pub will_publish: Option<ServiceCallback>,
    pub did_publish: Option<ServiceCallback>,
    pub did_not_publish: Option<ServiceCallback>,
    pub did_find: Option<FindCallback>,
    pub will_resolve: Option<ServiceCallback>,
    pub did_resolve: Option<ResolveCallback>,
    pub failed_to_extract_address: Option<ServiceCallback>,
    pub did_not_resolve: Option<ServiceCallback>,
    pub did_stop: Option<ServiceCallback>,
}

impl ClosureDelegate {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NetworkServiceDelegate for ClosureDelegate {
    fn will_publish(&mut self, service: &ServiceDescriptor) {
        if let Some(callback) = self.will_publish.as_mut() {
            callback(service);
        }
    }

    fn did_publish(&mut self, service: &ServiceDescriptor) {
        if let Some(callback) = self.did_publish.as_mut() {
            callback(service);
        }
    }

    fn did_not_publish(&mut self, service: &ServiceDescriptor) {
        if let Some(callback) = self.did_not_publish.as_mut() {
            callback(service);
        }
    }

    fn did_find(&mut self, service: &ServiceDescriptor, more_coming: bool, did_start_resolve: bool) {
        if let Some(callback) = self.did_find.as_mut() {
            callback(service, more_coming, did_start_resolve);
        }
    }

    fn will_resolve(&mut self, service: &ServiceDescriptor) {
        if let Some(callback) = self.will_resolve.as_mut() {
            callback(service);
        }
    }

    fn did_resolve(&mut self, service: &ServiceDescriptor, address: &str) {
        if let Some(callback) = self.did_resolve.as_mut() {
            callback(service, address);
        }
    }

    fn failed_to_extract_address(&mut self, service: &ServiceDescriptor) {
        if let Some(callback) = self.failed_to_extract_address.as_mut() {
            callback(service);
        }
    }

    fn did_not_resolve(&mut self, service: &ServiceDescriptor) {
        if let Some(callback) = self.did_not_resolve.as_mut() {
            callback(service);
        }
    }

    fn did_stop(&mut self, service: &ServiceDescriptor) {
        if let Some(callback) = self.did_stop.as_mut() {
            callback(service);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServiceType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_closure_slots_fire() {
        let found = Arc::new(AtomicUsize::new(0));
        let found_clone = found.clone();

        let mut delegate = ClosureDelegate::new();
        delegate.did_find = Some(Box::new(move |_, _, _| {
            found_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let service = ServiceDescriptor::local(&ServiceType::Http, "Test Service");
        delegate.did_find(&service, false, false);
        delegate.did_find(&service, false, true);

        assert_eq!(found.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unset_slots_are_silent() {
        let mut delegate = ClosureDelegate::new();
        let service = ServiceDescriptor::local(&ServiceType::Http, "Test Service");

        delegate.will_publish(&service);
        delegate.did_resolve(&service, "127.0.0.1");
        delegate.did_stop(&service);
    }

    #[test]
    fn test_noop_delegate_accepts_everything() {
        let mut delegate = NoopDelegate;
        let service = ServiceDescriptor::local(&ServiceType::Http, "Test Service");

        delegate.did_find(&service, true, false);
        delegate.did_not_resolve(&service);
    }
}
