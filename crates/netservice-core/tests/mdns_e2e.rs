//! End-to-end publish/browse/resolve over the real mDNS daemon
//!
//! Needs a multicast-capable network interface, which CI containers usually
//! lack, so the test is opt-in: `cargo test -- --ignored`.

use netservice_core::{ClosureDelegate, NetworkService, ServiceType};
use std::time::Duration;
use tokio::time::timeout;

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a multicast-capable network"]
async fn test_publish_browse_and_auto_resolve() {
    let publisher = NetworkService::new().expect("publisher daemon");
    let browser = NetworkService::new().expect("browser daemon");

    let (tx, rx) = async_channel::unbounded();

    let mut delegate = ClosureDelegate::new();
    let found_tx = tx.clone();
    delegate.did_find = Some(Box::new(move |service, _more, did_start_resolve| {
        if service.name == "Test Service" {
            let _ = found_tx.try_send(format!("found resolve={}", did_start_resolve));
        }
    }));
    delegate.did_resolve = Some(Box::new(move |service, address| {
        if service.name == "Test Service" {
            let _ = tx.try_send(format!(
                "resolved {} port={}",
                address,
                service.port.unwrap_or(0)
            ));
        }
    }));
    browser.set_delegate(Box::new(delegate));
    browser.set_auto_resolve(true);

    publisher.start_publish_service(&ServiceType::Http, "Test Service", 1234);
    browser.start_browse_service(&ServiceType::Http);

    let found = timeout(Duration::from_secs(30), rx.recv())
        .await
        .expect("service was not found")
        .unwrap();
    assert_eq!(found, "found resolve=true");

    let resolved = timeout(Duration::from_secs(30), rx.recv())
        .await
        .expect("service was not resolved")
        .unwrap();
    assert!(resolved.starts_with("resolved "));
    assert!(resolved.ends_with("port=1234"));

    publisher.stop_publish();
    browser.stop_browse();
}
