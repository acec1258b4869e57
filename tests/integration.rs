use std::env;
use std::sync::{Arc, Mutex};

use ibootpdu::{Event, PduClient};

/// Run with: cargo test --test integration -- --ignored
/// Requires a reachable device:
///   IBOOT_HOST=http://192.168.1.50 IBOOT_USER=admin IBOOT_PASSWORD=admin
fn device_client() -> PduClient {
    let host = env::var("IBOOT_HOST").expect("IBOOT_HOST not set");
    let user = env::var("IBOOT_USER").unwrap_or_else(|_| "admin".to_string());
    let password = env::var("IBOOT_PASSWORD").expect("IBOOT_PASSWORD not set");
    PduClient::builder(host)
        .credentials(user, password)
        .build()
        .expect("client config")
}

#[tokio::test]
#[ignore]
async fn poll_disconnect() {
    let events: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(vec![]));
    let events_clone = events.clone();

    let host = env::var("IBOOT_HOST").expect("IBOOT_HOST not set");
    let password = env::var("IBOOT_PASSWORD").expect("IBOOT_PASSWORD not set");
    let client = PduClient::builder(host)
        .credentials(env::var("IBOOT_USER").unwrap_or_else(|_| "admin".to_string()), password)
        .on_event(move |event| events_clone.lock().unwrap().push(event.clone()))
        .build()
        .expect("client config");

    let snap = client.poll().await.expect("poll failed");
    assert!(snap.get("Outlet_1#Name").is_some(), "should report at least one outlet");
    assert!(snap.control("Outlet_1#OutletControl").is_some());
    assert!(!events.lock().unwrap().is_empty(), "first poll should emit events");

    client.disconnect().await;
    assert!(client.snapshot().is_empty());
}

#[tokio::test]
#[ignore]
async fn toggle_outlet_and_restore() {
    // Outlet to exercise; defaults to the last one, usually a spare.
    let client = device_client();
    let snap = client.poll().await.expect("poll failed");

    let outlet = env::var("IBOOT_TEST_OUTLET").unwrap_or_else(|_| {
        let count = snap
            .statistics
            .keys()
            .filter(|k| k.starts_with("Outlet_") && k.ends_with("#Name"))
            .count();
        count.to_string()
    });
    let property = format!("Outlet_{outlet}#OutletControl");
    let original = snap.get(&property).expect("outlet not present").to_string();
    let flipped = if original == "1" { "0" } else { "1" };

    client.apply_control(&property, flipped).await.expect("control failed");
    assert_eq!(client.snapshot().get(&property), Some(flipped));

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    client.apply_control(&property, &original).await.expect("restore failed");
}
