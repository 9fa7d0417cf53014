#![allow(clippy::unwrap_used)]
// Integration tests for the data facade against a mocked August cloud.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use august_core::activity::ActivityStream;
use august_core::detail::DetailCache;
use august_core::device::{Device, DeviceDetail};
use august_core::gateway::AugustGateway;
use august_core::subscribe::DeviceUpdateBus;
use august_core::{
    ActivityType, AugustConfig, AugustData, CoreError, Lock, LockStatus, LoginMethod,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn test_config(server: &MockServer) -> AugustConfig {
    AugustConfig::new(
        LoginMethod::Email,
        "user@example.com",
        SecretString::from("hunter2".to_owned()),
    )
    .with_base_url(Url::parse(&server.uri()).unwrap())
    .with_token_cache_file(None)
    // Long intervals so only explicit refreshes hit the mocks.
    .with_activity_update_interval(Duration::from_secs(3600))
    .with_detail_update_interval(Duration::from_secs(3600))
}

fn lock_device(id: &str, name: &str) -> Device {
    Device::Lock(Lock {
        device_id: id.to_owned(),
        device_name: name.to_owned(),
        house_id: "H1".to_owned(),
        user_type: "superuser".to_owned(),
    })
}

async fn mount_session(server: &MockServer) {
    let expires = chrono::Utc::now() + chrono::Duration::days(30);
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-august-access-token", "tok")
                .set_body_json(json!({
                    "expiresAt": expires.to_rfc3339(),
                    "vPassword": true,
                    "vEmail": true,
                    "vPhone": true
                })),
        )
        .mount(server)
        .await;
}

/// One operative lock (L1), one doorbell (D1), same house.
async fn mount_standard_account(server: &MockServer) {
    mount_session(server).await;

    Mock::given(method("GET"))
        .and(path("/users/locks/mine"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "L1": { "LockName": "Front Door Lock", "HouseID": "H1", "UserType": "superuser" }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/doorbells/mine"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "D1": { "name": "Front Door", "HouseID": "H1" }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/locks/L1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "LockID": "L1",
            "LockName": "Front Door Lock",
            "HouseID": "H1",
            "battery": 0.88,
            "Bridge": { "_id": "B1", "operative": true },
            "LockStatus": {
                "status": "unlocked",
                "doorState": "closed",
                "dateTime": "2024-06-15T10:00:00Z"
            }
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/doorbells/D1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "doorbellID": "D1",
            "name": "Front Door",
            "HouseID": "H1",
            "status": "doorbell_call_status_online",
            "telemetry": { "battery_soc": 96 }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/houses/H1/activities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

// ── Setup and read paths ────────────────────────────────────────────

#[tokio::test]
async fn test_setup_discovers_and_primes() {
    let server = MockServer::start().await;
    mount_standard_account(&server).await;

    let data = AugustData::setup(test_config(&server)).await.unwrap();

    assert_eq!(data.get_locks().len(), 1);
    assert_eq!(data.get_doorbells().len(), 1);
    assert_eq!(data.house_ids(), vec!["H1".to_owned()]);

    let detail = data.get_device_detail("L1").await.unwrap().unwrap();
    let lock = detail.as_lock().unwrap();
    assert_eq!(lock.lock_status(), LockStatus::Unlocked);
    assert_eq!(lock.battery_percent(), 88);

    let detail = data.get_device_detail("D1").await.unwrap().unwrap();
    assert!(detail.as_doorbell().unwrap().is_online());

    data.stop().await;
}

#[tokio::test]
async fn test_reads_between_refreshes_serve_cached_data() {
    let server = MockServer::start().await;
    // The /locks/L1 mock above carries expect(1): every read below must
    // be served from cache, or teardown fails the test.
    mount_standard_account(&server).await;

    let data = AugustData::setup(test_config(&server)).await.unwrap();

    for _ in 0..5 {
        let detail = data.get_device_detail("L1").await.unwrap();
        assert!(detail.is_some());
    }

    data.stop().await;
}

#[tokio::test]
async fn test_unknown_device_is_an_error() {
    let server = MockServer::start().await;
    mount_standard_account(&server).await;

    let data = AugustData::setup(test_config(&server)).await.unwrap();

    let result = data.get_device_detail("nope").await;
    assert!(matches!(
        result,
        Err(CoreError::DeviceNotFound { ref device_id }) if device_id == "nope"
    ));

    data.stop().await;
}

// ── Device filter ───────────────────────────────────────────────────

#[tokio::test]
async fn test_locks_without_operative_bridge_are_excluded() {
    let server = MockServer::start().await;
    mount_session(&server).await;

    Mock::given(method("GET"))
        .and(path("/users/locks/mine"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "L1": { "LockName": "Front Door Lock", "HouseID": "H1", "UserType": "superuser" },
            "L2": { "LockName": "Bridgeless Lock", "HouseID": "H1", "UserType": "superuser" },
            "L3": { "LockName": "Broken Bridge Lock", "HouseID": "H1", "UserType": "superuser" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/doorbells/mine"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/locks/L1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "LockID": "L1", "LockName": "Front Door Lock", "HouseID": "H1",
            "Bridge": { "_id": "B1", "operative": true }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/locks/L2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "LockID": "L2", "LockName": "Bridgeless Lock", "HouseID": "H1"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/locks/L3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "LockID": "L3", "LockName": "Broken Bridge Lock", "HouseID": "H1",
            "Bridge": { "_id": "B3", "operative": false }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/houses/H1/activities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let data = AugustData::setup(test_config(&server)).await.unwrap();

    let locks = data.get_locks();
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0].device_id, "L1");

    data.stop().await;
}

// ── Remote operations ───────────────────────────────────────────────

#[tokio::test]
async fn test_lock_patches_cache_without_refetch() {
    let server = MockServer::start().await;
    mount_standard_account(&server).await;

    Mock::given(method("PUT"))
        .and(path("/remoteoperate/L1/lock"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "locked",
            "dateTime": "2024-06-15T10:30:00Z",
            "doorState": "closed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let data = AugustData::setup(test_config(&server)).await.unwrap();
    let mut rx = data.subscribe("L1");
    rx.borrow_and_update();

    data.lock("L1").await.unwrap();

    // The subscriber was woken and the cached snapshot already shows
    // the new position; /locks/L1 still carries expect(1) from setup.
    rx.changed().await.unwrap();
    let detail = data.get_device_detail("L1").await.unwrap().unwrap();
    assert_eq!(detail.as_lock().unwrap().lock_status(), LockStatus::Locked);

    data.stop().await;
}

#[tokio::test]
async fn test_bridge_offline_names_device_and_operation() {
    let server = MockServer::start().await;
    mount_standard_account(&server).await;

    Mock::given(method("PUT"))
        .and(path("/remoteoperate/L1/unlock"))
        .respond_with(ResponseTemplate::new(423).set_body_string("Locked"))
        .mount(&server)
        .await;

    let data = AugustData::setup(test_config(&server)).await.unwrap();

    let err = data.unlock("L1").await.unwrap_err();
    match err {
        CoreError::BridgeUnavailable {
            ref device_name,
            ref operation,
        } => {
            assert_eq!(device_name, "Front Door Lock");
            assert_eq!(operation, "unlock");
        }
        other => panic!("expected BridgeUnavailable, got: {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("Front Door Lock"));
    assert!(message.contains("unlock"));

    data.stop().await;
}

// ── Component-level behavior ────────────────────────────────────────

#[tokio::test]
async fn test_poll_notifies_once_per_device() {
    let server = MockServer::start().await;
    mount_session(&server).await;

    // Two fresh records for L1 in one poll batch.
    Mock::given(method("GET"))
        .and(path("/houses/H1/activities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "deviceID": "L1", "deviceName": "Front Door Lock",
                "action": "unlock", "dateTime": 1_718_447_400_000_i64
            },
            {
                "deviceID": "L1", "deviceName": "Front Door Lock",
                "action": "dooropen", "dateTime": 1_718_447_401_000_i64
            }
        ])))
        .mount(&server)
        .await;

    let gateway = AugustGateway::new(&test_config(&server)).unwrap();
    gateway.authenticate().await.unwrap();

    let details = DetailCache::new(Duration::from_secs(3600));
    let stream = ActivityStream::new(vec!["H1".to_owned()], Duration::from_secs(3600));
    let bus = DeviceUpdateBus::new();
    let mut rx = bus.subscribe("L1");
    rx.borrow_and_update();

    stream.poll_once(&gateway, &details, &bus).await.unwrap();

    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), 1, "both records coalesce into one wake-up");
    assert_eq!(stream.get_device_activities("L1", &[]).await.len(), 2);
}

#[tokio::test]
async fn test_failed_device_fetch_is_isolated() {
    let server = MockServer::start().await;
    mount_session(&server).await;

    Mock::given(method("GET"))
        .and(path("/locks/L1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/locks/L2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "LockID": "L2", "LockName": "Back Door Lock", "HouseID": "H1",
            "Bridge": { "_id": "B2", "operative": true }
        })))
        .mount(&server)
        .await;

    let gateway = AugustGateway::new(&test_config(&server)).unwrap();
    gateway.authenticate().await.unwrap();

    let devices = vec![
        lock_device("L1", "Front Door Lock"),
        lock_device("L2", "Back Door Lock"),
    ];

    let details = DetailCache::new(Duration::from_secs(3600));
    let refreshed = details.refresh(&gateway, &devices).await.unwrap().unwrap();
    assert_eq!(refreshed.len(), 2);

    // The failed device is marked unavailable; the healthy one is cached.
    assert!(details.get_detail("L1").await.is_none());
    let cached = details.get_detail("L2").await.unwrap();
    assert!(matches!(cached, DeviceDetail::Lock(ref d) if d.device_id == "L2"));
}

#[tokio::test]
async fn test_activity_read_refreshes_after_window() {
    let server = MockServer::start().await;
    mount_session(&server).await;

    Mock::given(method("GET"))
        .and(path("/users/locks/mine"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "L1": { "LockName": "Front Door Lock", "HouseID": "H1", "UserType": "superuser" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/doorbells/mine"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/locks/L1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "LockID": "L1", "LockName": "Front Door Lock", "HouseID": "H1",
            "Bridge": { "_id": "B1", "operative": true }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/houses/H1/activities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "deviceID": "L1", "deviceName": "Front Door Lock",
                "action": "unlock", "dateTime": 1_718_447_400_000_i64
            }
        ])))
        .mount(&server)
        .await;

    let config = test_config(&server).with_activity_update_interval(Duration::from_millis(200));
    let data = AugustData::setup(config).await.unwrap();
    data.stop().await;

    let stored = data
        .get_latest_device_activity("L1", &[ActivityType::LockOperation])
        .await
        .unwrap();
    assert_eq!(stored.action, "unlock");

    // A newer record lands in the feed after the poll loop is gone.
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/houses/H1/activities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "deviceID": "L1", "deviceName": "Front Door Lock",
                "action": "lock", "dateTime": 1_718_447_500_000_i64
            }
        ])))
        .mount(&server)
        .await;

    // Once the throttle window has elapsed, a plain read must fetch it.
    tokio::time::sleep(Duration::from_millis(250)).await;
    let activities = data.get_device_activities("L1", &[]).await;
    assert!(activities.iter().any(|a| a.action == "lock"));

    let stored = data
        .get_latest_device_activity("L1", &[ActivityType::LockOperation])
        .await
        .unwrap();
    assert_eq!(stored.action, "lock");
}

#[tokio::test]
async fn test_detail_refresh_resumes_after_window() {
    let server = MockServer::start().await;
    mount_session(&server).await;

    Mock::given(method("GET"))
        .and(path("/locks/L1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "LockID": "L1", "LockName": "Front Door Lock", "HouseID": "H1",
            "Bridge": { "_id": "B1", "operative": true }
        })))
        .expect(2)
        .mount(&server)
        .await;

    let gateway = AugustGateway::new(&test_config(&server)).unwrap();
    gateway.authenticate().await.unwrap();

    let devices = vec![lock_device("L1", "Front Door Lock")];
    let details = DetailCache::new(Duration::from_millis(100));

    assert!(details.refresh(&gateway, &devices).await.unwrap().is_some());
    // Inside the window: served from cache, no network batch.
    assert!(details.refresh(&gateway, &devices).await.unwrap().is_none());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(details.refresh(&gateway, &devices).await.unwrap().is_some());
}

#[tokio::test]
async fn test_initial_backfill_retried_after_failed_first_poll() {
    let server = MockServer::start().await;
    mount_session(&server).await;

    // First poll fails outright; the backfill limit must carry over to
    // the next attempt instead of being consumed by the failure.
    Mock::given(method("GET"))
        .and(path("/houses/H1/activities"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/houses/H1/activities"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/houses/H1/activities"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = AugustGateway::new(&test_config(&server)).unwrap();
    gateway.authenticate().await.unwrap();

    let details = DetailCache::new(Duration::from_secs(3600));
    let stream = ActivityStream::new(vec!["H1".to_owned()], Duration::from_secs(3600));
    let bus = DeviceUpdateBus::new();

    // House failures are isolated, so all three polls return Ok; the
    // limit expectations above pin the backfill/steady-state sequence.
    stream.poll_once(&gateway, &details, &bus).await.unwrap();
    stream.poll_once(&gateway, &details, &bus).await.unwrap();
    stream.poll_once(&gateway, &details, &bus).await.unwrap();
}

#[tokio::test]
async fn test_operate_rejects_non_lock() {
    let server = MockServer::start().await;
    mount_standard_account(&server).await;

    let data = AugustData::setup(test_config(&server)).await.unwrap();

    let result = data.unlock("D1").await;
    assert!(matches!(
        result,
        Err(CoreError::NotALock { ref device_id }) if device_id == "D1"
    ));

    data.stop().await;
}

#[tokio::test]
async fn test_zero_poll_interval_does_not_panic() {
    let server = MockServer::start().await;
    mount_session(&server).await;
    Mock::given(method("GET"))
        .and(path("/houses/H1/activities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let gateway = Arc::new(AugustGateway::new(&test_config(&server)).unwrap());
    gateway.authenticate().await.unwrap();

    let details = Arc::new(DetailCache::new(Duration::from_secs(3600)));
    let stream = Arc::new(ActivityStream::new(vec!["H1".to_owned()], Duration::ZERO));
    let bus = Arc::new(DeviceUpdateBus::new());

    let handle = stream.start(
        Arc::clone(&gateway),
        Arc::clone(&details),
        Arc::clone(&bus),
        Duration::ZERO,
    );
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.stop().await;
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let server = MockServer::start().await;
    mount_standard_account(&server).await;

    let data = AugustData::setup(test_config(&server)).await.unwrap();
    data.stop().await;
    data.stop().await;
}
