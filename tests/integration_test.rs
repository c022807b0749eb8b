use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Result;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;

use indoorflow::cache::{LocationCache, MemoryCache};
use indoorflow::models::{Floor, IndoorLocation};
use indoorflow::{config, routes, AppState};

/// Start the full router on an ephemeral port with the in-memory cache.
async fn spawn_app(vars: &[(&str, &str)]) -> Result<(String, Arc<MemoryCache>)> {
    // ---
    let corners = json!([
        {"lat": 1.0, "lng": 0.0},
        {"lat": 1.0, "lng": 1.0},
        {"lat": 0.0, "lng": 0.0},
        {"lat": 0.0, "lng": 1.0}
    ]);
    let plans = json!([{"name": "2", "apCorners": corners, "venueCorners": corners}]);

    let mut vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    vars.insert("FLOOR_PLANS".into(), plans.to_string());
    vars.entry("VALIDATOR".into()).or_insert_with(|| "v4l1d4t0r".into());

    let cfg = config::load_from(|name| vars.get(name).cloned())?;
    let cache = Arc::new(MemoryCache::new());
    let app = routes::router(AppState::new(cfg, cache.clone(), None));

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base = format!("http://{}", listener.local_addr()?);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok((base, cache))
}

fn notification(secret: &str, kind: &str, floor: &str) -> Value {
    // ---
    json!({
        "version": "2.0",
        "secret": secret,
        "type": kind,
        "data": {
            "apMac": "00:18:0a:13:dd:b0",
            "apTags": ["dev"],
            "apFloors": [floor],
            "observations": [{
                "ipv4": "/10.0.0.7",
                "clientMac": "d8:8f:76:8f:b1:e5",
                "location": {"lat": 0.5, "lng": 0.5, "unc": 3.0},
                "seenEpoch": 1_700_000_000,
                "rssi": -60
            }]
        }
    })
}

#[tokio::test]
async fn validator_is_served() -> Result<()> {
    // ---
    let (base, _) = spawn_app(&[]).await?;
    let client = Client::new();

    let body = client.get(format!("{base}/post")).send().await?.text().await?;
    assert_eq!(body, "v4l1d4t0r");

    let fallback = client.get(format!("{base}/anything/else")).send().await?;
    assert_eq!(fallback.status(), StatusCode::OK);
    assert_eq!(fallback.text().await?, "v4l1d4t0r");

    Ok(())
}

#[tokio::test]
async fn health_is_ok() -> Result<()> {
    // ---
    let (base, _) = spawn_app(&[]).await?;

    let body: Value = reqwest::get(format!("{base}/health")).await?.json().await?;
    assert_eq!(body, json!({"status": "ok"}));

    Ok(())
}

#[tokio::test]
async fn notification_is_resolved_and_readable() -> Result<()> {
    // ---
    let (base, _) = spawn_app(&[("SECRET", "s3cret")]).await?;
    let client = Client::new();

    let response = client
        .post(format!("{base}/post"))
        .json(&notification("s3cret", "DevicesSeen", "2"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let keys: Vec<String> = client.get(format!("{base}/users")).send().await?.json().await?;
    assert_eq!(keys, vec!["10.0.0.7"]);

    let location: Value = client
        .get(format!("{base}/users/10.0.0.7"))
        .send()
        .await?
        .json()
        .await?;
    assert!((location["latitude"].as_f64().unwrap() - 0.5).abs() < 1e-9);
    assert!((location["longitude"].as_f64().unwrap() - 0.5).abs() < 1e-9);
    assert_eq!(location["floor"], json!(2));
    assert_eq!(location["accuracy"], json!(3.0));
    assert_eq!(location["timestamp"], json!(1_700_000_000_000i64));

    let missing: Value = client
        .get(format!("{base}/users/10.9.9.9"))
        .send()
        .await?
        .json()
        .await?;
    assert!(missing.is_null());

    Ok(())
}

#[tokio::test]
async fn wrong_secret_is_forbidden() -> Result<()> {
    // ---
    let (base, cache) = spawn_app(&[("SECRET", "s3cret")]).await?;

    let response = Client::new()
        .post(format!("{base}/post"))
        .json(&notification("guess", "DevicesSeen", "2"))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await?;
    assert_eq!(body["statusCode"], json!(403));
    assert_eq!(body["error"], json!("Forbidden"));
    assert!(cache.list_keys().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn bad_type_and_malformed_body_are_rejected() -> Result<()> {
    // ---
    let (base, cache) = spawn_app(&[]).await?;
    let client = Client::new();

    let wrong_type = client
        .post(format!("{base}/post"))
        .json(&notification("", "LocationUpdate", "2"))
        .send()
        .await?;
    assert_eq!(wrong_type.status(), StatusCode::BAD_REQUEST);

    let malformed = client
        .post(format!("{base}/post"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    assert!(cache.list_keys().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn bluetooth_notifications_are_accepted() -> Result<()> {
    // ---
    let (base, cache) = spawn_app(&[]).await?;

    let response = Client::new()
        .post(format!("{base}/post"))
        .json(&notification("", "BluetoothDevicesSeen", "2"))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(cache.get("10.0.0.7").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn unknown_floor_writes_nothing() -> Result<()> {
    // ---
    let (base, cache) = spawn_app(&[]).await?;

    let response = Client::new()
        .post(format!("{base}/post"))
        .json(&notification("", "DevicesSeen", "Basement"))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache.get("10.0.0.7").await?, None);
    Ok(())
}

#[tokio::test]
async fn assets_carry_their_location() -> Result<()> {
    // ---
    let assets = r#"[{"id": "10.0.0.7", "name": "Forklift"}, {"name": "No id"}]"#;
    let (base, _) = spawn_app(&[("ASSETS", assets)]).await?;
    let client = Client::new();

    client
        .post(format!("{base}/post"))
        .json(&notification("", "DevicesSeen", "2"))
        .send()
        .await?;

    let listed: Vec<Value> = client.get(format!("{base}/assets")).send().await?.json().await?;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["name"], json!("Forklift"));
    assert_eq!(listed[0]["indoorLocation"]["floor"], json!(2));
    assert!(listed[1].get("indoorLocation").is_none());

    Ok(())
}

#[tokio::test]
async fn socket_without_user_id_is_refused() -> Result<()> {
    // ---
    let (base, _) = spawn_app(&[]).await?;
    let client = Client::new();

    for url in [format!("{base}/socket"), format!("{base}/socket?userId=")] {
        let response = client.get(&url).send().await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = response.json().await?;
        assert_eq!(body["message"], json!("Missing userId"));
    }

    Ok(())
}

#[tokio::test]
async fn socket_replays_then_streams_until_closed() -> Result<()> {
    // ---
    let (base, cache) = spawn_app(&[]).await?;
    let ttl = Duration::from_secs(60);
    let location = |latitude: f64| IndoorLocation {
        latitude,
        longitude: 3.02,
        floor: Floor::new("2"),
        accuracy: Some(5.0),
        timestamp: 1_700_000_000_000,
    };
    cache.set("u1", &location(1.0), ttl).await?;

    let url = format!("{}/socket?userId=u1", base.replacen("http", "ws", 1));
    let (mut socket, _) = connect_async(url.as_str()).await?;

    // Current value first
    let replay = timeout(Duration::from_secs(2), socket.next()).await?.expect("replay")?;
    let replay: Value = serde_json::from_str(replay.to_text()?)?;
    assert_eq!(
        replay,
        json!({
            "event": "indoorLocationChange",
            "userId": "u1",
            "indoorLocation": {
                "latitude": 1.0,
                "longitude": 3.02,
                "floor": 2,
                "accuracy": 5.0,
                "timestamp": 1_700_000_000_000i64
            }
        })
    );
    assert_eq!(cache.subscriber_count(), 1);

    // Then every update
    cache.set("u1", &location(2.0), ttl).await?;
    let update = timeout(Duration::from_secs(2), socket.next()).await?.expect("update")?;
    let update: Value = serde_json::from_str(update.to_text()?)?;
    assert_eq!(update["event"], json!("indoorLocationChange"));
    assert_eq!(update["indoorLocation"]["latitude"], json!(2.0));

    // Disconnect releases the subscription
    socket.close(None).await?;
    timeout(Duration::from_secs(2), async {
        while cache.subscriber_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    Ok(())
}
