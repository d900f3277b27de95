#[allow(dead_code)]
mod common;

use common::{ALICE, TestServer, ws_connect_as};

#[tokio::test]
async fn status_reports_health() {
    let server = TestServer::new().await;
    let resp = reqwest::get(format!("{}/status", server.base_url()))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].as_str().unwrap().contains('T'));
    assert!(body["uptime"].is_u64());
    assert!(body["uptimeFormatted"].as_str().unwrap().ends_with('s'));
    assert_eq!(body["server"]["port"], server.server.local_addr().port());
    assert_eq!(body["server"]["pingInterval"], 30_000);
    assert_eq!(body["server"]["pongTimeout"], 60_000);
    assert_eq!(body["clients"]["total"], 0);
    assert_eq!(body["database"]["status"], "connected");
}

#[tokio::test]
async fn status_counts_clients() {
    let server = TestServer::new().await;
    let (_stream, _) = ws_connect_as(&server, ALICE).await;

    let body: serde_json::Value = reqwest::get(format!("{}/status", server.base_url()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["clients"]["total"], 1);
    assert_eq!(body["clients"]["alive"], 1);
    assert_eq!(body["clients"]["inactive"], 0);
}

#[tokio::test]
async fn status_reports_store_outage() {
    let server = TestServer::new().await;
    server.store.set_offline(true);

    let body: serde_json::Value = reqwest::get(format!("{}/status", server.base_url()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["status"], "disconnected");
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let server = TestServer::new().await;
    let resp = reqwest::get(format!("{}/leaderboard", server.base_url()))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Not Found");
    assert_eq!(body["message"], "Available endpoints: GET /status");
}

#[tokio::test]
async fn preflight_is_accepted() {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();

    let resp = client
        .request(reqwest::Method::OPTIONS, format!("{}/anything", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .request(reqwest::Method::OPTIONS, format!("{}/status", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .request(reqwest::Method::OPTIONS, format!("{}/status", server.base_url()))
        .header("Origin", "http://example.com")
        .header("Access-Control-Request-Method", "GET")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert!(resp.headers().contains_key("access-control-allow-origin"));
}
