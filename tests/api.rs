use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use reqwest::StatusCode;
use serde_json::{json, Value};

use transit_planner::api::{self, AppState};
use transit_planner::config::Config;
use transit_planner::dataset::Dataset;

async fn spawn_server(args: &[&str]) -> String {
    let config = Config::parse_from(std::iter::once("transit-planner").chain(args.iter().copied()));
    let dataset = Arc::new(Dataset::taiwan().unwrap());
    let app = api::router(AppState::new(dataset, &config), &config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });
    format!("http://{addr}")
}

fn taipei_request() -> Value {
    json!({
        "origin": { "latitude": 25.0478, "longitude": 121.5170 },
        "destination": { "latitude": 25.0340, "longitude": 121.5645 }
    })
}

async fn post(client: &reqwest::Client, url: String, body: &Value) -> (StatusCode, Value) {
    let response = client.post(url).json(body).send().await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

async fn get(client: &reqwest::Client, url: String) -> (StatusCode, Value) {
    let response = client.get(url).send().await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_health_and_info() {
    let base = spawn_server(&[]).await;
    let client = reqwest::Client::new();

    let (status, body) = get(&client, format!("{base}/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["environment"], "development");

    let (status, body) = get(&client, format!("{base}/api")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"]["routes"], "/api/routes");
}

#[tokio::test]
async fn test_calculate_routes() {
    let base = spawn_server(&[]).await;
    let client = reqwest::Client::new();

    let (status, body) = post(&client, format!("{base}/api/routes"), &taipei_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "找到 3 條路線");

    let data = &body["data"];
    let routes = data["routes"].as_array().unwrap();
    assert_eq!(data["alternatives"], routes.len());
    assert_eq!(routes[0]["type"], "fastest");
    assert_eq!(routes[0]["totalTime"], 9);
    assert_eq!(routes[0]["segments"][1]["type"], "mrt");
    assert_eq!(data["origin"]["address"], "台北車站");
    assert!(data["searchTime"].is_string());
}

#[tokio::test]
async fn test_repeated_request_hits_cache() {
    let base = spawn_server(&[]).await;
    let client = reqwest::Client::new();

    let (_, first) = post(&client, format!("{base}/api/routes"), &taipei_request()).await;
    let (_, second) = post(&client, format!("{base}/api/routes"), &taipei_request()).await;
    assert_eq!(first["data"], second["data"]);

    let (status, stats) = get(&client, format!("{base}/api/routes/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["data"]["cacheSize"], 1);
    assert_eq!(stats["data"]["totalCalculations"], 1);
    assert_eq!(stats["data"]["cacheHitRate"], 0.5);
}

#[tokio::test]
async fn test_invalid_route_requests() {
    let base = spawn_server(&[]).await;
    let client = reqwest::Client::new();
    let url = format!("{base}/api/routes");

    let same_point = json!({
        "origin": { "latitude": 25.0478, "longitude": 121.5170 },
        "destination": { "latitude": 25.0478, "longitude": 121.5170 }
    });
    let (status, body) = post(&client, url.clone(), &same_point).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let out_of_range = json!({
        "origin": { "latitude": 95.0, "longitude": 121.5170 },
        "destination": { "latitude": 25.0340, "longitude": 121.5645 }
    });
    let (status, _) = post(&client, url.clone(), &out_of_range).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let tokyo = json!({
        "origin": { "latitude": 25.0478, "longitude": 121.5170 },
        "destination": { "latitude": 35.68, "longitude": 139.76 }
    });
    let (status, body) = post(&client, url.clone(), &tokyo).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Taiwan"));

    let (status, body) = post(&client, url.clone(), &json!({ "origin": { "latitude": 25.0 } })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "請求參數錯誤，請檢查輸入資料");

    let mut bad_priority = taipei_request();
    bad_priority["preferences"] = json!({ "prioritize": "scenery" });
    let (status, _) = post(&client, url, &bad_priority).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_location_endpoints() {
    let base = spawn_server(&[]).await;
    let client = reqwest::Client::new();

    let taipei_main = json!({ "latitude": 25.0478, "longitude": 121.5170 });
    let (status, body) = post(&client, format!("{base}/api/locations/reverse-geocode"), &taipei_main).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["address"], "台北車站");

    let (status, body) = post(&client, format!("{base}/api/locations/geocode"), &json!({ "address": "台北" })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["count"].as_u64().unwrap() > 0);

    let (status, body) = post(&client, format!("{base}/api/locations/geocode"), &json!({ "address": "zzzz" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "LOCATION_NOT_FOUND");

    let (status, body) = get(&client, format!("{base}/api/locations/search?q=台北&limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);

    let (status, _) = get(&client, format!("{base}/api/locations/search?q=台北&radius=100000")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let nearby = json!({ "coordinates": taipei_main, "maxDistance": 500, "limit": 3 });
    let (status, body) = post(&client, format!("{base}/api/locations/nearby-stations"), &nearby).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], "r10");

    let (status, body) = post(&client, format!("{base}/api/locations/details"), &taipei_main).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["estimatedAddress"], "台北市");
}

#[tokio::test]
async fn test_city_and_station_listings() {
    let base = spawn_server(&[]).await;
    let client = reqwest::Client::new();

    let (status, body) = get(&client, format!("{base}/api/locations/cities")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);

    let (status, body) = get(&client, format!("{base}/api/locations/cities/taipei")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["englishName"], "Taipei");

    let (status, _) = get(&client, format!("{base}/api/locations/cities/tokyo")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get(&client, format!("{base}/api/locations/stations?mode=hsr")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "hsr");
    assert_eq!(body["count"], 9);

    let (status, body) = get(&client, format!("{base}/api/locations/stations")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "all");

    let (status, _) = get(&client, format!("{base}/api/locations/stations?mode=plane")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_endpoint() {
    let base = spawn_server(&[]).await;
    let client = reqwest::Client::new();

    let (status, body) = get(&client, format!("{base}/api/nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_rate_limit() {
    let base = spawn_server(&["--rate-limit-max", "2"]).await;
    let client = reqwest::Client::new();
    let url = format!("{base}/api/locations/cities");

    for _ in 0..2 {
        let (status, _) = get(&client, url.clone()).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = get(&client, url).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RATE_LIMIT_EXCEEDED");

    let (status, _) = get(&client, format!("{base}/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let base = spawn_server(&[]).await;
    let client = reqwest::Client::new();

    let response = client.get(format!("{base}/health")).send().await.unwrap();
    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
    assert_eq!(headers["referrer-policy"], "no-referrer");
    assert!(!headers["x-request-id"].is_empty());

    let response = client
        .get(format!("{base}/api/nowhere"))
        .header("x-request-id", "trip-42")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-request-id"], "trip-42");
}

#[tokio::test]
async fn test_responses_are_gzipped_on_request() {
    let base = spawn_server(&[]).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{base}/api/locations/stations"))
        .header("accept-encoding", "gzip")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-encoding"], "gzip");

    let plain = client.get(format!("{base}/api/locations/stations")).send().await.unwrap();
    assert!(plain.headers().get("content-encoding").is_none());
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let base = spawn_server(&["--body-limit-bytes", "1024"]).await;
    let client = reqwest::Client::new();

    let body = json!({ "address": "台".repeat(2000) });
    let response = client
        .post(format!("{base}/api/locations/geocode"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let client = reqwest::Client::new();
    let (status, _) = post(&client, format!("{base}/api/locations/geocode"), &json!({ "address": "台北" })).await;
    assert_eq!(status, StatusCode::OK);
}
