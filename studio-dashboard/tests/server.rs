use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use tower::ServiceExt;

use studio_client::{ClientError, ClientResult, RecordSource};
use studio_common::{ConflictPolicy, RawRecord};
use studio_dashboard::render::HtmlRenderer;
use studio_dashboard::server::{router, AppState};
use studio_dashboard::Dashboard;

/// Serves BH1750 lux readings and nothing for any other measurement
struct LuxStore;

#[async_trait]
impl RecordSource for LuxStore {
    async fn fetch(&self, query: &str) -> ClientResult<Vec<RawRecord>> {
        if !query.contains("studio-bh1750") {
            return Ok(Vec::new());
        }
        Ok((0..3)
            .map(|hour| {
                RawRecord::new(
                    Utc.with_ymd_and_hms(2024, 5, 2, 10 + hour, 0, 0).unwrap(),
                    "lux",
                    100.0 + f64::from(hour),
                )
            })
            .collect())
    }
}

struct DownStore;

#[async_trait]
impl RecordSource for DownStore {
    async fn fetch(&self, _query: &str) -> ClientResult<Vec<RawRecord>> {
        Err(ClientError::Query {
            status: 500,
            message: "internal error".to_string(),
        })
    }
}

fn app<S: RecordSource + 'static>(source: S) -> Router {
    let dashboard = Dashboard::new(source, "Studio", ConflictPolicy::Reject);
    router(AppState::new(dashboard, HtmlRenderer::new()))
}

async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_index_renders_selection() {
    let (status, body) = get(app(LuxStore), "/?sensor=BH1750&start=14&stop=0").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<title>Studio Sensor Dashboard</title>"));
    assert!(body.contains(r#"<option value="BH1750" selected>BH1750</option>"#));
    assert!(body.contains(r#"value="14""#));
    assert!(body.contains("<th>lux</th>"));
    assert_eq!(body.matches("Plotly.newPlot(").count(), 1);
}

#[tokio::test]
async fn test_index_defaults_to_dht22() {
    let (status, body) = get(app(LuxStore), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"<option value="DHT22" selected>DHT22</option>"#));
    assert!(body.contains("No DHT22 data in the selected range."));
    assert!(body.contains("alert-danger"));
    assert!(!body.contains("Plotly.newPlot("));
}

#[tokio::test]
async fn test_index_rejects_invalid_window() {
    let (status, body) = get(app(LuxStore), "/?sensor=BH1750&start=2&stop=5").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("alert-danger"));
    assert!(body.contains(r#"value="5""#));
}

#[tokio::test]
async fn test_index_treats_cleared_input_as_default() {
    let (status, body) = get(app(LuxStore), "/?sensor=BH1750&start=&stop=0").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("<!DOCTYPE html>"));
    assert!(body.contains(r#"min="1" max="60" value="7""#));
    assert!(body.contains("<th>lux</th>"));
}

#[tokio::test]
async fn test_index_reports_malformed_days_on_the_page() {
    let (status, body) = get(app(LuxStore), "/?sensor=BH1750&start=14&stop=-1").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with("<!DOCTYPE html>"));
    assert!(body.contains(r#"<option value="BH1750" selected>BH1750</option>"#));
    assert!(body.contains("alert-danger"));
    assert!(body.contains("stop must be a whole number of days, got &quot;-1&quot;"));
    assert!(body.contains(r#"min="1" max="60" value="14""#));

    let (status, body) = get(app(LuxStore), "/api/render?start=seven").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("start must be a whole number"));
}

#[tokio::test]
async fn test_api_render_returns_instruction() {
    let (status, body) = get(app(LuxStore), "/api/render?sensor=bh1750").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["state"], "displaying");
    assert_eq!(json["data"]["selection"]["sensor"], "BH1750");
    assert_eq!(json["data"]["selection"]["start_days"], 7);
    let blocks = json["data"]["blocks"].as_array().unwrap();
    assert_eq!(blocks.iter().filter(|b| b["kind"] == "chart").count(), 1);
}

#[tokio::test]
async fn test_api_render_unknown_sensor() {
    let (status, body) = get(app(LuxStore), "/api/render?sensor=SCD30").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["success"], false);
    assert!(json["data"].is_null());
    assert!(json["error"].as_str().unwrap().contains("SCD30"));
}

#[tokio::test]
async fn test_store_failure_is_bad_gateway() {
    let (status, body) = get(app(DownStore), "/?sensor=BH1750").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("internal error"));

    let (status, _) = get(app(DownStore), "/api/render").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_health() {
    let (status, body) = get(app(DownStore), "/api/health").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["status"], "healthy");
    assert_eq!(json["data"]["bucket"], "Studio");
    assert_eq!(json["data"]["conflict_policy"], "reject");
}
