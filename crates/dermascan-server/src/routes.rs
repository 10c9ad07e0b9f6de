//! HTTP routes and handlers
//!
//! Response envelopes ({status, message, data}) and the Indonesian failure
//! message are part of the public contract consumed by existing clients and
//! must not be reworded.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use dermascan_core::PredictionRecord;

use crate::state::AppState;

const PREDICTION_FAILED: &str = "Terjadi kesalahan dalam melakukan prediksi";

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    // Body limit leaves headroom above the file cap for multipart framing;
    // the per-file cap is enforced in the handler with the documented message.
    let body_limit = state.config.max_upload_bytes + 64 * 1024;

    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/predict", post(predict))
        .route("/predict/histories", get(histories))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

async fn welcome() -> &'static str {
    "Welcome to the Dermascan API"
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

async fn fallback() -> Response {
    fail(StatusCode::NOT_FOUND, "Not found")
}

/// Classify one uploaded image and persist the outcome.
async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    metrics::counter!("dermascan_requests_total", "endpoint" => "predict").increment(1);
    let max = state.config.max_upload_bytes;

    // A body that is not multipart at all still gets the documented envelope
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return oversize(max);
        }
        Err(rejection) => {
            warn!("Rejected non-multipart upload: {rejection}");
            return fail(StatusCode::BAD_REQUEST, "Invalid file upload");
        }
    };

    // Pull the `image` field out of the multipart body
    let mut upload = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("image") {
                    continue;
                }
                let content_type = field.content_type().map(str::to_string);
                match field.bytes().await {
                    Ok(data) => {
                        upload = Some((content_type, data));
                        break;
                    }
                    Err(err) => return upload_error(max, err),
                }
            }
            Ok(None) => break,
            Err(err) => return upload_error(max, err),
        }
    }

    let Some((content_type, data)) = upload else {
        return fail(StatusCode::BAD_REQUEST, "No file uploaded");
    };

    if data.len() > max {
        return oversize(max);
    }

    if !content_type.as_deref().unwrap_or("").starts_with("image/") {
        warn!(?content_type, "Rejected upload with non-image content type");
        return fail(StatusCode::BAD_REQUEST, "Invalid file upload");
    }

    let label = match state.predictor.classify(&data).await {
        Ok(label) => label,
        Err(err) => {
            error!("Prediction failed: {err}");
            return fail(StatusCode::BAD_REQUEST, PREDICTION_FAILED);
        }
    };

    let record = PredictionRecord::new(label);

    // A record the client cannot later retrieve counts as a failed request,
    // even though inference itself succeeded.
    if let Err(err) = state.store.save(&record).await {
        error!("Failed to persist prediction {}: {err}", record.id);
        return fail(StatusCode::BAD_REQUEST, PREDICTION_FAILED);
    }

    info!(id = %record.id, result = %record.result, "Prediction stored");

    (
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "Model is predicted successfully",
            "data": record,
        })),
    )
        .into_response()
}

/// List every stored prediction as {id, history:{result, createdAt, suggestion}}.
async fn histories(State(state): State<AppState>) -> Response {
    let records = match state.store.list_all().await {
        Ok(records) => records,
        Err(err) => {
            error!("Failed to read prediction histories: {err}");
            return fail(StatusCode::BAD_REQUEST, PREDICTION_FAILED);
        }
    };

    if records.is_empty() {
        return fail(StatusCode::NOT_FOUND, "No predictions found");
    }

    let histories: Vec<_> = records
        .into_iter()
        .map(|record| {
            json!({
                "id": record.id,
                "history": {
                    "result": record.result,
                    "createdAt": record.created_at,
                    "suggestion": record.suggestion,
                },
            })
        })
        .collect();

    (
        StatusCode::OK,
        Json(json!({ "status": "success", "data": histories })),
    )
        .into_response()
}

/// Map a multipart read error; a body-limit trip gets the documented 413.
fn upload_error(max: usize, err: MultipartError) -> Response {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return oversize(max);
    }
    warn!("Malformed multipart upload: {err}");
    fail(StatusCode::BAD_REQUEST, "Invalid file upload")
}

fn oversize(max: usize) -> Response {
    fail(
        StatusCode::PAYLOAD_TOO_LARGE,
        &format!("Payload content length greater than maximum allowed: {max}"),
    )
}

fn fail(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "status": "fail", "message": message })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use dermascan_core::{Diagnosis, Error, Result as CoreResult};
    use dermascan_inference::Predictor;
    use dermascan_store::MemoryStore;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct CannedPredictor {
        outcome: CoreResult<Diagnosis>,
    }

    #[async_trait]
    impl Predictor for CannedPredictor {
        async fn classify(&self, _image_bytes: &[u8]) -> CoreResult<Diagnosis> {
            match &self.outcome {
                Ok(label) => Ok(*label),
                Err(err) => Err(Error::prediction(err.to_string())),
            }
        }
    }

    fn test_app(outcome: CoreResult<Diagnosis>) -> Router {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let state = AppState::new(
            ServerConfig::default(),
            Arc::new(CannedPredictor { outcome }),
            Arc::new(MemoryStore::new()),
            handle,
        );
        create_router(state)
    }

    const BOUNDARY: &str = "x-dermascan-test";

    fn multipart_body(field: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; \
                 name=\"{field}\"; filename=\"upload.png\"\r\n\
                 Content-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn predict_request(field: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(field, content_type, data)))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_welcome_and_health() {
        let app = test_app(Ok(Diagnosis::NonCancer));

        let response = app
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_headers_on_responses() {
        let app = test_app(Ok(Diagnosis::NonCancer));

        let response = app
            .oneshot(
                Request::get("/")
                    .header("origin", "https://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .map(|v| v.to_str().unwrap()),
            Some("*")
        );
    }

    #[tokio::test]
    async fn test_oversize_upload_rejected_with_documented_message() {
        let app = test_app(Ok(Diagnosis::NonCancer));
        let oversize = vec![0u8; 1_000_001];

        let response = app
            .oneshot(predict_request("image", "image/png", &oversize))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = body_json(response).await;
        assert_eq!(body["status"], "fail");
        assert_eq!(
            body["message"],
            "Payload content length greater than maximum allowed: 1000000"
        );
    }

    #[tokio::test]
    async fn test_non_image_content_type_rejected() {
        let app = test_app(Ok(Diagnosis::NonCancer));

        let response = app
            .oneshot(predict_request("image", "text/plain", b"not an image"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Invalid file upload");
    }

    #[tokio::test]
    async fn test_non_multipart_body_gets_fail_envelope() {
        let app = test_app(Ok(Diagnosis::NonCancer));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/predict")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"image":"zzzz"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], "Invalid file upload");
    }

    #[tokio::test]
    async fn test_missing_image_field_rejected() {
        let app = test_app(Ok(Diagnosis::NonCancer));

        let response = app
            .oneshot(predict_request("attachment", "image/png", b"pixels"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], "No file uploaded");
    }

    #[tokio::test]
    async fn test_pipeline_failure_returns_generic_message() {
        let app = test_app(Err(Error::prediction("stage failed")));

        let response = app
            .oneshot(predict_request("image", "image/jpeg", b"pixels"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], PREDICTION_FAILED);
    }

    #[tokio::test]
    async fn test_empty_histories_returns_not_found() {
        let app = test_app(Ok(Diagnosis::NonCancer));

        let response = app
            .oneshot(
                Request::get("/predict/histories")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], "No predictions found");
    }

    #[tokio::test]
    async fn test_successful_prediction_then_history_roundtrip() {
        let app = test_app(Ok(Diagnosis::NonCancer));

        let response = app
            .clone()
            .oneshot(predict_request("image", "image/png", b"benign pixels"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "Model is predicted successfully");

        let data = &body["data"];
        assert_eq!(data["result"], "Non-cancer");
        assert_eq!(data["suggestion"], "Penyakit kanker tidak terdeteksi.");
        let id = data["id"].as_str().unwrap().to_string();

        // Only record fields leave the server, nothing from the pipeline
        let keys: Vec<_> = data.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 4);
        for key in ["id", "result", "suggestion", "createdAt"] {
            assert!(keys.contains(&key.to_string()), "missing key {key}");
        }

        let response = app
            .oneshot(
                Request::get("/predict/histories")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "success");
        let entries = body["data"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["id"], id.as_str());
        assert_eq!(entries[0]["history"]["result"], "Non-cancer");
        assert_eq!(
            entries[0]["history"]["suggestion"],
            "Penyakit kanker tidak terdeteksi."
        );
        assert!(entries[0]["history"]["createdAt"].is_string());
    }
}
