//! HTTP surface: request DTOs, handlers, and error mapping.
//!
//! Every handler catches its own failures and answers with the
//! `{success: false, error}` envelope, so no request can take the process
//! down. Mutations go through the store's write lock (single writer);
//! reads match against a read-locked snapshot.

use crate::engine::{EngineError, EngineHandle};
use crate::store::FaceStore;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use gaze_core::{IdentityRecord, Matcher, NearestSampleMatcher};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

/// Shared state behind every handler.
pub struct AppState {
    pub store: RwLock<FaceStore>,
    pub engine: EngineHandle,
    pub match_threshold: f32,
    pub samples_per_registration: usize,
    pub model_status: String,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/model-status", get(model_status))
        .route("/api/health", get(health))
        .route("/api/register", post(register))
        .route("/api/recognize", post(recognize))
        .route("/api/faces", get(list_faces).delete(clear_faces))
        .route("/api/faces/{id}", delete(delete_face))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("no faces detected in images")]
    NoFaceDetected,
    #[error("invalid image")]
    InvalidImage,
    #[error("{0}")]
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NoFaceDetected => ApiError::NoFaceDetected,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) | ApiError::NoFaceDetected | ApiError::InvalidImage => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        let body = json!({ "success": false, "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

// Missing fields default to empty so validation can answer with the error
// envelope instead of the framework's rejection format.
#[derive(Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    images: Vec<String>,
}

#[derive(Deserialize)]
struct RecognizeRequest {
    #[serde(default)]
    image: String,
}

#[derive(Serialize)]
struct FaceLocation {
    top: u32,
    right: u32,
    bottom: u32,
    left: u32,
}

#[derive(Serialize)]
struct RecognizedFace {
    name: String,
    confidence: f32,
    location: FaceLocation,
}

#[derive(Serialize)]
struct FaceSummary {
    id: String,
    name: String,
    thumbnail: Option<String>,
    timestamp: String,
}

async fn index() -> &'static str {
    "Gaze face recognition API is running on /api endpoints"
}

async fn model_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "loaded": true, "message": state.model_status }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let count = state.store.read().await.len();
    Json(json!({ "status": "healthy", "registered_faces": count }))
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.name.trim().is_empty() || req.images.is_empty() {
        return Err(ApiError::Validation("Name and images required".into()));
    }

    // Decode up to the per-registration cap. Undecodable payloads are
    // skipped; they count as unusable samples, not as request failures.
    let mut images = Vec::new();
    for (idx, payload) in req
        .images
        .iter()
        .take(state.samples_per_registration)
        .enumerate()
    {
        match decode_base64_image(payload) {
            Ok(image) => images.push(image),
            Err(err) => {
                tracing::warn!(index = idx, error = %err, "skipping undecodable registration image");
            }
        }
    }

    let enrollment = state.engine.enroll(images).await?;
    let sample_count = enrollment.samples.len();

    let record = IdentityRecord::new(req.name.trim(), enrollment.samples, enrollment.thumbnail)
        .ok_or_else(|| ApiError::Internal("enrollment produced no samples".into()))?;
    let face_id = record.id.clone();
    let name = record.name.clone();

    state.store.write().await.append(record);
    tracing::info!(name = %name, id = %face_id, samples = sample_count, "identity registered");

    Ok(Json(json!({
        "success": true,
        "message": format!("Registered {name} with {sample_count} samples"),
        "face_id": face_id,
    })))
}

async fn recognize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecognizeRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.image.trim().is_empty() {
        return Err(ApiError::Validation("Image required".into()));
    }

    let image = decode_base64_image(&req.image).map_err(|err| {
        tracing::debug!(error = %err, "recognize: undecodable image");
        ApiError::InvalidImage
    })?;

    let scanned = state.engine.scan(image).await?;

    let store = state.store.read().await;
    let matcher = NearestSampleMatcher;
    let faces: Vec<RecognizedFace> = scanned
        .into_iter()
        .map(|(face, embedding)| {
            let result = matcher.identify(&embedding, store.records(), state.match_threshold);
            RecognizedFace {
                name: result.name.clone().unwrap_or_else(|| "Unknown".to_string()),
                confidence: result.confidence(),
                location: FaceLocation {
                    top: face.top,
                    right: face.right,
                    bottom: face.bottom,
                    left: face.left,
                },
            }
        })
        .collect();

    let count = faces.len();
    Ok(Json(json!({ "success": true, "faces": faces, "count": count })))
}

async fn list_faces(State(state): State<Arc<AppState>>) -> Json<Value> {
    let store = state.store.read().await;
    // Embeddings are deliberately omitted: large payload, not needed by
    // clients.
    let faces: Vec<FaceSummary> = store
        .records()
        .iter()
        .map(|r| FaceSummary {
            id: r.id.clone(),
            name: r.name.clone(),
            thumbnail: r.thumbnail.clone(),
            timestamp: r.created_at.to_rfc3339(),
        })
        .collect();
    let count = faces.len();
    Json(json!({ "success": true, "faces": faces, "count": count }))
}

async fn delete_face(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<Value> {
    let removed = state.store.write().await.delete(&id);
    if removed {
        tracing::info!(id = %id, "identity deleted");
    }
    // Idempotent: deleting an absent id is still a success.
    Json(json!({ "success": true, "message": "Face deleted successfully" }))
}

async fn clear_faces(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.store.write().await.clear();
    tracing::info!("all identities cleared");
    Json(json!({ "success": true, "message": "All faces cleared" }))
}

#[derive(Debug, thiserror::Error)]
enum ImageDecodeError {
    #[error("base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}

/// Decode a base64 image payload into an RGB image, stripping any data-URL
/// header (`data:image/jpeg;base64,<data>`).
fn decode_base64_image(payload: &str) -> Result<RgbImage, ImageDecodeError> {
    let data = match payload.split_once("base64,") {
        Some((_, rest)) => rest,
        None => payload,
    };
    let bytes = BASE64.decode(data.trim())?;
    let image = image::load_from_memory(&bytes)?;
    Ok(image.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{spawn_engine, EnrollLimits};
    use crate::store::MemoryBackend;
    use crate::testutil::StubAnalyzer;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app(analyzer: StubAnalyzer) -> Router {
        let engine = spawn_engine(
            analyzer,
            EnrollLimits {
                max_samples: 5,
                thumbnail_size: 32,
            },
        );
        let store = FaceStore::open(Box::new(MemoryBackend::default()));
        let state = Arc::new(AppState {
            store: RwLock::new(store),
            engine,
            match_threshold: 0.4,
            samples_per_registration: 5,
            model_status: "test models loaded".to_string(),
        });
        router(state)
    }

    fn png_base64() -> String {
        let image = RgbImage::from_pixel(8, 8, image::Rgb([100, 110, 120]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        BASE64.encode(bytes)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[test]
    fn test_data_url_prefix_is_stripped() {
        let payload = format!("data:image/png;base64,{}", png_base64());
        let image = decode_base64_image(&payload).unwrap();
        assert_eq!(image.width(), 8);
        assert_eq!(image.height(), 8);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_base64_image("!!not-base64!!").is_err());
        // Valid base64, not an image.
        assert!(decode_base64_image(&BASE64.encode(b"hello")).is_err());
    }

    #[tokio::test]
    async fn test_register_and_health() {
        let app = test_app(StubAnalyzer::with_one_face(vec![0.6, 0.8]));

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/register",
            Some(json!({ "name": "Alice", "images": [png_base64(), png_base64()] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["message"], json!("Registered Alice with 2 samples"));
        assert!(body["face_id"].as_str().is_some_and(|id| !id.is_empty()));

        let (status, body) = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("healthy"));
        assert_eq!(body["registered_faces"], json!(1));
    }

    #[tokio::test]
    async fn test_register_requires_name_and_images() {
        let app = test_app(StubAnalyzer::with_one_face(vec![1.0]));

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/register",
            Some(json!({ "images": [png_base64()] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/register",
            Some(json!({ "name": "Alice", "images": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_register_no_faces_leaves_store_unchanged() {
        let app = test_app(StubAnalyzer::without_faces());

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/register",
            Some(json!({ "name": "Alice", "images": [png_base64()] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("no faces detected in images"));

        let (_, body) = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(body["registered_faces"], json!(0));
    }

    #[tokio::test]
    async fn test_register_all_images_undecodable_is_no_face() {
        let app = test_app(StubAnalyzer::with_one_face(vec![1.0]));

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/register",
            Some(json!({ "name": "Alice", "images": ["!!garbage!!"] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("no faces detected in images"));
    }

    #[tokio::test]
    async fn test_recognize_matches_registered_identity() {
        // Stub returns the same embedding for register and recognize, so the
        // best distance is 0 and confidence clamps to 1.
        let app = test_app(StubAnalyzer::with_one_face(vec![0.6, 0.8]));

        send(
            &app,
            Method::POST,
            "/api/register",
            Some(json!({ "name": "Alice", "images": [png_base64()] })),
        )
        .await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/recognize",
            Some(json!({ "image": png_base64() })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["count"], json!(1));

        let face = &body["faces"][0];
        assert_eq!(face["name"], json!("Alice"));
        assert!((face["confidence"].as_f64().unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(face["location"]["top"], json!(1));
        assert_eq!(face["location"]["right"], json!(7));
        assert_eq!(face["location"]["bottom"], json!(7));
        assert_eq!(face["location"]["left"], json!(1));
    }

    #[tokio::test]
    async fn test_recognize_empty_store_is_unknown() {
        let app = test_app(StubAnalyzer::with_one_face(vec![0.6, 0.8]));

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/recognize",
            Some(json!({ "image": png_base64() })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["faces"][0]["name"], json!("Unknown"));
        assert_eq!(body["faces"][0]["confidence"], json!(0.0));
    }

    #[tokio::test]
    async fn test_recognize_rejects_bad_payloads() {
        let app = test_app(StubAnalyzer::with_one_face(vec![1.0]));

        let (status, body) =
            send(&app, Method::POST, "/api/recognize", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/recognize",
            Some(json!({ "image": "!!garbage!!" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("invalid image"));
    }

    #[tokio::test]
    async fn test_recognize_accepts_data_url() {
        let app = test_app(StubAnalyzer::with_one_face(vec![1.0]));

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/recognize",
            Some(json!({ "image": format!("data:image/png;base64,{}", png_base64()) })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], json!(1));
    }

    #[tokio::test]
    async fn test_list_faces_omits_embeddings() {
        let app = test_app(StubAnalyzer::with_one_face(vec![0.6, 0.8]));

        send(
            &app,
            Method::POST,
            "/api/register",
            Some(json!({ "name": "Alice", "images": [png_base64()] })),
        )
        .await;

        let (status, body) = send(&app, Method::GET, "/api/faces", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], json!(1));

        let face = &body["faces"][0];
        assert_eq!(face["name"], json!("Alice"));
        assert!(face["id"].as_str().is_some());
        assert!(face["timestamp"].as_str().is_some());
        assert!(face["thumbnail"].as_str().is_some());
        assert!(face.get("embedding").is_none());
        assert!(face.get("samples").is_none());
    }

    #[tokio::test]
    async fn test_delete_face_is_idempotent() {
        let app = test_app(StubAnalyzer::with_one_face(vec![0.6, 0.8]));

        // Absent id still succeeds.
        let (status, body) =
            send(&app, Method::DELETE, "/api/faces/no-such-id", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));

        let (_, body) = send(
            &app,
            Method::POST,
            "/api/register",
            Some(json!({ "name": "Alice", "images": [png_base64()] })),
        )
        .await;
        let id = body["face_id"].as_str().unwrap().to_string();

        let (status, _) =
            send(&app, Method::DELETE, &format!("/api/faces/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(body["registered_faces"], json!(0));
    }

    #[tokio::test]
    async fn test_clear_faces() {
        let app = test_app(StubAnalyzer::with_one_face(vec![0.6, 0.8]));

        for name in ["Alice", "Bob"] {
            send(
                &app,
                Method::POST,
                "/api/register",
                Some(json!({ "name": name, "images": [png_base64()] })),
            )
            .await;
        }

        let (status, body) = send(&app, Method::DELETE, "/api/faces", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));

        let (_, body) = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(body["registered_faces"], json!(0));
    }

    #[tokio::test]
    async fn test_index_and_model_status() {
        let app = test_app(StubAnalyzer::with_one_face(vec![1.0]));

        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&bytes).contains("/api"));

        let (status, body) = send(&app, Method::GET, "/api/model-status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["loaded"], json!(true));
        assert_eq!(body["message"], json!("test models loaded"));
    }
}
