pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::{routing::{get, post}, Router};
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use crate::adapters::http::state::HttpState;
use crate::adapters::http::ws::ws_handler;
use crate::config::AppConfig;

pub fn router(state: HttpState, config: &AppConfig) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/models", get(routes::list_models))
        .route("/detect", post(routes::detect))
        .route("/detect-video", post(routes::detect_video))
        .route("/detect-stream", get(ws_handler))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Orígenes explícitos con credenciales: métodos y cabeceras se reflejan de la petición.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Origen CORS inválido ignorado: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::state::HttpState;
    use crate::application::codec::tests::png_bytes;
    use crate::application::ports::{VideoFrames, VideoSourcePort};
    use crate::application::services::DetectionService;
    use crate::application::testing::{fake_registry, gradient};
    use crate::domain::errors::{DomainError, DomainResult};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct NoVideo;

    #[async_trait::async_trait]
    impl VideoSourcePort for NoVideo {
        async fn open(&self, _video: Vec<u8>) -> DomainResult<VideoFrames> {
            Err(DomainError::Video("sin vídeo en pruebas".into()))
        }
    }

    fn app() -> Router {
        let (registry, _, _) = fake_registry();
        let detection = Arc::new(DetectionService::new(Arc::new(registry), Arc::new(NoVideo)));
        router(HttpState { detection }, &AppConfig::default())
    }

    const BOUNDARY: &str = "XTESTBOUNDARY";

    fn multipart(fields: &[(&str, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            if *name == "file" {
                body.extend_from_slice(
                    b"Content-Disposition: form-data; name=\"file\"; filename=\"frame.png\"\r\nContent-Type: image/png\r\n\r\n",
                );
            } else {
                body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes());
            }
            body.extend_from_slice(value);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::post("/detect")
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn json(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_and_models() {
        let resp = app().oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json(resp).await["status"], "ok");

        let resp = app().oneshot(Request::get("/models").body(Body::empty()).unwrap()).await.unwrap();
        let body = json(resp).await;
        assert_eq!(body["default"], "yolo13n_clahe");
        assert_eq!(body["models"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn detect_returns_annotated_result() {
        let png = png_bytes(&gradient(10, 6));
        let resp = app().oneshot(multipart(&[("model", b"yolo26s"), ("file", &png)])).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = json(resp).await;
        assert_eq!(body["model"], "yolo26s");
        assert_eq!(body["detections"][0]["label"], "plain");
        assert!(body["image"].as_str().unwrap().starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn detect_errors_carry_detail() {
        let png = png_bytes(&gradient(4, 4));
        let resp = app().oneshot(multipart(&[("model", b"nope"), ("file", &png)])).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(json(resp).await["detail"].as_str().unwrap().contains("nope"));

        let resp = app().oneshot(multipart(&[("model", b"yolo26s")])).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app().oneshot(multipart(&[("file", b"not an image")])).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
