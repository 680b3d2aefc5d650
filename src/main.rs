mod adapters;
mod application;
mod config;
mod domain;

use std::sync::Arc;
use crate::adapters::{
    ffmpeg::video_source::FfmpegVideoSource,
    http::{router, state::HttpState},
    onnx::{model_catalog::OnnxModelCatalog, yolo_engine::OnnxDetectorLoader},
};
use crate::application::{registry::DetectorRegistry, services::DetectionService};
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. .env opcional y logs (RUST_LOG=info por defecto)
    let _ = dotenvy::dotenv();
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env();
    tracing::info!("🔧 Cargando modelos desde {}", config.model_dir.display());

    // 2. Registro de detectores: si falta algún artefacto no arrancamos
    let paths = OnnxModelCatalog::new(&config.model_dir).resolve();
    let loader = OnnxDetectorLoader::new(config.yolo.clone(), config.intra_threads);
    let registry = Arc::new(DetectorRegistry::new(paths, &loader)?);
    for variant in registry.variants() {
        let path = registry.artifact_path(&variant.key).map(|p| p.display().to_string()).unwrap_or_default();
        tracing::info!("🧠 Variante '{}' lista (preproceso: {:?}, fichero: {})", variant.key, variant.preprocess, path);
    }

    // 3. Servicio de aplicación y estado HTTP
    let video = Arc::new(FfmpegVideoSource::new(&config.ffprobe_bin, &config.ffmpeg_bin));
    let detection = Arc::new(DetectionService::new(registry, video));
    let state = HttpState { detection };
    let app = router(state, &config);

    // 4. Servidor
    let addr = config.bind_addr();
    tracing::info!("🚀 Servidor de detección iniciado en http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
