use std::sync::Arc;

use crate::{
    application::{
        codec,
        ports::VideoSourcePort,
        registry::DetectorRegistry,
        sampling::sample_video,
        session::LiveSession,
    },
    domain::{
        detection::{InferenceResult, VideoResult},
        errors::{DomainError, DomainResult},
        model::VariantInfo,
    },
};

/// Casos de uso de detección (imagen, vídeo y streaming) sobre el registro compartido.
/// La inferencia es bloqueante y se ejecuta en el pool de `spawn_blocking`.
#[derive(Clone)]
pub struct DetectionService {
    registry: Arc<DetectorRegistry>,
    video: Arc<dyn VideoSourcePort>,
}

impl DetectionService {
    pub fn new(registry: Arc<DetectorRegistry>, video: Arc<dyn VideoSourcePort>) -> Self {
        Self { registry, video }
    }

    pub fn variants(&self) -> Vec<VariantInfo> {
        self.registry.variants()
    }

    pub async fn detect_image(&self, bytes: Vec<u8>, model: String) -> DomainResult<InferenceResult> {
        let registry = self.registry.clone();
        tokio::task::spawn_blocking(move || {
            let image = codec::decode(&bytes)?;
            registry.predict(&model, &image)
        })
        .await
        .map_err(|e| DomainError::Inference(e.to_string()))?
    }

    pub async fn detect_video(
        &self,
        bytes: Vec<u8>,
        model: String,
        max_samples: usize,
    ) -> DomainResult<VideoResult> {
        if max_samples == 0 {
            return Err(DomainError::InvalidInput("max_frames debe ser mayor que 0".into()));
        }
        // Evita decodificar el vídeo si la variante no existe
        if !self.registry.contains(&model) {
            return Err(DomainError::UnknownVariant(model));
        }
        if bytes.is_empty() {
            return Err(DomainError::Decode("vídeo vacío".into()));
        }

        let video = self.video.open(bytes).await?;
        let registry = self.registry.clone();
        tokio::task::spawn_blocking(move || {
            sample_video(&registry, video.frames, video.total_frames, &model, max_samples)
        })
        .await
        .map_err(|e| DomainError::Inference(e.to_string()))?
    }

    pub fn open_session(&self) -> LiveSession {
        LiveSession::new(self.registry.clone())
    }
}
