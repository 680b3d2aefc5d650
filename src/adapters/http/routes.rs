use axum::{extract::{Multipart, State}, response::IntoResponse, Json};
use serde_json::json;

use crate::adapters::http::error::{ApiError, ApiResult};
use crate::adapters::http::state::HttpState;
use crate::application::sampling::DEFAULT_MAX_SAMPLES;
use crate::domain::detection::{InferenceResult, VideoResult};
use crate::domain::model::DEFAULT_VARIANT;

/// Campos del formulario multipart de `/detect` y `/detect-video`.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<Vec<u8>>,
    pub model: Option<String>,
    pub max_frames: Option<String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Error multipart: {e}")))?
        {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("file") => {
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("No se pudo leer el fichero: {e}")))?;
                    form.file = Some(data.to_vec());
                }
                Some("model") => form.model = Some(text(field).await?),
                Some("max_frames") => form.max_frames = Some(text(field).await?),
                _ => {}
            }
        }
        Ok(form)
    }

    fn take_file(&mut self) -> ApiResult<Vec<u8>> {
        self.file.take().ok_or_else(|| ApiError::bad_request("Falta el campo 'file'"))
    }

    fn model(&self) -> String {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_VARIANT)
            .to_string()
    }

    fn max_frames(&self) -> ApiResult<usize> {
        match self.max_frames.as_deref().map(str::trim) {
            None | Some("") => Ok(DEFAULT_MAX_SAMPLES),
            Some(raw) => raw
                .parse()
                .map_err(|_| ApiError::bad_request(format!("max_frames inválido: {raw}"))),
        }
    }
}

async fn text(field: axum::extract::multipart::Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("Campo inválido: {e}")))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn list_models(State(st): State<HttpState>) -> impl IntoResponse {
    Json(json!({
        "default": DEFAULT_VARIANT,
        "models": st.detection.variants(),
    }))
}

pub async fn detect(State(st): State<HttpState>, multipart: Multipart) -> ApiResult<Json<InferenceResult>> {
    let mut form = UploadForm::read(multipart).await?;
    let file = form.take_file()?;
    let result = st.detection.detect_image(file, form.model()).await?;
    Ok(Json(result))
}

pub async fn detect_video(State(st): State<HttpState>, multipart: Multipart) -> ApiResult<Json<VideoResult>> {
    let mut form = UploadForm::read(multipart).await?;
    let file = form.take_file()?;
    let max_frames = form.max_frames()?;
    let result = st.detection.detect_video(file, form.model(), max_frames).await?;
    tracing::info!("Vídeo procesado: {} frames muestreados de {}", result.frames.len(), result.total_frames);
    Ok(Json(result))
}
