use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]` en píxeles de la imagen de origen.
    pub bbox: [f32; 4],
}

/// Respuesta de una inferencia sobre un único frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResult {
    pub model: String,
    pub detections: Vec<Detection>,
    /// Imagen anotada como data URI (`data:image/jpeg;base64,...`).
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameResult {
    pub frame_number: u64,
    #[serde(flatten)]
    pub result: InferenceResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoResult {
    pub total_frames: u64,
    pub frames: Vec<FrameResult>,
}
