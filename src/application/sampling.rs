use tracing::debug;

use crate::application::registry::DetectorRegistry;
use crate::domain::{
    detection::{FrameResult, VideoResult},
    errors::{DomainError, DomainResult},
    frame::PixelGrid,
};

pub const DEFAULT_MAX_SAMPLES: usize = 30;

/// Intervalo de muestreo. Con `total_frames` desconocido (0) se toma cada frame.
pub fn stride(total_frames: u64, max_samples: usize) -> u64 {
    (total_frames / max_samples.max(1) as u64).max(1)
}

/// Recorre los frames en orden y procesa los que caen en múltiplos del
/// intervalo, hasta `max_samples` resultados.
///
/// Un fallo en cualquier frame (lectura o inferencia) aborta el lote completo.
pub fn sample_video<I>(
    registry: &DetectorRegistry,
    frames: I,
    total_frames: u64,
    key: &str,
    max_samples: usize,
) -> DomainResult<VideoResult>
where
    I: IntoIterator<Item = DomainResult<PixelGrid>>,
{
    if max_samples == 0 {
        return Err(DomainError::InvalidInput("max_frames debe ser mayor que 0".into()));
    }
    if !registry.contains(key) {
        return Err(DomainError::UnknownVariant(key.to_string()));
    }

    let step = stride(total_frames, max_samples);
    let mut results = Vec::with_capacity(max_samples);
    for (idx, frame) in frames.into_iter().enumerate() {
        if results.len() >= max_samples {
            break;
        }
        let frame = frame?;
        let idx = idx as u64;
        if idx % step != 0 {
            continue;
        }
        let result = registry.process_frame(key, &frame)?;
        debug!("Frame {}: {} detecciones", idx, result.detections.len());
        results.push(FrameResult { frame_number: idx, result });
    }

    Ok(VideoResult { total_frames, frames: results })
}
