use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::domain::{errors::DomainResult, frame::PixelGrid};

/// Caja tal y como la devuelve el detector, antes de normalizar.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBox {
    pub xyxy: [f32; 4],
    pub conf: f32,
    pub class_id: usize,
}

/// Un conjunto de resultados del detector para una imagen.
#[derive(Debug, Clone, Default)]
pub struct RawDetections {
    pub boxes: Vec<RawBox>,
    pub names: HashMap<usize, String>,
}

/// Capacidad de detección: opaca para el registro.
/// Las implementaciones deben poder usarse desde varios hilos a la vez.
pub trait DetectorPort: Send + Sync {
    /// Puede devolver varios conjuntos; con una sola imagen se espera exactamente uno.
    fn infer(&self, grid: &PixelGrid) -> DomainResult<Vec<RawDetections>>;
    fn render(&self, grid: &PixelGrid, result: &RawDetections) -> PixelGrid;
}

pub trait DetectorLoaderPort: Send + Sync {
    fn load(&self, path: &Path) -> DomainResult<Arc<dyn DetectorPort>>;
}

/// Secuencia ordenada de frames de un vídeo.
pub struct VideoFrames {
    /// 0 si el contenedor no declara el número de frames.
    pub total_frames: u64,
    pub frames: Box<dyn Iterator<Item = DomainResult<PixelGrid>> + Send>,
}

#[async_trait]
pub trait VideoSourcePort: Send + Sync {
    async fn open(&self, video: Vec<u8>) -> DomainResult<VideoFrames>;
}
