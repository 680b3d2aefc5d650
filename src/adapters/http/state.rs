use std::sync::Arc;
use crate::application::services::DetectionService;

/// Estado compartido para los manejadores HTTP de Axum.
/// Solo contiene el servicio de detección; el registro que hay debajo es de solo lectura.
#[derive(Clone)]
pub struct HttpState {
    pub detection: Arc<DetectionService>,
}
