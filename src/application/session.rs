use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::codec;
use crate::application::registry::DetectorRegistry;
use crate::domain::{
    detection::InferenceResult,
    errors::{DomainError, DomainResult},
    model::DEFAULT_VARIANT,
    stream::{summarize_detections, SessionState, StreamMessage},
};

/// Sesión de streaming en vivo: una por conexión.
///
/// Los mensajes se procesan de uno en uno; cada frame termina su inferencia
/// antes de leer el siguiente mensaje, así que las respuestas salen en el
/// mismo orden en que llegaron los frames.
pub struct LiveSession {
    registry: Arc<DetectorRegistry>,
    state: SessionState,
}

impl LiveSession {
    pub fn new(registry: Arc<DetectorRegistry>) -> Self {
        Self { registry, state: SessionState::default() }
    }

    /// Bucle principal. Termina cuando el flujo de entrada se agota, falla la
    /// recepción o falla el envío de una respuesta. Los errores de un mensaje
    /// concreto se registran y se ignoran.
    pub async fn run<S, E, K>(mut self, mut inbound: S, mut outbound: K) -> SessionState
    where
        S: Stream<Item = Result<String, E>> + Unpin,
        E: Display,
        K: Sink<String> + Unpin,
        K::Error: Display,
    {
        info!("[WebSocket] Cliente conectado");

        loop {
            let text = match inbound.next().await {
                Some(Ok(text)) => text,
                Some(Err(e)) => {
                    warn!("[WebSocket] Error de recepción (frame {}): {}", self.state.frame_count, e);
                    break;
                }
                None => break,
            };

            let reply = match self.handle(&text).await {
                Ok(Some(result)) => result,
                Ok(None) => continue,
                Err(e) => {
                    warn!("[Frame {}] {}", self.state.frame_count, e);
                    continue;
                }
            };

            let json = match serde_json::to_string(&reply) {
                Ok(json) => json,
                Err(e) => {
                    warn!("[Frame {}] No se pudo serializar la respuesta: {}", self.state.frame_count, e);
                    continue;
                }
            };
            if let Err(e) = outbound.send(json).await {
                warn!("[WebSocket] Error de envío: {}", e);
                break;
            }
        }

        info!("[WebSocket] Cliente desconectado tras {} frames", self.state.frame_count);
        self.state
    }

    /// Procesa un mensaje. Devuelve la respuesta a enviar, si la hay.
    pub async fn handle(&mut self, text: &str) -> DomainResult<Option<InferenceResult>> {
        let msg = StreamMessage::parse(text)
            .map_err(|e| DomainError::InvalidInput(format!("mensaje inválido: {}", e)))?;

        match msg {
            StreamMessage::Config { model } => {
                // Se valida de forma perezosa con el siguiente frame
                self.state.active_variant = model.unwrap_or_else(|| DEFAULT_VARIANT.to_string());
                info!("[WebSocket] Modelo seleccionado: {}", self.state.active_variant);
                Ok(None)
            }
            StreamMessage::Frame { data } => {
                self.state.frame_count += 1;
                let frame_no = self.state.frame_count;

                let Some(data) = data.filter(|d| !d.is_empty()) else {
                    warn!("[Frame {}] Frame vacío, se ignora", frame_no);
                    return Ok(None);
                };

                let registry = self.registry.clone();
                let key = self.state.active_variant.clone();
                let result = tokio::task::spawn_blocking(move || {
                    let bytes = codec::decode_base64_payload(&data)?;
                    let image = codec::decode(&bytes)?;
                    debug!("[Frame {}] Imagen {}x{}", frame_no, image.width(), image.height());
                    registry.process_frame(&key, &image)
                })
                .await
                .map_err(|e| DomainError::Inference(e.to_string()))??;

                debug!(
                    "[Frame {}] {} objetos: {}",
                    frame_no,
                    result.detections.len(),
                    summarize_detections(&result.detections)
                );
                Ok(Some(result))
            }
        }
    }
}
