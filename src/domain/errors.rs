use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Imagen inválida: {0}")]
    Decode(String),
    #[error("No se pudo codificar la imagen: {0}")]
    Encode(String),
    #[error("Modelo desconocido: {0}")]
    UnknownVariant(String),
    #[error("Faltan los modelos: {}", .0.join(", "))]
    MissingArtifact(Vec<String>),
    #[error("Entrada inválida: {0}")]
    InvalidInput(String),
    #[error("Error de inferencia: {0}")]
    Inference(String),
    #[error("Error de vídeo: {0}")]
    Video(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
