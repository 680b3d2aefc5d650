use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::codec;
use crate::application::ports::{DetectorLoaderPort, DetectorPort, RawDetections};
use crate::domain::{
    detection::{Detection, InferenceResult},
    errors::{DomainError, DomainResult},
    frame::PixelGrid,
    model::{find_variant, VariantInfo, VariantSpec},
};

struct RegisteredVariant {
    spec: &'static VariantSpec,
    path: PathBuf,
    detector: Arc<dyn DetectorPort>,
}

/// Registro de detectores: una instancia inicializada por variante.
/// Se construye una vez al arrancar y después solo se lee, así que se
/// comparte entre sesiones con un `Arc` sin bloqueos.
pub struct DetectorRegistry {
    variants: BTreeMap<String, RegisteredVariant>,
}

impl DetectorRegistry {
    /// Construcción todo-o-nada: falla si alguna variante no tiene su fichero
    /// (listando todas las que faltan) o si alguna clave no es una variante conocida.
    pub fn new(paths: BTreeMap<String, PathBuf>, loader: &dyn DetectorLoaderPort) -> DomainResult<Self> {
        let mut specs = Vec::with_capacity(paths.len());
        for (key, path) in paths {
            let spec = find_variant(&key).ok_or_else(|| DomainError::UnknownVariant(key.clone()))?;
            specs.push((spec, path));
        }

        let missing: Vec<String> = specs
            .iter()
            .filter(|(_, path)| !path.exists())
            .map(|(spec, _)| spec.key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DomainError::MissingArtifact(missing));
        }

        let mut variants = BTreeMap::new();
        for (spec, path) in specs {
            let detector = loader.load(&path)?;
            info!("Modelo '{}' cargado desde {}", spec.key, path.display());
            variants.insert(spec.key.to_string(), RegisteredVariant { spec, path, detector });
        }
        Ok(Self { variants })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.variants.contains_key(key)
    }

    pub fn variants(&self) -> Vec<VariantInfo> {
        self.variants
            .values()
            .map(|v| VariantInfo { key: v.spec.key.to_string(), preprocess: v.spec.preprocess })
            .collect()
    }

    pub fn artifact_path(&self, key: &str) -> Option<&PathBuf> {
        self.variants.get(key).map(|v| &v.path)
    }

    /// Preprocesa (si la variante lo requiere), infiere, normaliza y anota.
    pub fn predict(&self, key: &str, grid: &PixelGrid) -> DomainResult<InferenceResult> {
        let variant = self
            .variants
            .get(key)
            .ok_or_else(|| DomainError::UnknownVariant(key.to_string()))?;

        let preprocessed = variant.spec.preprocess.apply(grid);
        let input = preprocessed.as_ref().unwrap_or(grid);

        let raw = variant
            .detector
            .infer(input)?
            .into_iter()
            .next()
            .unwrap_or_default();
        let detections = normalize(&raw);
        debug!("[{}] {} detecciones", key, detections.len());

        let annotated = variant.detector.render(input, &raw);
        Ok(InferenceResult {
            model: key.to_string(),
            detections,
            image: codec::encode(&annotated)?,
        })
    }

    /// Alias de `predict` para los llamadores de vídeo y streaming.
    pub fn process_frame(&self, key: &str, frame: &PixelGrid) -> DomainResult<InferenceResult> {
        self.predict(key, frame)
    }
}

fn normalize(raw: &RawDetections) -> Vec<Detection> {
    raw.boxes
        .iter()
        .map(|b| Detection {
            label: raw
                .names
                .get(&b.class_id)
                .cloned()
                .unwrap_or_else(|| b.class_id.to_string()),
            confidence: b.conf,
            bbox: b.xyxy,
        })
        .collect()
}
