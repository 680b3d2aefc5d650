use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::domain::model::{VariantSpec, VARIANTS};

/// Descubre los ficheros de modelo dentro de un directorio.
pub struct OnnxModelCatalog {
    model_dir: PathBuf,
}

impl OnnxModelCatalog {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self { model_dir: model_dir.into() }
    }

    /// Para cada variante: el primer candidato que exista o, si no hay
    /// ninguno, el primero declarado (el registro lo reportará como ausente).
    pub fn resolve(&self) -> BTreeMap<String, PathBuf> {
        VARIANTS
            .iter()
            .map(|spec| (spec.key.to_string(), resolve_variant(&self.model_dir, spec)))
            .collect()
    }
}

fn resolve_variant(dir: &Path, spec: &VariantSpec) -> PathBuf {
    spec.candidates
        .iter()
        .map(|file| dir.join(file))
        .find(|path| path.exists())
        .unwrap_or_else(|| dir.join(spec.candidates[0]))
}
