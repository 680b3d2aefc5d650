use serde::{Deserialize, Serialize};

pub const DEFAULT_VARIANT: &str = "yolo13n_clahe";

/// Preprocesado aplicado a la imagen antes de la inferencia.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preprocess {
    None,
    Clahe,
}

/// Variante de detector conocida en tiempo de compilación.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantSpec {
    pub key: &'static str,
    /// Ficheros candidatos en orden de preferencia: gana el primero que exista.
    pub candidates: &'static [&'static str],
    pub preprocess: Preprocess,
}

/// Conjunto cerrado de variantes.
pub const VARIANTS: &[VariantSpec] = &[
    VariantSpec {
        key: "yolo13n_clahe",
        candidates: &["YOLOv13nClahe.onnx"],
        preprocess: Preprocess::Clahe,
    },
    VariantSpec {
        key: "yolo26s",
        candidates: &["YOLOv26s.onnx"],
        preprocess: Preprocess::None,
    },
];

pub fn find_variant(key: &str) -> Option<&'static VariantSpec> {
    VARIANTS.iter().find(|v| v.key == key)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoloParams {
    pub input_size: u32,        // 640 typical
    pub conf_threshold: f32,    // 0..1
    pub iou_threshold: f32,     // 0..1
    pub max_detections: usize,  // e.g. 300
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantInfo {
    pub key: String,
    pub preprocess: Preprocess,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_keys_are_unique() {
        for (i, a) in VARIANTS.iter().enumerate() {
            assert!(VARIANTS[i + 1..].iter().all(|b| b.key != a.key), "duplicated key {}", a.key);
            assert!(!a.candidates.is_empty());
        }
    }

    #[test]
    fn default_variant_is_registered() {
        assert!(find_variant(DEFAULT_VARIANT).is_some());
        assert!(find_variant("yolo99").is_none());
    }

    #[test]
    fn only_clahe_variant_is_preprocessed() {
        assert_eq!(find_variant("yolo13n_clahe").unwrap().preprocess, Preprocess::Clahe);
        assert_eq!(find_variant("yolo26s").unwrap().preprocess, Preprocess::None);
    }
}
