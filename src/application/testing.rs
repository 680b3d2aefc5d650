//! Dobles de prueba para los puertos de la capa de aplicación.

use image::Rgb;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::application::ports::{DetectorLoaderPort, DetectorPort, RawBox, RawDetections};
use crate::application::registry::DetectorRegistry;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::frame::PixelGrid;

pub(crate) fn gradient(w: u32, h: u32) -> PixelGrid {
    PixelGrid::from_fn(w, h, |x, y| {
        let v = (60 + (x * 40 / w.max(1)) + (y * 20 / h.max(1))) as u8;
        Rgb([v, v.saturating_add(30), v.saturating_sub(20)])
    })
}

/// Detector falso: por defecto devuelve una caja que cubre todo el frame.
pub(crate) struct FakeDetector {
    label: String,
    boxes: Option<Vec<RawBox>>,
    names: HashMap<usize, String>,
    extra_set: bool,
    fail_on_width: Option<u32>,
    seen: Mutex<Vec<PixelGrid>>,
}

impl FakeDetector {
    pub(crate) fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            boxes: None,
            names: HashMap::from([(0, label.to_string())]),
            extra_set: false,
            fail_on_width: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_boxes(boxes: Vec<RawBox>, names: HashMap<usize, String>) -> Self {
        Self { boxes: Some(boxes), names, ..Self::new("fixed") }
    }

    pub(crate) fn with_extra_set(mut self) -> Self {
        self.extra_set = true;
        self
    }

    pub(crate) fn failing_on_width(mut self, width: u32) -> Self {
        self.fail_on_width = Some(width);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub(crate) fn seen(&self) -> Vec<PixelGrid> {
        self.seen.lock().unwrap().clone()
    }
}

impl DetectorPort for FakeDetector {
    fn infer(&self, grid: &PixelGrid) -> DomainResult<Vec<RawDetections>> {
        self.seen.lock().unwrap().push(grid.clone());
        if self.fail_on_width == Some(grid.width()) {
            return Err(DomainError::Inference(format!("{}: fallo simulado", self.label)));
        }

        let boxes = self.boxes.clone().unwrap_or_else(|| {
            vec![RawBox {
                xyxy: [0.0, 0.0, grid.width() as f32, grid.height() as f32],
                conf: 0.9,
                class_id: 0,
            }]
        });
        let mut sets = vec![RawDetections { boxes, names: self.names.clone() }];
        if self.extra_set {
            sets.push(RawDetections {
                boxes: vec![RawBox { xyxy: [0.0; 4], conf: 0.1, class_id: 3 }; 2],
                names: HashMap::new(),
            });
        }
        Ok(sets)
    }

    fn render(&self, grid: &PixelGrid, _result: &RawDetections) -> PixelGrid {
        grid.clone()
    }
}

/// Cargador que entrega detectores falsos según el nombre del fichero.
#[derive(Default)]
pub(crate) struct FakeLoader {
    detectors: HashMap<String, Arc<FakeDetector>>,
}

impl FakeLoader {
    /// Registro con un fichero temporal por variante.
    pub(crate) fn registry_with(entries: &[(&str, Arc<FakeDetector>)]) -> (DetectorRegistry, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = FakeLoader::default();
        let mut paths = BTreeMap::new();
        for (key, detector) in entries {
            let file = format!("{}.onnx", key);
            let path = dir.path().join(&file);
            std::fs::write(&path, b"onnx").unwrap();
            loader.detectors.insert(file, detector.clone());
            paths.insert(key.to_string(), path);
        }
        let registry = DetectorRegistry::new(paths, &loader).unwrap();
        (registry, dir)
    }
}

impl DetectorLoaderPort for FakeLoader {
    fn load(&self, path: &Path) -> DomainResult<Arc<dyn DetectorPort>> {
        let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        self.detectors
            .get(&name)
            .map(|d| d.clone() as Arc<dyn DetectorPort>)
            .ok_or_else(|| DomainError::Inference(format!("sin detector falso para {}", name)))
    }
}

/// Registro con las dos variantes conocidas respaldadas por detectores falsos.
pub(crate) fn fake_registry() -> (DetectorRegistry, Arc<FakeDetector>, Arc<FakeDetector>) {
    let clahe = Arc::new(FakeDetector::new("clahe"));
    let plain = Arc::new(FakeDetector::new("plain"));
    let (registry, _dir) = FakeLoader::registry_with(&[
        ("yolo13n_clahe", clahe.clone()),
        ("yolo26s", plain.clone()),
    ]);
    (registry, clahe, plain)
}
