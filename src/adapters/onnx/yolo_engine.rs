use anyhow::{anyhow, Result};
use image::{imageops::FilterType, RgbImage};
use ndarray::{s, Array4, ArrayView2, ArrayViewD, Axis, IxDyn};
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::Session;
use ort::value::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::adapters::onnx::overlay;
use crate::application::ports::{DetectorLoaderPort, DetectorPort, RawBox, RawDetections};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::frame::PixelGrid;
use crate::domain::model::YoloParams;

/// Detector YOLO sobre ONNX Runtime. `Session::run` necesita `&mut`,
/// así que la sesión va protegida por un `Mutex` para compartir el motor entre hilos.
pub struct OnnxYoloEngine {
    session: Mutex<Session>,
    names: HashMap<usize, String>,
    params: YoloParams,
}

impl OnnxYoloEngine {
    pub fn load(path: &Path, params: YoloParams, intra_threads: usize) -> Result<Self> {
        let mut builder = Session::builder()?.with_intra_threads(intra_threads)?;

        // CUDA es opcional: si está disponible se registra, si no continuamos en CPU.
        let cuda = CUDAExecutionProvider::default().build();
        if let Ok(builder_with_cuda) = builder.clone().with_execution_providers([cuda]) {
            builder = builder_with_cuda;
        }

        // Con `ort` sin default-features, usamos commit_from_memory.
        let model_bytes = fs::read(path)?;
        let session = builder.commit_from_memory(&model_bytes)?;

        let names = session
            .metadata()
            .ok()
            .and_then(|meta| meta.custom("names").ok().flatten())
            .map(|raw| parse_names(&raw))
            .unwrap_or_default();
        if names.is_empty() {
            tracing::warn!("{}: sin metadatos 'names', se usarán los ids de clase", path.display());
        }

        Ok(Self { session: Mutex::new(session), names, params })
    }

    fn run(&self, rgb: &RgbImage) -> Result<Vec<RawBox>> {
        let imgsz = self.params.input_size as usize;
        let resized = image::imageops::resize(rgb, imgsz as u32, imgsz as u32, FilterType::Triangle);

        let mut input = Array4::<f32>::zeros((1, 3, imgsz, imgsz));
        for (x, y, pixel) in resized.enumerate_pixels() {
            input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
            input[[0, 1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
            input[[0, 2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
        }

        let input_shape = vec![1, 3, imgsz as i64, imgsz as i64];
        let input_tensor = Value::from_array((input_shape, input.into_raw_vec_and_offset().0))?;

        let mut session = self.session.lock().map_err(|_| anyhow!("sesión ONNX envenenada"))?;
        let outputs = session.run(ort::inputs![input_tensor])?;
        let (shape_out, data_out) = outputs[0].try_extract_tensor::<f32>()?;

        let dims: Vec<usize> = shape_out.iter().map(|&x| x as usize).collect();
        if dims.len() != 3 {
            return Err(anyhow!("salida inesperada del modelo: {:?}", dims));
        }
        let array_view = ArrayViewD::from_shape(IxDyn(&dims), data_out)?;
        let view = array_view.index_axis(Axis(0), 0).into_dimensionality()?;

        let scale = Scale {
            sx: rgb.width() as f32 / imgsz as f32,
            sy: rgb.height() as f32 / imgsz as f32,
            width: rgb.width() as f32,
            height: rgb.height() as f32,
        };

        let boxes = if dims[2] == 6 {
            decode_end_to_end(view, &self.params, &scale)
        } else {
            decode_anchors(view, &self.params, &scale)
        };
        Ok(boxes)
    }
}

impl DetectorPort for OnnxYoloEngine {
    fn infer(&self, grid: &PixelGrid) -> DomainResult<Vec<RawDetections>> {
        let boxes = self.run(grid).map_err(|e| DomainError::Inference(e.to_string()))?;
        Ok(vec![RawDetections { boxes, names: self.names.clone() }])
    }

    fn render(&self, grid: &PixelGrid, result: &RawDetections) -> PixelGrid {
        overlay::draw_boxes(grid, &result.boxes)
    }
}

pub struct OnnxDetectorLoader {
    params: YoloParams,
    intra_threads: usize,
}

impl OnnxDetectorLoader {
    pub fn new(params: YoloParams, intra_threads: usize) -> Self {
        Self { params, intra_threads }
    }
}

impl DetectorLoaderPort for OnnxDetectorLoader {
    fn load(&self, path: &Path) -> DomainResult<Arc<dyn DetectorPort>> {
        let engine = OnnxYoloEngine::load(path, self.params.clone(), self.intra_threads)
            .map_err(|e| DomainError::Inference(format!("{}: {}", path.display(), e)))?;
        Ok(Arc::new(engine))
    }
}

/// Factores para llevar coordenadas de la entrada del modelo a la imagen original.
struct Scale {
    sx: f32,
    sy: f32,
    width: f32,
    height: f32,
}

impl Scale {
    fn to_source(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> [f32; 4] {
        let finite = |v: f32| if v.is_finite() { v } else { 0.0 };
        let (x1, y1, x2, y2) = (finite(x1), finite(y1), finite(x2), finite(y2));
        let x1 = (x1 * self.sx).clamp(0.0, self.width);
        let y1 = (y1 * self.sy).clamp(0.0, self.height);
        let x2 = (x2 * self.sx).clamp(x1, self.width);
        let y2 = (y2 * self.sy).clamp(y1, self.height);
        [x1, y1, x2, y2]
    }
}

/// Salida `[4 + nc, N]`: cx, cy, w, h y una puntuación por clase.
fn decode_anchors(view: ArrayView2<f32>, params: &YoloParams, scale: &Scale) -> Vec<RawBox> {
    let mut candidates = Vec::new();
    if view.shape()[0] <= 4 {
        return candidates;
    }

    for i in 0..view.shape()[1] {
        let scores = view.slice(s![4.., i]);
        let Some((class_id, &max_score)) = scores
            .indexed_iter()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            continue;
        };

        if max_score > params.conf_threshold {
            let cx = view[[0, i]];
            let cy = view[[1, i]];
            let w = view[[2, i]];
            let h = view[[3, i]];

            candidates.push(RawBox {
                xyxy: scale.to_source(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0),
                conf: max_score,
                class_id,
            });
        }
    }

    non_max_suppression(&mut candidates, params.iou_threshold);
    candidates.truncate(params.max_detections);
    candidates
}

/// Salida `[N, 6]` de modelos sin NMS: x1, y1, x2, y2, confianza, clase.
fn decode_end_to_end(view: ArrayView2<f32>, params: &YoloParams, scale: &Scale) -> Vec<RawBox> {
    let mut boxes: Vec<RawBox> = view
        .outer_iter()
        .filter(|row| row[4] > params.conf_threshold && row[5] >= 0.0)
        .map(|row| RawBox {
            xyxy: scale.to_source(row[0], row[1], row[2], row[3]),
            conf: row[4],
            class_id: row[5] as usize,
        })
        .collect();
    boxes.sort_by(|a, b| b.conf.total_cmp(&a.conf));
    boxes.truncate(params.max_detections);
    boxes
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let iw = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let ih = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = iw * ih;
    let union = (a[2] - a[0]) * (a[3] - a[1]) + (b[2] - b[0]) * (b[3] - b[1]) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

/// NMS independiente de la clase; deja las cajas ordenadas por confianza.
fn non_max_suppression(xs: &mut Vec<RawBox>, iou_threshold: f32) {
    xs.sort_by(|a, b| b.conf.total_cmp(&a.conf));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if iou(&xs[prev_index].xyxy, &xs[index].xyxy) > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

/// Interpreta el metadato `names` que exporta Ultralytics: `{0: 'person', 1: 'bicycle'}`.
pub fn parse_names(raw: &str) -> HashMap<usize, String> {
    let body = raw.trim().trim_start_matches('{').trim_end_matches('}');
    let mut names = HashMap::new();
    let mut rest = body;
    while let Some((key, tail)) = rest.split_once(':') {
        let Ok(id) = key.trim().trim_start_matches(',').trim().parse::<usize>() else {
            break;
        };
        let tail = tail.trim_start();
        let Some(quote) = tail.chars().next().filter(|c| *c == '\'' || *c == '"') else {
            break;
        };
        let Some(end) = tail[1..].find(quote) else {
            break;
        };
        names.insert(id, tail[1..1 + end].to_string());
        rest = &tail[end + 2..];
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn params() -> YoloParams {
        YoloParams { input_size: 100, conf_threshold: 0.25, iou_threshold: 0.45, max_detections: 10 }
    }

    fn scale2x() -> Scale {
        Scale { sx: 2.0, sy: 2.0, width: 200.0, height: 200.0 }
    }

    #[test]
    fn parses_ultralytics_names() {
        let names = parse_names("{0: 'plastic', 1: 'metal can', 2: \"paper\"}");
        assert_eq!(names.len(), 3);
        assert_eq!(names[&0], "plastic");
        assert_eq!(names[&1], "metal can");
        assert_eq!(names[&2], "paper");
        assert!(parse_names("").is_empty());
        assert!(parse_names("garbage").is_empty());
    }

    #[test]
    fn anchor_layout_filters_rescales_and_suppresses() {
        // 2 clases, 3 candidatos: dos solapados de clase 1 y uno débil
        let mut out = Array2::<f32>::zeros((6, 3));
        let cols = [
            [50.0, 50.0, 20.0, 20.0, 0.1, 0.9],
            [51.0, 50.0, 20.0, 20.0, 0.1, 0.8],
            [10.0, 10.0, 4.0, 4.0, 0.2, 0.1],
        ];
        for (i, c) in cols.iter().enumerate() {
            for (r, v) in c.iter().enumerate() {
                out[[r, i]] = *v;
            }
        }

        let boxes = decode_anchors(out.view(), &params(), &scale2x());
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].class_id, 1);
        assert_eq!(boxes[0].conf, 0.9);
        assert_eq!(boxes[0].xyxy, [80.0, 80.0, 120.0, 120.0]);
    }

    #[test]
    fn end_to_end_layout_keeps_order_and_clamps() {
        let out = Array2::from_shape_vec(
            (3, 6),
            vec![
                10.0, 10.0, 20.0, 20.0, 0.5, 2.0, //
                90.0, 90.0, 150.0, 150.0, 0.7, 0.0, //
                0.0, 0.0, 5.0, 5.0, 0.1, 1.0,
            ],
        )
        .unwrap();

        let boxes = decode_end_to_end(out.view(), &params(), &scale2x());
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].class_id, 0);
        assert_eq!(boxes[0].xyxy, [180.0, 180.0, 200.0, 200.0]);
        assert_eq!(boxes[1].xyxy, [20.0, 20.0, 40.0, 40.0]);
    }

    #[test]
    fn boxes_are_well_formed_after_scaling() {
        let s = scale2x();
        let b = s.to_source(-10.0, 30.0, -5.0, 20.0);
        assert!(b[0] <= b[2] && b[1] <= b[3]);
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
    }
}
