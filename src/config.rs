//! Configuración del proceso a partir de variables de entorno.

use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::model::YoloParams;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Directorio donde se buscan los `.onnx` de cada variante
    pub model_dir: PathBuf,
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub intra_threads: usize,
    pub yolo: YoloParams,
    pub ffprobe_bin: PathBuf,
    pub ffmpeg_bin: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_dir: PathBuf::from("models"),
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            max_upload_bytes: 200 * 1024 * 1024,
            intra_threads: 4,
            yolo: YoloParams::default(),
            ffprobe_bin: PathBuf::from("ffprobe"),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Valores ausentes o inválidos caen a los de `Default`.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();

        Self {
            host: get("HOST").unwrap_or(d.host),
            port: parse(&get, "PORT").unwrap_or(d.port),
            model_dir: get("MODEL_DIR").map(PathBuf::from).unwrap_or(d.model_dir),
            allowed_origins: get("ALLOWED_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect::<Vec<_>>()
                })
                .filter(|origins| !origins.is_empty())
                .unwrap_or(d.allowed_origins),
            max_upload_bytes: parse(&get, "MAX_UPLOAD_BYTES").unwrap_or(d.max_upload_bytes),
            intra_threads: parse(&get, "ORT_INTRA_THREADS").unwrap_or(d.intra_threads),
            yolo: YoloParams {
                input_size: parse(&get, "INPUT_SIZE").unwrap_or(d.yolo.input_size),
                conf_threshold: parse(&get, "CONF_THRESHOLD").unwrap_or(d.yolo.conf_threshold),
                iou_threshold: parse(&get, "IOU_THRESHOLD").unwrap_or(d.yolo.iou_threshold),
                max_detections: parse(&get, "MAX_DETECTIONS").unwrap_or(d.yolo.max_detections),
            },
            ffprobe_bin: get("FFPROBE_BIN").map(PathBuf::from).unwrap_or(d.ffprobe_bin),
            ffmpeg_bin: get("FFMPEG_BIN").map(PathBuf::from).unwrap_or(d.ffmpeg_bin),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    get(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> AppConfig {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = from(&[]);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8000");
        assert_eq!(cfg.model_dir, PathBuf::from("models"));
        assert_eq!(cfg.allowed_origins.len(), 2);
        assert_eq!(cfg.yolo.input_size, 640);
        assert_eq!(cfg.ffmpeg_bin, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn reads_overrides_and_ignores_garbage() {
        let cfg = from(&[
            ("PORT", "9100"),
            ("MODEL_DIR", "/srv/models"),
            ("ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
            ("CONF_THRESHOLD", "0.4"),
            ("MAX_DETECTIONS", "many"),
        ]);
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.model_dir, PathBuf::from("/srv/models"));
        assert_eq!(cfg.allowed_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(cfg.yolo.conf_threshold, 0.4);
        assert_eq!(cfg.yolo.max_detections, 300);
    }

    #[test]
    fn numeric_fields_parse_to_their_own_types() {
        let cfg = from(&[
            ("PORT", "8080"),
            ("MAX_UPLOAD_BYTES", "1048576"),
            ("ORT_INTRA_THREADS", "2"),
            ("INPUT_SIZE", "320"),
            ("CONF_THRESHOLD", "0.5"),
            ("IOU_THRESHOLD", "0.6"),
            ("MAX_DETECTIONS", "50"),
        ]);
        assert_eq!(cfg.port, 8080u16);
        assert_eq!(cfg.max_upload_bytes, 1_048_576usize);
        assert_eq!(cfg.intra_threads, 2usize);
        assert_eq!(cfg.yolo.input_size, 320u32);
        assert_eq!(cfg.yolo.conf_threshold, 0.5f32);
        assert_eq!(cfg.yolo.iou_threshold, 0.6f32);
        assert_eq!(cfg.yolo.max_detections, 50usize);
    }

    #[test]
    fn out_of_range_port_falls_back() {
        assert_eq!(from(&[("PORT", "70000")]).port, 8000);
    }

    #[test]
    fn empty_origin_list_keeps_defaults() {
        assert_eq!(from(&[("ALLOWED_ORIGINS", " , ")]).allowed_origins.len(), 2);
    }
}
