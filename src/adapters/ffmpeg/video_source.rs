//! Fuente de vídeo basada en `ffprobe` + `ffmpeg` (salida rawvideo RGB24 por stdout).

use async_trait::async_trait;
use serde::Deserialize;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::application::ports::{VideoFrames, VideoSourcePort};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::frame::PixelGrid;

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeInfo {
    pub width: u32,
    pub height: u32,
    /// 0 si el contenedor no lo declara.
    pub nb_frames: u64,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
    nb_frames: Option<String>,
    #[serde(default)]
    tags: FfprobeTags,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

impl FfprobeStream {
    /// Rotación de la matriz de visualización o, en contenedores antiguos, la etiqueta `rotate`.
    fn rotation(&self) -> i64 {
        self.side_data_list
            .iter()
            .find_map(|sd| sd.rotation)
            .map(|r| r.round() as i64)
            .or_else(|| self.tags.rotate.as_deref().and_then(|r| r.trim().parse().ok()))
            .unwrap_or(0)
    }
}

pub fn parse_probe(json: &[u8]) -> DomainResult<ProbeInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)
        .map_err(|e| DomainError::Video(format!("salida de ffprobe inválida: {}", e)))?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| DomainError::Video("sin pista de vídeo".into()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(DomainError::Video("dimensiones de vídeo desconocidas".into())),
    };
    // ffmpeg aplica la rotación al decodificar: a 90/270 grados los frames salen traspuestos
    let (width, height) = if stream.rotation().rem_euclid(180) == 90 {
        (height, width)
    } else {
        (width, height)
    };
    let nb_frames = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<u64>().ok())
        .unwrap_or(0);

    Ok(ProbeInfo { width, height, nb_frames })
}

pub struct FfmpegVideoSource {
    ffprobe: PathBuf,
    ffmpeg: PathBuf,
}

impl FfmpegVideoSource {
    pub fn new(ffprobe: impl Into<PathBuf>, ffmpeg: impl Into<PathBuf>) -> Self {
        Self { ffprobe: ffprobe.into(), ffmpeg: ffmpeg.into() }
    }
}

#[async_trait]
impl VideoSourcePort for FfmpegVideoSource {
    async fn open(&self, video: Vec<u8>) -> DomainResult<VideoFrames> {
        let input = tokio::task::spawn_blocking(move || write_temp(&video))
            .await
            .map_err(|e| DomainError::Video(e.to_string()))??;

        let info = probe(&self.ffprobe, input.path()).await?;
        debug!("Vídeo {}x{}, {} frames declarados", info.width, info.height, info.nb_frames);

        // stderr a fichero: una tubería sin leer podría bloquear a ffmpeg
        let stderr = NamedTempFile::new().map_err(|e| DomainError::Video(e.to_string()))?;
        let stderr_handle = stderr.reopen().map_err(|e| DomainError::Video(e.to_string()))?;

        let mut child = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(input.path())
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(stderr_handle))
            .spawn()
            .map_err(|e| DomainError::Video(format!("no se pudo lanzar ffmpeg: {}", e)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DomainError::Video("sin stdout de ffmpeg".into()))?;

        let frames = FfmpegFrames {
            reader: RawFrameReader::new(stdout, info.width, info.height),
            child,
            stderr,
            finished: false,
            _input: input,
        };
        Ok(VideoFrames { total_frames: info.nb_frames, frames: Box::new(frames) })
    }
}

fn write_temp(video: &[u8]) -> DomainResult<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .suffix(".mp4")
        .tempfile()
        .map_err(|e| DomainError::Video(e.to_string()))?;
    file.write_all(video).map_err(|e| DomainError::Video(e.to_string()))?;
    file.flush().map_err(|e| DomainError::Video(e.to_string()))?;
    Ok(file)
}

async fn probe(ffprobe: &Path, path: &Path) -> DomainResult<ProbeInfo> {
    let output = tokio::process::Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,nb_frames:stream_tags=rotate:stream_side_data=rotation",
            "-of",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| DomainError::Video(format!("no se pudo lanzar ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(DomainError::Video(format!(
            "ffprobe falló: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    parse_probe(&output.stdout)
}

/// Corta un flujo rawvideo RGB24 en frames completos. Un frame parcial al
/// final se descarta.
pub struct RawFrameReader<R> {
    inner: R,
    width: u32,
    height: u32,
    done: bool,
}

impl<R: Read> RawFrameReader<R> {
    pub fn new(inner: R, width: u32, height: u32) -> Self {
        Self { inner, width, height, done: false }
    }
}

impl<R: Read> Iterator for RawFrameReader<R> {
    type Item = DomainResult<PixelGrid>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut buf = vec![0u8; self.width as usize * self.height as usize * 3];
        match self.inner.read_exact(&mut buf) {
            Ok(()) => PixelGrid::from_raw(self.width, self.height, buf).map(Ok),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(DomainError::Video(e.to_string())))
            }
        }
    }
}

/// Mantiene vivos el proceso y los ficheros temporales mientras se leen frames.
/// Al agotarse la salida se comprueba el código de salida de ffmpeg: un fallo
/// a mitad de vídeo se entrega como último elemento en lugar de un final limpio.
struct FfmpegFrames {
    reader: RawFrameReader<ChildStdout>,
    child: Child,
    stderr: NamedTempFile,
    finished: bool,
    _input: NamedTempFile,
}

impl FfmpegFrames {
    fn check_exit(&mut self) -> DomainResult<()> {
        let status = self
            .child
            .wait()
            .map_err(|e| DomainError::Video(format!("no se pudo esperar a ffmpeg: {}", e)))?;
        if status.success() {
            return Ok(());
        }
        let log = std::fs::read_to_string(self.stderr.path()).unwrap_or_default();
        Err(DomainError::Video(format!("ffmpeg falló ({}): {}", status, log.trim())))
    }
}

impl Iterator for FfmpegFrames {
    type Item = DomainResult<PixelGrid>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.reader.next() {
            Some(frame) => Some(frame),
            None => {
                self.finished = true;
                self.check_exit().err().map(Err)
            }
        }
    }
}

impl Drop for FfmpegFrames {
    fn drop(&mut self) {
        // El muestreo puede terminar antes del final del vídeo
        if let Err(e) = self.child.kill() {
            if e.kind() != ErrorKind::InvalidInput {
                warn!("No se pudo detener ffmpeg: {}", e);
            }
        }
        let _ = self.child.wait();
    }
}
