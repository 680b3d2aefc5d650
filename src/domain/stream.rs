use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use super::detection::Detection;
use super::model::DEFAULT_VARIANT;

/// Mensajes que el cliente envía por el WebSocket de streaming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamMessage {
    Config {
        #[serde(default)]
        model: Option<String>,
    },
    Frame {
        #[serde(default)]
        data: Option<String>,
    },
}

impl StreamMessage {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Estado mutable de una sesión de streaming.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub active_variant: String,
    pub frame_count: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            active_variant: DEFAULT_VARIANT.to_string(),
            frame_count: 0,
        }
    }
}

pub fn summarize_detections(detections: &[Detection]) -> String {
    let mut counts = BTreeMap::new();
    for det in detections {
        *counts.entry(&det.label).or_insert(0) += 1;
    }
    counts.iter()
        .map(|(label, count)| format!("{} {}", count, label))
        .collect::<Vec<_>>()
        .join(", ")
}
