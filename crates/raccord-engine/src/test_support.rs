use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use raccord_contracts::scene::{Character, ProjectSnapshot, Product, Scene, SceneGroup};
use serde_json::Value;

use crate::images::ImagePayload;
use crate::providers::{VisionPart, VisionProvider, VisionPurpose, VisionRequest};

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Text(String),
    Fail(String),
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub model: String,
    pub purpose: VisionPurpose,
    pub api_key: String,
    pub parts: Vec<VisionPart>,
}

/// Shared view of the calls a scripted provider received.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallLog {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl CallLog {
    pub fn count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    pub fn models(&self) -> Vec<String> {
        self.snapshot().into_iter().map(|call| call.model).collect()
    }

    pub fn snapshot(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn last_instruction(&self) -> Option<String> {
        self.snapshot().pop().and_then(|call| {
            call.parts.into_iter().rev().find_map(|part| match part {
                VisionPart::Text(text) => Some(text),
                VisionPart::Image(_) => None,
            })
        })
    }
}

pub(crate) struct ScriptedProvider {
    name: String,
    reply: Reply,
    log: CallLog,
}

impl ScriptedProvider {
    pub fn new(name: &str, reply: Reply) -> Self {
        Self {
            name: name.to_string(),
            reply,
            log: CallLog::default(),
        }
    }

    pub fn calls(&self) -> CallLog {
        self.log.clone()
    }
}

impl VisionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete(&self, request: &VisionRequest) -> Result<String> {
        if let Ok(mut calls) = self.log.calls.lock() {
            calls.push(RecordedCall {
                model: request.model.clone(),
                purpose: request.purpose,
                api_key: request.api_key.clone(),
                parts: request.parts.clone(),
            });
        }
        match &self.reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Fail(message) => bail!("{message}"),
        }
    }
}

pub(crate) fn frame(seed: u8) -> ImagePayload {
    ImagePayload::new(vec![0x89, b'P', b'N', b'G', seed], "image/png")
}

/// Two scenes in one hall: Minh leaves and the sword disappears.
pub(crate) fn sample_project() -> ProjectSnapshot {
    let ids = |values: &[&str]| -> Vec<String> { values.iter().map(|value| value.to_string()).collect() };
    ProjectSnapshot {
        scenes: vec![
            Scene {
                id: "s1".to_string(),
                group_id: Some("g-hall".to_string()),
                character_ids: ids(&["c-lan", "c-minh"]),
                product_ids: ids(&["p-sword"]),
                context_description: "Lan sits by the fire holding the sword".to_string(),
                camera_angle: Some("wide".to_string()),
            },
            Scene {
                id: "s2".to_string(),
                group_id: Some("g-hall".to_string()),
                character_ids: ids(&["c-lan"]),
                product_ids: Vec::new(),
                context_description: "Lan sits alone, staring at the fire".to_string(),
                camera_angle: Some("medium".to_string()),
            },
        ],
        scene_groups: vec![SceneGroup {
            id: "g-hall".to_string(),
            name: "Great hall".to_string(),
        }],
        characters: vec![
            Character {
                id: "c-lan".to_string(),
                name: "Lan".to_string(),
            },
            Character {
                id: "c-minh".to_string(),
                name: "Minh".to_string(),
            },
        ],
        products: vec![Product {
            id: "p-sword".to_string(),
            name: "Sword".to_string(),
        }],
        ..ProjectSnapshot::default()
    }
}

pub(crate) fn event_types(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)?;
    let mut kinds = Vec::new();
    for line in raw.lines().filter(|line| !line.trim().is_empty()) {
        let row: Value = serde_json::from_str(line)?;
        kinds.push(row["type"].as_str().unwrap_or_default().to_string());
    }
    Ok(kinds)
}
