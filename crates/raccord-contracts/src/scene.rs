use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub character_ids: Vec<String>,
    #[serde(default, alias = "propIds")]
    pub product_ids: Vec<String>,
    #[serde(default)]
    pub context_description: String,
    #[serde(default)]
    pub camera_angle: Option<String>,
}

/// A location the editor groups scenes under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneGroup {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
}

/// Global character rendering style chosen for the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CharacterStyle {
    #[default]
    Standard,
    Mannequin,
}

impl CharacterStyle {
    pub fn requires_mannequin(self) -> bool {
        matches!(self, Self::Mannequin)
    }
}

/// Read-only snapshot of the editor state for the duration of one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub scene_groups: Vec<SceneGroup>,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub character_style: CharacterStyle,
}

impl ProjectSnapshot {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading project {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("project {} is not a valid snapshot", path.display()))
    }

    pub fn scene_index(&self, scene_id: &str) -> Option<usize> {
        self.scenes.iter().position(|scene| scene.id == scene_id)
    }

    pub fn scene(&self, scene_id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|scene| scene.id == scene_id)
    }

    /// Returns `(previous, current)` when the scene exists and is not first.
    pub fn adjacent_pair(&self, scene_id: &str) -> Option<(&Scene, &Scene)> {
        let index = self.scene_index(scene_id)?;
        if index == 0 {
            return None;
        }
        Some((&self.scenes[index - 1], &self.scenes[index]))
    }

    pub fn group_name(&self, group_id: Option<&str>) -> Option<&str> {
        let group_id = group_id?;
        self.scene_groups
            .iter()
            .find(|group| group.id == group_id)
            .map(|group| group.name.as_str())
    }

    /// Unknown ids fall back to the id itself so messages stay readable.
    pub fn character_name<'a>(&'a self, character_id: &'a str) -> &'a str {
        self.characters
            .iter()
            .find(|character| character.id == character_id)
            .map(|character| character.name.as_str())
            .unwrap_or(character_id)
    }

    pub fn product_name<'a>(&'a self, product_id: &'a str) -> &'a str {
        self.products
            .iter()
            .find(|product| product.id == product_id)
            .map(|product| product.name.as_str())
            .unwrap_or(product_id)
    }

    pub fn character_names(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .map(|id| self.character_name(id).to_string())
            .collect()
    }

    pub fn product_names(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .map(|id| self.product_name(id).to_string())
            .collect()
    }
}
