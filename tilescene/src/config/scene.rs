//! Scene description model and loaders.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ConfigError;
use crate::source::TileSource;

/// Style used by rules that do not name one.
pub const DEFAULT_STYLE_NAME: &str = "polygons";

/// The scene description.
///
/// Only the parts the lifecycle core needs are typed; everything else is kept
/// as raw JSON and passed through to workers and the render backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Optional tile source; callers may also supply one directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<TileSource>,

    #[serde(default)]
    pub camera: Value,

    #[serde(default)]
    pub lighting: Value,

    #[serde(default)]
    pub styles: BTreeMap<String, StyleConfig>,

    #[serde(default)]
    pub layers: BTreeMap<String, LayerRule>,
}

/// A rendering style definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleConfig {
    /// Base style this one extends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,

    /// Animated styles force a redraw every frame while active.
    #[serde(default)]
    pub animated: bool,

    /// Whether the style takes part in the feature selection pass.
    #[serde(default = "default_true")]
    pub selection: bool,

    #[serde(default)]
    pub shaders: Value,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A layer rule; rules nest through `layers`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<RuleStyle>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub layers: BTreeMap<String, LayerRule>,
}

/// Style parameters attached to a rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RuleStyle {
    /// Style name, falling back to [`DEFAULT_STYLE_NAME`].
    pub fn style_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_STYLE_NAME)
    }

    pub fn is_visible(&self) -> bool {
        self.visible != Some(false)
    }
}

fn default_true() -> bool {
    true
}

impl SceneConfig {
    /// Parses a scene description from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serializes the config for shipping to workers.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Normalizes settings that may not have been given explicitly.
    ///
    /// Rule styles become visible unless explicitly hidden, and camera and
    /// lighting are guaranteed to be JSON objects.
    pub fn preprocess(&mut self) {
        fn visit(rules: &mut BTreeMap<String, LayerRule>) {
            for rule in rules.values_mut() {
                if let Some(style) = rule.style.as_mut() {
                    if style.visible != Some(false) {
                        style.visible = Some(true);
                    }
                }
                visit(&mut rule.layers);
            }
        }
        visit(&mut self.layers);

        if !self.camera.is_object() {
            self.camera = Value::Object(Map::new());
        }
        if !self.lighting.is_object() {
            self.lighting = Value::Object(Map::new());
        }
    }

    /// All rules, depth first, with their dotted path.
    pub fn rules(&self) -> Vec<(String, &LayerRule)> {
        fn visit<'a>(
            prefix: &str,
            rules: &'a BTreeMap<String, LayerRule>,
            out: &mut Vec<(String, &'a LayerRule)>,
        ) {
            for (name, rule) in rules {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", prefix, name)
                };
                out.push((path.clone(), rule));
                visit(&path, &rule.layers, out);
            }
        }

        let mut out = Vec::new();
        visit("", &self.layers, &mut out);
        out
    }

    /// Names of styles referenced by at least one visible rule.
    ///
    /// This does not check whether any geometry matches the rule, only that
    /// the style is potentially renderable.
    pub fn active_styles(&self) -> BTreeSet<String> {
        self.rules()
            .into_iter()
            .filter_map(|(_, rule)| rule.style.as_ref())
            .filter(|style| style.is_visible())
            .map(|style| style.style_name().to_string())
            .collect()
    }
}

/// Source of the scene description.
///
/// The scene calls the loader once at startup and again on every reload.
pub trait SceneConfigLoader: Send + Sync {
    /// Loads a fresh copy of the scene description.
    fn load(&self) -> Result<SceneConfig, ConfigError>;

    /// Human-readable description of where the config comes from.
    fn describe(&self) -> String;
}

/// Loads a scene description from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileLoader {
    path: PathBuf,
}

impl JsonFileLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SceneConfigLoader for JsonFileLoader {
    fn load(&self) -> Result<SceneConfig, ConfigError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        SceneConfig::from_json_str(&text)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A scene description supplied directly by the caller.
#[derive(Debug, Clone)]
pub struct InlineConfig(pub SceneConfig);

impl SceneConfigLoader for InlineConfig {
    fn load(&self) -> Result<SceneConfig, ConfigError> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        "inline".to_string()
    }
}
