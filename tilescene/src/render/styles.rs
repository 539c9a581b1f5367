//! Compiled programs per style.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, warn};

use super::{ProgramHandle, ProgramKind, RenderBackend};
use crate::config::SceneConfig;

/// Programs compiled for one style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompiledStyle {
    pub main: Option<ProgramHandle>,
    pub selection: Option<ProgramHandle>,
    pub animated: bool,
}

impl CompiledStyle {
    pub fn program(&self, kind: ProgramKind) -> Option<ProgramHandle> {
        match kind {
            ProgramKind::Main => self.main,
            ProgramKind::Selection => self.selection,
        }
    }
}

/// Styles of the current scene config and their compiled programs.
#[derive(Debug, Clone, Default)]
pub struct StyleRegistry {
    styles: BTreeMap<String, CompiledStyle>,
    active: BTreeSet<String>,
    animated: bool,
}

impl StyleRegistry {
    /// Compiles every style in `config`.
    ///
    /// A style whose program fails to compile is kept without that program
    /// and skipped when drawing.
    pub fn compile<B>(config: &SceneConfig, backend: &mut B) -> Self
    where
        B: RenderBackend + ?Sized,
    {
        let mut styles = BTreeMap::new();

        for (name, style) in &config.styles {
            let mut compiled = CompiledStyle {
                animated: style.animated,
                ..Default::default()
            };

            match backend.compile_program(name, ProgramKind::Main, style) {
                Ok(program) => compiled.main = Some(program),
                Err(e) => warn!(style = %name, error = %e, "Style program failed to compile"),
            }

            if style.selection {
                match backend.compile_program(name, ProgramKind::Selection, style) {
                    Ok(program) => compiled.selection = Some(program),
                    Err(e) => warn!(style = %name, error = %e, "Selection program failed to compile"),
                }
            }

            styles.insert(name.clone(), compiled);
        }

        let active = config.active_styles();
        let animated = active
            .iter()
            .any(|name| styles.get(name).is_some_and(|s: &CompiledStyle| s.animated));

        info!(
            styles = styles.len(),
            active = active.len(),
            animated,
            "Compiled scene styles"
        );

        Self {
            styles,
            active,
            animated,
        }
    }

    pub fn get(&self, name: &str) -> Option<&CompiledStyle> {
        self.styles.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CompiledStyle)> {
        self.styles.iter().map(|(name, style)| (name.as_str(), style))
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Styles referenced by at least one visible rule.
    pub fn active_styles(&self) -> &BTreeSet<String> {
        &self.active
    }

    /// Whether any active style animates, requiring continuous redraw.
    pub fn is_animated(&self) -> bool {
        self.animated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessBackend;

    fn config() -> SceneConfig {
        SceneConfig::from_json_str(
            r#"{
                "styles": {
                    "polygons": {},
                    "water": { "animated": true },
                    "labels": { "selection": false }
                },
                "layers": {
                    "earth": { "style": { "name": "polygons" } },
                    "ocean": { "style": { "name": "water", "visible": false } }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_compiles_main_and_selection_programs() {
        let mut backend = HeadlessBackend::new();
        let registry = StyleRegistry::compile(&config(), &mut backend);

        assert_eq!(registry.len(), 3);
        let polygons = registry.get("polygons").unwrap();
        assert!(polygons.main.is_some());
        assert!(polygons.selection.is_some());

        let labels = registry.get("labels").unwrap();
        assert!(labels.main.is_some());
        assert!(labels.selection.is_none());
    }

    #[test]
    fn test_hidden_animated_style_does_not_animate_scene() {
        let mut backend = HeadlessBackend::new();
        let registry = StyleRegistry::compile(&config(), &mut backend);

        assert!(registry.active_styles().contains("polygons"));
        assert!(!registry.active_styles().contains("water"));
        assert!(!registry.is_animated());
    }

    #[test]
    fn test_compile_failure_skips_program() {
        let mut backend = HeadlessBackend::new();
        backend.fail_compile("polygons");
        let registry = StyleRegistry::compile(&config(), &mut backend);

        let polygons = registry.get("polygons").unwrap();
        assert!(polygons.main.is_none());
        assert!(polygons.program(ProgramKind::Selection).is_none());
    }
}
