//! Validate command - check a scene description and the options file.

use std::path::PathBuf;

use tilescene::config::{JsonFileLoader, SceneConfigLoader, SceneOptions};
use tilescene::render::{HeadlessBackend, StyleRegistry};

use crate::error::CliError;

/// Arguments for the validate command.
pub struct ValidateArgs {
    pub scene: PathBuf,
}

/// Run the validate command.
pub fn run(args: ValidateArgs, options: &SceneOptions) -> Result<(), CliError> {
    options.validate()?;

    let loader = JsonFileLoader::new(&args.scene);
    let mut config = loader.load()?;
    config.preprocess();

    let mut backend = HeadlessBackend::new();
    let styles = StyleRegistry::compile(&config, &mut backend);
    let rules = config.rules();

    println!("Scene: {}", loader.describe());
    println!();
    println!("Styles ({}):", styles.len());
    for (name, compiled) in styles.iter() {
        let mut flags = Vec::new();
        if styles.active_styles().contains(name) {
            flags.push("active");
        }
        if compiled.animated {
            flags.push("animated");
        }
        if compiled.selection.is_some() {
            flags.push("selectable");
        }
        println!("  {:<24} {}", name, flags.join(", "));
    }

    println!();
    println!("Layer rules ({}):", rules.len());
    for (path, rule) in &rules {
        match rule.style.as_ref() {
            Some(style) => println!(
                "  {:<32} style={} order={} visible={}",
                path,
                style.style_name(),
                style.order.unwrap_or(0),
                style.is_visible()
            ),
            None => println!("  {}", path),
        }
    }

    let missing: Vec<&String> = styles
        .active_styles()
        .iter()
        .filter(|name| styles.get(name).is_none())
        .collect();

    println!();
    println!("Workers:        {}", options.num_workers);
    println!("Tile scale:     {}", options.tile_scale.get());
    println!("Zoom hysteresis {}", options.preserve_tiles_within_zoom);
    println!(
        "Pick buffer:    {}x{} (read back after {} ticks)",
        options.selection_buffer_width,
        options.selection_buffer_height,
        options.selection_frame_delay
    );

    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
        return Err(CliError::Config(format!(
            "Rules reference undefined styles: {}",
            names.join(", ")
        )));
    }

    println!();
    println!("Scene is valid.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn scene_file(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_scene() {
        let file = scene_file(
            r#"{"styles": {"polygons": {}}, "layers": {"water": {"style": {"order": 1}}}}"#,
        );
        let args = ValidateArgs {
            scene: file.path().to_path_buf(),
        };
        assert!(run(args, &SceneOptions::default()).is_ok());
    }

    #[test]
    fn test_undefined_style_is_reported() {
        let file = scene_file(r#"{"layers": {"roads": {"style": {"name": "lines"}}}}"#);
        let args = ValidateArgs {
            scene: file.path().to_path_buf(),
        };
        assert!(matches!(
            run(args, &SceneOptions::default()),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_unparseable_scene() {
        let file = scene_file("not json");
        let args = ValidateArgs {
            scene: file.path().to_path_buf(),
        };
        assert!(run(args, &SceneOptions::default()).is_err());
    }
}
