use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::request::Rgb;

/// Immutable renderer settings. Every field is optional in the JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_assets_path")]
    pub assets_path: PathBuf,
    /// Image sources live here, relative to `assets_path`.
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,
    /// Background used when a request names none, relative to `assets_path`.
    #[serde(default = "default_template")]
    pub template: PathBuf,
    #[serde(default = "default_font_family")]
    pub default_font_family: String,
    #[serde(default = "default_font_size")]
    pub default_font_size: u32,
    #[serde(default = "default_text_colour")]
    pub default_text_colour: Rgb,
    #[serde(default = "default_wrap_width")]
    pub default_wrap_width: usize,
    /// Substituted by the batch driver when a speaker photo is unavailable.
    #[serde(default = "default_placeholder_image")]
    pub placeholder_image: String,
    /// Tracks the batch driver never renders.
    #[serde(default = "default_skip_tracks")]
    pub skip_tracks: Vec<String>,
}

fn default_output_dir() -> PathBuf { PathBuf::from("output") }
fn default_assets_path() -> PathBuf { PathBuf::from("assets") }
fn default_images_dir() -> PathBuf { PathBuf::from("images") }
fn default_template() -> PathBuf { PathBuf::from("templates/placeholder.jpg") }
fn default_font_family() -> String { "fonts/Lato-Regular.ttf".to_string() }
fn default_font_size() -> u32 { 16 }
fn default_text_colour() -> Rgb { Rgb::new(255, 255, 255) }
fn default_wrap_width() -> usize { 28 }
fn default_placeholder_image() -> String { "placeholder.jpg".to_string() }
fn default_skip_tracks() -> Vec<String> {
    vec!["Food & Beverage".to_string(), "Informational".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            assets_path: default_assets_path(),
            images_dir: default_images_dir(),
            template: default_template(),
            default_font_family: default_font_family(),
            default_font_size: default_font_size(),
            default_text_colour: default_text_colour(),
            default_wrap_width: default_wrap_width(),
            placeholder_image: default_placeholder_image(),
            skip_tracks: default_skip_tracks(),
        }
    }
}

impl Config {
    /// Resolve a caller-supplied path under the assets root.
    /// Absolute paths are returned unchanged.
    pub fn asset_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.assets_path.join(relative)
    }

    pub fn image_path(&self, image_name: &str) -> PathBuf {
        self.assets_path.join(&self.images_dir).join(image_name)
    }

    pub fn template_path(&self, requested: Option<&str>) -> PathBuf {
        match requested {
            Some(template) => self.asset_path(template),
            None => self.asset_path(&self.template),
        }
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(format!("{file_name}.png"))
    }
}

/// Load settings from a JSON file, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    let config: Config = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;

    if config.default_font_size == 0 {
        anyhow::bail!("default_font_size must be positive");
    }
    if config.default_wrap_width == 0 {
        anyhow::bail!("default_wrap_width must be positive");
    }

    Ok(config)
}
