// Typed render requests: one ImageRequest per output PNG

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, SocialImageError};
use crate::parser::parse_colour;

/// Drawn in place of a text element that carries no value.
pub const TEXT_PLACEHOLDER: &str = "Text not set";

/// A top-level render job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageRequest {
    /// Output base name, written as `<output_dir>/<file_name>.png`.
    pub file_name: String,
    /// Background image; the configured template is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default)]
    pub elements: Elements,
}

/// Elements grouped by kind. Images are always painted before text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Elements {
    #[serde(default)]
    pub images: Vec<ImageElement>,
    #[serde(default)]
    pub text: Vec<TextElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextElement {
    #[serde(default)]
    pub value: Option<String>,
    pub position: Position,
    #[serde(default)]
    pub font: FontSpec,
    #[serde(default)]
    pub centered: bool,
    #[serde(default)]
    pub multiline: bool,
    /// Characters per wrapped line; falls back to the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_width: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FontSpec {
    /// Font file, relative to the assets root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    /// Pixel size; a numeric string is accepted so templated layouts can fill it.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_font_size"
    )]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<Rgb>,
}

/// Text anchor: `x` is either a left edge or a `[x1, x2]` centring band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Position {
    pub x: HorizontalAnchor,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HorizontalAnchor {
    Left(i32),
    Band([i32; 2]),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageElement {
    pub position: Point,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Size>,
    /// Source image, relative to the configured images directory.
    pub image_name: String,
    #[serde(default = "default_circle")]
    pub circle: bool,
}

fn default_circle() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    #[serde(alias = "x")]
    pub width: u32,
    #[serde(alias = "y")]
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Channels { r: u8, g: u8, b: u8 },
            Triple([u8; 3]),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Channels { r, g, b } => Ok(Rgb::new(r, g, b)),
            Repr::Triple([r, g, b]) => Ok(Rgb::new(r, g, b)),
            Repr::Text(s) => {
                parse_colour(&s).ok_or_else(|| D::Error::custom(format!("invalid colour '{s}'")))
            }
        }
    }
}

fn deserialize_font_size<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u32),
        Text(String),
    }

    match Option::<Repr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Repr::Number(size)) => Ok(Some(size)),
        Some(Repr::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid font size '{s}'"))),
    }
}

impl ImageRequest {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            template: None,
            elements: Elements::default(),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_image(mut self, image: ImageElement) -> Self {
        self.elements.images.push(image);
        self
    }

    pub fn with_text(mut self, text: TextElement) -> Self {
        self.elements.text.push(text);
        self
    }

    /// Parse and validate a request document.
    pub fn from_json(json: &str) -> Result<Self> {
        let request: ImageRequest = serde_json::from_str(json)
            .map_err(|e| SocialImageError::invalid(format!("malformed request: {e}")))?;
        request.validate()?;
        Ok(request)
    }

    /// Check every element once, before anything is drawn.
    pub fn validate(&self) -> Result<()> {
        if self.file_name.trim().is_empty() {
            return Err(SocialImageError::invalid("file_name must not be empty"));
        }
        if self.file_name.contains(['/', '\\']) {
            return Err(SocialImageError::invalid(format!(
                "file_name '{}' must not contain a path separator",
                self.file_name
            )));
        }
        if matches!(&self.template, Some(t) if t.trim().is_empty()) {
            return Err(SocialImageError::invalid("template must not be empty when set"));
        }
        for (idx, image) in self.elements.images.iter().enumerate() {
            image
                .validate()
                .map_err(|e| prefix_index(e, "images", idx))?;
        }
        for (idx, text) in self.elements.text.iter().enumerate() {
            text.validate().map_err(|e| prefix_index(e, "text", idx))?;
        }
        Ok(())
    }
}

fn prefix_index(err: SocialImageError, kind: &str, idx: usize) -> SocialImageError {
    match err {
        SocialImageError::InvalidElementSpec(msg) => {
            SocialImageError::invalid(format!("{kind}[{idx}]: {msg}"))
        }
        other => other,
    }
}

impl TextElement {
    pub fn new(value: impl Into<String>, x: i32, y: i32) -> Self {
        Self {
            value: Some(value.into()),
            position: Position {
                x: HorizontalAnchor::Left(x),
                y,
            },
            font: FontSpec::default(),
            centered: false,
            multiline: false,
            wrap_width: None,
        }
    }

    /// Text centred within the band `[x1, x2]`.
    pub fn centered_in(value: impl Into<String>, x1: i32, x2: i32, y: i32) -> Self {
        Self {
            position: Position {
                x: HorizontalAnchor::Band([x1, x2]),
                y,
            },
            centered: true,
            ..Self::new(value, x1, y)
        }
    }

    pub fn with_font(mut self, family: impl Into<String>, size: u32, colour: Rgb) -> Self {
        self.font = FontSpec {
            family: Some(family.into()),
            size: Some(size),
            colour: Some(colour),
        };
        self
    }

    pub fn wrapped(mut self, wrap_width: usize) -> Self {
        self.multiline = true;
        self.wrap_width = Some(wrap_width);
        self
    }

    /// The string to draw, or the placeholder when no value was given.
    pub fn text(&self) -> &str {
        self.value.as_deref().unwrap_or(TEXT_PLACEHOLDER)
    }

    pub fn validate(&self) -> Result<()> {
        match (self.centered, self.position.x) {
            (true, HorizontalAnchor::Left(_)) => {
                return Err(SocialImageError::invalid(
                    "centered text needs a two-value band [x1, x2]",
                ))
            }
            (false, HorizontalAnchor::Band(_)) => {
                return Err(SocialImageError::invalid(
                    "a [x1, x2] band is only valid for centered text",
                ))
            }
            (true, HorizontalAnchor::Band([x1, x2])) if x1 > x2 => {
                return Err(SocialImageError::invalid(format!(
                    "band [{x1}, {x2}] is reversed"
                )))
            }
            _ => {}
        }
        if self.font.size == Some(0) {
            return Err(SocialImageError::invalid("font size must be positive"));
        }
        if matches!(&self.font.family, Some(f) if f.trim().is_empty()) {
            return Err(SocialImageError::invalid("font family must not be empty"));
        }
        if self.wrap_width == Some(0) {
            return Err(SocialImageError::invalid("wrap_width must be positive"));
        }
        Ok(())
    }
}

impl ImageElement {
    /// A source cropped to a circle of the given size.
    pub fn circle(image_name: impl Into<String>, x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            position: Point { x, y },
            dimensions: Some(Size { width, height }),
            image_name: image_name.into(),
            circle: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.image_name.trim().is_empty() {
            return Err(SocialImageError::invalid("image_name must not be empty"));
        }
        match self.dimensions {
            Some(Size { width, height }) if width == 0 || height == 0 => Err(
                SocialImageError::invalid(format!("dimensions {width}x{height} must be non-zero")),
            ),
            None if self.circle => Err(SocialImageError::invalid(format!(
                "circular image '{}' needs dimensions",
                self.image_name
            ))),
            _ => Ok(()),
        }
    }
}
