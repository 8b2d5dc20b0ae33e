// Text layout: style resolution, wrapping, centring and vertical flow

use rusttype::{point, Font, PositionedGlyph, Scale};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::canvas::Canvas;
use crate::config::Config;
use crate::error::{Result, SocialImageError};
use crate::request::{FontSpec, HorizontalAnchor, Position, Rgb, TextElement};

/// Pixel extent of a laid-out string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextExtent {
    pub width: u32,
    pub height: u32,
}

/// Anything that can measure a single line of text.
pub trait TextMetrics {
    fn measure(&self, text: &str) -> TextExtent;
}

/// Font, size and colour after falling back to configured defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub family: PathBuf,
    pub size: u32,
    pub colour: Rgb,
}

impl TextStyle {
    pub fn resolve(font: &FontSpec, config: &Config) -> Self {
        let family = font
            .family
            .as_deref()
            .unwrap_or(config.default_font_family.as_str());
        Self {
            family: config.asset_path(family),
            size: font.size.unwrap_or(config.default_font_size),
            colour: font.colour.unwrap_or(config.default_text_colour),
        }
    }
}

/// A TrueType/OpenType face at a fixed pixel size.
#[derive(Clone)]
pub struct GlyphFont {
    font: Arc<Font<'static>>,
    scale: Scale,
}

impl GlyphFont {
    pub fn new(font: Arc<Font<'static>>, size: u32) -> Self {
        Self {
            font,
            scale: Scale::uniform(size as f32),
        }
    }

    pub fn load(path: &Path, size: u32) -> Result<Self> {
        Ok(Self::new(Arc::new(read_font(path)?), size))
    }

    /// Glyphs for `text` with the top of the ascent at `y`.
    pub fn positioned_glyphs(&self, text: &str, x: f32, y: f32) -> Vec<PositionedGlyph<'static>> {
        let ascent = self.font.v_metrics(self.scale).ascent;
        self.font
            .layout(text, self.scale, point(x, y + ascent))
            .collect()
    }
}

impl TextMetrics for GlyphFont {
    /// Width is the caret advance (or the right edge of ink, if further);
    /// height is the bottom of the ink measured from the top of the ascent.
    fn measure(&self, text: &str) -> TextExtent {
        let glyphs = self.positioned_glyphs(text, 0.0, 0.0);
        let mut width = glyphs
            .last()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0);
        let mut height = 0i32;
        for glyph in &glyphs {
            if let Some(bb) = glyph.pixel_bounding_box() {
                width = width.max(bb.max.x as f32);
                height = height.max(bb.max.y);
            }
        }
        TextExtent {
            width: width.ceil().max(0.0) as u32,
            height: height.max(0) as u32,
        }
    }
}

fn read_font(path: &Path) -> Result<Font<'static>> {
    let bytes = std::fs::read(path).map_err(|e| SocialImageError::font_load(path, e.to_string()))?;
    Font::try_from_vec(bytes)
        .ok_or_else(|| SocialImageError::font_load(path, "not a TrueType/OpenType font"))
}

/// Parsed faces keyed by path; scaled per request.
#[derive(Default)]
pub struct FontCache {
    faces: HashMap<PathBuf, Arc<Font<'static>>>,
}

impl FontCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, path: &Path, size: u32) -> Result<GlyphFont> {
        if let Some(face) = self.faces.get(path) {
            return Ok(GlyphFont::new(Arc::clone(face), size));
        }
        let face = Arc::new(read_font(path)?);
        tracing::debug!(path = %path.display(), "loaded font");
        self.faces.insert(path.to_path_buf(), Arc::clone(&face));
        Ok(GlyphFont::new(face, size))
    }
}

/// Greedy word wrap to at most `width` characters per line.
///
/// Words are never split: a word longer than `width` sits alone on its
/// own line. Whitespace-only input yields no lines.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= width {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Left edge that centres a string of width `text_width` in `[x1, x2]`.
///
/// Computed in `f64`; results outside `i32` saturate and are clipped later.
pub fn centered_x(x1: i32, x2: i32, text_width: u32) -> i32 {
    let offset = (f64::from(x2) - f64::from(x1) - f64::from(text_width)) / 2.0;
    (f64::from(x1) + offset).round() as i32
}

fn line_x(anchor: HorizontalAnchor, text_width: u32) -> i32 {
    match anchor {
        HorizontalAnchor::Left(x) => x,
        HorizontalAnchor::Band([x1, x2]) => centered_x(x1, x2, text_width),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedLine {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub extent: TextExtent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextLayout {
    pub lines: Vec<PlacedLine>,
    /// Total vertical advance: the sum of each line's measured height.
    pub advance: u32,
}

/// Place `text` at `position`.
///
/// Single-line text is one line even when empty. Multiline text is wrapped
/// and each line is positioned independently, top to bottom, advancing by
/// that line's own measured height.
pub fn layout_text<M: TextMetrics + ?Sized>(
    text: &str,
    position: Position,
    multiline: Option<usize>,
    metrics: &M,
) -> TextLayout {
    // Explicit line breaks always start a new line
    let source_lines: Vec<String> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .flat_map(|line| match multiline {
            Some(wrap_width) => wrap(line, wrap_width),
            None => vec![line.to_string()],
        })
        .collect();

    let mut lines = Vec::with_capacity(source_lines.len());
    let mut cursor = position.y;
    let mut advance = 0u32;
    for line in source_lines {
        let extent = metrics.measure(&line);
        lines.push(PlacedLine {
            x: line_x(position.x, extent.width),
            y: cursor,
            extent,
            text: line,
        });
        cursor = cursor.saturating_add(i32::try_from(extent.height).unwrap_or(i32::MAX));
        advance = advance.saturating_add(extent.height);
    }

    TextLayout { lines, advance }
}

/// Lay out `element` with `style` and draw it onto `canvas`.
pub fn draw_text(
    canvas: &mut Canvas,
    element: &TextElement,
    style: &TextStyle,
    font: &GlyphFont,
    default_wrap_width: usize,
) -> Result<TextLayout> {
    element.validate()?;
    let multiline = element
        .multiline
        .then(|| element.wrap_width.unwrap_or(default_wrap_width));
    let layout = layout_text(element.text(), element.position, multiline, font);
    for line in &layout.lines {
        canvas.draw_glyphs(font, &line.text, line.x, line.y, style.colour);
    }
    Ok(layout)
}
