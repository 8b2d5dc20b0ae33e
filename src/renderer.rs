// Compositor: turns one ImageRequest into one PNG

use image::RgbaImage;
use std::path::{Path, PathBuf};

use crate::canvas::Canvas;
use crate::config::Config;
use crate::error::Result;
use crate::request::{ImageElement, ImageRequest, TextElement};
use crate::text::{self, FontCache, TextLayout, TextStyle};
use crate::thumbnail;

/// Renders requests against an immutable configuration.
///
/// Holds no per-render state, so one renderer can serve any number of
/// independent requests (including from several threads).
#[derive(Debug, Clone)]
pub struct Renderer {
    config: Config,
}

impl Renderer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Render `request` and write `<output_dir>/<file_name>.png`.
    ///
    /// The file is only written once every element has been applied.
    #[tracing::instrument(skip(self, request), fields(file_name = %request.file_name))]
    pub fn create_image(&self, request: &ImageRequest) -> Result<PathBuf> {
        let canvas = self.compose(request)?;
        let output = self.config.output_path(&request.file_name);
        canvas.save_png(&output)?;
        tracing::info!(path = %output.display(), "wrote social image");
        Ok(output)
    }

    /// Build the composited canvas without persisting it.
    pub fn compose(&self, request: &ImageRequest) -> Result<Canvas> {
        request.validate()?;

        let template = self.config.template_path(request.template.as_deref());
        let mut canvas = Canvas::open_template(&template)?;
        tracing::debug!(
            template = %template.display(),
            width = canvas.width(),
            height = canvas.height(),
            "opened template"
        );

        // Images first so text always lands on top
        for image in &request.elements.images {
            self.apply_image(&mut canvas, image)?;
        }

        let mut fonts = FontCache::new();
        for text in &request.elements.text {
            self.apply_text(&mut canvas, text, &mut fonts)?;
        }

        Ok(canvas)
    }

    fn apply_image(&self, canvas: &mut Canvas, element: &ImageElement) -> Result<()> {
        let source = self.config.image_path(&element.image_name);
        let overlay = prepare_image(&source, element)?;
        canvas.paste(&overlay, element.position.x, element.position.y);
        tracing::debug!(
            image = %element.image_name,
            x = element.position.x,
            y = element.position.y,
            circle = element.circle,
            "pasted image"
        );
        Ok(())
    }

    fn apply_text(
        &self,
        canvas: &mut Canvas,
        element: &TextElement,
        fonts: &mut FontCache,
    ) -> Result<TextLayout> {
        let style = TextStyle::resolve(&element.font, &self.config);
        let font = fonts.get(&style.family, style.size)?;
        let layout = text::draw_text(canvas, element, &style, &font, self.config.default_wrap_width)?;
        tracing::debug!(lines = layout.lines.len(), advance = layout.advance, "drew text");
        Ok(layout)
    }
}

/// Load a source image and shape it for pasting: circular thumbnail,
/// centred fit without a mask, or the source unchanged.
fn prepare_image(path: &Path, element: &ImageElement) -> Result<RgbaImage> {
    element.validate()?;
    let source = thumbnail::load_source(path)?;
    match (element.circle, element.dimensions) {
        (true, Some(size)) => thumbnail::make_circle_thumbnail(&source, size),
        (false, Some(size)) => Ok(thumbnail::fit_centered(&source, size.width, size.height)),
        // validate() rejects a circle without dimensions
        (_, None) => Ok(source.to_rgba8()),
    }
}
