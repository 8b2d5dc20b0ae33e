use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageEncoder, Rgba, RgbaImage};
use std::path::Path;

use crate::error::{Result, SocialImageError};
use crate::request::Rgb;
use crate::text::GlyphFont;

/// The in-progress composited image. Owned by exactly one render.
pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    /// A fully transparent canvas
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Open a background template as an RGBA canvas
    pub fn open_template(path: &Path) -> Result<Self> {
        let template = image::open(path).map_err(|source| SocialImageError::TemplateNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_image(template.to_rgba8()))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Composite `overlay` with its top-left corner at (x, y), using the
    /// overlay's own alpha as the paste mask. Out-of-bounds pixels are clipped.
    pub fn paste(&mut self, overlay: &RgbaImage, x: i32, y: i32) {
        let (width, height) = self.image.dimensions();
        for (ox, oy, src) in overlay.enumerate_pixels() {
            let (cx, cy) = (i64::from(x) + i64::from(ox), i64::from(y) + i64::from(oy));
            let Some((px, py)) = clip(width, height, cx, cy) else {
                continue;
            };
            let dst = self.image.get_pixel_mut(px, py);
            blend_over(dst, [src.0[0], src.0[1], src.0[2]], src.0[3]);
        }
    }

    /// Rasterize `text` with the top of its ascent at (x, y).
    pub fn draw_glyphs(&mut self, font: &GlyphFont, text: &str, x: i32, y: i32, colour: Rgb) {
        let rgb = [colour.r, colour.g, colour.b];
        let (width, height) = self.image.dimensions();
        let image = &mut self.image;
        for glyph in font.positioned_glyphs(text, x as f32, y as f32) {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let alpha = (coverage.clamp(0.0, 1.0) * 255.0).round() as u8;
                if alpha == 0 {
                    return;
                }
                let gx = i64::from(bb.min.x) + i64::from(gx);
                let gy = i64::from(bb.min.y) + i64::from(gy);
                if let Some((px, py)) = clip(width, height, gx, gy) {
                    blend_over(image.get_pixel_mut(px, py), rgb, alpha);
                }
            });
        }
    }

    /// Encode the canvas as a lossless, maximally compressed PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut png_bytes = Vec::new();
        {
            let encoder = PngEncoder::new_with_quality(
                &mut png_bytes,
                CompressionType::Best,
                FilterType::Adaptive,
            );
            encoder
                .write_image(
                    self.image.as_raw(),
                    self.image.width(),
                    self.image.height(),
                    image::ColorType::Rgba8,
                )
                .map_err(SocialImageError::Encode)?;
        }
        Ok(png_bytes)
    }

    /// Encode, then write the file in one step, creating parent directories.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        let png_bytes = self.encode_png()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SocialImageError::Output {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, png_bytes).map_err(|source| SocialImageError::Output {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Canvas pixel for a signed position, if it lies on the canvas
fn clip(width: u32, height: u32, x: i64, y: i64) -> Option<(u32, u32)> {
    let x = u32::try_from(x).ok().filter(|&x| x < width)?;
    let y = u32::try_from(y).ok().filter(|&y| y < height)?;
    Some((x, y))
}

/// Straight-alpha source-over of a coloured pixel with coverage `alpha`
fn blend_over(dst: &mut Rgba<u8>, src: [u8; 3], alpha: u8) {
    match alpha {
        0 => {}
        255 => *dst = Rgba([src[0], src[1], src[2], 255]),
        _ => {
            let sa = alpha as f32 / 255.0;
            let da = dst.0[3] as f32 / 255.0;
            let out_a = sa + da * (1.0 - sa);
            for i in 0..3 {
                let c = (src[i] as f32 * sa + dst.0[i] as f32 * da * (1.0 - sa)) / out_a;
                dst.0[i] = c.round().clamp(0.0, 255.0) as u8;
            }
            dst.0[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn solid(width: u32, height: u32, px: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(px))
    }

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "socialgen_{name}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn test_blend_over_extremes() {
        let mut px = Rgba([10, 20, 30, 255]);
        blend_over(&mut px, [200, 100, 50], 0);
        assert_eq!(px, Rgba([10, 20, 30, 255]));
        blend_over(&mut px, [200, 100, 50], 255);
        assert_eq!(px, Rgba([200, 100, 50, 255]));
    }

    #[test]
    fn test_blend_over_half_on_opaque() {
        let mut px = Rgba([0, 0, 0, 255]);
        blend_over(&mut px, [255, 255, 255], 128);
        assert_eq!(px.0[3], 255);
        assert!((127..=129).contains(&px.0[0]));
    }

    #[test]
    fn test_blend_over_onto_transparent_keeps_colour() {
        let mut px = Rgba([0, 0, 0, 0]);
        blend_over(&mut px, [255, 0, 0], 100);
        assert_eq!(px, Rgba([255, 0, 0, 100]));
    }

    #[test]
    fn test_paste_respects_alpha_mask() {
        let mut canvas = Canvas::from_image(solid(4, 4, [0, 0, 255, 255]));
        let mut overlay = solid(2, 2, [255, 0, 0, 255]);
        overlay.put_pixel(1, 1, Rgba([255, 0, 0, 0]));
        canvas.paste(&overlay, 1, 1);
        assert_eq!(*canvas.image().get_pixel(1, 1), Rgba([255, 0, 0, 255]));
        assert_eq!(*canvas.image().get_pixel(2, 1), Rgba([255, 0, 0, 255]));
        // Transparent overlay pixel shows the background
        assert_eq!(*canvas.image().get_pixel(2, 2), Rgba([0, 0, 255, 255]));
        assert_eq!(*canvas.image().get_pixel(0, 0), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_paste_clips_out_of_bounds() {
        let mut canvas = Canvas::from_image(solid(3, 3, [0, 0, 0, 255]));
        canvas.paste(&solid(4, 4, [9, 9, 9, 255]), -2, 2);
        assert_eq!(*canvas.image().get_pixel(0, 2), Rgba([9, 9, 9, 255]));
        assert_eq!(*canvas.image().get_pixel(2, 2), Rgba([0, 0, 0, 255]));
        assert_eq!(*canvas.image().get_pixel(0, 1), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_paste_at_extreme_offsets_is_clipped() {
        let mut canvas = Canvas::from_image(solid(3, 3, [0, 0, 0, 255]));
        let before = canvas.image().clone();
        canvas.paste(&solid(10, 10, [9, 9, 9, 255]), i32::MAX - 5, 0);
        canvas.paste(&solid(10, 10, [9, 9, 9, 255]), 0, i32::MAX - 5);
        canvas.paste(&solid(10, 10, [9, 9, 9, 255]), i32::MIN, i32::MIN);
        assert_eq!(canvas.image(), &before);
    }

    #[test]
    fn test_clip_bounds() {
        assert_eq!(clip(3, 3, 2, 0), Some((2, 0)));
        assert_eq!(clip(3, 3, 3, 0), None);
        assert_eq!(clip(3, 3, -1, 1), None);
        assert_eq!(clip(3, 3, i64::from(u32::MAX) + 1, 0), None);
    }

    #[test]
    fn test_draw_glyphs_inks_pixels_in_colour() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/fonts/DejaVuSans-Bold.ttf");
        let font = GlyphFont::load(&path, 40).unwrap();
        let mut canvas = Canvas::from_image(solid(200, 80, [0, 0, 0, 255]));
        canvas.draw_glyphs(&font, "S100", 10, 10, Rgb::new(255, 255, 255));
        let white = canvas
            .image()
            .pixels()
            .filter(|p| p.0 == [255, 255, 255, 255])
            .count();
        assert!(white > 50, "expected solid glyph pixels, got {white}");
        // Nothing drawn left of the anchor
        assert!((0..80).all(|y| canvas.image().get_pixel(5, y).0 == [0, 0, 0, 255]));
    }

    #[test]
    fn test_open_missing_template() {
        let err = Canvas::open_template(Path::new("/no/such/template.png")).err().unwrap();
        assert!(matches!(err, SocialImageError::TemplateNotFound { .. }));
    }

    #[test]
    fn test_png_round_trip_is_lossless() {
        let mut img = solid(5, 3, [1, 2, 3, 255]);
        img.put_pixel(4, 2, Rgba([200, 100, 50, 17]));
        let canvas = Canvas::from_image(img.clone());
        let bytes = canvas.encode_png().unwrap();
        assert_eq!(&bytes[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, img);
    }

    #[test]
    fn test_save_png_creates_directories() {
        let dir = temp_dir("canvas_save");
        let path = dir.join("nested").join("card.png");
        Canvas::new(2, 2).save_png(&path).unwrap();
        assert!(path.is_file());
        std::fs::remove_dir_all(&dir).ok();
    }
}
