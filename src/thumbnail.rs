// Circular thumbnails for speaker photos

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbaImage};
use std::path::Path;

use crate::error::{Result, SocialImageError};
use crate::request::Size;

/// Open any raster the `image` crate can decode.
pub fn load_source(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|source| SocialImageError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// Single-channel mask: 255 inside the ellipse inscribed in the full
/// rectangle, 0 elsewhere. A pixel is inside when its centre is.
pub fn circle_mask(width: u32, height: u32) -> GrayImage {
    let rx = width as f32 / 2.0;
    let ry = height as f32 / 2.0;
    GrayImage::from_fn(width, height, |x, y| {
        let dx = (x as f32 + 0.5 - rx) / rx;
        let dy = (y as f32 + 0.5 - ry) / ry;
        if dx * dx + dy * dy <= 1.0 {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Scale and crop `source` to exactly `width` x `height`, keeping the
/// aspect ratio and cutting equally from both edges around the centre.
pub fn fit_centered(source: &DynamicImage, width: u32, height: u32) -> RgbaImage {
    let rgba = source.to_rgba8();
    let (src_w, src_h) = rgba.dimensions();

    let target_ratio = width as f64 / height as f64;
    let src_ratio = src_w as f64 / src_h as f64;

    let (crop_w, crop_h) = if src_ratio > target_ratio {
        // Wider than the target: keep full height, trim the sides
        let w = (src_h as f64 * target_ratio).round().max(1.0) as u32;
        (w.min(src_w), src_h)
    } else {
        // Taller than the target: keep full width, trim top and bottom
        let h = (src_w as f64 / target_ratio).round().max(1.0) as u32;
        (src_w, h.min(src_h))
    };
    let crop_x = (src_w - crop_w) / 2;
    let crop_y = (src_h - crop_h) / 2;

    let cropped = imageops::crop_imm(&rgba, crop_x, crop_y, crop_w, crop_h).to_image();
    if cropped.dimensions() == (width, height) {
        cropped
    } else {
        imageops::resize(&cropped, width, height, FilterType::Lanczos3)
    }
}

/// Replace the alpha channel of `image` with `mask`.
pub fn put_alpha(image: &mut RgbaImage, mask: &GrayImage) -> Result<()> {
    if image.dimensions() != mask.dimensions() {
        return Err(SocialImageError::invalid(format!(
            "mask is {:?} but image is {:?}",
            mask.dimensions(),
            image.dimensions()
        )));
    }
    for (pixel, alpha) in image.pixels_mut().zip(mask.pixels()) {
        pixel.0[3] = alpha.0[0];
    }
    Ok(())
}

/// Fit `source` into `dimensions` and make it opaque only inside the
/// inscribed circle.
pub fn make_circle_thumbnail(source: &DynamicImage, dimensions: Size) -> Result<RgbaImage> {
    let Size { width, height } = dimensions;
    if width == 0 || height == 0 {
        return Err(SocialImageError::invalid(format!(
            "thumbnail dimensions {width}x{height} must be non-zero"
        )));
    }
    let mask = circle_mask(width, height);
    let mut thumbnail = fit_centered(source, width, height);
    put_alpha(&mut thumbnail, &mask)?;
    Ok(thumbnail)
}

pub fn circle_thumbnail_from_file(path: &Path, dimensions: Size) -> Result<RgbaImage> {
    let source = load_source(path)?;
    make_circle_thumbnail(&source, dimensions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// 300x100: red | green | blue thirds
    fn striped_source() -> DynamicImage {
        let img = RgbaImage::from_fn(300, 100, |x, _| match x {
            0..=99 => Rgba([255, 0, 0, 255]),
            100..=199 => Rgba([0, 255, 0, 255]),
            _ => Rgba([0, 0, 255, 255]),
        });
        DynamicImage::ImageRgba8(img)
    }

    fn inside_ellipse(x: u32, y: u32, w: u32, h: u32) -> bool {
        let rx = w as f32 / 2.0;
        let ry = h as f32 / 2.0;
        let dx = (x as f32 + 0.5 - rx) / rx;
        let dy = (y as f32 + 0.5 - ry) / ry;
        dx * dx + dy * dy <= 1.0
    }

    #[test]
    fn test_circle_mask_corners_and_centre() {
        let mask = circle_mask(300, 300);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
        assert_eq!(mask.get_pixel(299, 0).0[0], 0);
        assert_eq!(mask.get_pixel(0, 299).0[0], 0);
        assert_eq!(mask.get_pixel(299, 299).0[0], 0);
        assert_eq!(mask.get_pixel(150, 150).0[0], 255);
        // Edge midpoints touch the rectangle
        assert_eq!(mask.get_pixel(0, 150).0[0], 255);
        assert_eq!(mask.get_pixel(150, 0).0[0], 255);
    }

    #[test]
    fn test_mask_is_binary() {
        let mask = circle_mask(37, 21);
        assert!(mask.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn test_fit_centered_crops_middle_of_wide_source() {
        let fitted = fit_centered(&striped_source(), 100, 100);
        assert_eq!(fitted.dimensions(), (100, 100));
        assert_eq!(*fitted.get_pixel(0, 50), Rgba([0, 255, 0, 255]));
        assert_eq!(*fitted.get_pixel(99, 50), Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_fit_centered_scales_down() {
        let fitted = fit_centered(&striped_source(), 30, 30);
        assert_eq!(fitted.dimensions(), (30, 30));
        let centre = fitted.get_pixel(15, 15);
        assert!(centre.0[1] > 200, "expected green centre, got {:?}", centre);
        assert!(centre.0[0] < 40 && centre.0[2] < 40);
    }

    #[test]
    fn test_fit_centered_tall_target() {
        let fitted = fit_centered(&striped_source(), 20, 100);
        assert_eq!(fitted.dimensions(), (20, 100));
        // A 20:100 slice of a 300x100 source is the 20px column at the centre
        assert_eq!(*fitted.get_pixel(10, 50), Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_thumbnail_alpha_matches_ellipse() {
        for &(w, h) in &[(300u32, 300u32), (40, 20), (7, 13)] {
            let thumb = make_circle_thumbnail(&striped_source(), Size { width: w, height: h }).unwrap();
            assert_eq!(thumb.dimensions(), (w, h));
            for (x, y, p) in thumb.enumerate_pixels() {
                let expected = if inside_ellipse(x, y, w, h) { 255 } else { 0 };
                assert_eq!(p.0[3], expected, "alpha at ({x}, {y}) in {w}x{h}");
            }
        }
    }

    #[test]
    fn test_thumbnail_rejects_zero_size() {
        let err = make_circle_thumbnail(&striped_source(), Size { width: 0, height: 10 });
        assert!(matches!(err, Err(SocialImageError::InvalidElementSpec(_))));
    }

    #[test]
    fn test_missing_source_is_image_load_error() {
        let err = circle_thumbnail_from_file(
            Path::new("/no/such/speaker.jpg"),
            Size { width: 10, height: 10 },
        )
        .unwrap_err();
        assert!(err.is_image_load());
    }

    #[test]
    fn test_corrupt_source_is_image_load_error() {
        let path = std::env::temp_dir().join(format!("socialgen_corrupt_{}.png", std::process::id()));
        std::fs::write(&path, b"definitely not a png").unwrap();
        let err = load_source(&path).unwrap_err();
        assert!(err.is_image_load());
        std::fs::remove_file(&path).ok();
    }
}
