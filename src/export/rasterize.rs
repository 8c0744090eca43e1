//! Rasterisation: SVG markup block → bitmap of known pixel size.
//!
//! The [`Rasterizer`] trait is the library boundary; [`SvgRasterizer`] is the
//! production implementation built on `resvg`. Rendering is CPU-bound, so
//! the export pipeline calls it from `spawn_blocking`.

use image::{DynamicImage, RgbaImage};
use resvg::tiny_skia::{Color, Pixmap, Transform};
use resvg::usvg::{fontdb, Options, Tree};
use tracing::debug;

/// Converts one markup fragment into a bitmap `target_width_px` wide.
///
/// Errors carry only a description; the pipeline adds the block index.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, markup: &str, target_width_px: u32) -> Result<DynamicImage, String>;
}

/// `resvg`-backed rasteriser with a font database loaded once.
pub struct SvgRasterizer {
    fontdb: fontdb::Database,
}

impl Default for SvgRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SvgRasterizer {
    /// Load the system fonts. This scans font directories and takes a few
    /// hundred milliseconds; reuse the instance.
    pub fn new() -> Self {
        let mut fontdb = fontdb::Database::new();
        fontdb.load_system_fonts();
        debug!("Loaded {} font faces", fontdb.len());
        Self { fontdb }
    }

    /// A rasteriser with no fonts. Text is dropped; shapes still render.
    pub fn without_fonts() -> Self {
        Self {
            fontdb: fontdb::Database::new(),
        }
    }
}

impl Rasterizer for SvgRasterizer {
    fn rasterize(&self, markup: &str, target_width_px: u32) -> Result<DynamicImage, String> {
        let tree = Tree::from_str(markup, &Options::default(), &self.fontdb)
            .map_err(|e| format!("Failed to parse SVG: {e}"))?;

        let size = tree.size();
        if size.width() <= 0.0 || size.height() <= 0.0 {
            return Err("SVG has zero size".to_string());
        }

        let scale = target_width_px as f32 / size.width();
        let height_px = (size.height() * scale).ceil().max(1.0) as u32;

        let mut pixmap = Pixmap::new(target_width_px, height_px)
            .ok_or_else(|| format!("Cannot allocate {target_width_px}x{height_px} pixmap"))?;
        pixmap.fill(Color::WHITE);
        resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

        // Opaque background, so premultiplied RGBA equals straight RGBA.
        let img = RgbaImage::from_raw(target_width_px, height_px, pixmap.take())
            .ok_or_else(|| "Pixmap buffer has unexpected length".to_string())?;

        debug!("Rasterised block → {}x{} px", target_width_px, height_px);
        Ok(DynamicImage::ImageRgba8(img))
    }
}
