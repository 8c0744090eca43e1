//! Content blocks: the unit of export layout.

use crate::export::paginate::BlockExtent;
use image::DynamicImage;

/// One indivisible unit of document content, as produced by the assembler.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    /// A standalone SVG document to rasterise.
    Markup { svg: String },
    /// A horizontal separator drawn directly as a line.
    Rule,
}

/// A block after rasterisation.
#[derive(Debug, Clone)]
pub enum RasterBlock {
    Image(DynamicImage),
    Rule,
}

impl RasterBlock {
    pub fn extent(&self) -> BlockExtent {
        match self {
            RasterBlock::Image(img) => BlockExtent::Raster {
                width_px: img.width(),
                height_px: img.height(),
            },
            RasterBlock::Rule => BlockExtent::Rule,
        }
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        match self {
            RasterBlock::Image(img) => (img.width(), img.height()),
            RasterBlock::Rule => (0, 0),
        }
    }
}
