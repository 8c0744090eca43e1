//! PDF serialisation of a [`PagedDocument`].
//!
//! Every image block becomes one JPEG image XObject (`DCTDecode`), drawn by
//! the page content stream with a `cm` transform. Rule blocks are stroked
//! directly. Object numbering: 1 = catalog, 2 = page tree, then images, then
//! a page/content pair per page.

use crate::error::TutorError;
use crate::export::block::RasterBlock;
use crate::export::paginate::{PagedDocument, PlacementKind};
use crate::progress::ExportProgressCallback;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref};
use std::collections::HashMap;
use tracing::debug;

const JPEG_QUALITY: u8 = 90;
const RULE_WIDTH_PT: f32 = 0.75;
const RULE_GRAY: f32 = 0.6;

fn mm_to_pt(mm: f32) -> f32 {
    mm * 72.0 / 25.4
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, TutorError> {
    // JPEG has no alpha channel; blocks are rendered on white anyway.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY))
        .map_err(|e| TutorError::ExportFailed(format!("JPEG encoding failed: {e}")))?;
    Ok(buf)
}

/// Serialise `doc` to PDF bytes. `blocks` is indexed by `Placement::block`.
pub fn write_pdf(
    doc: &PagedDocument,
    blocks: &[RasterBlock],
    progress: &dyn ExportProgressCallback,
) -> Result<Vec<u8>, TutorError> {
    let mut pdf = Pdf::new();
    let catalog_id = Ref::new(1);
    let tree_id = Ref::new(2);
    let mut next_id = 3;

    pdf.catalog(catalog_id).pages(tree_id);

    // Image XObjects, keyed by block index.
    let mut images: HashMap<usize, (Ref, String)> = HashMap::new();
    for (index, block) in blocks.iter().enumerate() {
        let RasterBlock::Image(img) = block else {
            continue;
        };
        let id = Ref::new(next_id);
        next_id += 1;
        let data = encode_jpeg(img)?;
        {
            let mut xobject = pdf.image_xobject(id, &data);
            xobject.filter(Filter::DctDecode);
            xobject.width(img.width() as i32);
            xobject.height(img.height() as i32);
            xobject.color_space().device_rgb();
            xobject.bits_per_component(8);
        }
        images.insert(index, (id, format!("Im{index}")));
    }

    let page_w = mm_to_pt(doc.layout.page_width_mm);
    let page_h = mm_to_pt(doc.layout.page_height_mm);
    let mut page_ids = Vec::with_capacity(doc.pages.len());

    for (page_index, page) in doc.pages.iter().enumerate() {
        let page_id = Ref::new(next_id);
        let content_id = Ref::new(next_id + 1);
        next_id += 2;
        page_ids.push(page_id);

        let mut content = Content::new();
        let mut used: Vec<(&str, Ref)> = Vec::new();

        for pl in &page.placements {
            let x = mm_to_pt(pl.x_mm);
            let w = mm_to_pt(pl.width_mm);
            match pl.kind {
                PlacementKind::Image => {
                    let (id, name) = images.get(&pl.block).ok_or_else(|| {
                        TutorError::ExportFailed(format!("No bitmap for block {}", pl.block))
                    })?;
                    let h = mm_to_pt(pl.height_mm);
                    // PDF origin is bottom-left.
                    let y = page_h - mm_to_pt(pl.y_mm) - h;
                    content.save_state();
                    content.transform([w, 0.0, 0.0, h, x, y]);
                    content.x_object(Name(name.as_bytes()));
                    content.restore_state();
                    used.push((name.as_str(), *id));
                }
                PlacementKind::Rule => {
                    let y = page_h - mm_to_pt(pl.y_mm + pl.height_mm / 2.0);
                    content.save_state();
                    content.set_line_width(RULE_WIDTH_PT);
                    content.set_stroke_gray(RULE_GRAY);
                    content.move_to(x, y);
                    content.line_to(x + w, y);
                    content.stroke();
                    content.restore_state();
                }
            }
        }

        pdf.stream(content_id, &content.finish());

        let mut pdf_page = pdf.page(page_id);
        pdf_page.media_box(Rect::new(0.0, 0.0, page_w, page_h));
        pdf_page.parent(tree_id);
        pdf_page.contents(content_id);
        {
            let mut resources = pdf_page.resources();
            if !used.is_empty() {
                let mut xobjects = resources.x_objects();
                for (name, id) in &used {
                    xobjects.pair(Name(name.as_bytes()), *id);
                }
            }
        }
        pdf_page.finish();
        progress.on_page_finished(page_index + 1);
    }

    let count = page_ids.len() as i32;
    pdf.pages(tree_id).kids(page_ids).count(count);

    let bytes = pdf.finish();
    debug!(
        "Serialised PDF: {} pages, {} images, {} bytes",
        count,
        images.len(),
        bytes.len()
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::paginate::{paginate, PageLayout};
    use crate::progress::NoopProgressCallback;
    use image::{Rgba, RgbaImage};

    fn img(w: u32, h: u32) -> RasterBlock {
        RasterBlock::Image(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            w,
            h,
            Rgba([20, 40, 60, 255]),
        )))
    }

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    #[test]
    fn mm_conversion() {
        assert!((mm_to_pt(25.4) - 72.0).abs() < 1e-4);
        assert!((mm_to_pt(210.0) - 595.2756).abs() < 1e-2);
    }

    #[test]
    fn writes_one_page_per_paged_page() {
        let blocks = vec![img(180, 100), RasterBlock::Rule, img(180, 100), img(180, 100)];
        let extents: Vec<_> = blocks.iter().map(RasterBlock::extent).collect();
        let doc = paginate(&extents, &PageLayout::a4());
        assert_eq!(doc.page_count(), 2);

        let bytes = write_pdf(&doc, &blocks, &NoopProgressCallback).expect("pdf");
        assert!(bytes.starts_with(b"%PDF-"));
        let pages = count(&bytes, b"/Type /Page") - count(&bytes, b"/Type /Pages");
        assert_eq!(pages, 2);
        assert_eq!(count(&bytes, b"/DCTDecode"), 3);
    }

    #[test]
    fn empty_document_is_a_valid_single_page() {
        let doc = paginate(&[], &PageLayout::a4());
        let bytes = write_pdf(&doc, &[], &NoopProgressCallback).expect("pdf");
        assert!(bytes.starts_with(b"%PDF-"));
        assert!(bytes.ends_with(b"%%EOF") || bytes.ends_with(b"%%EOF\n"));
    }
}
