//! Block pagination: place rasterised blocks onto fixed-size pages.
//!
//! Blocks are indivisible. Each one is scaled to the usable page width and
//! stacked top-to-bottom with a fixed gap; when the next block would cross
//! the bottom margin of a page that already holds something, a new page is
//! started. A block taller than the whole usable area is placed alone on its
//! own page and allowed to overflow rather than split or rejected.
//!
//! All lengths are millimetres, measured from the top-left corner of the
//! page. The PDF writer converts to points and flips the y axis.

use crate::error::TutorError;
use serde::{Deserialize, Serialize};

/// Physical page geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    /// Applied on all four sides.
    pub margin_mm: f32,
    /// Vertical space between consecutive blocks on the same page.
    pub gap_mm: f32,
    /// Height reserved for a horizontal rule.
    pub rule_height_mm: f32,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::a4()
    }
}

impl PageLayout {
    /// A4 portrait, 15 mm margins, 2 mm gap.
    pub const fn a4() -> Self {
        Self {
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            margin_mm: 15.0,
            gap_mm: 2.0,
            rule_height_mm: 4.0,
        }
    }

    pub fn usable_width(&self) -> f32 {
        self.page_width_mm - 2.0 * self.margin_mm
    }

    pub fn usable_height(&self) -> f32 {
        self.page_height_mm - 2.0 * self.margin_mm
    }

    /// Lowest y a block may reach without overflowing.
    pub fn bottom_limit(&self) -> f32 {
        self.page_height_mm - self.margin_mm
    }

    pub fn validate(&self) -> Result<(), TutorError> {
        if self.usable_width() <= 0.0 || self.usable_height() <= 0.0 {
            return Err(TutorError::InvalidConfig(format!(
                "Margins of {} mm leave no usable area on a {}×{} mm page",
                self.margin_mm, self.page_width_mm, self.page_height_mm
            )));
        }
        if self.gap_mm < 0.0 || self.rule_height_mm < 0.0 {
            return Err(TutorError::InvalidConfig(
                "Gap and rule height must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// What the paginator needs to know about one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockExtent {
    /// A bitmap of known pixel size.
    Raster { width_px: u32, height_px: u32 },
    /// A hairline separator; never rasterised.
    Rule,
}

impl BlockExtent {
    /// Height on the page once scaled to `layout`'s usable width.
    pub fn scaled_height(&self, layout: &PageLayout) -> f32 {
        match *self {
            BlockExtent::Raster { width_px, height_px } => {
                if width_px == 0 {
                    0.0
                } else {
                    height_px as f32 * layout.usable_width() / width_px as f32
                }
            }
            BlockExtent::Rule => layout.rule_height_mm,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementKind {
    Image,
    Rule,
}

/// One block positioned on a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Index into the input block sequence.
    pub block: usize,
    pub kind: PlacementKind,
    pub x_mm: f32,
    pub y_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub placements: Vec<Placement>,
}

impl Page {
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

/// Finalised page list, ready for the PDF writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedDocument {
    pub layout: PageLayout,
    pub pages: Vec<Page>,
}

impl PagedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Where the next block goes on the current page.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Cursor {
    /// Nothing placed yet; the next block goes at the top margin whatever its size.
    EmptyPage,
    /// At least one block placed; `y` is where the next one would start.
    PartialPage { y: f32 },
}

/// Lay `blocks` out on pages in input order.
///
/// Zero blocks yield a single empty page.
pub fn paginate(blocks: &[BlockExtent], layout: &PageLayout) -> PagedDocument {
    let mut pages = Vec::new();
    let mut current = Page::default();
    let mut cursor = Cursor::EmptyPage;
    let width = layout.usable_width();

    for (index, extent) in blocks.iter().enumerate() {
        let height = extent.scaled_height(layout);

        let y = match cursor {
            Cursor::EmptyPage => layout.margin_mm,
            Cursor::PartialPage { y } if y + height > layout.bottom_limit() => {
                pages.push(std::mem::take(&mut current));
                layout.margin_mm
            }
            Cursor::PartialPage { y } => y,
        };

        let kind = match extent {
            BlockExtent::Raster { .. } => PlacementKind::Image,
            BlockExtent::Rule => PlacementKind::Rule,
        };

        current.placements.push(Placement {
            block: index,
            kind,
            x_mm: layout.margin_mm,
            y_mm: y,
            width_mm: width,
            height_mm: height,
        });

        cursor = Cursor::PartialPage {
            y: y + height + layout.gap_mm,
        };
    }

    pages.push(current);

    PagedDocument {
        layout: *layout,
        pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A raster block whose scaled height on A4 is `mm` (usable width 180 mm).
    fn block_mm(mm: u32) -> BlockExtent {
        BlockExtent::Raster {
            width_px: 180,
            height_px: mm,
        }
    }

    #[test]
    fn a4_usable_area() {
        let l = PageLayout::a4();
        assert_eq!(l.usable_width(), 180.0);
        assert_eq!(l.usable_height(), 267.0);
        assert_eq!(l.bottom_limit(), 282.0);
    }

    #[test]
    fn scaling_preserves_aspect_ratio() {
        let l = PageLayout::a4();
        let e = BlockExtent::Raster {
            width_px: 1240,
            height_px: 620,
        };
        assert!((e.scaled_height(&l) - 90.0).abs() < 1e-3);
    }

    #[test]
    fn three_hundred_mm_blocks_make_two_pages() {
        let doc = paginate(&[block_mm(100), block_mm(100), block_mm(100)], &PageLayout::a4());
        assert_eq!(doc.page_count(), 2);
        let first: Vec<usize> = doc.pages[0].placements.iter().map(|p| p.block).collect();
        let second: Vec<usize> = doc.pages[1].placements.iter().map(|p| p.block).collect();
        assert_eq!(first, vec![0, 1]);
        assert_eq!(second, vec![2]);
        assert_eq!(doc.pages[0].placements[1].y_mm, 117.0);
        assert_eq!(doc.pages[1].placements[0].y_mm, 15.0);
    }

    #[test]
    fn oversized_block_is_placed_alone() {
        let doc = paginate(&[block_mm(400)], &PageLayout::a4());
        assert_eq!(doc.page_count(), 1);
        let p = doc.pages[0].placements[0];
        assert_eq!(p.y_mm, 15.0);
        assert_eq!(p.height_mm, 400.0);
    }

    #[test]
    fn oversized_block_after_content_starts_new_page() {
        let doc = paginate(
            &[block_mm(20), block_mm(400), block_mm(20)],
            &PageLayout::a4(),
        );
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.pages[1].placements.len(), 1);
        assert_eq!(doc.pages[1].placements[0].block, 1);
    }

    #[test]
    fn zero_blocks_yield_one_empty_page() {
        let doc = paginate(&[], &PageLayout::a4());
        assert_eq!(doc.page_count(), 1);
        assert!(doc.pages[0].is_empty());
    }

    #[test]
    fn exact_fit_stays_on_page() {
        // 15 + 265 = 280, then 280 + 2 = 282 leaves room for nothing but a 0 mm block.
        let doc = paginate(&[block_mm(265), block_mm(0)], &PageLayout::a4());
        assert_eq!(doc.page_count(), 1);
        let doc = paginate(&[block_mm(267)], &PageLayout::a4());
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn rules_reserve_fixed_height_and_paginate() {
        let l = PageLayout::a4();
        let doc = paginate(&[block_mm(262), BlockExtent::Rule], &l);
        // 15 + 262 + 2 = 279; 279 + 4 = 283 > 282 → rule moves to page 2.
        assert_eq!(doc.page_count(), 2);
        let rule = doc.pages[1].placements[0];
        assert_eq!(rule.kind, PlacementKind::Rule);
        assert_eq!(rule.height_mm, l.rule_height_mm);
    }

    #[test]
    fn order_is_preserved() {
        let blocks: Vec<BlockExtent> = (0..20).map(|_| block_mm(40)).collect();
        let doc = paginate(&blocks, &PageLayout::a4());
        let order: Vec<usize> = doc
            .pages
            .iter()
            .flat_map(|p| p.placements.iter().map(|pl| pl.block))
            .collect();
        assert_eq!(order, (0..20).collect::<Vec<_>>());
        for page in &doc.pages {
            for pl in &page.placements {
                assert!(pl.y_mm + pl.height_mm <= l_bottom() + 1e-3);
            }
        }
    }

    fn l_bottom() -> f32 {
        PageLayout::a4().bottom_limit()
    }

    #[test]
    fn invalid_margins_rejected() {
        let l = PageLayout {
            margin_mm: 120.0,
            ..PageLayout::a4()
        };
        assert!(l.validate().is_err());
        assert!(PageLayout::a4().validate().is_ok());
    }
}
