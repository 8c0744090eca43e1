//! PDF export pipeline.
//!
//! ```text
//! content ─► assemble ─► [ContentBlock] ─► rasterize ─► [RasterBlock]
//!                                                         │
//!                          file ◄─ atomic write ◄─ pdf ◄─ paginate
//! ```
//!
//! Every block is rasterised before anything touches the disk, and the PDF is
//! written to a temporary file in the destination directory and renamed into
//! place. A failure at any stage leaves no output file.

pub mod assemble;
pub mod block;
pub mod paginate;
pub mod pdf;
pub mod rasterize;

pub use assemble::{assemble_document, DocumentBuilder, Exportable};
pub use block::{ContentBlock, RasterBlock};
pub use paginate::{paginate, BlockExtent, PageLayout, PagedDocument};
pub use rasterize::{Rasterizer, SvgRasterizer};

use crate::error::TutorError;
use crate::progress::ProgressCallback;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Page geometry and bitmap resolution for one export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportOptions {
    pub layout: PageLayout,
    /// Width every markup block is rasterised at.
    pub render_width_px: u32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            layout: PageLayout::a4(),
            render_width_px: 1240,
        }
    }
}

/// What an export produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub pages: usize,
    pub blocks: usize,
    pub bytes: usize,
    pub duration_ms: u64,
}

/// Rasterise `blocks`, paginate them and write a PDF to `path`.
///
/// Blocks are rasterised one at a time, in order, on the blocking pool.
/// The first failure aborts the export with
/// [`TutorError::RasterisationFailed`] naming the block.
pub async fn export_pdf(
    blocks: Vec<ContentBlock>,
    rasterizer: Arc<dyn Rasterizer>,
    options: &ExportOptions,
    path: &Path,
    progress: &ProgressCallback,
) -> Result<ExportSummary, TutorError> {
    let start = Instant::now();
    let total = blocks.len();
    info!("Exporting {} blocks to {}", total, path.display());
    progress.on_export_start(total);

    let result = render_and_write(blocks, rasterizer, options, path, progress).await;
    match result {
        Ok((pages, bytes)) => {
            progress.on_export_complete(pages);
            let summary = ExportSummary {
                path: path.to_path_buf(),
                pages,
                blocks: total,
                bytes,
                duration_ms: start.elapsed().as_millis() as u64,
            };
            info!(
                "Export complete: {} pages, {} bytes in {}ms",
                summary.pages, summary.bytes, summary.duration_ms
            );
            Ok(summary)
        }
        Err(e) => {
            warn!("Export aborted: {}", e);
            progress.on_export_failed(&e.to_string());
            Err(e)
        }
    }
}

async fn render_and_write(
    blocks: Vec<ContentBlock>,
    rasterizer: Arc<dyn Rasterizer>,
    options: &ExportOptions,
    path: &Path,
    progress: &ProgressCallback,
) -> Result<(usize, usize), TutorError> {
    options.layout.validate()?;
    let rasters = rasterize_all(blocks, rasterizer, options.render_width_px, progress).await?;

    let extents: Vec<BlockExtent> = rasters.iter().map(RasterBlock::extent).collect();
    let doc = paginate(&extents, &options.layout);
    let pages = doc.page_count();
    debug!("Paginated {} blocks onto {} pages", extents.len(), pages);

    let path = path.to_path_buf();
    let progress = Arc::clone(progress);
    let bytes = tokio::task::spawn_blocking(move || -> Result<usize, TutorError> {
        let pdf = pdf::write_pdf(&doc, &rasters, progress.as_ref())?;
        write_atomically(&path, &pdf)?;
        Ok(pdf.len())
    })
    .await
    .map_err(|e| TutorError::Internal(format!("PDF writer task panicked: {e}")))??;

    Ok((pages, bytes))
}

async fn rasterize_all(
    blocks: Vec<ContentBlock>,
    rasterizer: Arc<dyn Rasterizer>,
    width_px: u32,
    progress: &ProgressCallback,
) -> Result<Vec<RasterBlock>, TutorError> {
    let total = blocks.len();
    let mut out = Vec::with_capacity(total);

    for (index, block) in blocks.into_iter().enumerate() {
        let raster = match block {
            ContentBlock::Rule => RasterBlock::Rule,
            ContentBlock::Markup { svg } => {
                let r = Arc::clone(&rasterizer);
                let img = tokio::task::spawn_blocking(move || r.rasterize(&svg, width_px))
                    .await
                    .map_err(|e| TutorError::RasterisationFailed {
                        block: index,
                        detail: format!("rasteriser panicked: {e}"),
                    })?
                    .map_err(|detail| TutorError::RasterisationFailed {
                        block: index,
                        detail,
                    })?;
                RasterBlock::Image(img)
            }
        };
        let (w, h) = raster.pixel_size();
        progress.on_block_rasterised(index, total, w, h);
        out.push(raster);
    }

    Ok(out)
}

/// Write to a sibling temp file, then rename over `path`.
fn write_atomically(path: &Path, data: &[u8]) -> Result<(), TutorError> {
    let write_err = |source: std::io::Error| TutorError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(data).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ExportProgressCallback, NoopProgressCallback};
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fixed-height bitmaps; fails on markup containing "FAIL".
    struct StubRasterizer;

    impl Rasterizer for StubRasterizer {
        fn rasterize(&self, markup: &str, width: u32) -> Result<DynamicImage, String> {
            if markup.contains("FAIL") {
                return Err("stub failure".into());
            }
            Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                width,
                width / 4,
                Rgba([255, 255, 255, 255]),
            )))
        }
    }

    #[derive(Default)]
    struct Recorder {
        rasterised: AtomicUsize,
        pages: AtomicUsize,
        failures: Mutex<Vec<String>>,
    }

    impl ExportProgressCallback for Recorder {
        fn on_block_rasterised(&self, _i: usize, _t: usize, _w: u32, _h: u32) {
            self.rasterised.fetch_add(1, Ordering::SeqCst);
        }
        fn on_export_complete(&self, pages: usize) {
            self.pages.store(pages, Ordering::SeqCst);
        }
        fn on_export_failed(&self, error: &str) {
            self.failures.lock().unwrap().push(error.to_string());
        }
    }

    fn markup(s: &str) -> ContentBlock {
        ContentBlock::Markup { svg: s.into() }
    }

    #[tokio::test]
    async fn writes_pdf_and_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("notes.pdf");
        let rec = Arc::new(Recorder::default());
        let progress: ProgressCallback = rec.clone();

        let blocks = vec![markup("a"), ContentBlock::Rule, markup("b")];
        let summary = export_pdf(
            blocks,
            Arc::new(StubRasterizer),
            &ExportOptions::default(),
            &out,
            &progress,
        )
        .await
        .expect("export");

        assert_eq!(summary.pages, 1);
        assert_eq!(summary.blocks, 3);
        assert_eq!(rec.rasterised.load(Ordering::SeqCst), 3);
        assert_eq!(rec.pages.load(Ordering::SeqCst), 1);
        let bytes = std::fs::read(&out).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        assert_eq!(bytes.len(), summary.bytes);
    }

    #[tokio::test]
    async fn rasterisation_failure_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("broken.pdf");
        let rec = Arc::new(Recorder::default());
        let progress: ProgressCallback = rec.clone();

        let blocks = vec![markup("ok"), markup("FAIL here"), markup("never")];
        let err = export_pdf(
            blocks,
            Arc::new(StubRasterizer),
            &ExportOptions::default(),
            &out,
            &progress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, TutorError::RasterisationFailed { block: 1, .. }));
        assert!(!out.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(rec.rasterised.load(Ordering::SeqCst), 1);
        assert_eq!(rec.failures.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_export_has_one_page() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("empty.pdf");
        let progress: ProgressCallback = Arc::new(NoopProgressCallback);
        let summary = export_pdf(
            Vec::new(),
            Arc::new(StubRasterizer),
            &ExportOptions::default(),
            &out,
            &progress,
        )
        .await
        .unwrap();
        assert_eq!(summary.pages, 1);
        assert!(out.exists());
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("x.pdf");
        std::fs::write(&out, b"old").unwrap();
        write_atomically(&out, b"new").unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
