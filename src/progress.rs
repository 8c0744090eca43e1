//! Progress-callback trait for PDF export events.
//!
//! Inject an [`Arc<dyn ExportProgressCallback>`] via
//! [`crate::config::TutorConfigBuilder::progress_callback`] to observe an
//! export as blocks are rasterised and pages are filled.
//!
//! # Example
//!
//! ```rust
//! use edgequake_tutor::{ExportProgressCallback, TutorConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl ExportProgressCallback for Counter {
//!     fn on_block_rasterised(&self, index: usize, total: usize, _w: u32, _h: u32) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("block {}/{}", index + 1, total);
//!     }
//! }
//!
//! let config = TutorConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the export pipeline. All methods default to no-ops.
///
/// Blocks are processed strictly in order, but the rasteriser runs on the
/// blocking pool, so implementations must be `Send + Sync`.
pub trait ExportProgressCallback: Send + Sync {
    /// Called once before the first block is rasterised.
    fn on_export_start(&self, total_blocks: usize) {
        let _ = total_blocks;
    }

    /// Called after each block has a bitmap (rule blocks included, with 0×0).
    ///
    /// # Arguments
    /// * `index`: 0-based block index
    /// * `total`: number of blocks
    /// * `width_px` / `height_px`: bitmap size
    fn on_block_rasterised(&self, index: usize, total: usize, width_px: u32, height_px: u32) {
        let _ = (index, total, width_px, height_px);
    }

    /// Called as each page's content stream is serialised (1-based).
    fn on_page_finished(&self, page_num: usize) {
        let _ = page_num;
    }

    /// Called once the PDF is written, with the number of pages.
    fn on_export_complete(&self, pages: usize) {
        let _ = pages;
    }

    /// Called when the export aborts. Nothing has been written.
    fn on_export_failed(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation used when no callback is configured.
pub struct NoopProgressCallback;

impl ExportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::TutorConfig`].
pub type ProgressCallback = Arc<dyn ExportProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        total: AtomicUsize,
        blocks: AtomicUsize,
        pages: AtomicUsize,
        failures: AtomicUsize,
    }

    impl ExportProgressCallback for TrackingCallback {
        fn on_export_start(&self, total_blocks: usize) {
            self.total.store(total_blocks, Ordering::SeqCst);
        }

        fn on_block_rasterised(&self, _i: usize, _t: usize, _w: u32, _h: u32) {
            self.blocks.fetch_add(1, Ordering::SeqCst);
        }

        fn on_export_complete(&self, pages: usize) {
            self.pages.store(pages, Ordering::SeqCst);
        }

        fn on_export_failed(&self, _error: &str) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_export_start(3);
        cb.on_block_rasterised(0, 3, 100, 40);
        cb.on_page_finished(1);
        cb.on_export_complete(1);
        cb.on_export_failed("boom");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let t = TrackingCallback::default();
        t.on_export_start(2);
        t.on_block_rasterised(0, 2, 10, 10);
        t.on_block_rasterised(1, 2, 10, 10);
        t.on_export_complete(1);
        assert_eq!(t.total.load(Ordering::SeqCst), 2);
        assert_eq!(t.blocks.load(Ordering::SeqCst), 2);
        assert_eq!(t.pages.load(Ordering::SeqCst), 1);
        assert_eq!(t.failures.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_export_start(10);
    }
}
