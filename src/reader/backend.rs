//! Document engine abstraction
//!
//! The reader never talks to a PDF library directly. A [`PdfBackend`] opens
//! documents from bytes; each render worker keeps its own opened
//! [`PdfDocument`], since engine documents are generally not thread-safe.

use super::error::BackendError;
use super::raster::RasterSurface;

/// Natural page size in points
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Height over width, 4:3 portrait when the size is degenerate
    pub fn aspect(&self) -> f32 {
        if self.width > 0.0 && self.height > 0.0 {
            self.height / self.width
        } else {
            4.0 / 3.0
        }
    }
}

/// Capability to open documents
pub trait PdfBackend: Send + Sync {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PdfDocument>, BackendError>;
}

/// An opened document
pub trait PdfDocument {
    fn page_count(&self) -> usize;

    fn page_size(&self, index: usize) -> Result<PageSize, BackendError>;

    /// Rasterize page `index` (0-based) at `scale` pixels per point
    fn render(&self, index: usize, scale: f32) -> Result<RasterSurface, BackendError>;
}

#[cfg(feature = "pdf")]
pub use self::mupdf_backend::MupdfBackend;

#[cfg(feature = "pdf")]
mod mupdf_backend {
    use mupdf::{Colorspace, Document, Matrix, Pixmap};

    use super::{BackendError, PageSize, PdfBackend, PdfDocument, RasterSurface};

    /// Backend rendering through MuPDF
    #[derive(Debug, Default, Clone, Copy)]
    pub struct MupdfBackend;

    impl PdfBackend for MupdfBackend {
        fn open(&self, bytes: &[u8]) -> Result<Box<dyn PdfDocument>, BackendError> {
            let doc = Document::from_bytes(bytes, "application/pdf").map_err(engine)?;
            let page_count = doc.page_count().map_err(engine)?.max(0) as usize;
            Ok(Box::new(MupdfDocument { doc, page_count }))
        }
    }

    struct MupdfDocument {
        doc: Document,
        page_count: usize,
    }

    impl MupdfDocument {
        fn load(&self, index: usize) -> Result<mupdf::Page, BackendError> {
            if index >= self.page_count {
                return Err(BackendError::PageOutOfRange {
                    index,
                    count: self.page_count,
                });
            }
            self.doc.load_page(index as i32).map_err(engine)
        }
    }

    impl PdfDocument for MupdfDocument {
        fn page_count(&self) -> usize {
            self.page_count
        }

        fn page_size(&self, index: usize) -> Result<PageSize, BackendError> {
            let bounds = self.load(index)?.bounds().map_err(engine)?;
            Ok(PageSize::new(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0))
        }

        fn render(&self, index: usize, scale: f32) -> Result<RasterSurface, BackendError> {
            let page = self.load(index)?;
            let transform = Matrix::new_scale(scale, scale);
            let pixmap = page
                .to_pixmap(&transform, &Colorspace::device_rgb(), false, false)
                .map_err(engine)?;
            let pixels = pixmap_to_rgb(&pixmap)?;

            Ok(RasterSurface {
                page_index: index,
                width: pixmap.width(),
                height: pixmap.height(),
                scale,
                pixels,
            })
        }
    }

    fn engine(e: mupdf::error::Error) -> BackendError {
        BackendError::engine(e.to_string())
    }

    fn pixmap_to_rgb(pixmap: &Pixmap) -> Result<Vec<u8>, BackendError> {
        let n = pixmap.n() as usize;
        if n < 3 {
            return Err(BackendError::engine(format!(
                "Unsupported pixmap format: {n} channels"
            )));
        }

        let width = pixmap.width() as usize;
        let height = pixmap.height() as usize;
        let stride = pixmap.stride() as usize;
        let samples = pixmap.samples();
        let row_bytes = width * n;
        if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
            return Err(BackendError::engine("Pixmap buffer size mismatch"));
        }

        let mut out = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            let row = &samples[y * stride..y * stride + row_bytes];
            if n == 3 {
                out.extend_from_slice(row);
            } else {
                for px in row.chunks_exact(n) {
                    out.extend_from_slice(&px[..3]);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_falls_back_for_degenerate_sizes() {
        assert_eq!(PageSize::new(600.0, 800.0).aspect(), 800.0 / 600.0);
        assert_eq!(PageSize::new(0.0, 800.0).aspect(), 4.0 / 3.0);
    }
}
