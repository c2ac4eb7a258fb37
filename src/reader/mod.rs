//! PDF reader engine
//!
//! The session is a pure state machine fed with commands and async
//! completions; the service runs its effects on worker threads.

mod backend;
mod cache;
mod error;
mod gesture;
mod loader;
mod navigation;
mod progress;
mod raster;
mod request;
mod service;
mod session;
mod view;
mod worker;
mod zoom;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use backend::{PageSize, PdfBackend, PdfDocument};
#[cfg(feature = "pdf")]
pub use backend::MupdfBackend;
pub use cache::PageCache;
pub use error::{BackendError, FetchError, ReaderError};
pub use gesture::{PinchRecognizer, TouchEvent, TouchPhase, TouchPoint};
pub use loader::{
    ContentFetcher, DocumentHandle, DocumentId, HttpFetcher, Resolution, decode_data_uri,
    load_document, resolve,
};
pub use navigation::{FlipIntent, NavState, Navigator};
pub use progress::ProgressDebouncer;
pub use raster::{RasterSurface, SlotId, SlotKey, SlotState, SlotTracker, render_scale};
pub use request::{LoadJob, LoadResponse, RenderJob, RenderResponse, RequestId, SessionEpoch};
pub use service::{ReaderEvent, ReaderHost, ReaderService};
pub use session::{Command, Effect, LoadState, NavKey, ReaderSession};
pub use view::{
    ErrorPanel, FlipView, HeaderView, PageSlotView, ReaderView, ScrollPageView, ScrollView,
    Scrubber,
};
pub use zoom::ZoomController;

/// Page width in pixels at 100% zoom
pub const DEFAULT_BASE_PAGE_WIDTH: f32 = 800.0;
/// Render scale used when no target width is requested
pub const DEFAULT_BASE_SCALE: f32 = 1.5;
pub const DEFAULT_PROGRESS_DEBOUNCE: Duration = Duration::from_millis(1000);
/// Length of the page-flip transition cue
pub const DEFAULT_FLIP_CUE: Duration = Duration::from_millis(400);
pub const DEFAULT_WORKERS: usize = 2;
pub const DEFAULT_CACHE_SIZE: usize = 32;

/// Presentation strategy for the open document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// One page at a time
    #[default]
    Flip,
    /// All pages stacked vertically
    Scroll,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Flip => Self::Scroll,
            Self::Scroll => Self::Flip,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flip => "Flip",
            Self::Scroll => "Scroll",
        }
    }
}

/// Tunables for a reader session
#[derive(Clone, Debug)]
pub struct ReaderConfig {
    pub base_page_width: f32,
    pub base_render_scale: f32,
    pub progress_debounce: Duration,
    pub flip_cue: Duration,
    pub render_workers: usize,
    pub page_cache_size: usize,
    pub initial_mode: ViewMode,
    pub dark_mode: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            base_page_width: DEFAULT_BASE_PAGE_WIDTH,
            base_render_scale: DEFAULT_BASE_SCALE,
            progress_debounce: DEFAULT_PROGRESS_DEBOUNCE,
            flip_cue: DEFAULT_FLIP_CUE,
            render_workers: DEFAULT_WORKERS,
            page_cache_size: DEFAULT_CACHE_SIZE,
            initial_mode: ViewMode::Flip,
            dark_mode: false,
        }
    }
}
