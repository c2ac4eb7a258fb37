//! Page rasterization bookkeeping
//!
//! Tracks what each visible slot shows and discards render results that
//! arrive after the slot moved on to another page, width or document.

use std::collections::HashMap;
use std::sync::Arc;

use super::backend::PageSize;
use super::loader::DocumentId;
use super::request::RequestId;

/// Rendered page pixels.
///
/// RGB, 3 bytes per pixel, rows packed without padding.
#[derive(Clone)]
pub struct RasterSurface {
    /// Page index (0-based)
    pub page_index: usize,
    pub width: u32,
    pub height: u32,
    /// Pixels per point used for rendering
    pub scale: f32,
    pub pixels: Vec<u8>,
}

impl RasterSurface {
    /// Surface filled with a single color
    pub fn solid(page_index: usize, width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            page_index,
            width,
            height,
            scale: 1.0,
            pixels,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        let px = self.pixels.get(offset..offset + 3)?;
        Some([px[0], px[1], px[2]])
    }

    /// Height over width
    pub fn aspect(&self) -> f32 {
        if self.width == 0 {
            return 0.0;
        }
        self.height as f32 / self.width as f32
    }
}

impl std::fmt::Debug for RasterSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterSurface")
            .field("page_index", &self.page_index)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}

/// Scale that makes a page `target_width` pixels wide.
///
/// Without a target width the page renders at `base_scale`.
pub fn render_scale(natural: PageSize, target_width: Option<u32>, base_scale: f32) -> f32 {
    match target_width {
        Some(width) if natural.width > 0.0 && width > 0 => width as f32 / natural.width,
        _ => base_scale,
    }
}

/// Visible place a page is drawn into
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotId {
    /// The single page of flip mode
    Flip,
    /// A page (1-based) in the scroll stack
    Scroll(usize),
}

/// Identity of a render result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub document: DocumentId,
    /// Page index (0-based)
    pub page_index: usize,
    /// Target width in pixels
    pub target_width: Option<u32>,
}

/// What a slot currently shows
#[derive(Clone, Debug, Default)]
pub enum SlotState {
    /// Not rendered yet; draw a placeholder
    #[default]
    Skeleton,
    Rendered(Arc<RasterSurface>),
    Failed(String),
}

impl SlotState {
    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered(_))
    }
}

#[derive(Debug)]
struct SlotEntry {
    key: SlotKey,
    /// Request whose result the slot is waiting for
    awaiting: Option<RequestId>,
    state: SlotState,
}

/// Last-request-wins bookkeeping for every visible slot
#[derive(Debug, Default)]
pub struct SlotTracker {
    slots: HashMap<SlotId, SlotEntry>,
}

static SKELETON: SlotState = SlotState::Skeleton;

impl SlotTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point `slot` at `key`.
    ///
    /// Returns the id to issue when a render is needed, `None` when the slot
    /// already shows or awaits exactly this key. Any earlier request for the
    /// slot becomes stale.
    pub fn request(
        &mut self,
        slot: SlotId,
        key: SlotKey,
        next_id: impl FnOnce() -> RequestId,
    ) -> Option<RequestId> {
        if let Some(entry) = self.slots.get(&slot) {
            if entry.key == key {
                return None;
            }
        }

        let id = next_id();
        self.slots.insert(
            slot,
            SlotEntry {
                key,
                awaiting: Some(id),
                state: SlotState::Skeleton,
            },
        );
        Some(id)
    }

    /// Apply a finished render.
    ///
    /// Returns the slot that took the result, or `None` when the request was
    /// superseded and the result was dropped.
    pub fn complete(
        &mut self,
        id: RequestId,
        result: Result<Arc<RasterSurface>, String>,
    ) -> Option<SlotId> {
        let (slot, entry) = self
            .slots
            .iter_mut()
            .find(|(_, entry)| entry.awaiting == Some(id))?;

        entry.awaiting = None;
        entry.state = match result {
            Ok(surface) => SlotState::Rendered(surface),
            Err(detail) => SlotState::Failed(detail),
        };
        Some(*slot)
    }

    /// Forget a request that will never complete (skipped by a worker)
    pub fn abandon(&mut self, id: RequestId) {
        self.slots.retain(|_, entry| entry.awaiting != Some(id));
    }

    pub fn state(&self, slot: SlotId) -> &SlotState {
        self.slots
            .get(&slot)
            .map_or(&SKELETON, |entry| &entry.state)
    }

    pub fn pending(&self) -> usize {
        self.slots
            .values()
            .filter(|entry| entry.awaiting.is_some())
            .count()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(SlotId) -> bool) {
        self.slots.retain(|slot, _| keep(*slot));
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
