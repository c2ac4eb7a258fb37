//! Presentation model of a reader session
//!
//! Plain data built by [`ReaderSession::view`](super::ReaderSession::view);
//! the terminal widgets only draw what is in here.

use super::ViewMode;
use super::navigation::FlipIntent;
use super::raster::SlotState;

/// Reader chrome
#[derive(Clone, Debug, PartialEq)]
pub struct HeaderView {
    pub title: String,
    pub author: String,
    pub zoom_percent: u32,
    pub dark_mode: bool,
    pub mode: ViewMode,
    /// "Open original" target, when the content is remote or external
    pub original_link: Option<String>,
    /// Whether "open original" is offered at all
    pub show_original: bool,
}

#[derive(Clone, Debug)]
pub struct PageSlotView {
    /// Page number (1-based)
    pub page: usize,
    pub state: SlotState,
    /// Height over width of the page, for sizing placeholders
    pub aspect: f32,
    /// Width the page is rendered at
    pub target_width: u32,
}

/// Page slider bound to `[1, page_count]`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scrubber {
    pub value: usize,
    pub max: usize,
}

impl Scrubber {
    pub const MIN: usize = 1;

    /// Position along the track, 0.0 at page 1 and 1.0 at the last page
    pub fn fraction(&self) -> f32 {
        if self.max <= Self::MIN {
            return 0.0;
        }
        (self.value.saturating_sub(Self::MIN)) as f32 / (self.max - Self::MIN) as f32
    }

    /// Page for a position along the track
    pub fn page_at(&self, fraction: f32) -> usize {
        let span = self.max.saturating_sub(Self::MIN) as f32;
        let page = Self::MIN as f32 + (fraction.clamp(0.0, 1.0) * span).round();
        (page as usize).clamp(Self::MIN, self.max.max(Self::MIN))
    }
}

#[derive(Clone, Debug)]
pub struct FlipView {
    pub page: PageSlotView,
    pub current_page: usize,
    pub page_count: usize,
    pub can_prev: bool,
    pub can_next: bool,
    pub scrubber: Scrubber,
    /// Transition cue to play, `None` once it finished
    pub cue: FlipIntent,
}

#[derive(Clone, Debug)]
pub struct ScrollPageView {
    pub slot: PageSlotView,
    pub highlighted: bool,
}

#[derive(Clone, Debug)]
pub struct ScrollView {
    /// Every page of the document, in order
    pub pages: Vec<ScrollPageView>,
    pub current_page: usize,
    pub page_count: usize,
}

impl ScrollView {
    pub fn page_numbers(&self) -> Vec<usize> {
        self.pages.iter().map(|p| p.slot.page).collect()
    }
}

/// Error panel; exit is always available, plus "open original" when known
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorPanel {
    pub title: String,
    pub message: String,
    pub open_original: Option<String>,
}

#[derive(Clone, Debug)]
pub enum ReaderView {
    Loading {
        mode: ViewMode,
        /// Placeholder pages to draw
        skeletons: usize,
    },
    Failed(ErrorPanel),
    /// Nothing to render in-app; only the outbound link
    ExternalOnly { link: Option<String> },
    Flip(FlipView),
    Scroll(ScrollView),
}

impl ReaderView {
    /// Whether prev/next/scrubber controls are shown
    pub fn has_page_controls(&self) -> bool {
        matches!(self, Self::Flip(_))
    }

    pub fn error_panel(&self) -> Option<&ErrorPanel> {
        match self {
            Self::Failed(panel) => Some(panel),
            _ => None,
        }
    }
}
