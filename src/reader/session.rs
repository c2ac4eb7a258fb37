//! Reader session state machine
//!
//! A session is pure state: user commands, timer ticks and async
//! completions go in, [`Effect`]s come out. Nothing here blocks or spawns;
//! [`ReaderService`](super::ReaderService) runs the effects.
//!
//! Every async operation carries a generation tag. Loads carry the session
//! [`SessionEpoch`], which changes when the book changes or the session
//! closes; renders carry a [`RequestId`] that only the slot which issued it
//! will accept.

use std::time::Instant;

use log::{debug, info, warn};

use super::gesture::TouchEvent;
use super::loader::{DocumentHandle, DocumentId, Resolution, resolve};
use super::navigation::{FlipIntent, NavState, Navigator};
use super::progress::ProgressDebouncer;
use super::raster::{SlotId, SlotKey, SlotTracker};
use super::request::{LoadJob, LoadResponse, RenderJob, RenderResponse, RequestId, SessionEpoch};
use super::view::{
    ErrorPanel, FlipView, HeaderView, PageSlotView, ReaderView, ScrollPageView, ScrollView,
    Scrubber,
};
use super::zoom::ZoomController;
use super::{ReaderConfig, ReaderError, ViewMode};
use crate::book::Book;

/// Scroll-mode pages kept around the visible ones
const SCROLL_KEEP_RADIUS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavKey {
    Left,
    Right,
}

/// User input to a session
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    NextPage,
    PrevPage,
    /// Jump to a page (1-based), clamped into range
    Seek(usize),
    /// Scroll mode: this page is now under the pointer/viewport
    ViewportPage(usize),
    /// Arrow keys; only honoured in flip mode
    Key(NavKey),
    ZoomIn,
    ZoomOut,
    Touch(TouchEvent),
    SetMode(ViewMode),
    ToggleMode,
    ToggleDarkMode,
    /// Scroll mode: pages (1-based) currently on screen
    SetVisiblePages(Vec<usize>),
    Exit,
}

/// Work for the host to carry out
#[derive(Clone, Debug)]
pub enum Effect {
    Load(LoadJob),
    Render(RenderJob),
    SaveProgress { book_id: String, page: usize },
    /// The document was closed; cached pages can go
    ReleaseDocument(DocumentId),
    Exit,
}

#[derive(Clone, Debug)]
pub enum LoadState {
    Loading,
    Failed(ReaderError),
    /// External-only book: no document, no page controls
    ExternalOnly,
    Ready(DocumentHandle),
}

pub struct ReaderSession {
    book: Book,
    config: ReaderConfig,
    epoch: SessionEpoch,
    next_request_id: u64,
    load: LoadState,
    navigator: Navigator,
    zoom: ZoomController,
    mode: ViewMode,
    dark_mode: bool,
    slots: SlotTracker,
    debouncer: ProgressDebouncer,
    /// Scroll mode: pages on screen, sorted
    visible: Vec<usize>,
    cue_started: Option<Instant>,
    closed: bool,
}

impl ReaderSession {
    /// Start a session for `book`; the effects contain the initial load
    pub fn open(book: Book, config: ReaderConfig) -> (Self, Vec<Effect>) {
        let mut session = Self {
            navigator: Navigator::new(book.resume_page()),
            debouncer: ProgressDebouncer::new(config.progress_debounce),
            mode: config.initial_mode,
            dark_mode: config.dark_mode,
            book,
            config,
            epoch: SessionEpoch(1),
            next_request_id: 0,
            load: LoadState::Loading,
            zoom: ZoomController::new(),
            slots: SlotTracker::new(),
            visible: Vec::new(),
            cue_started: None,
            closed: false,
        };
        let effects = session.start_load();
        (session, effects)
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn epoch(&self) -> SessionEpoch {
        self.epoch
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load
    }

    pub fn nav_state(&self) -> NavState {
        self.navigator.state()
    }

    pub fn current_page(&self) -> Option<usize> {
        self.navigator.current_page()
    }

    pub fn page_count(&self) -> usize {
        self.navigator.page_count()
    }

    pub fn flip_intent(&self) -> FlipIntent {
        self.navigator.flip_intent()
    }

    pub fn zoom_factor(&self) -> f32 {
        self.zoom.factor()
    }

    pub fn target_width(&self) -> u32 {
        self.zoom.target_width(self.config.base_page_width)
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn is_dark_mode(&self) -> bool {
        self.dark_mode
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn visible_pages(&self) -> &[usize] {
        &self.visible
    }

    pub fn has_pending_save(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn pending_renders(&self) -> usize {
        self.slots.pending()
    }

    pub fn document(&self) -> Option<&DocumentHandle> {
        match &self.load {
            LoadState::Ready(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn apply(&mut self, cmd: Command, now: Instant) -> Vec<Effect> {
        if self.closed {
            return vec![];
        }

        match cmd {
            Command::NextPage => {
                let changed = self.navigator.next_page();
                self.after_flip(changed, now)
            }

            Command::PrevPage => {
                let changed = self.navigator.prev_page();
                self.after_flip(changed, now)
            }

            Command::Seek(page) => {
                let changed = self.navigator.seek(page);
                self.after_flip(changed, now)
            }

            Command::Key(key) => {
                if self.mode != ViewMode::Flip {
                    return vec![];
                }
                match key {
                    NavKey::Left => self.apply(Command::PrevPage, now),
                    NavKey::Right => self.apply(Command::NextPage, now),
                }
            }

            Command::ViewportPage(page) => {
                if self.mode != ViewMode::Scroll || !self.navigator.follow_viewport(page) {
                    return vec![];
                }
                self.note_progress(now);
                self.sync_slots()
            }

            Command::ZoomIn => {
                if self.zoom.zoom_in() {
                    self.sync_slots()
                } else {
                    vec![]
                }
            }

            Command::ZoomOut => {
                if self.zoom.zoom_out() {
                    self.sync_slots()
                } else {
                    vec![]
                }
            }

            Command::Touch(event) => {
                if self.zoom.touch(&event) {
                    self.sync_slots()
                } else {
                    vec![]
                }
            }

            Command::SetMode(mode) => {
                if mode == self.mode {
                    return vec![];
                }
                self.mode = mode;
                if mode == ViewMode::Scroll && self.visible.is_empty() {
                    self.visible = self.navigator.current_page().into_iter().collect();
                }
                self.sync_slots()
            }

            Command::ToggleMode => self.apply(Command::SetMode(self.mode.toggled()), now),

            Command::ToggleDarkMode => {
                self.dark_mode = !self.dark_mode;
                vec![]
            }

            Command::SetVisiblePages(mut pages) => {
                let page_count = self.navigator.page_count();
                pages.retain(|page| (1..=page_count).contains(page));
                pages.sort_unstable();
                pages.dedup();
                if pages == self.visible {
                    return vec![];
                }
                self.visible = pages;
                if self.mode == ViewMode::Scroll {
                    self.sync_slots()
                } else {
                    vec![]
                }
            }

            Command::Exit => {
                let mut effects = self.close();
                effects.push(Effect::Exit);
                effects
            }
        }
    }

    /// Timers: the progress debounce and the flip cue
    pub fn tick(&mut self, now: Instant) -> Vec<Effect> {
        let cue_done = self
            .cue_started
            .is_some_and(|started| now.duration_since(started) >= self.config.flip_cue);
        if cue_done {
            self.navigator.clear_flip_intent();
            self.cue_started = None;
        }

        match self.debouncer.poll(now) {
            Some(page) => vec![self.save(page)],
            None => vec![],
        }
    }

    /// Apply a finished load; results from an older epoch are dropped
    pub fn on_load_completed(&mut self, response: LoadResponse, now: Instant) -> Vec<Effect> {
        if self.closed || response.epoch != self.epoch {
            debug!(
                "Dropping load result for epoch {:?} (live {:?})",
                response.epoch, self.epoch
            );
            return vec![];
        }
        if !matches!(self.load, LoadState::Loading) {
            return vec![];
        }

        match response.result {
            Ok(handle) if handle.page_count() == 0 => {
                warn!("Document for '{}' has no pages", self.book.title);
                self.fail(ReaderError::load_failed(
                    "Unable to load PDF. It might be blocked or invalid. (document has no pages)",
                    self.book.original_link().map(str::to_string),
                ));
                vec![]
            }

            Ok(handle) => {
                let start = self.navigator.ready(handle.page_count());
                info!(
                    "Reader ready: '{}' at page {start} of {}",
                    self.book.title,
                    handle.page_count()
                );
                if self.navigator.start_was_clamped() {
                    self.debouncer.note(start, now);
                }
                self.load = LoadState::Ready(handle);
                if self.mode == ViewMode::Scroll && self.visible.is_empty() {
                    self.visible = vec![start];
                }
                self.sync_slots()
            }

            Err(e) => {
                self.fail(e);
                vec![]
            }
        }
    }

    /// Apply a finished render; returns true when something visible changed
    pub fn on_render_response(&mut self, response: RenderResponse) -> bool {
        match response {
            RenderResponse::Page { id, key, surface } => {
                if self.slots.complete(id, Ok(surface)).is_some() {
                    return true;
                }
                debug!("Dropping stale render of page {}", key.page_index + 1);
                false
            }

            RenderResponse::Failed { id, key, detail } => {
                let error = ReaderError::PageRenderFailed {
                    page: key.page_index + 1,
                    detail,
                };
                if self.slots.complete(id, Err(error.to_string())).is_some() {
                    warn!("{error}");
                    return true;
                }
                false
            }

            RenderResponse::Skipped(id) => {
                self.slots.abandon(id);
                false
            }
        }
    }

    /// Open another book in this session.
    ///
    /// The old book's pending save is flushed and everything in flight for
    /// it becomes stale.
    pub fn switch_book(&mut self, book: Book) -> Vec<Effect> {
        let mut effects = self.teardown();
        info!("Switching reader to '{}'", book.title);

        self.navigator = Navigator::new(book.resume_page());
        self.book = book;
        self.zoom = ZoomController::new();
        self.mode = self.config.initial_mode;
        self.dark_mode = self.config.dark_mode;
        self.visible.clear();
        self.closed = false;
        effects.extend(self.start_load());
        effects
    }

    pub fn header(&self) -> HeaderView {
        HeaderView {
            title: self.book.title.clone(),
            author: self.book.author.clone(),
            zoom_percent: self.zoom.percent(),
            dark_mode: self.dark_mode,
            mode: self.mode,
            original_link: self.book.original_link().map(str::to_string),
            show_original: self.book.has_external_affordance(),
        }
    }

    pub fn view(&self) -> ReaderView {
        let handle = match &self.load {
            LoadState::Loading => {
                return ReaderView::Loading {
                    mode: self.mode,
                    skeletons: match self.mode {
                        ViewMode::Flip => 1,
                        ViewMode::Scroll => 2,
                    },
                };
            }
            LoadState::Failed(e) => {
                return ReaderView::Failed(ErrorPanel {
                    title: e.title().to_string(),
                    message: e.to_string(),
                    open_original: e.original_link().map(str::to_string),
                });
            }
            LoadState::ExternalOnly => {
                return ReaderView::ExternalOnly {
                    link: self.book.original_link().map(str::to_string),
                };
            }
            LoadState::Ready(handle) => handle,
        };

        let NavState::Ready {
            current_page,
            page_count,
        } = self.navigator.state()
        else {
            return ReaderView::Loading {
                mode: self.mode,
                skeletons: 1,
            };
        };
        let target_width = self.target_width();
        let slot_view = |slot: SlotId, page: usize| PageSlotView {
            page,
            state: self.slots.state(slot).clone(),
            aspect: handle.page_size(page - 1).aspect(),
            target_width,
        };

        match self.mode {
            ViewMode::Flip => ReaderView::Flip(FlipView {
                page: slot_view(SlotId::Flip, current_page),
                current_page,
                page_count,
                can_prev: self.navigator.can_go_back(),
                can_next: self.navigator.can_go_forward(),
                scrubber: Scrubber {
                    value: current_page,
                    max: page_count,
                },
                cue: self.navigator.flip_intent(),
            }),
            ViewMode::Scroll => ReaderView::Scroll(ScrollView {
                pages: (1..=page_count)
                    .map(|page| ScrollPageView {
                        slot: slot_view(SlotId::Scroll(page), page),
                        highlighted: page == current_page,
                    })
                    .collect(),
                current_page,
                page_count,
            }),
        }
    }

    fn start_load(&mut self) -> Vec<Effect> {
        match resolve(&self.book) {
            Ok(Resolution::Fetch(content)) => {
                self.load = LoadState::Loading;
                debug!("Loading '{}' ({})", self.book.title, content.kind());
                vec![Effect::Load(LoadJob {
                    epoch: self.epoch,
                    document: DocumentId::fresh(),
                    content,
                    original: self.book.original_link().map(str::to_string),
                })]
            }
            Ok(Resolution::ExternalOnly) => {
                info!("'{}' is external only", self.book.title);
                self.load = LoadState::ExternalOnly;
                vec![]
            }
            Err(e) => {
                warn!("Cannot open '{}': {e}", self.book.title);
                self.fail(e);
                vec![]
            }
        }
    }

    fn fail(&mut self, error: ReaderError) {
        self.navigator.fail();
        self.load = LoadState::Failed(error);
    }

    /// End the session: flush progress, invalidate in-flight work
    fn close(&mut self) -> Vec<Effect> {
        let effects = self.teardown();
        self.closed = true;
        effects
    }

    fn teardown(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(page) = self.debouncer.flush() {
            effects.push(self.save(page));
        }
        if let LoadState::Ready(handle) = &self.load {
            effects.push(Effect::ReleaseDocument(handle.id()));
        }
        self.epoch = self.epoch.next();
        self.load = LoadState::Loading;
        self.slots.clear();
        self.cue_started = None;
        effects
    }

    fn after_flip(&mut self, changed: bool, now: Instant) -> Vec<Effect> {
        if !changed {
            return vec![];
        }
        self.cue_started = Some(now);
        self.note_progress(now);
        self.sync_slots()
    }

    fn note_progress(&mut self, now: Instant) {
        if let Some(page) = self.navigator.current_page() {
            self.debouncer.note(page, now);
        }
    }

    fn save(&self, page: usize) -> Effect {
        debug!("Saving progress for '{}': page {page}", self.book.id);
        Effect::SaveProgress {
            book_id: self.book.id.clone(),
            page,
        }
    }

    /// Point every visible slot at what it should show, issuing renders
    /// for slots whose key changed
    fn sync_slots(&mut self) -> Vec<Effect> {
        let LoadState::Ready(handle) = &self.load else {
            return vec![];
        };
        let Some(current_page) = self.navigator.current_page() else {
            return vec![];
        };

        let wanted: Vec<(SlotId, usize)> = match self.mode {
            ViewMode::Flip => vec![(SlotId::Flip, current_page)],
            ViewMode::Scroll => {
                let visible = &self.visible;
                self.slots.retain(|slot| match slot {
                    SlotId::Flip => true,
                    SlotId::Scroll(page) => visible.iter().any(|v| v.abs_diff(page) <= SCROLL_KEEP_RADIUS),
                });
                visible.iter().map(|page| (SlotId::Scroll(*page), *page)).collect()
            }
        };

        let target_width = Some(self.zoom.target_width(self.config.base_page_width));
        let next_request_id = &mut self.next_request_id;
        let mut effects = Vec::new();
        for (slot, page) in wanted {
            let key = SlotKey {
                document: handle.id(),
                page_index: page - 1,
                target_width,
            };
            let issued = self.slots.request(slot, key, || {
                *next_request_id += 1;
                RequestId::new(*next_request_id)
            });
            if let Some(id) = issued {
                effects.push(Effect::Render(RenderJob {
                    id,
                    epoch: self.epoch,
                    key,
                    handle: handle.clone(),
                    base_scale: self.config.base_render_scale,
                }));
            }
        }
        effects
    }
}
