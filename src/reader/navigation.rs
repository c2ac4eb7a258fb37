//! Page navigation state machine
//!
//! Pages are 1-based here; the rasterizer works with 0-based indices.

/// Direction of the last explicit page turn, used only for the transition cue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FlipIntent {
    #[default]
    None,
    Forward,
    Backward,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavState {
    Loading,
    Error,
    Ready {
        current_page: usize,
        page_count: usize,
    },
}

/// Owns the current page, page count and flip intent of a session
#[derive(Debug)]
pub struct Navigator {
    state: NavState,
    /// Page to restore once the page count is known
    inherited_page: usize,
    flip: FlipIntent,
}

impl Navigator {
    pub fn new(inherited_page: usize) -> Self {
        Self {
            state: NavState::Loading,
            inherited_page: inherited_page.max(1),
            flip: FlipIntent::None,
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn flip_intent(&self) -> FlipIntent {
        self.flip
    }

    pub fn clear_flip_intent(&mut self) {
        self.flip = FlipIntent::None;
    }

    pub fn current_page(&self) -> Option<usize> {
        match self.state {
            NavState::Ready { current_page, .. } => Some(current_page),
            _ => None,
        }
    }

    pub fn page_count(&self) -> usize {
        match self.state {
            NavState::Ready { page_count, .. } => page_count,
            _ => 0,
        }
    }

    pub fn can_go_back(&self) -> bool {
        self.current_page().is_some_and(|page| page > 1)
    }

    pub fn can_go_forward(&self) -> bool {
        match self.state {
            NavState::Ready {
                current_page,
                page_count,
            } => current_page < page_count,
            _ => false,
        }
    }

    /// `Loading → Ready`; returns the starting page.
    ///
    /// The inherited page is clamped into `[1, page_count]`.
    pub fn ready(&mut self, page_count: usize) -> usize {
        let current_page = self.inherited_page.clamp(1, page_count.max(1));
        self.state = NavState::Ready {
            current_page,
            page_count,
        };
        self.flip = FlipIntent::None;
        current_page
    }

    /// `Loading → Error`
    pub fn fail(&mut self) {
        self.state = NavState::Error;
        self.flip = FlipIntent::None;
    }

    /// Whether the starting page differs from the one the book remembered
    pub fn start_was_clamped(&self) -> bool {
        self.current_page()
            .is_some_and(|page| page != self.inherited_page)
    }

    pub fn next_page(&mut self) -> bool {
        if !self.can_go_forward() {
            return false;
        }
        self.move_to(self.current_page().unwrap_or(1) + 1, FlipIntent::Forward)
    }

    pub fn prev_page(&mut self) -> bool {
        if !self.can_go_back() {
            return false;
        }
        self.move_to(self.current_page().unwrap_or(1) - 1, FlipIntent::Backward)
    }

    /// Jump to `page`, clamped into range; intent follows the direction
    pub fn seek(&mut self, page: usize) -> bool {
        let NavState::Ready {
            current_page,
            page_count,
        } = self.state
        else {
            return false;
        };
        let target = page.clamp(1, page_count.max(1));
        let intent = if target > current_page {
            FlipIntent::Forward
        } else {
            FlipIntent::Backward
        };
        self.move_to(target, intent)
    }

    /// The page under the viewport changed (scroll mode); no flip cue
    pub fn follow_viewport(&mut self, page: usize) -> bool {
        let NavState::Ready { page_count, .. } = self.state else {
            return false;
        };
        if page == 0 || page > page_count {
            return false;
        }
        self.move_to(page, self.flip)
    }

    fn move_to(&mut self, page: usize, intent: FlipIntent) -> bool {
        let NavState::Ready {
            current_page,
            page_count,
        } = self.state
        else {
            return false;
        };
        if page == current_page {
            return false;
        }
        self.state = NavState::Ready {
            current_page: page,
            page_count,
        };
        self.flip = intent;
        true
    }
}
