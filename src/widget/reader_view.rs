//! Reader pane
//!
//! Draws a [`ReaderView`] into the terminal with half-block cells and turns
//! keyboard and mouse input into reader commands. Page geometry from the
//! last frame is kept so scrolling, hit testing and the scrubber work
//! against what the user actually sees.

use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    Frame,
    buffer::Buffer,
    layout::{Constraint, Flex, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use crate::reader::{
    Command, ErrorPanel, FlipIntent, FlipView, HeaderView, NavKey, PageSlotView, RasterSurface,
    ReaderView, ScrollView, Scrubber, SlotState, ViewMode,
};
use crate::theme::{Base16Palette, palette};

/// Rendered pixels per terminal column
pub const PIXELS_PER_CELL: f32 = 10.0;
/// Blank rows between pages in scroll mode
const SEPARATOR_ROWS: u32 = 1;
const LINE_STEP: u32 = 2;
const WHEEL_STEP: u32 = 3;
/// Pages are dimmed this much in dark mode
const DARK_MODE_BRIGHTNESS: f32 = 0.9;
const HALF_BLOCK: char = '▀';

/// What the host should do after an input event
#[derive(Clone, Debug, PartialEq)]
pub enum PaneAction {
    Command(Command),
    OpenLink(String),
    Redraw,
}

/// Terminal columns a page rendered at `target_width` pixels occupies
pub fn page_columns(target_width: u32) -> u16 {
    ((target_width as f32 / PIXELS_PER_CELL).round() as u16).max(1)
}

/// Terminal rows for a page `columns` wide; every row holds two pixels
pub fn page_rows(columns: u16, aspect: f32) -> u32 {
    ((f32::from(columns) * aspect / 2.0).ceil() as u32).max(1)
}

#[derive(Clone, Copy, Debug)]
struct PagePlacement {
    page: usize,
    /// First row of the page in document coordinates
    top: u32,
    rows: u32,
}

/// Screen regions from the last frame
#[derive(Default)]
struct Hitboxes {
    pages: Vec<(usize, Rect)>,
    prev: Option<Rect>,
    next: Option<Rect>,
    scrubber: Option<(Rect, Scrubber)>,
}

#[derive(Default)]
pub struct ReaderPane {
    mode: Option<ViewMode>,
    /// Scroll mode: first document row on screen
    scroll_offset: u32,
    /// Flip mode: first page row on screen when the page is taller than the body
    pan_offset: u32,
    /// Page the pane has positioned itself for
    synced_page: Option<usize>,
    synced_width: Option<u32>,
    placements: Vec<PagePlacement>,
    body: Rect,
    flip_rows: u32,
    hitboxes: Hitboxes,
    visible: Vec<usize>,
    reported_visible: Option<Vec<usize>>,
    goto_input: Option<String>,
    open_link: Option<String>,
}

impl ReaderPane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_goto_active(&self) -> bool {
        self.goto_input.is_some()
    }

    /// Pages on screen in the last frame
    pub fn visible_pages(&self) -> &[usize] {
        &self.visible
    }

    /// Visible pages if they changed since the last call
    pub fn take_visible_update(&mut self) -> Option<Vec<usize>> {
        if self.reported_visible.as_ref() == Some(&self.visible) {
            return None;
        }
        self.reported_visible = Some(self.visible.clone());
        Some(self.visible.clone())
    }

    /// Forget positioning state, e.g. when another book is opened
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn handle_event(&mut self, event: &Event) -> Option<PaneAction> {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => self.handle_key(*key),
            Event::Mouse(mouse) => self.handle_mouse(*mouse),
            _ => None,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<PaneAction> {
        if self.goto_input.is_some() {
            return self.handle_goto_key(key);
        }

        let command = |c| Some(PaneAction::Command(c));
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => command(Command::Exit),
            KeyCode::Left | KeyCode::Char('h') => command(Command::Key(NavKey::Left)),
            KeyCode::Right | KeyCode::Char('l') => command(Command::Key(NavKey::Right)),
            KeyCode::Char('+') | KeyCode::Char('=') => command(Command::ZoomIn),
            KeyCode::Char('-') => command(Command::ZoomOut),
            KeyCode::Char('m') => command(Command::ToggleMode),
            KeyCode::Char('d') => command(Command::ToggleDarkMode),
            KeyCode::Char('g') => {
                self.goto_input = Some(String::new());
                Some(PaneAction::Redraw)
            }
            KeyCode::Char('o') => self.open_link.clone().map(PaneAction::OpenLink),
            KeyCode::Char('j') | KeyCode::Down => self.scroll_down(LINE_STEP),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_up(LINE_STEP),
            KeyCode::PageDown | KeyCode::Char(' ') => self.scroll_down(self.page_step()),
            KeyCode::PageUp => self.scroll_up(self.page_step()),
            _ => None,
        }
    }

    fn handle_goto_key(&mut self, key: KeyEvent) -> Option<PaneAction> {
        let input = self.goto_input.as_mut()?;
        match key.code {
            KeyCode::Char(c) if c.is_ascii_digit() => {
                if input.len() < 6 {
                    input.push(c);
                }
                Some(PaneAction::Redraw)
            }
            KeyCode::Backspace => {
                input.pop();
                Some(PaneAction::Redraw)
            }
            KeyCode::Enter => {
                let page = self.goto_input.take()?.parse::<usize>().ok();
                match page {
                    Some(page) => Some(PaneAction::Command(Command::Seek(page))),
                    None => Some(PaneAction::Redraw),
                }
            }
            KeyCode::Esc => {
                self.goto_input = None;
                Some(PaneAction::Redraw)
            }
            _ => None,
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) -> Option<PaneAction> {
        let zoom = mouse.modifiers.contains(KeyModifiers::CONTROL);
        match mouse.kind {
            MouseEventKind::ScrollDown if zoom => Some(PaneAction::Command(Command::ZoomOut)),
            MouseEventKind::ScrollUp if zoom => Some(PaneAction::Command(Command::ZoomIn)),
            MouseEventKind::ScrollDown => self.scroll_down(WHEEL_STEP),
            MouseEventKind::ScrollUp => self.scroll_up(WHEEL_STEP),
            MouseEventKind::Moved => {
                if self.mode != Some(ViewMode::Scroll) {
                    return None;
                }
                let page = self.page_at(mouse.column, mouse.row)?;
                self.follow(page)
            }
            MouseEventKind::Down(MouseButton::Left) => self.handle_click(mouse.column, mouse.row),
            _ => None,
        }
    }

    fn handle_click(&mut self, column: u16, row: u16) -> Option<PaneAction> {
        let position = Position::new(column, row);
        let hit = |rect: Option<Rect>| rect.is_some_and(|r| r.contains(position));

        if hit(self.hitboxes.prev) {
            return Some(PaneAction::Command(Command::PrevPage));
        }
        if hit(self.hitboxes.next) {
            return Some(PaneAction::Command(Command::NextPage));
        }
        let (rect, scrubber) = self.hitboxes.scrubber?;
        if !rect.contains(position) {
            return None;
        }
        let span = f32::from(rect.width.saturating_sub(1).max(1));
        let fraction = f32::from(column - rect.x) / span;
        Some(PaneAction::Command(Command::Seek(scrubber.page_at(fraction))))
    }

    fn page_at(&self, column: u16, row: u16) -> Option<usize> {
        let position = Position::new(column, row);
        self.hitboxes
            .pages
            .iter()
            .find(|(_, rect)| rect.contains(position))
            .map(|(page, _)| *page)
    }

    fn page_step(&self) -> u32 {
        u32::from(self.body.height).saturating_sub(2).max(1)
    }

    fn scroll_down(&mut self, rows: u32) -> Option<PaneAction> {
        match self.mode? {
            ViewMode::Scroll => {
                self.scroll_offset = (self.scroll_offset + rows).min(self.max_scroll());
                self.follow_viewport()
            }
            ViewMode::Flip => {
                let max_pan = self.flip_rows.saturating_sub(u32::from(self.body.height));
                self.pan_offset = (self.pan_offset + rows).min(max_pan);
                Some(PaneAction::Redraw)
            }
        }
    }

    fn scroll_up(&mut self, rows: u32) -> Option<PaneAction> {
        match self.mode? {
            ViewMode::Scroll => {
                self.scroll_offset = self.scroll_offset.saturating_sub(rows);
                self.follow_viewport()
            }
            ViewMode::Flip => {
                self.pan_offset = self.pan_offset.saturating_sub(rows);
                Some(PaneAction::Redraw)
            }
        }
    }

    fn max_scroll(&self) -> u32 {
        let total = self
            .placements
            .last()
            .map_or(0, |last| last.top + last.rows);
        total.saturating_sub(u32::from(self.body.height))
    }

    /// Page under the top third of the viewport
    fn viewport_page(&self) -> Option<usize> {
        let anchor = self.scroll_offset + u32::from(self.body.height) / 3;
        self.placements
            .iter()
            .take_while(|p| p.top <= anchor)
            .last()
            .map(|p| p.page)
    }

    fn follow_viewport(&mut self) -> Option<PaneAction> {
        match self.viewport_page() {
            Some(page) => self.follow(page).or(Some(PaneAction::Redraw)),
            None => Some(PaneAction::Redraw),
        }
    }

    fn follow(&mut self, page: usize) -> Option<PaneAction> {
        if self.synced_page == Some(page) {
            return None;
        }
        self.synced_page = Some(page);
        Some(PaneAction::Command(Command::ViewportPage(page)))
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect, header: &HeaderView, view: &ReaderView) {
        let palette = palette(header.dark_mode);
        let [header_area, body, footer] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .areas(area);

        f.render_widget(
            Block::default().style(Style::default().bg(palette.base_00)),
            area,
        );
        self.body = body;
        self.hitboxes = Hitboxes::default();
        self.open_link = header
            .show_original
            .then(|| header.original_link.clone())
            .flatten();

        self.render_header(f, header_area, header, palette);

        match view {
            ReaderView::Loading { mode, skeletons } => {
                self.enter_mode(*mode);
                self.visible.clear();
                render_loading(f, body, *skeletons, palette);
                self.render_status(f, footer, "Loading document", palette);
            }
            ReaderView::Failed(panel) => {
                self.visible.clear();
                if panel.open_original.is_some() {
                    self.open_link = panel.open_original.clone();
                }
                render_error_panel(f, body, panel, palette);
                self.render_status(f, footer, "q: back to library", palette);
            }
            ReaderView::ExternalOnly { link } => {
                self.visible.clear();
                self.open_link = link.clone();
                render_external(f, body, link.as_deref(), palette);
                self.render_status(f, footer, "q: back to library", palette);
            }
            ReaderView::Flip(flip) => {
                self.enter_mode(ViewMode::Flip);
                self.render_flip(f.buffer_mut(), body, flip, header.dark_mode, palette);
                self.render_flip_footer(f, footer, flip, palette);
            }
            ReaderView::Scroll(scroll) => {
                self.enter_mode(ViewMode::Scroll);
                self.render_scroll(f.buffer_mut(), body, scroll, header.dark_mode, palette);
                let status = format!(
                    "Page {} of {}   j/k scroll  m flip mode  g go to  q back",
                    scroll.current_page, scroll.page_count
                );
                self.render_status(f, footer, &status, palette);
            }
        }

        if let Some(input) = &self.goto_input {
            render_goto_modal(f, body, input, palette);
        }
    }

    fn enter_mode(&mut self, mode: ViewMode) {
        if self.mode != Some(mode) {
            self.mode = Some(mode);
            self.synced_page = None;
            self.pan_offset = 0;
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect, header: &HeaderView, palette: &Base16Palette) {
        let muted = Style::default().fg(palette.base_04).bg(palette.base_01);
        let mut spans = vec![Span::styled(
            format!(" {}", header.title),
            Style::default()
                .fg(palette.base_06)
                .bg(palette.base_01)
                .add_modifier(Modifier::BOLD),
        )];
        if !header.author.is_empty() {
            spans.push(Span::styled(format!(" · {}", header.author), muted));
        }
        spans.push(Span::styled(
            format!(
                "   {}%  {}  {}",
                header.zoom_percent,
                header.mode.as_str(),
                if header.dark_mode { "Dark" } else { "Light" }
            ),
            muted,
        ));
        if header.show_original {
            spans.push(Span::styled(
                "  [o] original",
                Style::default().fg(palette.base_0d).bg(palette.base_01),
            ));
        }
        f.render_widget(
            Paragraph::new(Line::from(spans)).style(Style::default().bg(palette.base_01)),
            area,
        );
    }

    fn render_status(&self, f: &mut Frame, area: Rect, text: &str, palette: &Base16Palette) {
        f.render_widget(
            Paragraph::new(format!(" {text}"))
                .style(Style::default().fg(palette.base_04).bg(palette.base_01)),
            area,
        );
    }

    fn render_flip(
        &mut self,
        buf: &mut Buffer,
        body: Rect,
        flip: &FlipView,
        dark_mode: bool,
        palette: &Base16Palette,
    ) {
        if self.synced_page != Some(flip.current_page)
            || self.synced_width != Some(flip.page.target_width)
        {
            self.synced_page = Some(flip.current_page);
            self.synced_width = Some(flip.page.target_width);
            self.pan_offset = 0;
        }

        let columns = page_columns(flip.page.target_width);
        let rows = page_rows(columns, flip.page.aspect);
        self.flip_rows = rows;
        self.placements.clear();
        self.pan_offset = self
            .pan_offset
            .min(rows.saturating_sub(u32::from(body.height)));

        let left = centered_left(body, columns);
        let top = if rows < u32::from(body.height) {
            i32::from(body.y) + (i32::from(body.height) - rows as i32) / 2
        } else {
            i32::from(body.y) - self.pan_offset as i32
        };
        let rect = draw_page(buf, body, left, top, columns, rows, &flip.page, dark_mode, palette);
        self.hitboxes.pages = rect.map(|r| (flip.page.page, r)).into_iter().collect();
        self.visible = vec![flip.current_page];
    }

    fn render_flip_footer(&mut self, f: &mut Frame, area: Rect, flip: &FlipView, palette: &Base16Palette) {
        let enabled = Style::default().fg(palette.base_0d).bg(palette.base_01);
        let disabled = Style::default().fg(palette.base_03).bg(palette.base_01);
        let label = format!(" Page {} of {} ", flip.current_page, flip.page_count);
        let cue = match flip.cue {
            FlipIntent::Forward => " »",
            FlipIntent::Backward => " «",
            FlipIntent::None => "  ",
        };

        let [prev, track, next, info] = Layout::horizontal([
            Constraint::Length(3),
            Constraint::Min(4),
            Constraint::Length(3),
            Constraint::Length((label.len() + cue.len() + 1) as u16),
        ])
        .areas(area);

        f.render_widget(
            Paragraph::new(" ◀ ").style(if flip.can_prev { enabled } else { disabled }),
            prev,
        );
        f.render_widget(
            Paragraph::new(" ▶ ").style(if flip.can_next { enabled } else { disabled }),
            next,
        );
        f.render_widget(
            Paragraph::new(scrubber_line(flip.scrubber, track.width, palette)),
            track,
        );
        f.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(label, Style::default().fg(palette.base_05).bg(palette.base_01)),
                Span::styled(cue, Style::default().fg(palette.base_0a).bg(palette.base_01)),
            ])),
            info,
        );

        if flip.can_prev {
            self.hitboxes.prev = Some(prev);
        }
        if flip.can_next {
            self.hitboxes.next = Some(next);
        }
        self.hitboxes.scrubber = Some((track, flip.scrubber));
    }

    fn render_scroll(
        &mut self,
        buf: &mut Buffer,
        body: Rect,
        scroll: &ScrollView,
        dark_mode: bool,
        palette: &Base16Palette,
    ) {
        let width = scroll.pages.first().map_or(0, |p| p.slot.target_width);
        let columns = page_columns(width);

        let mut top = 0;
        self.placements = scroll
            .pages
            .iter()
            .map(|p| {
                let rows = page_rows(columns, p.slot.aspect);
                let placement = PagePlacement {
                    page: p.slot.page,
                    top,
                    rows,
                };
                top += rows + SEPARATOR_ROWS;
                placement
            })
            .collect();

        // Jump to the session's page after a seek, a mode switch or a zoom change
        if self.synced_page != Some(scroll.current_page) || self.synced_width != Some(width) {
            self.synced_page = Some(scroll.current_page);
            self.synced_width = Some(width);
            if let Some(p) = self.placements.iter().find(|p| p.page == scroll.current_page) {
                self.scroll_offset = p.top;
            }
        }
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());

        let left = centered_left(body, columns);
        let view_top = self.scroll_offset;
        let view_bottom = view_top + u32::from(body.height);
        self.visible.clear();

        for (placement, page) in self.placements.iter().zip(&scroll.pages) {
            if placement.top + placement.rows <= view_top || placement.top >= view_bottom {
                continue;
            }
            let top = i32::from(body.y) + placement.top as i32 - view_top as i32;
            if let Some(rect) = draw_page(
                buf,
                body,
                left,
                top,
                columns,
                placement.rows,
                &page.slot,
                dark_mode,
                palette,
            ) {
                if page.highlighted {
                    draw_highlight(buf, body, rect, palette);
                }
                self.hitboxes.pages.push((placement.page, rect));
            }
            self.visible.push(placement.page);
        }
    }
}

/// Left column of a page centred in `body`; negative when it is wider
fn centered_left(body: Rect, columns: u16) -> i32 {
    i32::from(body.x) + (i32::from(body.width) - i32::from(columns)) / 2
}

/// Draw one page with its top-left corner at (`left`, `top`), clipped to
/// `clip`. Returns the on-screen rectangle it covers.
#[allow(clippy::too_many_arguments)]
fn draw_page(
    buf: &mut Buffer,
    clip: Rect,
    left: i32,
    top: i32,
    columns: u16,
    rows: u32,
    slot: &PageSlotView,
    dark_mode: bool,
    palette: &Base16Palette,
) -> Option<Rect> {
    let x0 = left.max(i32::from(clip.x));
    let y0 = top.max(i32::from(clip.y));
    let x1 = (left + i32::from(columns)).min(i32::from(clip.right()));
    let y1 = (top + rows as i32).min(i32::from(clip.bottom()));
    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    let rect = Rect::new(x0 as u16, y0 as u16, (x1 - x0) as u16, (y1 - y0) as u16);

    match &slot.state {
        SlotState::Rendered(surface) => {
            for y in y0..y1 {
                for x in x0..x1 {
                    let column = (x - left) as u32;
                    let row = (y - top) as u32;
                    let upper = sample(surface, column, row * 2, columns, rows, dark_mode);
                    let lower = sample(surface, column, row * 2 + 1, columns, rows, dark_mode);
                    buf[(x as u16, y as u16)]
                        .set_char(HALF_BLOCK)
                        .set_fg(upper)
                        .set_bg(lower);
                }
            }
        }
        SlotState::Skeleton => {
            fill(buf, rect, palette.skeleton());
            label(
                buf,
                rect,
                &format!("Loading page {}", slot.page),
                Style::default().fg(palette.base_04).bg(palette.skeleton()),
            );
        }
        SlotState::Failed(detail) => {
            fill(buf, rect, palette.base_01);
            label(
                buf,
                rect,
                &format!("Page {} could not be rendered: {detail}", slot.page),
                Style::default().fg(palette.base_08).bg(palette.base_01),
            );
        }
    }
    Some(rect)
}

/// Nearest-neighbour pixel for a half-cell of the page grid
fn sample(
    surface: &RasterSurface,
    column: u32,
    half_row: u32,
    columns: u16,
    rows: u32,
    dark_mode: bool,
) -> Color {
    let sx = ((column as f32 + 0.5) * surface.width as f32 / f32::from(columns)) as u32;
    let sy = ((half_row as f32 + 0.5) * surface.height as f32 / (rows * 2) as f32) as u32;
    let [r, g, b] = surface
        .pixel(sx.min(surface.width.saturating_sub(1)), sy.min(surface.height.saturating_sub(1)))
        .unwrap_or([255, 255, 255]);
    if dark_mode {
        let dim = |c: u8| (f32::from(c) * DARK_MODE_BRIGHTNESS).round() as u8;
        Color::Rgb(dim(r), dim(g), dim(b))
    } else {
        Color::Rgb(r, g, b)
    }
}

fn fill(buf: &mut Buffer, rect: Rect, color: Color) {
    buf.set_style(rect, Style::default().bg(color));
    for y in rect.top()..rect.bottom() {
        for x in rect.left()..rect.right() {
            buf[(x, y)].set_char(' ');
        }
    }
}

/// Centered single-line label inside `rect`
fn label(buf: &mut Buffer, rect: Rect, text: &str, style: Style) {
    let width = text.chars().count().min(rect.width as usize) as u16;
    let x = rect.x + (rect.width - width) / 2;
    let y = rect.y + rect.height / 2;
    buf.set_stringn(x, y, text, width as usize, style);
}

/// Bar in the column left of the highlighted page, or over its first
/// column when the page fills the body
fn draw_highlight(buf: &mut Buffer, body: Rect, page: Rect, palette: &Base16Palette) {
    let x = if page.x > body.x { page.x - 1 } else { page.x };
    for y in page.top()..page.bottom() {
        buf[(x, y)]
            .set_char('┃')
            .set_fg(palette.highlight())
            .set_bg(palette.base_00);
    }
}

fn scrubber_line(scrubber: Scrubber, width: u16, palette: &Base16Palette) -> Line<'static> {
    let width = usize::from(width.max(1));
    let knob = (scrubber.fraction() * (width - 1) as f32).round() as usize;
    let track = Style::default().fg(palette.base_03).bg(palette.base_01);
    Line::from(vec![
        Span::styled("─".repeat(knob), track),
        Span::styled("●", Style::default().fg(palette.base_0d).bg(palette.base_01)),
        Span::styled("─".repeat(width - 1 - knob), track),
    ])
}

fn render_loading(f: &mut Frame, body: Rect, skeletons: usize, palette: &Base16Palette) {
    const LOADING_STR: &str = "[ LOADING ]";
    let count = skeletons.max(1) as u32;
    let parts = Layout::vertical(vec![Constraint::Ratio(1, count); count as usize]).split(body);

    for part in parts.iter() {
        let width = (part.height.saturating_mul(3) / 2).clamp(1, part.width);
        let [page] = Layout::horizontal([Constraint::Length(width)])
            .flex(Flex::Center)
            .areas(part.inner(ratatui::layout::Margin::new(0, 1)));
        fill(f.buffer_mut(), page, palette.skeleton());
    }

    let [label_area] = Layout::horizontal([Constraint::Length(LOADING_STR.len() as u16)])
        .flex(Flex::Center)
        .areas(Rect::new(body.x, body.y + body.height / 2, body.width, 1));
    f.render_widget(
        Span::styled(
            LOADING_STR,
            Style::new()
                .fg(palette.base_06)
                .bg(palette.base_01)
                .add_modifier(Modifier::BOLD),
        ),
        label_area,
    );
}

fn centered_panel(area: Rect, lines: u16) -> Rect {
    let width = 60u16.min(area.width.saturating_sub(4)).max(1);
    let height = (lines + 2).min(area.height).max(1);
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}

fn render_panel(
    f: &mut Frame,
    area: Rect,
    title: &str,
    lines: Vec<Line<'static>>,
    accent: Color,
    palette: &Base16Palette,
) {
    let panel = centered_panel(area, lines.len() as u16 + 2);
    f.render_widget(Clear, panel);
    f.render_widget(
        Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(accent))
                    .title(format!(" {title} "))
                    .title_style(Style::default().fg(accent).add_modifier(Modifier::BOLD))
                    .style(Style::default().bg(palette.base_01)),
            )
            .style(Style::default().fg(palette.base_05).bg(palette.base_01))
            .wrap(Wrap { trim: false }),
        panel,
    );
}

fn render_error_panel(f: &mut Frame, body: Rect, panel: &ErrorPanel, palette: &Base16Palette) {
    let mut lines = vec![Line::from(panel.message.clone()), Line::from("")];
    lines.push(Line::from("q: back to library"));
    if panel.open_original.is_some() {
        lines.push(Line::from("o: open original"));
    }
    render_panel(f, body, &panel.title, lines, palette.base_08, palette);
}

fn render_external(f: &mut Frame, body: Rect, link: Option<&str>, palette: &Base16Palette) {
    let mut lines = vec![Line::from("This book is read outside the app.")];
    if let Some(link) = link {
        lines.push(Line::from(""));
        lines.push(Line::styled(
            link.to_string(),
            Style::default().fg(palette.base_0d).add_modifier(Modifier::UNDERLINED),
        ));
        lines.push(Line::from(""));
        lines.push(Line::from("o: open original"));
    }
    lines.push(Line::from("q: back to library"));
    render_panel(f, body, "External Book", lines, palette.base_0d, palette);
}

fn render_goto_modal(f: &mut Frame, body: Rect, input: &str, palette: &Base16Palette) {
    let lines = vec![
        Line::from(format!("Page: {input}_")),
        Line::from(""),
        Line::styled("Enter: go   Esc: cancel", Style::default().fg(palette.base_04)),
    ];
    render_panel(f, body, "Go to Page", lines, palette.base_0d, palette);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{ScrollPageView, Scrubber};
    use crate::test_utils::test_helpers::{capture_terminal_state, create_test_terminal};
    use crossterm::event::{KeyEventState, MouseEvent};
    use std::sync::Arc;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::empty(),
            kind: KeyEventKind::Press,
            state: KeyEventState::empty(),
        })
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::empty(),
        })
    }

    fn header(mode: ViewMode) -> HeaderView {
        HeaderView {
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            zoom_percent: 100,
            dark_mode: false,
            mode,
            original_link: Some("https://example.com/dune.pdf".into()),
            show_original: true,
        }
    }

    fn slot(page: usize, state: SlotState) -> PageSlotView {
        PageSlotView {
            page,
            state,
            aspect: 4.0 / 3.0,
            // 20 columns, 14 rows
            target_width: 200,
        }
    }

    fn flip_view(current_page: usize, page_count: usize) -> ReaderView {
        ReaderView::Flip(FlipView {
            page: slot(current_page, SlotState::Skeleton),
            current_page,
            page_count,
            can_prev: current_page > 1,
            can_next: current_page < page_count,
            scrubber: Scrubber {
                value: current_page,
                max: page_count,
            },
            cue: FlipIntent::None,
        })
    }

    fn scroll_view(current_page: usize, page_count: usize) -> ReaderView {
        ReaderView::Scroll(ScrollView {
            pages: (1..=page_count)
                .map(|page| ScrollPageView {
                    slot: slot(page, SlotState::Skeleton),
                    highlighted: page == current_page,
                })
                .collect(),
            current_page,
            page_count,
        })
    }

    #[test]
    fn page_geometry_follows_width_and_aspect() {
        assert_eq!(page_columns(800), 80);
        assert_eq!(page_columns(3), 1);
        assert_eq!(page_rows(80, 4.0 / 3.0), 54);
        assert_eq!(page_rows(20, 4.0 / 3.0), 14);
    }

    #[test]
    fn flip_view_shows_page_controls() {
        let mut terminal = create_test_terminal(60, 20);
        let mut pane = ReaderPane::new();
        terminal
            .draw(|f| pane.render(f, f.area(), &header(ViewMode::Flip), &flip_view(3, 10)))
            .unwrap();

        let screen = capture_terminal_state(&terminal);
        assert!(screen.contains("Dune · Frank Herbert"));
        assert!(screen.contains("100%  Flip  Light"));
        assert!(screen.contains("[o] original"));
        assert!(screen.contains("Loading page 3"));
        assert!(screen.contains("Page 3 of 10"));
        assert_eq!(pane.take_visible_update(), Some(vec![3]));
        assert_eq!(pane.take_visible_update(), None);
    }

    #[test]
    fn rendered_page_is_drawn_with_half_blocks() {
        let mut terminal = create_test_terminal(40, 20);
        let mut pane = ReaderPane::new();
        let surface = Arc::new(RasterSurface::solid(0, 200, 266, [200, 100, 50]));
        let mut view = flip_view(1, 2);
        if let ReaderView::Flip(flip) = &mut view {
            flip.page.state = SlotState::Rendered(surface);
        }
        terminal
            .draw(|f| pane.render(f, f.area(), &header(ViewMode::Flip), &view))
            .unwrap();

        let buffer = terminal.backend().buffer();
        let cell = &buffer[(20, 10)];
        assert_eq!(cell.symbol(), "▀");
        assert_eq!(cell.fg, Color::Rgb(200, 100, 50));
    }

    #[test]
    fn dark_mode_dims_page_pixels() {
        let surface = RasterSurface::solid(0, 10, 10, [200, 100, 50]);
        assert_eq!(sample(&surface, 0, 0, 1, 1, true), Color::Rgb(180, 90, 45));
        assert_eq!(sample(&surface, 0, 0, 1, 1, false), Color::Rgb(200, 100, 50));
    }

    #[test]
    fn keys_map_to_commands() {
        let mut pane = ReaderPane::new();
        assert_eq!(
            pane.handle_event(&key(KeyCode::Right)),
            Some(PaneAction::Command(Command::Key(NavKey::Right)))
        );
        assert_eq!(
            pane.handle_event(&key(KeyCode::Char('+'))),
            Some(PaneAction::Command(Command::ZoomIn))
        );
        assert_eq!(
            pane.handle_event(&key(KeyCode::Char('m'))),
            Some(PaneAction::Command(Command::ToggleMode))
        );
        assert_eq!(
            pane.handle_event(&key(KeyCode::Esc)),
            Some(PaneAction::Command(Command::Exit))
        );
        // Nothing drawn yet, so there is no link to open
        assert_eq!(pane.handle_event(&key(KeyCode::Char('o'))), None);
    }

    #[test]
    fn goto_input_seeks_typed_page() {
        let mut pane = ReaderPane::new();
        pane.handle_event(&key(KeyCode::Char('g')));
        assert!(pane.is_goto_active());
        pane.handle_event(&key(KeyCode::Char('1')));
        pane.handle_event(&key(KeyCode::Char('q')));
        pane.handle_event(&key(KeyCode::Char('2')));
        assert_eq!(
            pane.handle_event(&key(KeyCode::Enter)),
            Some(PaneAction::Command(Command::Seek(12)))
        );
        assert!(!pane.is_goto_active());
    }

    #[test]
    fn scrubber_click_seeks() {
        let mut terminal = create_test_terminal(60, 20);
        let mut pane = ReaderPane::new();
        terminal
            .draw(|f| pane.render(f, f.area(), &header(ViewMode::Flip), &flip_view(1, 11)))
            .unwrap();

        let (track, _) = pane.hitboxes.scrubber.unwrap();
        let footer_row = 19;
        assert_eq!(
            pane.handle_event(&mouse(
                MouseEventKind::Down(MouseButton::Left),
                track.right() - 1,
                footer_row
            )),
            Some(PaneAction::Command(Command::Seek(11)))
        );
        // Prev is disabled on the first page
        assert_eq!(
            pane.handle_event(&mouse(MouseEventKind::Down(MouseButton::Left), 1, footer_row)),
            None
        );
    }

    #[test]
    fn scrolling_reports_the_page_under_the_viewport() {
        let mut terminal = create_test_terminal(40, 12);
        let mut pane = ReaderPane::new();
        terminal
            .draw(|f| pane.render(f, f.area(), &header(ViewMode::Scroll), &scroll_view(1, 5)))
            .unwrap();
        assert_eq!(pane.visible_pages(), &[1]);

        // Pages are 14 rows plus a separator; the anchor row is a third into the 10-row body
        let commands: Vec<_> = (0..6)
            .filter_map(|_| pane.handle_event(&mouse(MouseEventKind::ScrollDown, 10, 5)))
            .filter(|action| *action != PaneAction::Redraw)
            .collect();
        assert_eq!(commands, vec![PaneAction::Command(Command::ViewportPage(2))]);
    }

    #[test]
    fn mouse_over_page_selects_it_in_scroll_mode() {
        let mut terminal = create_test_terminal(40, 40);
        let mut pane = ReaderPane::new();
        terminal
            .draw(|f| pane.render(f, f.area(), &header(ViewMode::Scroll), &scroll_view(1, 5)))
            .unwrap();
        assert_eq!(pane.visible_pages(), &[1, 2, 3]);

        // Page 2 starts 15 rows below the top of the body
        assert_eq!(
            pane.handle_event(&mouse(MouseEventKind::Moved, 20, 18)),
            Some(PaneAction::Command(Command::ViewportPage(2)))
        );
        assert_eq!(pane.handle_event(&mouse(MouseEventKind::Moved, 20, 19)), None);
    }

    #[test]
    fn current_page_is_marked_when_it_fills_the_width() {
        let view = |current_page| {
            ReaderView::Scroll(ScrollView {
                pages: (1..=3)
                    .map(|page| ScrollPageView {
                        slot: PageSlotView {
                            target_width: 800,
                            ..slot(page, SlotState::Skeleton)
                        },
                        highlighted: page == current_page,
                    })
                    .collect(),
                current_page,
                page_count: 3,
            })
        };

        // 80 columns of page on an 80-column screen: no gutter left
        for (width, bar_column) in [(80, 0), (60, 0), (100, 9)] {
            let mut terminal = create_test_terminal(width, 30);
            let mut pane = ReaderPane::new();
            terminal
                .draw(|f| pane.render(f, f.area(), &header(ViewMode::Scroll), &view(1)))
                .unwrap();

            let buffer = terminal.backend().buffer();
            for row in [1, 10, 28] {
                let cell = &buffer[(bar_column, row)];
                assert_eq!(cell.symbol(), "┃", "width={width} row={row}");
                assert_eq!(cell.fg, palette(false).highlight());
            }
        }
    }

    #[test]
    fn error_panel_offers_exit_and_original() {
        let mut terminal = create_test_terminal(70, 16);
        let mut pane = ReaderPane::new();
        let view = ReaderView::Failed(ErrorPanel {
            title: "Unable to Load PDF".into(),
            message: "Failed to fetch PDF: HTTP 404".into(),
            open_original: Some("https://example.com/x.pdf".into()),
        });
        let mut head = header(ViewMode::Flip);
        head.show_original = false;
        terminal
            .draw(|f| pane.render(f, f.area(), &head, &view))
            .unwrap();

        let screen = capture_terminal_state(&terminal);
        assert!(screen.contains("Unable to Load PDF"));
        assert!(screen.contains("q: back to library"));
        assert!(screen.contains("o: open original"));
        assert_eq!(
            pane.handle_event(&key(KeyCode::Char('o'))),
            Some(PaneAction::OpenLink("https://example.com/x.pdf".into()))
        );
    }
}
