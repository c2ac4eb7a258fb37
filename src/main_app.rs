use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEventKind, MouseButton, MouseEventKind};
use flume::{Receiver, Sender};
use log::{debug, info, warn};
use ratatui::{
    Frame, Terminal,
    layout::{Constraint, Layout, Rect},
    widgets::Paragraph,
};

use crate::book::Book;
use crate::event_source::EventSource;
use crate::library::Library;
use crate::notification::NotificationManager;
use crate::reader::{
    BackendError, Command, ContentFetcher, PdfBackend, ReaderConfig, ReaderEvent, ReaderService,
};
use crate::settings;
use crate::theme::palette;
use crate::widget::library_list::LibraryList;
use crate::widget::reader_view::{PaneAction, ReaderPane};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Library,
    Reader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Quit,
}

pub struct App {
    library: Library,
    library_list: LibraryList,
    library_area: Rect,
    screen: Screen,
    reader: Option<ReaderService>,
    reader_pane: ReaderPane,
    backend: Option<Arc<dyn PdfBackend>>,
    fetcher: Arc<dyn ContentFetcher>,
    config: ReaderConfig,
    events_tx: Sender<ReaderEvent>,
    events_rx: Receiver<ReaderEvent>,
    pub notifications: NotificationManager,
    persist_settings: bool,
}

impl App {
    /// `backend` is `None` when the build has no PDF support
    pub fn new(
        library: Library,
        backend: Option<Arc<dyn PdfBackend>>,
        fetcher: Arc<dyn ContentFetcher>,
        config: ReaderConfig,
    ) -> Self {
        let (events_tx, events_rx) = flume::unbounded();
        Self {
            library_list: LibraryList::new(library.len()),
            library,
            library_area: Rect::default(),
            screen: Screen::Library,
            reader: None,
            reader_pane: ReaderPane::new(),
            backend,
            fetcher,
            config,
            events_tx,
            events_rx,
            notifications: NotificationManager::new(),
            persist_settings: false,
        }
    }

    /// Write preference changes such as dark mode back to the config file
    pub fn with_persisted_settings(mut self) -> Self {
        self.persist_settings = true;
        self
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn reader(&self) -> Option<&ReaderService> {
        self.reader.as_ref()
    }

    pub fn selected_index(&self) -> usize {
        self.library_list.selected
    }

    /// Open a book in the reader; returns false if it could not be opened
    pub fn open_book(&mut self, book_id: &str) -> bool {
        let Some(book) = self.library.get(book_id).cloned() else {
            warn!("Cannot open unknown book {book_id}");
            self.notifications.error(format!("No book with id {book_id}"));
            return false;
        };
        let Some(backend) = self.backend.clone() else {
            self.notifications.error(BackendError::Unavailable.to_string());
            return false;
        };

        info!("Opening '{}' in the reader", book.title);
        self.reader_pane.reset();
        match self.reader.as_mut() {
            Some(reader) => reader.switch_book(book),
            None => {
                self.reader = Some(ReaderService::new(
                    book,
                    self.config.clone(),
                    backend,
                    self.fetcher.clone(),
                    Box::new(self.events_tx.clone()),
                ));
            }
        }
        self.screen = Screen::Reader;
        true
    }

    fn open_selected(&mut self) {
        let Some(book) = self.library_list.selected_book(self.library.books()) else {
            return;
        };
        let id = book.id.clone();
        self.open_book(&id);
    }

    pub fn handle_event(&mut self, event: &Event) -> Option<AppAction> {
        match self.screen {
            Screen::Library => self.handle_library_event(event),
            Screen::Reader => {
                self.handle_reader_event(event);
                None
            }
        }
    }

    fn handle_library_event(&mut self, event: &Event) -> Option<AppAction> {
        let count = self.library.len();
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Some(AppAction::Quit),
                KeyCode::Char('j') | KeyCode::Down => self.library_list.move_selection_down(count),
                KeyCode::Char('k') | KeyCode::Up => self.library_list.move_selection_up(),
                KeyCode::Enter => self.open_selected(),
                _ => {}
            },
            Event::Mouse(mouse) => match mouse.kind {
                MouseEventKind::Down(MouseButton::Left) => {
                    self.library_list
                        .handle_mouse_click(mouse.row, self.library_area, count);
                }
                MouseEventKind::ScrollDown => self.library_list.move_selection_down(count),
                MouseEventKind::ScrollUp => self.library_list.move_selection_up(),
                _ => {}
            },
            _ => {}
        }
        None
    }

    fn handle_reader_event(&mut self, event: &Event) {
        let Some(action) = self.reader_pane.handle_event(event) else {
            return;
        };
        match action {
            PaneAction::Command(command) => self.apply_reader_command(command),
            PaneAction::OpenLink(link) => {
                info!("Opening original document {link}");
                if let Err(e) = open::that(&link) {
                    warn!("Failed to open {link}: {e}");
                    self.notifications.error(format!("Could not open link: {e}"));
                }
            }
            PaneAction::Redraw => {}
        }
    }

    fn apply_reader_command(&mut self, command: Command) {
        let Some(reader) = self.reader.as_mut() else {
            return;
        };
        let toggles_dark = command == Command::ToggleDarkMode;
        reader.apply(command);

        if toggles_dark {
            let dark = reader.session().is_dark_mode();
            self.config.dark_mode = dark;
            if self.persist_settings {
                settings::set_dark_mode(dark);
            }
        }
        self.drain_reader_events();
    }

    /// Poll background work and expire notifications; true when a redraw is due
    pub fn tick(&mut self) -> bool {
        let mut changed = self.notifications.update();
        if let Some(reader) = self.reader.as_mut() {
            changed |= reader.poll();
        }
        changed | self.drain_reader_events()
    }

    fn drain_reader_events(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.events_rx.try_recv() {
            changed = true;
            match event {
                ReaderEvent::UpdateProgress { book_id, page } => {
                    self.library.update_progress(&book_id, page);
                }
                ReaderEvent::Exit => {
                    debug!("Reader exited, back to library");
                    self.screen = Screen::Library;
                    self.reader_pane.reset();
                }
            }
        }
        changed
    }

    pub fn draw(&mut self, f: &mut Frame) {
        let [main, status] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(f.area());

        let dark_mode = self.config.dark_mode;
        match (self.screen, self.reader.as_ref()) {
            (Screen::Reader, Some(reader)) => {
                let header = reader.header();
                let view = reader.view();
                self.reader_pane.render(f, f.area(), &header, &view);
            }
            _ => {
                self.library_area = main;
                self.library_list
                    .render(f, main, self.library.books(), palette(dark_mode));
                f.render_widget(
                    Paragraph::new(" j/k move  Enter read  q quit").style(
                        ratatui::style::Style::default()
                            .fg(palette(dark_mode).base_04)
                            .bg(palette(dark_mode).base_01),
                    ),
                    status,
                );
            }
        }

        if let Some(notification) = self.notifications.current() {
            f.render_widget(
                Paragraph::new(notification.styled_line(palette(dark_mode))),
                status,
            );
        }

        self.sync_visible_pages();
    }

    /// Tell the reader which pages the last frame showed
    fn sync_visible_pages(&mut self) {
        if self.screen != Screen::Reader {
            return;
        }
        if let (Some(pages), Some(reader)) =
            (self.reader_pane.take_visible_update(), self.reader.as_mut())
        {
            reader.apply(Command::SetVisiblePages(pages));
        }
    }

    /// Add a book as the newest library entry and return its id, which
    /// differs from the book's own when that id is taken. A book that
    /// could not be saved stays in the list and a warning is shown.
    pub fn add_book(&mut self, book: Book) -> String {
        if let Some(warning) = self.library.add_book(book) {
            self.notifications.warn(warning.to_string());
        }
        self.library_list.clamp(self.library.len());
        self.library
            .books()
            .first()
            .map(|book| book.id.clone())
            .unwrap_or_default()
    }
}

pub fn run_app_with_event_source<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_source: &mut dyn EventSource,
) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    let tick_rate = Duration::from_millis(50);
    let mut last_tick = Instant::now();
    let mut needs_redraw = true;

    loop {
        if needs_redraw {
            terminal.draw(|f| app.draw(f))?;
            needs_redraw = false;
        }

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        let mut events_processed = 0;
        if event_source.poll(timeout)? {
            while events_processed < 50 {
                let event = event_source.read()?;
                events_processed += 1;
                if app.handle_event(&event) == Some(AppAction::Quit) {
                    return Ok(());
                }
                if !event_source.poll(Duration::ZERO)? {
                    break;
                }
            }
        }
        needs_redraw |= events_processed > 0;

        if last_tick.elapsed() >= tick_rate {
            needs_redraw |= app.tick();
            last_tick = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::embed_pdf;
    use crate::library::MemoryLibraryStore;
    use crate::test_utils::test_helpers::{capture_terminal_state, create_test_terminal};
    use crate::test_utils::{FakeBackend, FakeFetcher, fake_pdf};
    use serial_test::serial;
    use tempfile::TempDir;

    fn app_with(books: Vec<Book>, backend: bool) -> App {
        let mut library = Library::open(Box::new(MemoryLibraryStore::new()));
        for book in books.into_iter().rev() {
            library.add_book(book);
        }
        let backend: Option<Arc<dyn PdfBackend>> =
            backend.then(|| Arc::new(FakeBackend::new()) as Arc<dyn PdfBackend>);
        let config = ReaderConfig {
            progress_debounce: Duration::from_millis(10),
            ..ReaderConfig::default()
        };
        App::new(library, backend, Arc::new(FakeFetcher::default()), config)
    }

    fn key(c: char) -> Event {
        crate::event_source::SimulatedEventSource::char_key(c)
    }

    fn pump(app: &mut App, done: impl Fn(&App) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(app) {
            assert!(Instant::now() < deadline, "timed out waiting for app");
            app.tick();
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn library_navigation_and_quit() {
        let mut app = app_with(vec![Book::new("1", "One"), Book::new("2", "Two")], true);
        assert_eq!(app.handle_event(&key('j')), None);
        assert_eq!(app.selected_index(), 1);
        assert_eq!(app.handle_event(&key('q')), Some(AppAction::Quit));
    }

    #[test]
    fn missing_backend_is_reported() {
        let mut app = app_with(vec![Book::new("1", "One")], false);
        assert!(!app.open_book("1"));
        assert_eq!(app.screen(), Screen::Library);
        assert_eq!(
            app.notifications.current().unwrap().message,
            "PDF support is not available in this build"
        );
    }

    #[test]
    fn reading_updates_library_progress() {
        let book = Book::new("1", "One").with_pdf_url(embed_pdf(&fake_pdf(5)));
        let mut app = app_with(vec![book], true);
        assert!(app.open_book("1"));
        pump(&mut app, |a| {
            a.reader().is_some_and(|r| r.session().current_page().is_some())
        });

        app.handle_event(&crate::event_source::SimulatedEventSource::plain_key(
            KeyCode::Right,
        ));
        pump(&mut app, |a| a.library().get("1").unwrap().last_read_page == Some(2));

        app.handle_event(&key('q'));
        assert_eq!(app.screen(), Screen::Library);
    }

    #[test]
    fn storage_warning_is_shown_and_book_kept() {
        let library = Library::open(Box::new(MemoryLibraryStore::with_quota(16)));
        let backend: Arc<dyn PdfBackend> = Arc::new(FakeBackend::new());
        let mut app = App::new(
            library,
            Some(backend),
            Arc::new(FakeFetcher::default()),
            ReaderConfig::default(),
        );

        let book = Book::new("big", "Big").with_pdf_url(embed_pdf(&fake_pdf(40)));
        assert_eq!(app.add_book(book), "big");
        assert_eq!(app.library().len(), 1);

        let notification = app.notifications.current().unwrap();
        assert!(notification.message.starts_with("Storage is full"));
        assert_eq!(notification.level, crate::notification::NotificationLevel::Warning);
        assert!(app.open_book("big"));
    }

    #[test]
    fn added_duplicate_gets_fresh_id() {
        let mut app = app_with(vec![Book::new("1", "One")], true);
        assert_eq!(app.add_book(Book::new("1", "Again")), "1-1");
        assert_eq!(app.library().books()[0].title, "Again");
    }

    #[test]
    #[serial]
    fn dark_mode_toggle_is_saved_only_when_persisting() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "version: 1\n").unwrap();
        settings::load_settings_from_path(&path);

        let book = || Book::new("1", "One").with_pdf_url(embed_pdf(&fake_pdf(3)));
        let mut app = app_with(vec![book()], true);
        assert!(app.open_book("1"));
        pump(&mut app, |a| {
            a.reader().is_some_and(|r| r.session().current_page().is_some())
        });
        app.handle_event(&key('d'));
        assert!(app.reader().unwrap().session().is_dark_mode());
        assert!(!settings::current().dark_mode);

        let mut app = app_with(vec![book()], true).with_persisted_settings();
        assert!(app.open_book("1"));
        pump(&mut app, |a| {
            a.reader().is_some_and(|r| r.session().current_page().is_some())
        });
        app.handle_event(&key('d'));
        assert!(settings::current().dark_mode);
        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("dark_mode: true"));

        settings::restore_defaults();
    }

    #[test]
    fn library_screen_lists_books() {
        let mut app = app_with(vec![Book::new("1", "Neuromancer").with_author("Gibson")], true);
        let mut terminal = create_test_terminal(60, 8);
        terminal.draw(|f| app.draw(f)).unwrap();

        let screen = capture_terminal_state(&terminal);
        assert!(screen.contains("Neuromancer  Gibson  new"));
        assert!(screen.contains("Enter read"));
    }
}
