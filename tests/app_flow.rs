use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use readsphere::book::{Book, embed_pdf};
use readsphere::event_source::{KeyCode, SimulatedEventSource};
use readsphere::library::{JsonLibraryStore, Library, MemoryLibraryStore};
use readsphere::main_app::{App, Screen, run_app_with_event_source};
use readsphere::reader::{PdfBackend, ReaderConfig, ViewMode};
use readsphere::test_utils::test_helpers::{
    TestScenarioBuilder, capture_terminal_state, create_test_terminal,
};
use readsphere::test_utils::{FakeBackend, FakeFetcher, fake_pdf};
use tempfile::TempDir;

fn config() -> ReaderConfig {
    ReaderConfig {
        // 20 columns per page keeps several pages on a small test screen
        base_page_width: 200.0,
        progress_debounce: Duration::from_millis(10),
        ..ReaderConfig::default()
    }
}

fn app(library: Library) -> App {
    let backend: Arc<dyn PdfBackend> = Arc::new(FakeBackend::new());
    App::new(
        library,
        Some(backend),
        Arc::new(FakeFetcher::default()),
        config(),
    )
}

fn json_library(path: &Path) -> Library {
    Library::open(Box::new(JsonLibraryStore::new(path)))
}

fn pump(app: &mut App, done: impl Fn(&App) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done(app) {
        assert!(Instant::now() < deadline, "timed out waiting for app");
        app.tick();
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn reader_ready(app: &App) -> bool {
    app.reader()
        .is_some_and(|r| r.session().current_page().is_some())
}

#[test]
fn open_book_and_return_to_library() {
    let mut library = Library::open(Box::new(MemoryLibraryStore::new()));
    library.add_book(Book::new("b", "Second").with_pdf_url(embed_pdf(&fake_pdf(2))));
    library.add_book(Book::new("a", "First").with_pdf_url(embed_pdf(&fake_pdf(2))));
    let mut app = app(library);

    let mut terminal = create_test_terminal(60, 12);
    let mut events = TestScenarioBuilder::new()
        .navigate_down(1)
        .press_enter()
        .press_esc()
        .quit()
        .build();
    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();

    assert_eq!(app.screen(), Screen::Library);
    assert_eq!(app.selected_index(), 1);
    assert_eq!(app.reader().unwrap().session().book().id, "b");
    assert!(app.reader().unwrap().is_closed());
}

#[test]
fn progress_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("books.json");
    {
        let mut library = json_library(&path);
        library.add_book(Book::new("d", "Dune").with_pdf_url(embed_pdf(&fake_pdf(8))));
    }

    let mut app = app(json_library(&path));
    assert!(app.open_book("d"));
    pump(&mut app, reader_ready);

    app.handle_event(&SimulatedEventSource::plain_key(KeyCode::Right));
    app.handle_event(&SimulatedEventSource::plain_key(KeyCode::Right));
    pump(&mut app, |a| a.library().get("d").unwrap().last_read_page == Some(3));
    app.handle_event(&SimulatedEventSource::char_key('q'));
    drop(app);

    let reopened = json_library(&path);
    assert_eq!(reopened.get("d").unwrap().last_read_page, Some(3));
    assert_eq!(reopened.get("d").unwrap().resume_page(), 3);
}

#[test]
fn hovering_a_page_in_scroll_mode_selects_it() {
    let mut library = Library::open(Box::new(MemoryLibraryStore::new()));
    library.add_book(Book::new("s", "Stacked").with_pdf_url(embed_pdf(&fake_pdf(5))));
    let mut app = app(library);
    assert!(app.open_book("s"));
    pump(&mut app, reader_ready);

    app.handle_event(&SimulatedEventSource::char_key('m'));
    assert_eq!(app.reader().unwrap().session().mode(), ViewMode::Scroll);

    let mut terminal = create_test_terminal(60, 40);
    terminal.draw(|f| app.draw(f)).unwrap();
    assert_eq!(app.reader().unwrap().session().visible_pages(), &[1, 2, 3]);

    // Page 2 sits 15 rows below page 1, which starts under the header
    app.handle_event(&SimulatedEventSource::mouse_moved(30, 20));
    assert_eq!(app.reader().unwrap().session().current_page(), Some(2));
    assert!(app.reader().unwrap().session().has_pending_save());
}

#[test]
fn reader_screen_shows_header_and_page_counter() {
    let mut library = Library::open(Box::new(MemoryLibraryStore::new()));
    library.add_book(
        Book::new("h", "Hyperion")
            .with_author("Dan Simmons")
            .with_pdf_url(embed_pdf(&fake_pdf(4))),
    );
    let mut app = app(library);
    assert!(app.open_book("h"));
    pump(&mut app, reader_ready);

    let mut terminal = create_test_terminal(70, 24);
    terminal.draw(|f| app.draw(f)).unwrap();
    let screen = capture_terminal_state(&terminal);
    assert!(screen.contains("Hyperion · Dan Simmons"));
    assert!(screen.contains("100%  Flip  Light"));
    assert!(screen.contains("Page 1 of 4"));
}

#[test]
fn next_book_opens_in_flip_mode_and_light_theme() {
    let mut library = Library::open(Box::new(MemoryLibraryStore::new()));
    library.add_book(Book::new("b", "Second").with_pdf_url(embed_pdf(&fake_pdf(3))));
    library.add_book(Book::new("a", "First").with_pdf_url(embed_pdf(&fake_pdf(3))));
    let mut app = app(library);

    assert!(app.open_book("a"));
    pump(&mut app, reader_ready);
    for c in ['m', 'd', 'q'] {
        app.handle_event(&SimulatedEventSource::char_key(c));
    }
    assert_eq!(app.screen(), Screen::Library);

    assert!(app.open_book("b"));
    pump(&mut app, reader_ready);
    let session = app.reader().unwrap().session();
    assert_eq!(session.book().id, "b");
    assert_eq!(session.mode(), ViewMode::Flip);
    assert!(!session.is_dark_mode());

    let mut terminal = create_test_terminal(70, 24);
    terminal.draw(|f| app.draw(f)).unwrap();
    assert!(capture_terminal_state(&terminal).contains("100%  Flip  Light"));
}
