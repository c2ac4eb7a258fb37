use std::fs::File;
use std::io::stdout;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{error, info};
use ratatui::{Terminal, backend::CrosstermBackend};
use simplelog::{Config, LevelFilter, WriteLogger};

use readsphere::book::Book;
use readsphere::event_source::KeyboardEventSource;
use readsphere::library::{JsonLibraryStore, Library, resolve_library_path, resolve_log_path};
use readsphere::main_app::{App, run_app_with_event_source};
use readsphere::panic_handler;
use readsphere::reader::{HttpFetcher, PdfBackend};
use readsphere::settings;

#[derive(Debug, Parser)]
#[command(name = "readsphere")]
#[command(about = "A terminal book library with a flip/scroll PDF reader")]
#[command(version)]
struct Cli {
    /// Library file to use instead of the default one
    #[arg(long, global = true, value_name = "FILE")]
    library: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Open a book straight in the reader.
    Open {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Print the library.
    List,
    /// Add a book from a local PDF or a URL.
    Add {
        #[arg(value_name = "SOURCE")]
        source: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, default_value = "")]
        author: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        cover: String,
        /// The book is read on another site
        #[arg(long)]
        external: bool,
        /// Start reading the book right away
        #[arg(long)]
        read: bool,
    },
}

/// What the reader shows first
enum Startup {
    Library,
    Open(String),
    Add(Book),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = resolve_log_path()?;
    WriteLogger::init(
        cli.log_level.into(),
        Config::default(),
        File::create(&log_path)
            .with_context(|| format!("Failed to create log file {log_path:?}"))?,
    )?;
    info!("Starting readsphere");

    settings::load_settings();
    let settings = settings::current();

    let library_path = match cli.library {
        Some(path) => path,
        None => resolve_library_path()?,
    };
    let store = JsonLibraryStore::new(library_path).with_quota(settings.storage_quota());
    let mut library = Library::open(Box::new(store));

    match cli.command {
        None => run_tui(library, Startup::Library),
        Some(Commands::Open { id }) => {
            if library.get(&id).is_none() {
                bail!("No book with id {id}; see `readsphere list`");
            }
            run_tui(library, Startup::Open(id))
        }
        Some(Commands::List) => {
            for book in library.books() {
                let author = if book.author.is_empty() {
                    String::new()
                } else {
                    format!(" by {}", book.author)
                };
                println!("{}\t{}{author}\t{}", book.id, book.title, book.progress_label());
            }
            Ok(())
        }
        Some(Commands::Add {
            source,
            title,
            author,
            description,
            cover,
            external,
            read,
        }) => {
            let title = title.unwrap_or_else(|| readsphere::book::title_from_source(&source));
            let mut book = Book::from_source(&source, title)?
                .with_author(author)
                .with_description(description)
                .with_cover(cover);
            if external {
                book = book.external();
            }
            if read {
                return run_tui(library, Startup::Add(book));
            }
            let id = book.id.clone();
            if let Some(warning) = library.add_book(book) {
                eprintln!("warning: {warning}");
            }
            println!("Added {id}");
            Ok(())
        }
    }
}

#[cfg(feature = "pdf")]
fn pdf_backend() -> Option<Arc<dyn PdfBackend>> {
    Some(Arc::new(readsphere::reader::MupdfBackend))
}

#[cfg(not(feature = "pdf"))]
fn pdf_backend() -> Option<Arc<dyn PdfBackend>> {
    None
}

fn run_tui(library: Library, startup: Startup) -> Result<()> {
    panic_handler::initialize_panic_handler();

    let settings = settings::current();
    let fetcher = Arc::new(HttpFetcher::new(settings.fetch_timeout()));
    let mut app = App::new(library, pdf_backend(), fetcher, settings.reader_config())
        .with_persisted_settings();
    match startup {
        Startup::Library => {}
        Startup::Open(id) => {
            app.open_book(&id);
        }
        Startup::Add(book) => {
            let id = app.add_book(book);
            app.open_book(&id);
        }
    }

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app_with_event_source(&mut terminal, &mut app, &mut KeyboardEventSource);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        error!("Application error: {err:?}");
    }
    info!("Shutting down readsphere");
    res
}
