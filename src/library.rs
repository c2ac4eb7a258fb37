//! Persistent book library

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::book::Book;

const APP_DIR: &str = "readsphere";
const LIBRARY_FILENAME: &str = "books.json";

/// Browser local storage allows roughly this much per origin
pub const DEFAULT_STORAGE_QUOTA: usize = 5 * 1024 * 1024;

/// The store could not persist the library.
///
/// The in-memory library is still up to date; only durability is lost.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceWarning {
    #[error(
        "Storage is full ({needed} bytes needed, {quota} allowed). \
         This book will not be saved permanently; try a smaller file or an external link."
    )]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("Could not write library: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not encode library: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Backing storage for the library
pub trait LibraryStore {
    /// Load every stored book. Missing or corrupt storage yields an empty list.
    fn load_all(&self) -> Vec<Book>;

    fn save_all(&mut self, books: &[Book]) -> Result<(), PersistenceWarning>;
}

/// Library stored as a JSON array in a single file
pub struct JsonLibraryStore {
    file_path: PathBuf,
    quota: Option<usize>,
}

impl JsonLibraryStore {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            quota: Some(DEFAULT_STORAGE_QUOTA),
        }
    }

    pub fn with_quota(mut self, quota: Option<usize>) -> Self {
        self.quota = quota;
        self
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

impl LibraryStore for JsonLibraryStore {
    fn load_all(&self) -> Vec<Book> {
        if !self.file_path.exists() {
            debug!("No library at {:?}, starting empty", self.file_path);
            return Vec::new();
        }

        let content = match fs::read_to_string(&self.file_path) {
            Ok(content) => content,
            Err(e) => {
                error!("Failed to read library {:?}: {e}", self.file_path);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Book>>(&content) {
            Ok(books) => {
                info!("Loaded {} books from {:?}", books.len(), self.file_path);
                books
            }
            Err(e) => {
                error!("Failed to parse library {:?}: {e}", self.file_path);
                Vec::new()
            }
        }
    }

    fn save_all(&mut self, books: &[Book]) -> Result<(), PersistenceWarning> {
        let content = serde_json::to_string(books)?;
        if let Some(quota) = self.quota {
            if content.len() > quota {
                return Err(PersistenceWarning::QuotaExceeded {
                    needed: content.len(),
                    quota,
                });
            }
        }

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.file_path, content)?;
        Ok(())
    }
}

/// Store that keeps the serialized library in memory.
///
/// Clones share the same contents, so a test can keep one handle to inspect
/// what the library saved through another.
#[derive(Clone, Default)]
pub struct MemoryLibraryStore {
    saved: Arc<Mutex<Option<String>>>,
    quota: Option<usize>,
}

impl MemoryLibraryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            saved: Arc::default(),
            quota: Some(quota),
        }
    }

    /// Books as last written by `save_all`
    pub fn saved_books(&self) -> Vec<Book> {
        self.load_all()
    }
}

impl LibraryStore for MemoryLibraryStore {
    fn load_all(&self) -> Vec<Book> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
            .and_then(|content| serde_json::from_str(content).ok())
            .unwrap_or_default()
    }

    fn save_all(&mut self, books: &[Book]) -> Result<(), PersistenceWarning> {
        let content = serde_json::to_string(books)?;
        if let Some(quota) = self.quota {
            if content.len() > quota {
                return Err(PersistenceWarning::QuotaExceeded {
                    needed: content.len(),
                    quota,
                });
            }
        }
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = Some(content);
        Ok(())
    }
}

/// In-memory list of books backed by a [`LibraryStore`]
pub struct Library {
    books: Vec<Book>,
    store: Box<dyn LibraryStore>,
}

impl Library {
    pub fn open(store: Box<dyn LibraryStore>) -> Self {
        let books = store.load_all();
        Self { books, store }
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn get(&self, id: &str) -> Option<&Book> {
        self.books.iter().find(|book| book.id == id)
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Add a book as the newest entry.
    ///
    /// The book stays in the library even when saving fails; the returned
    /// warning is meant to be shown to the user once.
    pub fn add_book(&mut self, mut book: Book) -> Option<PersistenceWarning> {
        if self.get(&book.id).is_some() {
            let base = book.id.clone();
            let mut suffix = 1;
            while self.get(&format!("{base}-{suffix}")).is_some() {
                suffix += 1;
            }
            book.id = format!("{base}-{suffix}");
        }

        info!("Adding book {:?} ({})", book.title, book.id);
        self.books.insert(0, book);

        match self.store.save_all(&self.books) {
            Ok(()) => None,
            Err(e) => {
                error!("Storage quota or write failure while adding book: {e}");
                Some(e)
            }
        }
    }

    /// Record the last read page of a book.
    ///
    /// Only `last_read_page` changes; order and other fields are kept.
    /// Persistence failures are logged, not surfaced.
    pub fn update_progress(&mut self, book_id: &str, page: usize) {
        let Some(book) = self.books.iter_mut().find(|book| book.id == book_id) else {
            warn!("Progress update for unknown book {book_id}");
            return;
        };

        if book.last_read_page == Some(page) {
            return;
        }
        book.last_read_page = Some(page);
        debug!("Saving progress: book {book_id} page {page}");

        if let Err(e) = self.store.save_all(&self.books) {
            error!("Failed to save progress: {e}");
        }
    }
}

/// Default location of the library file
pub fn resolve_library_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .context("Could not determine data directory")?
        .join(APP_DIR);
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {data_dir:?}"))?;
    Ok(data_dir.join(LIBRARY_FILENAME))
}

/// Compute the log file path.
/// Uses `state_dir` on platforms that have it, falls back to `cache_dir`.
pub fn resolve_log_path() -> Result<PathBuf> {
    let base = dirs::state_dir()
        .or_else(dirs::cache_dir)
        .context("Could not determine state or cache directory")?;
    log_path_under(&base)
}

fn log_path_under(base: &Path) -> Result<PathBuf> {
    let log_dir = base.join(APP_DIR);
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {log_dir:?}"))?;

    Ok(log_dir.join("readsphere.log"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_books() -> Vec<Book> {
        vec![
            Book::new("a", "Alpha").with_author("Ann"),
            Book::new("b", "Beta").with_last_read_page(3),
            Book::new("c", "Gamma"),
        ]
    }

    #[test]
    fn json_store_round_trips_books() {
        let tmp = TempDir::new().unwrap();
        let mut store = JsonLibraryStore::new(tmp.path().join("books.json"));

        store.save_all(&sample_books()).unwrap();
        assert_eq!(store.load_all(), sample_books());
    }

    #[test]
    fn json_store_tolerates_missing_and_corrupt_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("books.json");
        let store = JsonLibraryStore::new(&path);
        assert!(store.load_all().is_empty());

        fs::write(&path, "{ not json").unwrap();
        assert!(store.load_all().is_empty());
    }

    #[test]
    fn json_store_enforces_quota() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("books.json");
        let mut store = JsonLibraryStore::new(&path).with_quota(Some(16));

        let err = store.save_all(&sample_books()).unwrap_err();
        assert!(matches!(err, PersistenceWarning::QuotaExceeded { quota: 16, .. }));
        assert!(!path.exists());
    }

    #[test]
    fn add_book_prepends_and_persists() {
        let store = MemoryLibraryStore::new();
        let mut library = Library::open(Box::new(store.clone()));
        library.add_book(Book::new("1", "First"));
        let warning = library.add_book(Book::new("2", "Second"));

        assert!(warning.is_none());
        let ids: Vec<_> = library.books().iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
        assert_eq!(store.saved_books(), library.books());
    }

    #[test]
    fn add_book_over_quota_keeps_book_in_memory() {
        let store = MemoryLibraryStore::with_quota(10);
        let mut library = Library::open(Box::new(store.clone()));

        let warning = library.add_book(Book::new("1", "A rather long title"));
        assert!(matches!(
            warning,
            Some(PersistenceWarning::QuotaExceeded { .. })
        ));
        assert_eq!(library.len(), 1);
        assert!(store.saved_books().is_empty());
    }

    #[test]
    fn add_book_renames_duplicate_ids() {
        let mut library = Library::open(Box::new(MemoryLibraryStore::new()));
        library.add_book(Book::new("1", "First"));
        library.add_book(Book::new("1", "Second"));
        library.add_book(Book::new("1", "Third"));

        let ids: Vec<_> = library.books().iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["1-2", "1-1", "1"]);
    }

    #[test]
    fn update_progress_touches_only_the_matching_book() {
        let mut store = MemoryLibraryStore::new();
        store.save_all(&sample_books()).unwrap();
        let mut library = Library::open(Box::new(store.clone()));

        library.update_progress("b", 9);

        let mut expected = sample_books();
        expected[1].last_read_page = Some(9);
        assert_eq!(library.books(), expected.as_slice());
        assert_eq!(store.saved_books(), expected);
    }

    #[test]
    fn update_progress_for_unknown_book_is_ignored() {
        let mut library = Library::open(Box::new(MemoryLibraryStore::new()));
        library.add_book(Book::new("a", "Alpha"));
        library.update_progress("missing", 4);
        assert_eq!(library.books()[0].last_read_page, None);
    }

    #[test]
    fn log_path_is_created_under_app_dir() {
        let tmp = TempDir::new().unwrap();
        let log_path = log_path_under(tmp.path()).unwrap();
        assert_eq!(log_path, tmp.path().join("readsphere").join("readsphere.log"));
        assert!(log_path.parent().unwrap().exists());
    }
}
