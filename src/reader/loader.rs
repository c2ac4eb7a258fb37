//! Document loading: content reference → opened document handle

use std::fs;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::{debug, info, warn};

use super::backend::{PageSize, PdfBackend};
use super::error::{FetchError, ReaderError};
use super::request::LoadJob;
use crate::book::{Book, ContentRef};

const LOAD_FAILED_MESSAGE: &str = "Unable to load PDF. It might be blocked or invalid.";
/// US Letter, used when the engine cannot report a page size
const FALLBACK_PAGE_SIZE: PageSize = PageSize::new(612.0, 792.0);

/// Process-unique identity of an opened document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DocumentId(pub u64);

impl DocumentId {
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// An opened document, cheap to clone.
///
/// Holds the raw bytes so each render worker can open its own engine
/// document; page sizes are read once at load time.
#[derive(Clone)]
pub struct DocumentHandle {
    id: DocumentId,
    bytes: Arc<[u8]>,
    page_sizes: Arc<[PageSize]>,
}

impl DocumentHandle {
    pub fn new(id: DocumentId, bytes: Arc<[u8]>, page_sizes: Vec<PageSize>) -> Self {
        Self {
            id,
            bytes,
            page_sizes: page_sizes.into(),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    /// Natural size of page `index` (0-based)
    pub fn page_size(&self, index: usize) -> PageSize {
        self.page_sizes
            .get(index)
            .copied()
            .unwrap_or(FALLBACK_PAGE_SIZE)
    }
}

impl std::fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentHandle")
            .field("id", &self.id)
            .field("bytes", &self.bytes.len())
            .field("page_count", &self.page_count())
            .finish()
    }
}

/// What opening a book amounts to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Content must be fetched and opened
    Fetch(ContentRef),
    /// External link only; nothing to render in-app
    ExternalOnly,
}

/// Decide how a book's content is reached, without doing any I/O
pub fn resolve(book: &Book) -> Result<Resolution, ReaderError> {
    match book.content() {
        Some(content) => Ok(Resolution::Fetch(content)),
        None if book.is_external => Ok(Resolution::ExternalOnly),
        None => Err(ReaderError::ContentMissing),
    }
}

/// Source of remote document bytes
pub trait ContentFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Largest document a fetch will download
pub const MAX_DOCUMENT_BYTES: u64 = 256 * 1024 * 1024;

/// Fetches documents over HTTP(S)
pub struct HttpFetcher {
    agent: ureq::Agent,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(timeout)
                .user_agent(concat!("readsphere/", env!("CARGO_PKG_VERSION")))
                .build(),
            max_bytes: MAX_DOCUMENT_BYTES,
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl ContentFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(status, _) => FetchError::Status {
                status,
                url: url.to_string(),
            },
            ureq::Error::Transport(t) => FetchError::Network(t.to_string()),
        })?;

        read_capped(response.into_reader(), self.max_bytes)
    }
}

/// Read a whole body, failing once it grows past `limit` bytes
fn read_capped(reader: impl Read, limit: u64) -> Result<Vec<u8>, FetchError> {
    let mut bytes = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|e| FetchError::Network(e.to_string()))?;
    if bytes.len() as u64 > limit {
        return Err(FetchError::TooLarge { limit });
    }
    Ok(bytes)
}

/// Decode the payload of a `data:` URI
pub fn decode_data_uri(data: &str, base64: bool) -> Result<Vec<u8>, FetchError> {
    if base64 {
        let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        return BASE64
            .decode(compact)
            .map_err(|e| FetchError::Decode(e.to_string()));
    }

    Ok(urlencoding::decode_binary(data.as_bytes()).into_owned())
}

fn read_content(content: &ContentRef, fetcher: &dyn ContentFetcher) -> Result<Vec<u8>, FetchError> {
    match content {
        ContentRef::Embedded { data, base64, .. } => decode_data_uri(data, *base64),
        ContentRef::Remote(url) => fetcher.fetch(url),
        ContentRef::Path(path) => {
            fs::read(path).map_err(|e| FetchError::Io(format!("{}: {e}", path.display())))
        }
    }
}

/// Fetch and open a document. Runs on a loader thread.
pub fn load_document(
    job: &LoadJob,
    fetcher: &dyn ContentFetcher,
    backend: &dyn PdfBackend,
) -> Result<DocumentHandle, ReaderError> {
    let fail = |detail: String| {
        warn!("PDF load error ({}): {detail}", job.content.kind());
        ReaderError::load_failed(
            format!("{LOAD_FAILED_MESSAGE} ({detail})"),
            job.original.clone(),
        )
    };

    debug!("Loading {} document", job.content.kind());
    let bytes = read_content(&job.content, fetcher).map_err(|e| fail(e.to_string()))?;
    let doc = backend.open(&bytes).map_err(|e| fail(e.to_string()))?;

    let page_count = doc.page_count();
    let page_sizes = (0..page_count)
        .map(|index| {
            doc.page_size(index).unwrap_or_else(|e| {
                warn!("No size for page {}: {e}", index + 1);
                FALLBACK_PAGE_SIZE
            })
        })
        .collect();

    info!(
        "Opened {} document: {page_count} pages, {} bytes",
        job.content.kind(),
        bytes.len()
    );
    Ok(DocumentHandle::new(job.document, bytes.into(), page_sizes))
}
