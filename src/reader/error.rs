//! Reader error taxonomy

/// Failure of the document engine
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("PDF engine: {0}")]
    Engine(String),

    #[error("page {index} out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("PDF support is not available in this build")]
    Unavailable,
}

impl BackendError {
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }
}

/// Failure to obtain the document bytes
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("network: {0}")]
    Network(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("{0}")]
    Io(String),

    #[error("malformed data URI: {0}")]
    Decode(String),

    #[error("document is larger than {limit} bytes")]
    TooLarge { limit: u64 },
}

/// Errors surfaced by a reader session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReaderError {
    /// No content reference and not marked external
    #[error("No PDF content found.")]
    ContentMissing,

    /// Fetching or opening the document failed
    #[error("{message}")]
    LoadFailed {
        message: String,
        /// Outbound link to the original document, when there is one
        original: Option<String>,
    },

    /// One page could not be rasterized
    #[error("page {page} failed to render: {detail}")]
    PageRenderFailed { page: usize, detail: String },
}

impl ReaderError {
    pub fn load_failed(message: impl Into<String>, original: Option<String>) -> Self {
        Self::LoadFailed {
            message: message.into(),
            original,
        }
    }

    /// Heading for the error panel
    pub fn title(&self) -> &'static str {
        match self {
            Self::ContentMissing => "No Content",
            Self::LoadFailed { .. } => "Unable to Load PDF",
            Self::PageRenderFailed { .. } => "Page Failed",
        }
    }

    pub fn original_link(&self) -> Option<&str> {
        match self {
            Self::LoadFailed { original, .. } => original.as_deref(),
            _ => None,
        }
    }
}
