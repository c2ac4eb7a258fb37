//! Book records and content references

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

const PDF_MIME: &str = "application/pdf";

/// A book in the library.
///
/// Field names serialize in camelCase so stored libraries stay compatible
/// with the `books.json` layout (`pdfUrl`, `isExternal`, `lastReadPage`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_external: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_read_page: Option<usize>,
}

impl Book {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            author: String::new(),
            description: String::new(),
            cover_url: String::new(),
            pdf_url: None,
            is_external: false,
            last_read_page: None,
        }
    }

    /// Build a book from a local PDF file or a URL.
    ///
    /// Local files are embedded as a base64 `data:` URI, URLs are kept as-is.
    pub fn from_source(source: &str, title: impl Into<String>) -> Result<Self> {
        let pdf_url = if is_remote(source) {
            source.to_string()
        } else {
            let bytes = fs::read(source).with_context(|| format!("Failed to read {source}"))?;
            embed_pdf(&bytes)
        };

        let mut book = Self::new(generate_id(), title);
        book.pdf_url = Some(pdf_url);
        Ok(book)
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_cover(mut self, cover_url: impl Into<String>) -> Self {
        self.cover_url = cover_url.into();
        self
    }

    pub fn with_pdf_url(mut self, pdf_url: impl Into<String>) -> Self {
        self.pdf_url = Some(pdf_url.into());
        self
    }

    pub fn external(mut self) -> Self {
        self.is_external = true;
        self
    }

    pub fn with_last_read_page(mut self, page: usize) -> Self {
        self.last_read_page = Some(page);
        self
    }

    /// Page to reopen at; 1 when nothing was saved yet
    pub fn resume_page(&self) -> usize {
        self.last_read_page.unwrap_or(1).max(1)
    }

    pub fn content(&self) -> Option<ContentRef> {
        self.pdf_url.as_deref().map(ContentRef::parse)
    }

    /// Link that can be opened outside the reader, if the content has one.
    ///
    /// Embedded documents have no meaningful outbound link.
    pub fn original_link(&self) -> Option<&str> {
        match self.content()? {
            ContentRef::Embedded { .. } => None,
            _ => self.pdf_url.as_deref(),
        }
    }

    /// Whether the header should offer an "open original" affordance
    pub fn has_external_affordance(&self) -> bool {
        self.is_external || self.pdf_url.as_deref().is_some_and(is_remote)
    }

    pub fn progress_label(&self) -> String {
        match self.last_read_page {
            Some(page) if page > 1 => format!("p. {page}"),
            _ => "new".to_string(),
        }
    }
}

/// Parsed form of a book's `pdf_url`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentRef {
    /// `data:` URI with the document inline
    Embedded { mime: String, data: String, base64: bool },
    /// `http://` or `https://` URL
    Remote(String),
    /// Anything else is read from the filesystem
    Path(PathBuf),
}

impl ContentRef {
    pub fn parse(reference: &str) -> Self {
        if let Some(rest) = reference.strip_prefix("data:") {
            let (meta, data) = rest.split_once(',').unwrap_or((rest, ""));
            let base64 = meta.ends_with(";base64");
            let mime = meta.trim_end_matches(";base64");
            return Self::Embedded {
                mime: if mime.is_empty() {
                    PDF_MIME.to_string()
                } else {
                    mime.to_string()
                },
                data: data.to_string(),
                base64,
            };
        }

        if is_remote(reference) {
            return Self::Remote(reference.to_string());
        }

        Self::Path(PathBuf::from(reference.strip_prefix("file://").unwrap_or(reference)))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Embedded { .. } => "embedded",
            Self::Remote(_) => "remote",
            Self::Path(_) => "path",
        }
    }
}

pub fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

pub fn embed_pdf(bytes: &[u8]) -> String {
    format!("data:{PDF_MIME};base64,{}", BASE64.encode(bytes))
}

/// Title fallback for `add` when none is given: the file stem or URL tail
pub fn title_from_source(source: &str) -> String {
    let tail = source.rsplit('/').next().unwrap_or(source);
    Path::new(tail)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("Untitled")
        .to_string()
}

fn generate_id() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}
