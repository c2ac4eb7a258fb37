//! Load and render request/response types

use std::sync::Arc;

use super::error::ReaderError;
use super::loader::{DocumentHandle, DocumentId};
use super::raster::{RasterSurface, SlotKey};
use crate::book::ContentRef;

/// Unique identifier for render requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Generation of a reader session.
///
/// Bumped whenever the open book changes or the reader exits; async work
/// tagged with an older epoch is ignored on arrival.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionEpoch(pub u64);

impl SessionEpoch {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Document load to run off the UI thread
#[derive(Clone, Debug)]
pub struct LoadJob {
    pub epoch: SessionEpoch,
    pub document: DocumentId,
    pub content: ContentRef,
    /// Outbound link reported with failures
    pub original: Option<String>,
}

#[derive(Debug)]
pub struct LoadResponse {
    pub epoch: SessionEpoch,
    pub result: Result<DocumentHandle, ReaderError>,
}

/// Page render to run on a worker
#[derive(Clone, Debug)]
pub struct RenderJob {
    pub id: RequestId,
    pub epoch: SessionEpoch,
    pub key: SlotKey,
    pub handle: DocumentHandle,
    /// Scale used when the key has no target width
    pub base_scale: f32,
}

/// Message to render workers
#[derive(Debug)]
pub enum RenderRequest {
    Render(RenderJob),
    /// Shutdown the worker
    Shutdown,
}

/// Response from render workers
#[derive(Debug)]
pub enum RenderResponse {
    Page {
        id: RequestId,
        key: SlotKey,
        surface: Arc<RasterSurface>,
    },

    Failed {
        id: RequestId,
        key: SlotKey,
        detail: String,
    },

    /// The job belonged to a session that is no longer live
    Skipped(RequestId),
}
