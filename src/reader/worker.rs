//! Load and render workers - run in separate threads

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use flume::{Receiver, Sender};
use log::{debug, warn};

use super::backend::{PdfBackend, PdfDocument};
use super::cache::PageCache;
use super::loader::{ContentFetcher, DocumentId, load_document};
use super::raster::render_scale;
use super::request::{LoadJob, LoadResponse, RenderJob, RenderRequest, RenderResponse, SessionEpoch};

/// Epoch of the session whose work is still wanted
pub type LiveEpoch = Arc<AtomicU64>;

fn is_live(live: &AtomicU64, epoch: SessionEpoch) -> bool {
    live.load(Ordering::Acquire) == epoch.0
}

/// Run one document load on its own thread.
///
/// Each load gets a thread so a slow fetch for a book the user already left
/// never delays the next book.
pub fn spawn_load(
    job: LoadJob,
    fetcher: Arc<dyn ContentFetcher>,
    backend: Arc<dyn PdfBackend>,
    live: LiveEpoch,
    responses: Sender<LoadResponse>,
) {
    std::thread::spawn(move || {
        if !is_live(&live, job.epoch) {
            debug!("Skipping load for stale epoch {:?}", job.epoch);
            return;
        }
        let result = load_document(&job, fetcher.as_ref(), backend.as_ref());
        let _ = responses.send(LoadResponse {
            epoch: job.epoch,
            result,
        });
    });
}

pub fn render_worker(
    backend: Arc<dyn PdfBackend>,
    requests: Receiver<RenderRequest>,
    responses: Sender<RenderResponse>,
    cache: Arc<Mutex<PageCache>>,
    live: LiveEpoch,
) {
    let mut open: Option<(DocumentId, Box<dyn PdfDocument>)> = None;

    for request in requests {
        match request {
            RenderRequest::Render(job) => {
                if !is_live(&live, job.epoch) {
                    let _ = responses.send(RenderResponse::Skipped(job.id));
                    continue;
                }
                let response = handle_render(backend.as_ref(), &mut open, &job, &cache);
                let _ = responses.send(response);
            }

            RenderRequest::Shutdown => break,
        }
    }
}

fn handle_render(
    backend: &dyn PdfBackend,
    open: &mut Option<(DocumentId, Box<dyn PdfDocument>)>,
    job: &RenderJob,
    cache: &Arc<Mutex<PageCache>>,
) -> RenderResponse {
    let key = job.key;

    let cached = cache
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(&key);
    if let Some(surface) = cached {
        return RenderResponse::Page {
            id: job.id,
            key,
            surface,
        };
    }

    // Workers keep the last opened document; a new id means a new book
    if open.as_ref().is_none_or(|(id, _)| *id != key.document) {
        match backend.open(job.handle.bytes()) {
            Ok(doc) => *open = Some((key.document, doc)),
            Err(e) => {
                warn!("Render worker could not open document: {e}");
                *open = None;
                return RenderResponse::Failed {
                    id: job.id,
                    key,
                    detail: e.to_string(),
                };
            }
        }
    }
    let Some((_, doc)) = open.as_ref() else {
        return RenderResponse::Skipped(job.id);
    };

    let natural = job.handle.page_size(key.page_index);
    let scale = render_scale(natural, key.target_width, job.base_scale);

    match doc.render(key.page_index, scale) {
        Ok(surface) => {
            let surface = cache
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(key, surface);
            RenderResponse::Page {
                id: job.id,
                key,
                surface,
            }
        }
        Err(e) => {
            warn!("Page {} failed to render: {e}", key.page_index + 1);
            RenderResponse::Failed {
                id: job.id,
                key,
                detail: e.to_string(),
            }
        }
    }
}
