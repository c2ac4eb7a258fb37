//! Reader service - runs a session's effects on worker threads

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use flume::{Receiver, Sender};
use log::{debug, info};

use super::backend::PdfBackend;
use super::cache::PageCache;
use super::loader::ContentFetcher;
use super::request::{LoadResponse, RenderRequest, RenderResponse};
use super::session::{Command, Effect, ReaderSession};
use super::view::{HeaderView, ReaderView};
use super::worker::{LiveEpoch, render_worker, spawn_load};
use super::ReaderConfig;
use crate::book::Book;

/// Callbacks from the reader to whoever embeds it
pub trait ReaderHost {
    /// The user dismissed the reader
    fn on_exit(&mut self);

    /// Debounced reading position of `book_id`
    fn on_update_progress(&mut self, book_id: &str, page: usize);
}

/// Host callbacks as messages, for hosts that poll a channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReaderEvent {
    UpdateProgress { book_id: String, page: usize },
    Exit,
}

impl ReaderHost for Sender<ReaderEvent> {
    fn on_exit(&mut self) {
        let _ = self.send(ReaderEvent::Exit);
    }

    fn on_update_progress(&mut self, book_id: &str, page: usize) {
        let _ = self.send(ReaderEvent::UpdateProgress {
            book_id: book_id.to_string(),
            page,
        });
    }
}

/// Owns a [`ReaderSession`] plus the threads doing its loads and renders
pub struct ReaderService {
    session: ReaderSession,
    host: Box<dyn ReaderHost>,
    backend: Arc<dyn PdfBackend>,
    fetcher: Arc<dyn ContentFetcher>,
    live: LiveEpoch,
    request_tx: Sender<RenderRequest>,
    response_rx: Receiver<RenderResponse>,
    load_tx: Sender<LoadResponse>,
    load_rx: Receiver<LoadResponse>,
    cache: Arc<Mutex<PageCache>>,
    num_workers: usize,
}

impl ReaderService {
    pub fn new(
        book: Book,
        config: ReaderConfig,
        backend: Arc<dyn PdfBackend>,
        fetcher: Arc<dyn ContentFetcher>,
        host: Box<dyn ReaderHost>,
    ) -> Self {
        let num_workers = config.render_workers.max(1);
        let cache = Arc::new(Mutex::new(PageCache::new(config.page_cache_size)));
        let live: LiveEpoch = Arc::new(AtomicU64::new(0));

        // flume for MPMC: workers share one request queue
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();
        let (load_tx, load_rx) = flume::unbounded();

        for _ in 0..num_workers {
            let backend = backend.clone();
            let rx = request_rx.clone();
            let tx = response_tx.clone();
            let cache = cache.clone();
            let live = live.clone();

            std::thread::spawn(move || {
                render_worker(backend, rx, tx, cache, live);
            });
        }

        let (session, effects) = ReaderSession::open(book, config);
        let mut service = Self {
            session,
            host,
            backend,
            fetcher,
            live,
            request_tx,
            response_rx,
            load_tx,
            load_rx,
            cache,
            num_workers,
        };
        service.execute_effects(effects);
        service
    }

    pub fn session(&self) -> &ReaderSession {
        &self.session
    }

    pub fn view(&self) -> ReaderView {
        self.session.view()
    }

    pub fn header(&self) -> HeaderView {
        self.session.header()
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    pub fn apply(&mut self, cmd: Command) {
        self.apply_at(cmd, Instant::now());
    }

    pub fn apply_at(&mut self, cmd: Command, now: Instant) {
        let effects = self.session.apply(cmd, now);
        self.execute_effects(effects);
    }

    pub fn switch_book(&mut self, book: Book) {
        let effects = self.session.switch_book(book);
        self.execute_effects(effects);
    }

    /// Drain completions and run timers; returns true when the view changed
    pub fn poll(&mut self) -> bool {
        self.poll_at(Instant::now())
    }

    pub fn poll_at(&mut self, now: Instant) -> bool {
        let mut changed = false;

        while let Ok(response) = self.load_rx.try_recv() {
            let effects = self.session.on_load_completed(response, now);
            self.execute_effects(effects);
            changed = true;
        }

        while let Ok(response) = self.response_rx.try_recv() {
            changed |= self.session.on_render_response(response);
        }

        let intent = self.session.flip_intent();
        let effects = self.session.tick(now);
        changed |= intent != self.session.flip_intent();
        self.execute_effects(effects);

        changed
    }

    fn execute_effects(&mut self, effects: Vec<Effect>) {
        // Workers compare against this before starting any job
        self.live.store(self.session.epoch().0, Ordering::Release);

        for effect in effects {
            match effect {
                Effect::Load(job) => {
                    spawn_load(
                        job,
                        self.fetcher.clone(),
                        self.backend.clone(),
                        self.live.clone(),
                        self.load_tx.clone(),
                    );
                }

                Effect::Render(job) => {
                    debug!("Render page {} at {:?}px", job.key.page_index + 1, job.key.target_width);
                    let _ = self.request_tx.send(RenderRequest::Render(job));
                }

                Effect::SaveProgress { book_id, page } => {
                    self.host.on_update_progress(&book_id, page);
                }

                Effect::ReleaseDocument(document) => {
                    self.cache
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .invalidate_document(document);
                }

                Effect::Exit => {
                    info!("Reader closed");
                    self.host.on_exit();
                }
            }
        }
    }

    /// Shutdown all workers
    pub fn shutdown(&self) {
        self.live.store(0, Ordering::Release);
        for _ in 0..self.num_workers {
            let _ = self.request_tx.send(RenderRequest::Shutdown);
        }
    }
}

impl Drop for ReaderService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::book::embed_pdf;
    use crate::reader::{NavState, SlotState};
    use crate::test_utils::{FakeBackend, FakeFetcher, fake_pdf};

    fn service(book: Book, config: ReaderConfig) -> (ReaderService, Receiver<ReaderEvent>) {
        let (tx, rx) = flume::unbounded();
        let service = ReaderService::new(
            book,
            config,
            Arc::new(FakeBackend::new()),
            Arc::new(FakeFetcher::default()),
            Box::new(tx),
        );
        (service, rx)
    }

    fn poll_until(service: &mut ReaderService, mut done: impl FnMut(&ReaderService) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(service) {
            assert!(Instant::now() < deadline, "timed out waiting for reader");
            service.poll();
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn loads_and_renders_first_page() {
        let book = Book::new("1", "a").with_pdf_url(embed_pdf(&fake_pdf(4)));
        let (mut service, _) = service(book, ReaderConfig::default());

        poll_until(&mut service, |s| match s.view() {
            ReaderView::Flip(flip) => flip.page.state.is_rendered(),
            _ => false,
        });
        assert_eq!(
            service.session().nav_state(),
            NavState::Ready {
                current_page: 1,
                page_count: 4
            }
        );
    }

    #[test]
    fn host_receives_progress_and_exit() {
        let book = Book::new("1", "a").with_pdf_url(embed_pdf(&fake_pdf(4)));
        let config = ReaderConfig {
            progress_debounce: Duration::from_millis(20),
            ..ReaderConfig::default()
        };
        let (mut service, events) = service(book, config);
        poll_until(&mut service, |s| s.session().current_page().is_some());

        service.apply(Command::NextPage);
        service.apply(Command::NextPage);
        poll_until(&mut service, |s| !s.session().has_pending_save());
        assert_eq!(
            events.try_recv(),
            Ok(ReaderEvent::UpdateProgress {
                book_id: "1".into(),
                page: 3
            })
        );
        assert!(events.try_recv().is_err());

        service.apply(Command::Exit);
        assert_eq!(events.try_recv(), Ok(ReaderEvent::Exit));
        assert!(service.is_closed());
    }

    #[test]
    fn render_failure_marks_only_that_page() {
        let (tx, _rx) = flume::unbounded();
        let book = Book::new("1", "a").with_pdf_url(embed_pdf(&fake_pdf(3)));
        let mut service = ReaderService::new(
            book,
            ReaderConfig::default(),
            Arc::new(FakeBackend::new().failing_page(0)),
            Arc::new(FakeFetcher::default()),
            Box::new(tx),
        );

        poll_until(&mut service, |s| match s.view() {
            ReaderView::Flip(flip) => matches!(flip.page.state, SlotState::Failed(_)),
            _ => false,
        });
        service.apply(Command::NextPage);
        poll_until(&mut service, |s| match s.view() {
            ReaderView::Flip(flip) => flip.page.state.is_rendered(),
            _ => false,
        });
    }
}
