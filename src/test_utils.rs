//! Fakes and helpers shared by unit and integration tests

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::reader::{
    BackendError, ContentFetcher, FetchError, PageSize, PdfBackend, PdfDocument, RasterSurface,
};

const FAKE_MAGIC: &str = "%FAKE-PDF pages=";
/// Natural size of every fake page, in points
pub const FAKE_PAGE_SIZE: PageSize = PageSize::new(600.0, 800.0);

/// Bytes the fake backend opens as an `n`-page document
pub fn fake_pdf(pages: usize) -> Vec<u8> {
    format!("{FAKE_MAGIC}{pages}\n").into_bytes()
}

/// Gray level of a fake page, so tests can tell pages apart by pixel
pub fn fake_page_shade(index: usize) -> u8 {
    (index % 200) as u8 + 40
}

/// Document engine that understands [`fake_pdf`] bytes
#[derive(Clone, Debug, Default)]
pub struct FakeBackend {
    failing_pages: HashSet<usize>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendering page `index` (0-based) fails
    pub fn failing_page(mut self, index: usize) -> Self {
        self.failing_pages.insert(index);
        self
    }

}

impl PdfBackend for FakeBackend {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PdfDocument>, BackendError> {
        let text = std::str::from_utf8(bytes).map_err(|_| BackendError::engine("not a PDF"))?;
        let page_count = text
            .strip_prefix(FAKE_MAGIC)
            .and_then(|rest| rest.trim().parse::<usize>().ok())
            .ok_or_else(|| BackendError::engine("not a PDF"))?;

        Ok(Box::new(FakeDocument {
            page_count,
            failing_pages: self.failing_pages.clone(),
        }))
    }
}

struct FakeDocument {
    page_count: usize,
    failing_pages: HashSet<usize>,
}

impl PdfDocument for FakeDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_size(&self, index: usize) -> Result<PageSize, BackendError> {
        if index >= self.page_count {
            return Err(BackendError::PageOutOfRange {
                index,
                count: self.page_count,
            });
        }
        Ok(FAKE_PAGE_SIZE)
    }

    fn render(&self, index: usize, scale: f32) -> Result<RasterSurface, BackendError> {
        if index >= self.page_count {
            return Err(BackendError::PageOutOfRange {
                index,
                count: self.page_count,
            });
        }
        if self.failing_pages.contains(&index) {
            return Err(BackendError::engine(format!("corrupt page {}", index + 1)));
        }

        let width = (FAKE_PAGE_SIZE.width * scale).round().max(1.0) as u32;
        let height = (FAKE_PAGE_SIZE.height * scale).round().max(1.0) as u32;
        let shade = fake_page_shade(index);
        let mut surface = RasterSurface::solid(index, width, height, [shade, shade, shade]);
        surface.scale = scale;
        Ok(surface)
    }
}

/// Fetcher serving canned responses, recording every request
#[derive(Clone, Default)]
pub struct FakeFetcher {
    responses: HashMap<String, Vec<u8>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeFetcher {
    pub fn with(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.responses.insert(url.into(), bytes);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl ContentFetcher for FakeFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                status: 404,
                url: url.to_string(),
            })
    }
}

pub mod test_helpers {
    use crate::event_source::{Event, KeyCode, SimulatedEventSource};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    /// Builder for creating test scenarios with simulated user input
    #[derive(Default)]
    pub struct TestScenarioBuilder {
        events: Vec<Event>,
    }

    impl TestScenarioBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn press_key(mut self, code: KeyCode) -> Self {
            self.events.push(SimulatedEventSource::plain_key(code));
            self
        }

        pub fn press_enter(self) -> Self {
            self.press_key(KeyCode::Enter)
        }

        pub fn press_esc(self) -> Self {
            self.press_key(KeyCode::Esc)
        }

        /// Move down the list n times (press 'j' n times)
        pub fn navigate_down(mut self, times: usize) -> Self {
            for _ in 0..times {
                self.events.push(SimulatedEventSource::char_key('j'));
            }
            self
        }

        pub fn next_page(self) -> Self {
            self.press_key(KeyCode::Right)
        }

        pub fn prev_page(self) -> Self {
            self.press_key(KeyCode::Left)
        }

        /// Quit the application (press 'q')
        pub fn quit(mut self) -> Self {
            self.events.push(SimulatedEventSource::char_key('q'));
            self
        }

        pub fn build(self) -> SimulatedEventSource {
            SimulatedEventSource::new(self.events)
        }
    }

    /// Create a test terminal for snapshot testing
    pub fn create_test_terminal(width: u16, height: u16) -> Terminal<TestBackend> {
        let backend = TestBackend::new(width, height);
        match Terminal::new(backend) {
            Ok(terminal) => terminal,
            Err(e) => panic!("test terminal: {e}"),
        }
    }

    /// Capture the current terminal buffer as a string
    pub fn capture_terminal_state(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut lines = Vec::new();

        for y in 0..buffer.area.height {
            let mut line = String::new();
            for x in 0..buffer.area.width {
                line.push_str(buffer[(x, y)].symbol());
            }
            lines.push(line.trim_end().to_string());
        }

        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }

        lines.join("\n")
    }
}
