//! Two-finger pinch recognition
//!
//! Knows nothing about zoom policy: it reports the ratio between the
//! current finger distance and the distance when the pinch began.

/// A contact point in screen coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TouchPoint {
    pub x: f32,
    pub y: f32,
}

impl TouchPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TouchPhase {
    Start,
    Move,
    End,
}

/// Touch input with every active contact point
#[derive(Clone, Debug, PartialEq)]
pub struct TouchEvent {
    pub phase: TouchPhase,
    pub points: Vec<TouchPoint>,
}

impl TouchEvent {
    pub fn start(points: &[TouchPoint]) -> Self {
        Self {
            phase: TouchPhase::Start,
            points: points.to_vec(),
        }
    }

    pub fn moved(points: &[TouchPoint]) -> Self {
        Self {
            phase: TouchPhase::Move,
            points: points.to_vec(),
        }
    }

    pub fn end() -> Self {
        Self {
            phase: TouchPhase::End,
            points: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct PinchRecognizer {
    baseline: Option<f32>,
}

impl PinchRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.baseline.is_some()
    }

    /// Begin a pinch. Needs exactly two contacts that are apart.
    pub fn start(&mut self, points: &[TouchPoint]) -> bool {
        self.baseline = finger_distance(points).filter(|d| *d > 0.0);
        self.baseline.is_some()
    }

    /// Distance ratio relative to the start of the pinch
    pub fn update(&self, points: &[TouchPoint]) -> Option<f32> {
        let baseline = self.baseline?;
        let distance = finger_distance(points)?;
        Some(distance / baseline)
    }

    pub fn end(&mut self) {
        self.baseline = None;
    }
}

fn finger_distance(points: &[TouchPoint]) -> Option<f32> {
    let [a, b] = points else {
        return None;
    };
    Some((a.x - b.x).hypot(a.y - b.y))
}
