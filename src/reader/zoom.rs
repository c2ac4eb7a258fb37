//! Zoom factor for the reader
//!
//! Step zoom from buttons/keys and continuous zoom from a pinch gesture
//! share one clamped factor. The factor only feeds the render width.

use super::gesture::{PinchRecognizer, TouchEvent, TouchPhase};

#[derive(Debug)]
pub struct ZoomController {
    factor: f32,
    pinch: PinchRecognizer,
    /// Factor when the current pinch began
    pinch_base: f32,
}

impl Default for ZoomController {
    fn default() -> Self {
        Self {
            factor: Self::DEFAULT,
            pinch: PinchRecognizer::new(),
            pinch_base: Self::DEFAULT,
        }
    }
}

impl ZoomController {
    pub const DEFAULT: f32 = 1.0;
    pub const MIN: f32 = 0.5;
    pub const MAX: f32 = 3.0;
    pub const STEP: f32 = 0.25;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn percent(&self) -> u32 {
        (self.factor * 100.0).round() as u32
    }

    pub fn zoom_in(&mut self) -> bool {
        self.set(self.factor + Self::STEP)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.set(self.factor - Self::STEP)
    }

    pub fn is_pinching(&self) -> bool {
        self.pinch.is_active()
    }

    /// Feed a touch event; returns true when the factor changed
    pub fn touch(&mut self, event: &TouchEvent) -> bool {
        match event.phase {
            TouchPhase::Start => {
                if self.pinch.start(&event.points) {
                    self.pinch_base = self.factor;
                }
                false
            }
            TouchPhase::Move => match self.pinch.update(&event.points) {
                Some(ratio) => self.set(self.pinch_base * ratio),
                None => false,
            },
            TouchPhase::End => {
                self.pinch.end();
                false
            }
        }
    }

    /// Page width in pixels for the current factor
    pub fn target_width(&self, base_page_width: f32) -> u32 {
        (base_page_width * self.factor).round().max(1.0) as u32
    }

    fn set(&mut self, factor: f32) -> bool {
        let factor = Self::clamp_factor(factor);
        if (factor - self.factor).abs() < f32::EPSILON {
            return false;
        }
        self.factor = factor;
        true
    }

    /// Clamp into `[MIN, MAX]`, mapping NaN/Inf to the default
    pub fn clamp_factor(factor: f32) -> f32 {
        if factor.is_finite() {
            factor.clamp(Self::MIN, Self::MAX)
        } else {
            Self::DEFAULT
        }
    }
}
