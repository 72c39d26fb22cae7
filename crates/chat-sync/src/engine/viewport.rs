//! Scroll anchoring for backward pagination
//!
//! Prepending older messages grows the content above the reader. The height
//! is measured before the merge; once the renderer has painted the new rows,
//! scrolling by the growth keeps the same message under the reader's eye.

use super::PageOutcome;

/// What the engine needs from a scrollable renderer
pub trait Viewport {
    /// Total content height in renderer units
    fn content_height(&self) -> f64;

    /// Move the scroll position down by `delta`
    fn scroll_by(&mut self, delta: f64);
}

/// Pending scroll adjustment for one merged page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollCompensation {
    height_before: f64,
}

impl ScrollCompensation {
    pub fn new(height_before: f64) -> Self {
        Self { height_before }
    }

    pub fn height_before(&self) -> f64 {
        self.height_before
    }

    /// Scroll by the content growth since measurement; call after paint
    ///
    /// Returns the applied delta. Content that did not grow is left alone.
    pub fn apply(&self, viewport: &mut dyn Viewport) -> f64 {
        let delta = viewport.content_height() - self.height_before;
        if delta > 0.0 {
            viewport.scroll_by(delta);
            delta
        } else {
            0.0
        }
    }
}

/// Page outcome plus the compensation to apply once it is painted
#[derive(Debug, Clone, PartialEq)]
pub struct CompensatedPage {
    pub outcome: PageOutcome,
    pub compensation: Option<ScrollCompensation>,
}
