//! Presentation signals emitted by the tracking core.

use safewalk_env::{Coordinate, Presenter, Route};

/// One instruction for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationSignal {
    /// Show or hide the wrong-way alert
    AlertVisible(bool),

    /// Show or hide the resting indicator
    RestingVisible(bool),

    /// Replace the drawn route
    RedrawRoute(Route),

    /// Recenter the map on a position with a visible radius in meters
    CenterOn(Coordinate, f64),
}

impl PresentationSignal {
    /// Forwards this signal to a presenter.
    pub fn deliver<P: Presenter + ?Sized>(&self, presenter: &P) {
        match self {
            PresentationSignal::AlertVisible(v) => presenter.set_alert_visible(*v),
            PresentationSignal::RestingVisible(v) => presenter.set_resting_visible(*v),
            PresentationSignal::RedrawRoute(route) => presenter.redraw_route(route),
            PresentationSignal::CenterOn(position, radius_m) => {
                presenter.center_on(*position, *radius_m)
            }
        }
    }
}

/// Remembers the last visibility sent for one indicator so repeated
/// requests for the same state are dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisibilityLatch {
    visible: bool,
}

impl VisibilityLatch {
    /// Creates a latch in the hidden state.
    pub fn hidden() -> Self {
        Self { visible: false }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Requests a visibility. Returns `Some(visible)` only if the state
    /// changed.
    pub fn set(&mut self, visible: bool) -> Option<bool> {
        if self.visible == visible {
            None
        } else {
            self.visible = visible;
            Some(visible)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latch_only_reports_changes() {
        let mut latch = VisibilityLatch::hidden();

        assert_eq!(latch.set(false), None);
        assert_eq!(latch.set(true), Some(true));
        assert_eq!(latch.set(true), None);
        assert!(latch.is_visible());
        assert_eq!(latch.set(false), Some(false));
    }
}
