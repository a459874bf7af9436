//! Presenter that records what the user would have seen.

use safewalk_core::PresentationSignal;
use safewalk_env::{Coordinate, Presenter, Route};
use std::sync::Mutex;

/// Records every presentation call and tracks the visible state.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    log: Mutex<Vec<PresentationSignal>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, signal: PresentationSignal) {
        if let Ok(mut log) = self.log.lock() {
            log.push(signal);
        }
    }

    /// All calls in order.
    pub fn signals(&self) -> Vec<PresentationSignal> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Whether the alert is showing after the last call.
    pub fn alert_visible(&self) -> bool {
        self.last_visibility(|s| match s {
            PresentationSignal::AlertVisible(v) => Some(*v),
            _ => None,
        })
    }

    /// Whether the resting indicator is showing after the last call.
    pub fn resting_visible(&self) -> bool {
        self.last_visibility(|s| match s {
            PresentationSignal::RestingVisible(v) => Some(*v),
            _ => None,
        })
    }

    /// Number of times the alert was raised.
    pub fn alerts_raised(&self) -> usize {
        self.count(|s| *s == PresentationSignal::AlertVisible(true))
    }

    /// Number of times the resting indicator was shown.
    pub fn resting_shown(&self) -> usize {
        self.count(|s| *s == PresentationSignal::RestingVisible(true))
    }

    /// Number of route redraws.
    pub fn redraws(&self) -> usize {
        self.count(|s| matches!(s, PresentationSignal::RedrawRoute(_)))
    }

    /// Number of map recenterings, one per accepted position.
    pub fn recenters(&self) -> usize {
        self.count(|s| matches!(s, PresentationSignal::CenterOn(..)))
    }

    /// The most recently drawn route.
    pub fn drawn_route(&self) -> Option<Route> {
        self.signals().into_iter().rev().find_map(|s| match s {
            PresentationSignal::RedrawRoute(route) => Some(route),
            _ => None,
        })
    }

    fn count(&self, f: impl Fn(&PresentationSignal) -> bool) -> usize {
        self.signals().iter().filter(|s| f(s)).count()
    }

    fn last_visibility(&self, f: impl Fn(&PresentationSignal) -> Option<bool>) -> bool {
        self.signals().iter().rev().find_map(f).unwrap_or(false)
    }
}

impl Presenter for RecordingPresenter {
    fn set_alert_visible(&self, visible: bool) {
        self.record(PresentationSignal::AlertVisible(visible));
    }

    fn set_resting_visible(&self, visible: bool) {
        self.record(PresentationSignal::RestingVisible(visible));
    }

    fn redraw_route(&self, route: &Route) {
        self.record(PresentationSignal::RedrawRoute(route.clone()));
    }

    fn center_on(&self, position: Coordinate, radius_m: f64) {
        self.record(PresentationSignal::CenterOn(position, radius_m));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_state_follows_last_call() {
        let presenter = RecordingPresenter::new();
        assert!(!presenter.alert_visible());

        presenter.set_alert_visible(true);
        presenter.set_resting_visible(true);
        presenter.set_alert_visible(false);

        assert!(!presenter.alert_visible());
        assert!(presenter.resting_visible());
        assert_eq!(presenter.alerts_raised(), 1);
        assert_eq!(presenter.resting_shown(), 1);
    }

    #[test]
    fn test_drawn_route_is_latest() {
        let presenter = RecordingPresenter::new();
        let a = Route::new(vec![Coordinate::new(1.0, 1.0)]);
        let b = Route::new(vec![Coordinate::new(2.0, 2.0)]);

        presenter.redraw_route(&a);
        presenter.redraw_route(&b);

        assert_eq!(presenter.redraws(), 2);
        assert_eq!(presenter.drawn_route(), Some(b));
    }
}
