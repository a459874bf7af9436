//! Presentation layer boundary.

use crate::types::{Coordinate, Route};

/// Receives the visual signals computed by the tracking core.
///
/// Rendering and animation live entirely on the other side of this trait.
pub trait Presenter: Send + Sync + 'static {
    /// Shows or hides the "wrong way" alert.
    fn set_alert_visible(&self, visible: bool);

    /// Shows or hides the resting (safe region) indicator.
    fn set_resting_visible(&self, visible: bool);

    /// Clears any previously drawn route and draws `route`.
    fn redraw_route(&self, route: &Route);

    /// Recenters the map on `position` with the given visible radius.
    fn center_on(&self, position: Coordinate, radius_m: f64);
}
