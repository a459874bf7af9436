//! Ground truth walker for simulation.
//!
//! The Walker is the "God's eye view" of the child:
//! - True position along a scripted path at walking pace
//! - Noisy GPS fixes derived from it
//! - Geofence entry/exit events when the true position crosses a region

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use safewalk_core::geometry::{distance_m, offset_m};
use safewalk_env::{Coordinate, LocationEvent};

/// One leg of the scripted path.
#[derive(Debug, Clone, Copy)]
struct Leg {
    to: Coordinate,

    /// Fixes spent standing at `to` after arriving
    dwell: u32,
}

/// A circular region the simulated OS reports entry and exit for.
#[derive(Debug, Clone)]
pub struct Geofence {
    pub id: String,
    pub center: Coordinate,
    pub radius_m: f64,
    inside: bool,
}

/// Walks a scripted path and emits location events.
pub struct Walker {
    /// RNG for GPS noise
    rng: ChaCha8Rng,

    /// Current true position
    position: Coordinate,

    legs: Vec<Leg>,
    next_leg: usize,
    dwell_left: u32,

    /// Distance covered per fix in meters (default: 1.4, walking pace at 1 Hz)
    step_m: f64,

    /// GPS noise standard deviation per axis in meters (default: 2.0)
    gps_noise_std: f64,

    geofence: Option<Geofence>,
    started: bool,
}

impl Walker {
    /// Creates a walker standing at `start`.
    pub fn new(seed: u64, start: Coordinate) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            position: start,
            legs: Vec::new(),
            next_leg: 0,
            dwell_left: 0,
            step_m: 1.4,
            gps_noise_std: 2.0,
            geofence: None,
            started: false,
        }
    }

    /// Appends a leg walking straight to `to`.
    pub fn then_to(mut self, to: Coordinate) -> Self {
        self.legs.push(Leg { to, dwell: 0 });
        self
    }

    /// Stays put for `fixes` fixes after reaching the last leg.
    pub fn dwell(mut self, fixes: u32) -> Self {
        if let Some(leg) = self.legs.last_mut() {
            leg.dwell += fixes;
        }
        self
    }

    pub fn with_step(mut self, step_m: f64) -> Self {
        self.step_m = step_m;
        self
    }

    /// Sets the GPS noise standard deviation (0 = exact fixes).
    pub fn with_noise(mut self, std_dev: f64) -> Self {
        self.gps_noise_std = std_dev;
        self
    }

    /// Reports entry and exit for a circular region.
    pub fn with_geofence(
        mut self,
        id: impl Into<String>,
        center: Coordinate,
        radius_m: f64,
    ) -> Self {
        let inside = distance_m(&self.position, &center) <= radius_m;
        self.geofence = Some(Geofence {
            id: id.into(),
            center,
            radius_m,
            inside,
        });
        self
    }

    /// Returns the true position.
    pub fn position(&self) -> Coordinate {
        self.position
    }

    /// True once the path is exhausted.
    pub fn is_finished(&self) -> bool {
        self.started && self.next_leg >= self.legs.len() && self.dwell_left == 0
    }

    /// Moves one fix forward and returns the events it produces.
    ///
    /// The first call reports the start position without moving.
    pub fn next_fix(&mut self) -> Option<Vec<LocationEvent>> {
        if self.is_finished() {
            return None;
        }

        if !self.started {
            self.started = true;
        } else if self.dwell_left > 0 {
            self.dwell_left -= 1;
        } else {
            self.advance(self.step_m);
        }

        let mut events = self.geofence_events();
        events.push(LocationEvent::Position(self.observe()));
        Some(events)
    }

    fn advance(&mut self, mut remaining: f64) {
        while remaining > 0.0 {
            let Some(leg) = self.legs.get(self.next_leg).copied() else {
                return;
            };

            let d = distance_m(&self.position, &leg.to);
            if d <= remaining {
                self.position = leg.to;
                self.next_leg += 1;
                if leg.dwell > 0 {
                    self.dwell_left = leg.dwell;
                    return;
                }
                remaining -= d;
            } else {
                let t = remaining / d;
                self.position = Coordinate::new(
                    self.position.latitude + (leg.to.latitude - self.position.latitude) * t,
                    self.position.longitude + (leg.to.longitude - self.position.longitude) * t,
                );
                return;
            }
        }
    }

    /// Generates a noisy GPS fix for the true position.
    fn observe(&mut self) -> Coordinate {
        let normal = match Normal::new(0.0, self.gps_noise_std) {
            Ok(normal) if self.gps_noise_std > 0.0 => normal,
            _ => return self.position,
        };
        let north = normal.sample(&mut self.rng);
        let east = normal.sample(&mut self.rng);
        offset_m(&self.position, north, east)
    }

    fn geofence_events(&mut self) -> Vec<LocationEvent> {
        let Some(fence) = self.geofence.as_mut() else {
            return Vec::new();
        };

        let inside = distance_m(&self.position, &fence.center) <= fence.radius_m;
        if inside == fence.inside {
            return Vec::new();
        }
        fence.inside = inside;

        if inside {
            vec![LocationEvent::RegionEntered(fence.id.clone())]
        } else {
            vec![LocationEvent::RegionExited(fence.id.clone())]
        }
    }
}

impl Iterator for Walker {
    type Item = Vec<LocationEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_fix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HOME: Coordinate = Coordinate::new(52.3850, 13.1150);
    const SCHOOL: Coordinate = Coordinate::new(52.3890, 13.1195);

    fn positions(walker: Walker) -> Vec<Coordinate> {
        walker
            .flatten()
            .filter_map(|e| match e {
                LocationEvent::Position(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_exact_walk_reaches_target() {
        let fixes = positions(Walker::new(1, HOME).then_to(SCHOOL).with_noise(0.0));

        assert_eq!(fixes.first(), Some(&HOME));
        assert_eq!(fixes.last(), Some(&SCHOOL));

        let expected = (distance_m(&HOME, &SCHOOL) / 1.4).ceil() as usize + 1;
        assert_eq!(fixes.len(), expected);
    }

    #[test]
    fn test_dwell_repeats_position() {
        let fixes = positions(
            Walker::new(1, HOME)
                .then_to(offset_m(&HOME, 2.0, 0.0))
                .dwell(3)
                .with_step(5.0)
                .with_noise(0.0),
        );

        // start, arrival, three dwell fixes
        assert_eq!(fixes.len(), 5);
        assert_eq!(fixes[1], fixes[4]);
    }

    #[test]
    fn test_geofence_entry_and_exit() {
        let beyond = offset_m(&SCHOOL, 100.0, 0.0);
        let events: Vec<LocationEvent> = Walker::new(1, HOME)
            .then_to(SCHOOL)
            .then_to(beyond)
            .with_noise(0.0)
            .with_step(5.0)
            .with_geofence("school", SCHOOL, 50.0)
            .flatten()
            .filter(|e| !matches!(e, LocationEvent::Position(_)))
            .collect();

        assert_eq!(
            events,
            vec![
                LocationEvent::RegionEntered("school".into()),
                LocationEvent::RegionExited("school".into()),
            ]
        );
    }

    #[test]
    fn test_same_seed_same_fixes() {
        let a = positions(Walker::new(7, HOME).then_to(SCHOOL));
        let b = positions(Walker::new(7, HOME).then_to(SCHOOL));
        let c = positions(Walker::new(8, HOME).then_to(SCHOOL));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    proptest! {
        #[test]
        fn test_noise_stays_near_truth(seed in any::<u64>(), std in 0.5f64..5.0) {
            let mut walker = Walker::new(seed, HOME).then_to(SCHOOL).with_noise(std);
            while let Some(events) = walker.next_fix() {
                let truth = walker.position();
                for event in events {
                    if let LocationEvent::Position(p) = event {
                        // 8 sigma on each axis
                        prop_assert!(distance_m(&p, &truth) < std * 8.0 * 1.5);
                    }
                }
            }
        }
    }
}
