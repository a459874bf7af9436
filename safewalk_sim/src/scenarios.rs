//! Simulation scenarios for the tracking session.

use serde::Serialize;

/// A scripted walk the runner knows how to replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// SW-001: Noisy walk straight to school, no deviation
    SchoolRun,

    /// SW-002: Child leaves the route and comes back
    Detour,

    /// SW-003: Arrival at and departure from the school region
    SchoolArrival,

    /// SW-004: Directions service down for the first requests
    RoutingOutage,

    /// SW-005: Route calculations finish out of order
    StaleRoute,

    /// SW-006: Directions slower than the fix rate, through the event loop
    SlowRouting,
}

impl ScenarioId {
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SchoolRun,
            ScenarioId::Detour,
            ScenarioId::SchoolArrival,
            ScenarioId::RoutingOutage,
            ScenarioId::StaleRoute,
            ScenarioId::SlowRouting,
        ]
    }

    /// Name accepted by `--scenario`.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::SchoolRun => "school_run",
            ScenarioId::Detour => "detour",
            ScenarioId::SchoolArrival => "school_arrival",
            ScenarioId::RoutingOutage => "routing_outage",
            ScenarioId::StaleRoute => "stale_route",
            ScenarioId::SlowRouting => "slow_routing",
        }
    }

    /// One line for `--help` style listings.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::SchoolRun => "Walk to the destination with 2m GPS noise, expect no alerts",
            ScenarioId::Detour => "60m detour mid-walk, expect alert, re-route and recovery",
            ScenarioId::SchoolArrival => "Stop at school, expect resting shown then withdrawn",
            ScenarioId::RoutingOutage => "3 failed and 1 empty calculation, then recovery",
            ScenarioId::StaleRoute => "Newer calculation finishes first, older result discarded",
            ScenarioId::SlowRouting => "Fixes arrive faster than routes, expect a route anyway",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase().replace('_', "");
        ScenarioId::all()
            .into_iter()
            .enumerate()
            .find(|(i, id)| {
                id.name().replace('_', "") == wanted || format!("sw-{:03}", i + 1) == wanted
            })
            .map(|(_, id)| id)
            .ok_or_else(|| format!("no scenario named '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
            assert_eq!(scenario.to_string(), scenario.name());
        }
    }

    #[test]
    fn test_parse_aliases_and_unknown() {
        assert_eq!("SW-002".parse::<ScenarioId>(), Ok(ScenarioId::Detour));
        assert_eq!("StaleRoute".parse::<ScenarioId>(), Ok(ScenarioId::StaleRoute));
        assert!("time_warp".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_serializes_as_name() {
        let json = serde_json::to_string(&ScenarioId::RoutingOutage).unwrap();
        assert_eq!(json, "\"routing_outage\"");
    }
}
