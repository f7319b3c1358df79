//! Beeline travel-time estimation for modes without a network representation.
//!
//! The raw contract is `time = beeline × factor ÷ speed`. When a generic
//! point-to-point routing collaborator is available it is consulted first;
//! the raw formula stays as the fallback.

use serde::{Deserialize, Serialize};

use crate::zones::Coord;

/// Optional point-to-point routing capability from the collaborator layer.
pub trait PointToPointRouter: Send + Sync {
    /// Travel time in seconds, `None` when the router cannot serve the pair.
    fn travel_time_s(&self, from: Coord, to: Coord, departure_time_s: f64) -> Option<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeleportParams {
    /// Detour factor applied to the beeline distance.
    pub beeline_factor: f64,
    pub speed_mps: f64,
}

impl Default for TeleportParams {
    fn default() -> Self {
        Self {
            beeline_factor: 1.3,
            speed_mps: 4.17, // ~15 km/h, a generic teleported mode
        }
    }
}

pub struct TeleportationEstimator<'a> {
    params: TeleportParams,
    router: Option<&'a dyn PointToPointRouter>,
}

impl<'a> TeleportationEstimator<'a> {
    pub fn new(params: TeleportParams) -> Self {
        Self {
            params,
            router: None,
        }
    }

    pub fn with_router(params: TeleportParams, router: &'a dyn PointToPointRouter) -> Self {
        Self {
            params,
            router: Some(router),
        }
    }

    /// Estimated travel time in seconds.
    pub fn travel_time_s(&self, from: Coord, to: Coord, departure_time_s: f64) -> f64 {
        if let Some(router) = self.router {
            if let Some(routed) = router.travel_time_s(from, to, departure_time_s) {
                return routed;
            }
        }
        from.distance_to(to) * self.params.beeline_factor / self.params.speed_mps
    }
}
