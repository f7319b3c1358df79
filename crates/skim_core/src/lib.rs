//! Zone-to-zone travel-time matrices ("skims") for a multi-modal transport
//! network: for every pair of zones and each travel mode (car, transit,
//! teleported/beeline), a dense matrix of expected travel times in minutes
//! at a given departure time.
//!
//! Build pipeline:
//!
//! 1. [`connectors::ZoneConnectorManager`] maps each zone to representative
//!    network-access coordinates (once per zone/network state).
//! 2. [`computer::ParallelSkimComputer`] partitions origins across a fixed
//!    worker pool and fans out per mode:
//!    [`search::AggregatedTargetSearch`] (car / free-speed),
//!    [`transit::TransitRowEngine`] (schedule-based transit),
//!    [`teleport::TeleportationEstimator`] (beeline modes).
//! 3. [`imputation::IntrazonalImputer`] fills self-zone and unresolved cells
//!    in a final sequential pass.
//!
//! Collaborator layers plug in through traits: [`network::LinkCost`],
//! [`transit::TransitSchedule`], [`teleport::PointToPointRouter`].

pub mod computer;
pub mod connectors;
pub mod error;
pub mod imputation;
pub mod matrix;
pub mod network;
pub mod search;
pub mod teleport;
pub mod transit;
pub mod zones;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use computer::{ModeSpec, ParallelSkimComputer, SkimConfig};
pub use connectors::{ConnectorStrategy, ZoneConnectorManager, ZoneConnectors};
pub use error::SkimError;
pub use imputation::{IntrazonalFillParameters, IntrazonalImputer};
pub use matrix::SkimMatrix;
pub use network::{
    FreeSpeedCost, HourlyProfileCost, LinkCost, Network, NetworkBuilder, NodeId, RoutingContext,
};
pub use search::{AggregateSink, AggregatedTargetSearch, SearchScratch};
pub use teleport::{PointToPointRouter, TeleportParams, TeleportationEstimator};
pub use transit::{
    NearbyStopIndex, StopArrival, StopId, TransitFallback, TransitParams, TransitSchedule,
};
pub use zones::{Coord, Polygon, Residence, Zone, ZoneId, ZoneSystem};
