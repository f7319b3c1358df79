//! Error type for skim builds.
//!
//! Worker-task failures are fail-fast: the first error aborts the whole build
//! and no partial matrix is returned. Unresolved cells are not errors; they
//! are recovered by the intrazonal imputation pass.

use thiserror::Error;

use crate::zones::ZoneId;

#[derive(Debug, Error)]
pub enum SkimError {
    /// Zone polygon is empty or has (near-)zero area. Fatal configuration
    /// error; never silently defaulted.
    #[error("zone {0} has degenerate geometry")]
    DegenerateZone(ZoneId),

    /// No network node could be resolved for a zone's access coordinate.
    #[error("no network node resolvable for access coordinate of zone {0}")]
    NoNetworkNode(ZoneId),

    /// No transit stop found for a zone even after the radius extension.
    /// Fatal for the transit-mode build only.
    #[error("no transit stop found for zone {0} after radius extension")]
    NoTransitStops(ZoneId),

    /// Connector table does not match the zone system it is used with.
    #[error("connector table covers {connectors} zones, zone system has {zones}")]
    ZoneCountMismatch { connectors: usize, zones: usize },

    /// Transit fallback requested scaling of a free-speed skim but no
    /// free-speed routing context was supplied.
    #[error("transit fallback requires a free-speed routing context")]
    MissingFallbackContext,

    /// The worker pool could not be constructed.
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),

    /// Matrix export/persistence failure.
    #[error("matrix persistence failed: {0}")]
    Persist(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
