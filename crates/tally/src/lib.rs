//! Meta crate that re-exports the Tally layers. Depend on this crate and pick
//! layers with feature flags; the underlying crates stay reachable for deeper
//! integration.

#[cfg(feature = "common")]
pub use tally_common as common;

#[cfg(feature = "engine")]
pub use tally_engine as engine;

#[cfg(feature = "dashboard")]
pub use tally_dashboard as dashboard;

#[cfg(feature = "engine")]
pub use tally_engine::{
    Amount, ChangeListener, ChangeSet, Count, CountAndSum, CountSum, Crossfilter, EngineConfig,
    EngineError, Filter, GroupHandle, Key, RecomputeStrategy, RecordId, RecordStore, Sum,
    TotalHandle, reduce,
};

#[cfg(feature = "dashboard")]
pub use tally_dashboard::{Citation, Dashboard, DashboardConfig, DashboardError, DatasetLoader};
