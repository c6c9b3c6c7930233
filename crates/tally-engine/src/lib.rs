//! Cross-filter engine.
//!
//! A [`Crossfilter`] indexes an immutable [`RecordStore`] under any number of
//! [`Dimension`]s, keeps one [`Filter`] per dimension, and maintains groups
//! whose aggregates reflect every *other* dimension's filter. Filter changes
//! are applied incrementally through each group's [`Reducer`].

pub mod config;
pub mod coordinator;
pub mod diagnostics;
pub mod dimension;
pub mod error;
pub mod filter;
pub mod group;
pub mod listener;
mod mask;
pub mod reducer;
pub mod spatial;
pub mod store;

pub use config::{EngineConfig, RecomputeStrategy, ReducerVerification};
pub use coordinator::{ChangeSet, Crossfilter, InteractionPhase, InteractionStats, StaleGroup};
pub use diagnostics::Diagnostic;
pub use dimension::Dimension;
pub use error::{EngineError, Result};
pub use filter::{Filter, Predicate};
pub use group::{GroupHandle, GroupStatus, TotalHandle};
pub use listener::{ChangeListener, FilterRequests};
pub use reducer::{
    Accumulator, Amount, Count, CountAndSum, CountSum, FnReducer, ReduceError, ReduceResult,
    Reducer, Sum, reduce,
};
pub use spatial::{GeoPoint, LatestPoints, OverlaySink, SpatialJoin};
pub use store::RecordStore;

pub use tally_common::{FieldError, Key, RecordId};

#[cfg(test)]
mod tests;
