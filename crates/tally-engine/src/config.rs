#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How groups are brought up to date after a filter change.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecomputeStrategy {
    /// Apply `add`/`remove` for the records whose membership flipped.
    #[default]
    Incremental,
    /// Rebuild every affected group from scratch.
    FullRescan,
}

/// Registration-time check that a reducer's `remove` undoes its `add`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReducerVerification {
    Off,
    /// Round-trip every `every`-th record through `add` then `remove`.
    Sampled { every: usize },
}

impl Default for ReducerVerification {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            ReducerVerification::Sampled { every: 64 }
        } else {
            ReducerVerification::Off
        }
    }
}

/// Configuration for the cross-filter coordinator
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub strategy: RecomputeStrategy,
    pub verify_reducers: ReducerVerification,
    /// Upper bound on listener-requested follow-up filters per interaction.
    pub max_cascade: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: RecomputeStrategy::Incremental,
            verify_reducers: ReducerVerification::default(),
            max_cascade: 16,
        }
    }
}

impl EngineConfig {
    pub fn full_rescan() -> Self {
        Self {
            strategy: RecomputeStrategy::FullRescan,
            ..Default::default()
        }
    }

    pub fn with_verification(mut self, verify: ReducerVerification) -> Self {
        self.verify_reducers = verify;
        self
    }
}
