mod common;

mod scenario;
mod self_exclusion;
mod spatial;
mod stale_groups;
mod strategy_parity;
