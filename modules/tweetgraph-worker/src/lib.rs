pub mod batch;
pub mod delivery;
pub mod ingest;
pub mod loopback;
pub mod scheduler;
pub mod search;
pub mod source;
pub mod tickets;
pub mod traits;
pub mod worker;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use worker::{CycleOutcome, CycleState, CycleStats, PipelineSettings, Worker};
