//! Round-trip instrumentation

pub mod counter;
pub mod counting_executor;

pub use counter::{Checkpoint, RoundTripCounter, RoundTripRecord};
pub use counting_executor::CountingExecutor;
