pub mod analysis;
pub mod pool;
pub mod signal;

pub use analysis::{Analyzer, SimulatedAnalysis};
pub use pool::{PoolError, WorkerPool, DEFAULT_WORKERS};
pub use signal::{shutdown_channel, Interrupted, ShutdownSignal, ShutdownTrigger};
