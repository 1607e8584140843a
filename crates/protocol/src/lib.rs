pub mod constants;
pub mod envelope;
pub mod format;
mod num;
pub mod types;

// Re-export primary types for convenience.
pub use constants::Route;
pub use envelope::{ApiResponse, EnvelopeError, HealthData};
pub use types::{FdLeak, FdStats, LeakGroup, LeakTotals, MemoryStats};
