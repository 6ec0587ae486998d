//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Health monitor (active.rs), every interval_secs:
//!     pool.list_healthy()
//!     → probe.rs each backend (bounded fan-out)
//!     → pool.remove() every failure once the scan is done
//!
//! Recovery monitor (recovery.rs), every recovery_interval_secs:
//!     pool.list_unhealthy()
//!     → probe.rs each backend
//!     → pool.promote() each success immediately
//! ```
//!
//! # Design Decisions
//! - One failed probe demotes; one successful probe promotes
//! - Proxy errors never change membership; only probes do
//! - Both monitors stop on the shutdown broadcast

pub mod active;
pub mod probe;
pub mod recovery;

pub use active::HealthMonitor;
pub use probe::{ProbeOutcome, Prober};
pub use recovery::RecoveryMonitor;
