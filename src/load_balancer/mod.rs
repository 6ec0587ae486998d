//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request arrives at the dispatcher
//!     → pool.rs (snapshot of healthy backends)
//!     → Apply load balancing algorithm:
//!         - least_conn.rs (pick backend with fewest connections)
//!         - round_robin.rs (rotate through backends)
//!     → backend.rs (connection guard held for the proxied call)
//! ```
//!
//! # Design Decisions
//! - Algorithms are pure over the snapshot; the dispatcher owns counting
//! - Health monitors own pool membership
//! - Algorithm chosen once at construction time

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod backend;
pub mod least_conn;
pub mod pool;
pub mod round_robin;

pub use backend::{Backend, BackendConnectionGuard};
pub use least_conn::LeastConnections;
pub use pool::{Membership, ServerPool};
pub use round_robin::RoundRobin;

/// A backend selection strategy.
///
/// Implementations must not mutate connection counts or pool membership.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick a backend from `backends`, or `None` if there is nothing to pick.
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;
}

/// Configurable selection algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    LeastConnections,
    RoundRobin,
}

impl Algorithm {
    /// Build a fresh strategy instance.
    pub fn build(self) -> Box<dyn LoadBalancer> {
        match self {
            Algorithm::LeastConnections => Box::new(LeastConnections::new()),
            Algorithm::RoundRobin => Box::new(RoundRobin::new()),
        }
    }
}
