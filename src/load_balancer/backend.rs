//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server by its `host:port` address
//! - Track in-flight connections (for Least Connections LB)
//! - Hand out RAII guards so every increment has exactly one decrement

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    /// The address of the backend (`host:port`). Immutable after creation.
    addr: String,
    /// Number of currently in-flight proxied requests.
    active_connections: AtomicUsize,
}

impl Backend {
    /// Create a new backend with zero connections.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            active_connections: AtomicUsize::new(0),
        }
    }

    /// The backend address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Get the current number of active connections.
    pub fn connections(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    /// Increment active connection count.
    pub fn inc_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrement active connection count.
    pub fn dec_connections(&self) {
        self.active_connections.fetch_sub(1, Ordering::AcqRel);
    }

    /// Count one connection against this backend until the guard is dropped.
    pub fn acquire(self: &Arc<Self>) -> BackendConnectionGuard {
        self.inc_connections();
        BackendConnectionGuard {
            backend: self.clone(),
        }
    }
}

/// A RAII guard that manages the active connection count.
#[derive(Debug)]
pub struct BackendConnectionGuard {
    backend: Arc<Backend>,
}

impl BackendConnectionGuard {
    /// The backend this guard counts against.
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Deref for BackendConnectionGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for BackendConnectionGuard {
    fn drop(&mut self) {
        self.backend.dec_connections();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_guard_round_trip() {
        let backend = Arc::new(Backend::new("127.0.0.1:8081"));
        assert_eq!(backend.connections(), 0);

        let g1 = backend.acquire();
        let g2 = backend.acquire();
        assert_eq!(backend.connections(), 2);
        assert_eq!(g1.addr(), "127.0.0.1:8081");

        drop(g1);
        assert_eq!(backend.connections(), 1);
        drop(g2);
        assert_eq!(backend.connections(), 0);
    }

    #[test]
    fn test_guard_released_on_early_return() {
        fn failing(backend: &Arc<Backend>) -> Result<(), &'static str> {
            let _guard = backend.acquire();
            Err("upstream failed")
        }

        let backend = Arc::new(Backend::new("127.0.0.1:8081"));
        assert!(failing(&backend).is_err());
        assert_eq!(backend.connections(), 0);
    }

    #[test]
    fn test_concurrent_guards_net_zero() {
        let backend = Arc::new(Backend::new("127.0.0.1:8081"));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let backend = backend.clone();
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        let guard = backend.acquire();
                        assert!(guard.connections() >= 1);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(backend.connections(), 0);
    }
}
