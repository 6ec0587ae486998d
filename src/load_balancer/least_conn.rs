//! Least Connections load balancing strategy.

use std::sync::Arc;
use crate::load_balancer::{LoadBalancer, backend::Backend};

/// Least connections selector.
/// Selects the backend with the minimum number of active connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        // `min_by_key` keeps the first of equal minimums, so ties resolve in
        // snapshot order.
        backends
            .iter()
            .min_by_key(|b| b.connections())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_with(addr: &str, connections: usize) -> Arc<Backend> {
        let b = Arc::new(Backend::new(addr));
        for _ in 0..connections {
            b.inc_connections();
        }
        b
    }

    #[test]
    fn test_least_conn() {
        let lb = LeastConnections::new();
        let b1 = backend_with("127.0.0.1:8080", 1);
        let b2 = backend_with("127.0.0.1:8081", 0);
        let backends = vec![b1.clone(), b2.clone()];

        // Should pick b2 (0 connections)
        let s1 = lb.next_server(&backends).unwrap();
        assert_eq!(s1.addr(), b2.addr());

        b2.inc_connections();
        b2.inc_connections(); // now b2 has 2, b1 has 1

        let s2 = lb.next_server(&backends).unwrap();
        assert_eq!(s2.addr(), b1.addr());
    }

    #[test]
    fn test_tie_picks_first_minimum() {
        let lb = LeastConnections::new();
        let backends = vec![
            backend_with("A", 5),
            backend_with("B", 2),
            backend_with("C", 2),
        ];
        assert_eq!(lb.next_server(&backends).unwrap().addr(), "B");
    }

    #[test]
    fn test_empty_snapshot() {
        assert!(LeastConnections::new().next_server(&[]).is_none());
    }

    #[test]
    fn test_selection_does_not_count() {
        let lb = LeastConnections::new();
        let backends = vec![backend_with("A", 0), backend_with("B", 0)];
        for _ in 0..3 {
            assert_eq!(lb.next_server(&backends).unwrap().addr(), "A");
        }
        assert!(backends.iter().all(|b| b.connections() == 0));
    }
}
