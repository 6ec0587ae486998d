//! Round-robin load balancing strategy.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::load_balancer::{LoadBalancer, backend::Backend};

/// Round-robin selector.
/// Stores an internal counter to rotate through the snapshot.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        if backends.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % backends.len();
        backends.get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let b1 = Arc::new(Backend::new("127.0.0.1:8080"));
        let b2 = Arc::new(Backend::new("127.0.0.1:8081"));
        let backends = vec![b1.clone(), b2.clone()];

        let s1 = lb.next_server(&backends).unwrap();
        assert_eq!(s1.addr(), b1.addr());

        let s2 = lb.next_server(&backends).unwrap();
        assert_eq!(s2.addr(), b2.addr());

        let s3 = lb.next_server(&backends).unwrap();
        assert_eq!(s3.addr(), b1.addr());
    }

    #[test]
    fn test_round_robin_shrinking_snapshot() {
        let lb = RoundRobin::new();
        let b1 = Arc::new(Backend::new("127.0.0.1:8080"));
        let b2 = Arc::new(Backend::new("127.0.0.1:8081"));

        lb.next_server(&[b1.clone(), b2.clone()]);
        assert_eq!(lb.next_server(&[b1.clone()]).unwrap().addr(), b1.addr());
        assert!(lb.next_server(&[]).is_none());
    }
}
