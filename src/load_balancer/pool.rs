//! Backend pool management.
//!
//! # Responsibilities
//! - Register and discard backends keyed by address
//! - Keep every backend in exactly one of two groups: healthy or unhealthy
//! - Move backends between groups (demotion / promotion)
//! - Hand out point-in-time snapshots for selection and health scanning
//!
//! Membership lives in a single sharded map. Moving an address between the
//! two groups rewrites one slot under its shard lock, so no reader can see the
//! address in both groups or in neither.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::load_balancer::backend::Backend;

/// Which group a registered backend currently belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    Healthy,
    Unhealthy,
}

#[derive(Debug)]
struct Slot {
    /// Registration order, used to keep snapshots stable.
    seq: u64,
    backend: Arc<Backend>,
    membership: Membership,
}

/// Concurrent registry of backends split into healthy and unhealthy groups.
#[derive(Debug, Default)]
pub struct ServerPool {
    members: DashMap<String, Slot>,
    next_seq: AtomicU64,
}

impl ServerPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool seeded with the given addresses, all healthy.
    pub fn with_backends<I, S>(addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pool = Self::new();
        for addr in addrs {
            pool.add(addr.as_ref());
        }
        pool
    }

    /// Register a backend as healthy.
    ///
    /// An address that is already registered keeps its `Backend` (and
    /// connection count) and is placed in the healthy group.
    pub fn add(&self, addr: &str) {
        match self.members.entry(addr.to_string()) {
            Entry::Occupied(mut slot) => {
                slot.get_mut().membership = Membership::Healthy;
            }
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                slot.insert(Slot {
                    seq,
                    backend: Arc::new(Backend::new(addr)),
                    membership: Membership::Healthy,
                });
                tracing::info!(addr = %addr, "Backend registered");
            }
        }
    }

    /// Demote a healthy backend. Returns false if it was not healthy.
    pub fn remove(&self, addr: &str) -> bool {
        self.transition(addr, Membership::Healthy, Membership::Unhealthy)
    }

    /// Promote an unhealthy backend. Returns false if it was not unhealthy.
    pub fn promote(&self, addr: &str) -> bool {
        self.transition(addr, Membership::Unhealthy, Membership::Healthy)
    }

    fn transition(&self, addr: &str, from: Membership, to: Membership) -> bool {
        match self.members.get_mut(addr) {
            Some(mut slot) if slot.membership == from => {
                slot.membership = to;
                true
            }
            _ => false,
        }
    }

    /// Permanently drop a backend from whichever group holds it.
    pub fn discard(&self, addr: &str) -> Option<Arc<Backend>> {
        let removed = self.members.remove(addr).map(|(_, slot)| slot.backend);
        if removed.is_some() {
            tracing::info!(addr = %addr, "Backend discarded");
        }
        removed
    }

    /// Make the registered set match `addrs`: add the new ones, discard the rest.
    pub fn reconcile(&self, addrs: &[String]) {
        let wanted: HashSet<&str> = addrs.iter().map(String::as_str).collect();

        // Collect first: removing while iterating would deadlock on the shard.
        let stale: Vec<String> = self
            .members
            .iter()
            .filter(|entry| !wanted.contains(entry.key().as_str()))
            .map(|entry| entry.key().clone())
            .collect();

        for addr in stale {
            self.discard(&addr);
        }
        for addr in addrs {
            if !self.members.contains_key(addr) {
                self.add(addr);
            }
        }
    }

    /// Snapshot of healthy backends in registration order.
    pub fn list_healthy(&self) -> Vec<Arc<Backend>> {
        self.snapshot(Membership::Healthy)
    }

    /// Snapshot of unhealthy backends in registration order.
    pub fn list_unhealthy(&self) -> Vec<Arc<Backend>> {
        self.snapshot(Membership::Unhealthy)
    }

    fn snapshot(&self, membership: Membership) -> Vec<Arc<Backend>> {
        let mut picked: Vec<(u64, Arc<Backend>)> = self
            .members
            .iter()
            .filter(|entry| entry.membership == membership)
            .map(|entry| (entry.seq, entry.backend.clone()))
            .collect();
        picked.sort_unstable_by_key(|(seq, _)| *seq);
        picked.into_iter().map(|(_, backend)| backend).collect()
    }

    /// Every registered backend with its group, in registration order.
    pub fn members(&self) -> Vec<(Arc<Backend>, Membership)> {
        let mut all: Vec<(u64, Arc<Backend>, Membership)> = self
            .members
            .iter()
            .map(|entry| (entry.seq, entry.backend.clone(), entry.membership))
            .collect();
        all.sort_unstable_by_key(|(seq, _, _)| *seq);
        all.into_iter().map(|(_, b, m)| (b, m)).collect()
    }

    /// Which group holds `addr`, if it is registered.
    pub fn membership(&self, addr: &str) -> Option<Membership> {
        self.members.get(addr).map(|slot| slot.membership)
    }

    /// Look up a registered backend.
    pub fn get(&self, addr: &str) -> Option<Arc<Backend>> {
        self.members.get(addr).map(|slot| slot.backend.clone())
    }

    /// Count of (healthy, unhealthy) backends.
    pub fn counts(&self) -> (usize, usize) {
        self.members
            .iter()
            .fold((0, 0), |(h, u), entry| match entry.membership {
                Membership::Healthy => (h + 1, u),
                Membership::Unhealthy => (h, u + 1),
            })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
