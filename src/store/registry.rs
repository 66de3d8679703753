//! Registry of issued node ids.
//!
//! A v4 uuid collision is practically impossible; seeing one means the
//! randomness source is broken, so it is treated as a fatal bug rather than
//! retried. The registry only exists in test builds, where the set of
//! issued ids is kept for the life of the process.

use super::types::NodeId;
use uuid::Uuid;

#[cfg(test)]
use std::collections::HashSet;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(test)]
fn issued() -> &'static Mutex<HashSet<Uuid>> {
    static ISSUED: OnceLock<Mutex<HashSet<Uuid>>> = OnceLock::new();
    ISSUED.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Draws a fresh node id.
pub fn issue() -> NodeId {
    let id = Uuid::new_v4();
    record(id);
    NodeId(id)
}

#[cfg(test)]
fn record(id: Uuid) {
    // A poisoned lock only means another thread panicked mid-insert; the set is still usable.
    let mut set = issued().lock().unwrap_or_else(|e| e.into_inner());
    if !set.insert(id) {
        panic!("BUG: node id collision on {}. The random source is broken.", id.simple());
    }
}

#[cfg(not(test))]
#[inline(always)]
fn record(_id: Uuid) {}
