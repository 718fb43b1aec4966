//! Duplicate-request detection.
//!
//! RPC clients retransmit calls they believe lost, most aggressively over
//! UDP. Tracking `(xid, peer)` pairs for a retention window lets the
//! server drop retransmissions of calls it has already answered instead
//! of executing a mutation twice. In-progress entries are kept regardless
//! of age so a slow handler cannot be raced by its own retransmission.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

enum TransactionState {
    InProgress,
    Completed(SystemTime),
}

/// Tracks RPC transactions to detect retransmissions.
pub struct TransactionTracker {
    retention_period: Duration,
    transactions: Mutex<HashMap<(u32, SocketAddr), TransactionState>>,
}

impl TransactionTracker {
    pub fn new(retention_period: Duration) -> TransactionTracker {
        TransactionTracker { retention_period, transactions: Mutex::new(HashMap::new()) }
    }

    /// True when `(xid, peer)` was seen before; otherwise records it as
    /// in progress and returns false.
    pub fn is_retransmission(&self, xid: u32, peer: &SocketAddr) -> bool {
        let mut transactions = self.transactions.lock().unwrap();
        housekeeping(&mut transactions, self.retention_period);
        if let std::collections::hash_map::Entry::Vacant(e) = transactions.entry((xid, *peer)) {
            e.insert(TransactionState::InProgress);
            false
        } else {
            true
        }
    }

    /// Marks a transaction completed, starting its retention clock.
    pub fn mark_processed(&self, xid: u32, peer: &SocketAddr) {
        let completion_time = SystemTime::now();
        if let Some(tx) = self.transactions.lock().unwrap().get_mut(&(xid, *peer)) {
            *tx = TransactionState::Completed(completion_time);
        }
    }
}

fn housekeeping(
    transactions: &mut HashMap<(u32, SocketAddr), TransactionState>,
    max_age: Duration,
) {
    let cutoff = SystemTime::now() - max_age;
    transactions.retain(|_, v| match v {
        TransactionState::InProgress => true,
        TransactionState::Completed(completion_time) => *completion_time >= cutoff,
    });
}
