//! Per-(chat, user) violation counter.
//!
//! `increment_and_get` is the safety-critical primitive: two concurrent
//! violations for the same user must never observe the same count, or a user
//! who should be punished is under-escalated. The increment runs as a single
//! upsert statement so the read and the write cannot be interleaved.

use crate::store::{Store, StoreError};
use rusqlite::params;

#[derive(Clone)]
pub struct ViolationLedger {
    store: Store,
}

impl ViolationLedger {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Atomically increment the counter (creating it at 0 if absent) and
    /// return the new value.
    pub fn increment_and_get(&self, chat_id: i64, user_id: i64) -> Result<u32, StoreError> {
        self.store.with_conn(|conn| {
            conn.query_row(
                "INSERT INTO warnings (chat_id, user_id, count) VALUES (?1, ?2, 1)
                 ON CONFLICT (chat_id, user_id) DO UPDATE SET count = count + 1
                 RETURNING count",
                params![chat_id, user_id],
                |row| row.get(0),
            )
        })
    }

    /// Set the counter back to 0. Idempotent; the zero-valued row persists.
    pub fn reset(&self, chat_id: i64, user_id: i64) -> Result<(), StoreError> {
        self.store.with_conn(|conn| {
            conn.execute(
                "UPDATE warnings SET count = 0 WHERE chat_id = ?1 AND user_id = ?2",
                params![chat_id, user_id],
            )?;
            Ok(())
        })
    }

    pub fn count(&self, chat_id: i64, user_id: i64) -> Result<u32, StoreError> {
        self.store.with_conn(|conn| {
            conn.query_row(
                "SELECT COALESCE(
                     (SELECT count FROM warnings WHERE chat_id = ?1 AND user_id = ?2), 0)",
                params![chat_id, user_id],
                |row| row.get(0),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::thread;

    fn ledger() -> ViolationLedger {
        ViolationLedger::new(Store::open_in_memory().unwrap())
    }

    #[test]
    fn test_increment_counts_up_from_one() {
        let ledger = ledger();
        assert_eq!(ledger.increment_and_get(-1, 10).unwrap(), 1);
        assert_eq!(ledger.increment_and_get(-1, 10).unwrap(), 2);
        assert_eq!(ledger.increment_and_get(-1, 10).unwrap(), 3);
    }

    #[test]
    fn test_counts_are_per_chat_user_pair() {
        let ledger = ledger();
        ledger.increment_and_get(-1, 10).unwrap();
        ledger.increment_and_get(-1, 10).unwrap();
        assert_eq!(ledger.increment_and_get(-2, 10).unwrap(), 1);
        assert_eq!(ledger.increment_and_get(-1, 11).unwrap(), 1);
        assert_eq!(ledger.count(-1, 10).unwrap(), 2);
    }

    #[test]
    fn test_reset_returns_counter_to_one_on_next_increment() {
        let ledger = ledger();
        for _ in 0..3 {
            ledger.increment_and_get(-1, 10).unwrap();
        }
        ledger.reset(-1, 10).unwrap();
        assert_eq!(ledger.count(-1, 10).unwrap(), 0);
        assert_eq!(ledger.increment_and_get(-1, 10).unwrap(), 1);
    }

    #[test]
    fn test_reset_is_idempotent_and_tolerates_missing_row() {
        let ledger = ledger();
        ledger.reset(-9, 9).unwrap();
        ledger.reset(-9, 9).unwrap();
        assert_eq!(ledger.increment_and_get(-9, 9).unwrap(), 1);
    }

    #[test]
    fn test_concurrent_increments_yield_distinct_values() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 25;

        let ledger = ledger();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let ledger = ledger.clone();
                let seen = seen.clone();
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        let value = ledger.increment_and_get(-1, 77).unwrap();
                        seen.lock().unwrap().push(value);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let seen = seen.lock().unwrap();
        let total = THREADS * PER_THREAD;
        assert_eq!(seen.len(), total);

        // Exactly {1..N}: no duplicates, no gaps.
        let distinct: HashSet<u32> = seen.iter().copied().collect();
        assert_eq!(distinct.len(), total);
        assert_eq!(*seen.iter().max().unwrap() as usize, total);
    }
}
