//! Read-side statistics over the moderation tables.

use crate::store::{EnforcementRecord, Store, StoreError};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatStats {
    pub chat_id: i64,
    pub messages_scored: u64,
    pub messages_removed: u64,
    pub reports: u64,
    pub enforcements: u64,
}

pub fn chat_stats(store: &Store, chat_id: i64) -> Result<ChatStats, StoreError> {
    store.with_conn(|conn| {
        let count = |sql: &str| -> rusqlite::Result<u64> {
            conn.query_row(sql, [chat_id], |row| row.get::<_, i64>(0))
                .map(|n| n as u64)
        };
        Ok(ChatStats {
            chat_id,
            messages_scored: count("SELECT COUNT(*) FROM score_log WHERE chat_id = ?1")?,
            messages_removed: count(
                "SELECT COUNT(*) FROM score_log WHERE chat_id = ?1 AND removed = 1",
            )?,
            reports: count("SELECT COUNT(*) FROM reports WHERE chat_id = ?1")?,
            enforcements: count("SELECT COUNT(*) FROM enforcements WHERE chat_id = ?1")?,
        })
    })
}

/// Full enforcement audit trail for a chat, oldest first.
pub fn enforcement_history(
    store: &Store,
    chat_id: i64,
) -> Result<Vec<EnforcementRecord>, StoreError> {
    store.enforcements(chat_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_track_activity() {
        let store = Store::open_in_memory().unwrap();

        store.record_score(-1, "ham", 0.1, 0.9, false).unwrap();
        store.record_score(-1, "spam", 0.95, 0.9, true).unwrap();
        store.record_score(-1, "more spam", 0.99, 0.9, true).unwrap();
        store.record_report(-1, "reported", Some(0.7), None).unwrap();
        store.record_enforcement(-1, 42, "ban: reached warning limit (auto)").unwrap();

        // A different chat's rows must not bleed in.
        store.record_score(-2, "other chat", 0.99, 0.9, true).unwrap();

        let stats = chat_stats(&store, -1).unwrap();
        assert_eq!(
            stats,
            ChatStats {
                chat_id: -1,
                messages_scored: 3,
                messages_removed: 2,
                reports: 1,
                enforcements: 1,
            }
        );
    }

    #[test]
    fn test_empty_chat_is_all_zeroes() {
        let store = Store::open_in_memory().unwrap();
        let stats = chat_stats(&store, -99).unwrap();
        assert_eq!(stats.messages_scored, 0);
        assert_eq!(stats.enforcements, 0);
    }
}
