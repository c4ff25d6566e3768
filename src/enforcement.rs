//! Turns an escalation decision into a concrete transport action and an
//! audit record.

use crate::policy::Punishment;
use crate::store::{Store, StoreError};
use crate::transport::{ChatTransport, TransportError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnforcementError {
    #[error("enforcement action failed: {0}")]
    Failed(#[from] TransportError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct EnforcementDispatcher {
    store: Store,
    transport: Arc<dyn ChatTransport>,
}

impl EnforcementDispatcher {
    pub fn new(store: Store, transport: Arc<dyn ChatTransport>) -> Self {
        Self { store, transport }
    }

    /// Delete capability used for flagged and reported messages.
    pub async fn delete_message(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<(), TransportError> {
        self.transport.delete_message(chat_id, message_id).await
    }

    /// Apply a punishment and write exactly one audit row for the attempt,
    /// whether or not the transport action succeeded. The match is
    /// exhaustive: an unrecognized punishment cannot reach this point
    /// because policy writes reject it at the boundary.
    pub async fn apply(
        &self,
        chat_id: i64,
        user_id: i64,
        punishment: Punishment,
        reason: &str,
    ) -> Result<(), EnforcementError> {
        let action = match punishment {
            // Informational only; the warning notification already went out.
            Punishment::Warn => Ok(()),
            Punishment::Mute => self.transport.restrict_user(chat_id, user_id).await,
            Punishment::Ban => self.transport.ban_user(chat_id, user_id).await,
        };

        let recorded_reason = match &action {
            Ok(()) => format!("{punishment}: {reason}"),
            Err(e) => format!("{punishment}: {reason} (action failed: {e})"),
        };
        self.store
            .record_enforcement(chat_id, user_id, &recorded_reason)?;

        action.map_err(EnforcementError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeTransport {
        restricted: Mutex<Vec<(i64, i64)>>,
        banned: Mutex<Vec<(i64, i64)>>,
        fail_ban: bool,
    }

    #[async_trait]
    impl ChatTransport for FakeTransport {
        async fn delete_message(&self, _: i64, _: i64) -> Result<(), TransportError> {
            Ok(())
        }

        async fn restrict_user(&self, chat_id: i64, user_id: i64) -> Result<(), TransportError> {
            self.restricted.lock().unwrap().push((chat_id, user_id));
            Ok(())
        }

        async fn ban_user(&self, chat_id: i64, user_id: i64) -> Result<(), TransportError> {
            if self.fail_ban {
                return Err(TransportError::BanFailed("not an admin".into()));
            }
            self.banned.lock().unwrap().push((chat_id, user_id));
            Ok(())
        }

        async fn send_message(&self, _: i64, _: &str) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn dispatcher(transport: Arc<FakeTransport>) -> (EnforcementDispatcher, Store) {
        let store = Store::open_in_memory().unwrap();
        (EnforcementDispatcher::new(store.clone(), transport), store)
    }

    #[tokio::test]
    async fn test_ban_dispatches_and_records() {
        let transport = Arc::new(FakeTransport::default());
        let (dispatcher, store) = dispatcher(transport.clone());

        dispatcher.apply(-1, 42, Punishment::Ban, "reached warning limit (auto)").await.unwrap();

        assert_eq!(*transport.banned.lock().unwrap(), vec![(-1, 42)]);
        let records = store.enforcements(-1).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].reason.starts_with("ban: reached warning limit"));
    }

    #[tokio::test]
    async fn test_mute_restricts_instead_of_banning() {
        let transport = Arc::new(FakeTransport::default());
        let (dispatcher, _store) = dispatcher(transport.clone());

        dispatcher.apply(-1, 42, Punishment::Mute, "reached warning limit (auto)").await.unwrap();

        assert_eq!(*transport.restricted.lock().unwrap(), vec![(-1, 42)]);
        assert!(transport.banned.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_warn_takes_no_transport_action_but_records() {
        let transport = Arc::new(FakeTransport::default());
        let (dispatcher, store) = dispatcher(transport.clone());

        dispatcher.apply(-1, 42, Punishment::Warn, "reached warning limit (auto)").await.unwrap();

        assert!(transport.restricted.lock().unwrap().is_empty());
        assert!(transport.banned.lock().unwrap().is_empty());
        assert_eq!(store.enforcements(-1).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_still_records_the_attempt() {
        let transport = Arc::new(FakeTransport {
            fail_ban: true,
            ..Default::default()
        });
        let (dispatcher, store) = dispatcher(transport);

        let err = dispatcher
            .apply(-1, 42, Punishment::Ban, "reached warning limit (auto)")
            .await
            .unwrap_err();
        assert!(matches!(err, EnforcementError::Failed(_)));

        let records = store.enforcements(-1).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].reason.contains("action failed"));
    }
}
