//! Seams to the bot-transport layer and the authorization collaborator.
//!
//! The engine only ever talks to these traits; the real chat platform
//! adapter lives outside this crate.

use async_trait::async_trait;
use thiserror::Error;

/// Inbound message event as delivered by the transport.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub chat_id: i64,
    pub user_id: i64,
    pub message_id: i64,
    pub text: String,
    pub is_private: bool,
    /// Message this event replies to, when the transport knows it.
    pub reply_target: Option<i64>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("delete failed: {0}")]
    DeleteFailed(String),
    #[error("restrict failed: {0}")]
    RestrictFailed(String),
    #[error("ban failed: {0}")]
    BanFailed(String),
    #[error("send failed: {0}")]
    SendFailed(String),
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), TransportError>;
    async fn restrict_user(&self, chat_id: i64, user_id: i64) -> Result<(), TransportError>;
    async fn ban_user(&self, chat_id: i64, user_id: i64) -> Result<(), TransportError>;
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError>;
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn is_moderator(&self, chat_id: i64, user_id: i64) -> bool;
}

/// Transport that logs every action instead of calling a bot API. Used by
/// demo mode and by deployments that want a dry run.
pub struct LoggingTransport;

#[async_trait]
impl ChatTransport for LoggingTransport {
    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), TransportError> {
        log::info!("would delete message {message_id} in chat {chat_id}");
        Ok(())
    }

    async fn restrict_user(&self, chat_id: i64, user_id: i64) -> Result<(), TransportError> {
        log::info!("would restrict user {user_id} in chat {chat_id}");
        Ok(())
    }

    async fn ban_user(&self, chat_id: i64, user_id: i64) -> Result<(), TransportError> {
        log::info!("would ban user {user_id} from chat {chat_id}");
        Ok(())
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        log::info!("would send to chat {chat_id}: {text}");
        Ok(())
    }
}

/// Grants moderator capability to everyone. Demo mode only.
pub struct AllowAllAuthorizer;

#[async_trait]
impl Authorizer for AllowAllAuthorizer {
    async fn is_moderator(&self, _chat_id: i64, _user_id: i64) -> bool {
        true
    }
}
