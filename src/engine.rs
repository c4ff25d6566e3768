//! Moderation decision engine.
//!
//! Turns a scored (or manually reported) message into a removal decision, an
//! updated violation count, and possibly an escalation, all governed by the
//! chat's policy. The engine holds no locks of its own; the ledger's atomic
//! increment is the sole concurrency-correctness guarantee, so events for
//! distinct (chat, user) pairs can run interleaved.

use crate::classifier::{ClassifierGateway, ScoringUnavailable};
use crate::enforcement::EnforcementDispatcher;
use crate::ledger::ViolationLedger;
use crate::policy::{ChatPolicy, PolicyError, PolicyStore, Punishment};
use crate::store::{Store, StoreError};
use crate::transport::{Authorizer, ChatTransport, MessageEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Where a (chat, user) pair sits in the warning cycle. `Escalated` is
/// terminal for the episode only; the ledger reset that follows puts the
/// pair back at `Clean`. A prior ban is a durable fact in the audit trail,
/// not a state the engine tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationState {
    Clean,
    Warned(u32),
    Escalated,
}

impl ViolationState {
    pub fn from_count(count: u32, max_warnings: u32) -> Self {
        match count {
            0 => ViolationState::Clean,
            n if n >= max_warnings => ViolationState::Escalated,
            n => ViolationState::Warned(n),
        }
    }
}

/// When the ledger is reset after an escalation. `OnAttempt` resets even if
/// the punishment dispatch failed, trading a possible free re-escalation for
/// never spamming warnings when the transport is unreliable. Matches the
/// behavior the product shipped with; switching to `OnSuccess` needs product
/// sign-off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    #[default]
    OnAttempt,
    OnSuccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    PrivateChat,
    EmptyText,
    ScorerUnavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EscalationOutcome {
    pub punishment: Punishment,
    /// Whether the transport action went through.
    pub enforced: bool,
    pub ledger_reset: bool,
}

/// Structured result of the automated path. No presentation; callers render.
#[derive(Debug, Clone, PartialEq)]
pub enum AutomatedVerdict {
    Skipped(SkipReason),
    Accepted {
        score: f64,
    },
    Removed {
        score: f64,
        /// False when the transport refused the deletion; the violation
        /// still counts.
        deleted: bool,
        warnings: u32,
        max_warnings: u32,
        escalation: Option<EscalationOutcome>,
    },
}

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub chat_id: i64,
    pub reporter_id: i64,
    /// The reported message, as referenced by the moderator's reply.
    pub message_id: i64,
    pub message_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutcome {
    pub report_id: i64,
    pub score: Option<f64>,
    pub deleted: bool,
    pub anonymous: bool,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("user {user_id} is not a moderator of chat {chat_id}")]
    NotModerator { chat_id: i64, user_id: i64 },
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

pub struct ModerationEngine {
    store: Store,
    policies: PolicyStore,
    ledger: ViolationLedger,
    gateway: ClassifierGateway,
    dispatcher: EnforcementDispatcher,
    transport: Arc<dyn ChatTransport>,
    authorizer: Arc<dyn Authorizer>,
    reset_policy: ResetPolicy,
}

impl ModerationEngine {
    pub fn new(
        store: Store,
        gateway: ClassifierGateway,
        transport: Arc<dyn ChatTransport>,
        authorizer: Arc<dyn Authorizer>,
        reset_policy: ResetPolicy,
    ) -> Self {
        Self {
            policies: PolicyStore::new(store.clone()),
            ledger: ViolationLedger::new(store.clone()),
            dispatcher: EnforcementDispatcher::new(store.clone(), transport.clone()),
            store,
            gateway,
            transport,
            authorizer,
            reset_policy,
        }
    }

    pub fn policy(&self, chat_id: i64) -> Result<ChatPolicy, PolicyError> {
        self.policies.policy(chat_id)
    }

    pub fn set_policy_field(
        &self,
        chat_id: i64,
        field: &str,
        value: &str,
    ) -> Result<(), PolicyError> {
        self.policies.set_field(chat_id, field, value)
    }

    /// Manual escalation surface for moderator tooling. Same dispatch and
    /// audit path as automated escalation.
    pub async fn apply_enforcement(
        &self,
        chat_id: i64,
        user_id: i64,
        punishment: Punishment,
        reason: &str,
    ) -> Result<(), crate::enforcement::EnforcementError> {
        self.dispatcher.apply(chat_id, user_id, punishment, reason).await
    }

    /// Automated path, one call per inbound group message.
    pub async fn decide_automated(
        &self,
        event: &MessageEvent,
    ) -> Result<AutomatedVerdict, EngineError> {
        if event.is_private {
            return Ok(AutomatedVerdict::Skipped(SkipReason::PrivateChat));
        }
        if event.text.trim().is_empty() {
            return Ok(AutomatedVerdict::Skipped(SkipReason::EmptyText));
        }

        let policy = self.policies.policy(event.chat_id)?;

        let score = match self.gateway.score(&event.text).await {
            Ok(score) => score,
            Err(ScoringUnavailable) => {
                // No signal is never treated as spam.
                log::warn!(
                    "scoring unavailable for chat {}, leaving message {} alone",
                    event.chat_id,
                    event.message_id
                );
                return Ok(AutomatedVerdict::Skipped(SkipReason::ScorerUnavailable));
            }
        };

        let is_spam = score >= policy.threshold;
        log::info!(
            "chat {} message {} score={score:.4} threshold={:.4}",
            event.chat_id,
            event.message_id,
            policy.threshold
        );

        if policy.logging_enabled {
            if let Err(e) = self.store.record_score(
                event.chat_id,
                &event.text,
                score,
                policy.threshold,
                is_spam,
            ) {
                log::error!("failed to write score log: {e}");
            }
        }

        if !is_spam {
            return Ok(AutomatedVerdict::Accepted { score });
        }

        // Removal failure does not abort the violation: the warning is about
        // user behavior, not message survival.
        let deleted = match self
            .dispatcher
            .delete_message(event.chat_id, event.message_id)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                log::error!(
                    "failed to delete message {} in chat {}: {e}",
                    event.message_id,
                    event.chat_id
                );
                false
            }
        };

        let warnings = self.increment_with_retry(event.chat_id, event.user_id)?;

        let notice = format!(
            "Message removed as suspected spam. Warning {warnings}/{}.",
            policy.max_warnings
        );
        if let Err(e) = self.transport.send_message(event.chat_id, &notice).await {
            log::error!("failed to send warning notice to chat {}: {e}", event.chat_id);
        }

        let escalation = match ViolationState::from_count(warnings, policy.max_warnings) {
            ViolationState::Escalated => Some(
                self.escalate(event.chat_id, event.user_id, policy.punishment)
                    .await,
            ),
            _ => None,
        };

        Ok(AutomatedVerdict::Removed {
            score,
            deleted,
            warnings,
            max_warnings: policy.max_warnings,
            escalation,
        })
    }

    /// Manual path: a moderator marked an existing message as spam. Feeds
    /// only the report ledger; no warning or escalation side effects.
    pub async fn decide_manual_report(
        &self,
        request: &ReportRequest,
    ) -> Result<ReportOutcome, EngineError> {
        if !self
            .authorizer
            .is_moderator(request.chat_id, request.reporter_id)
            .await
        {
            return Err(EngineError::NotModerator {
                chat_id: request.chat_id,
                user_id: request.reporter_id,
            });
        }

        let policy = self.policies.policy(request.chat_id)?;

        // Best effort: a report with no score is still a report.
        let score = if request.message_text.is_empty() {
            None
        } else {
            self.gateway.score(&request.message_text).await.ok()
        };

        let reporter_id = if policy.anonymous_reports {
            None
        } else {
            Some(request.reporter_id)
        };
        let report_id =
            self.store
                .record_report(request.chat_id, &request.message_text, score, reporter_id)?;

        let deleted = match self
            .dispatcher
            .delete_message(request.chat_id, request.message_id)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                log::error!(
                    "failed to delete reported message {} in chat {}: {e}",
                    request.message_id,
                    request.chat_id
                );
                false
            }
        };

        Ok(ReportOutcome {
            report_id,
            score,
            deleted,
            anonymous: policy.anonymous_reports,
        })
    }

    // The warning increment must not be skipped on a transient failure;
    // retry once before surfacing a fatal-for-this-message error.
    fn increment_with_retry(&self, chat_id: i64, user_id: i64) -> Result<u32, EngineError> {
        match self.ledger.increment_and_get(chat_id, user_id) {
            Ok(warnings) => Ok(warnings),
            Err(first) => {
                log::warn!("warning increment failed, retrying once: {first}");
                self.ledger.increment_and_get(chat_id, user_id).map_err(|e| {
                    log::error!(
                        "warning increment failed twice for user {user_id} in chat {chat_id}: {e}"
                    );
                    EngineError::Persistence(e)
                })
            }
        }
    }

    async fn escalate(
        &self,
        chat_id: i64,
        user_id: i64,
        punishment: Punishment,
    ) -> EscalationOutcome {
        let enforced = match self
            .dispatcher
            .apply(chat_id, user_id, punishment, "reached warning limit (auto)")
            .await
        {
            Ok(()) => true,
            Err(e) => {
                log::error!("enforcement failed for user {user_id} in chat {chat_id}: {e}");
                false
            }
        };

        let should_reset = match self.reset_policy {
            ResetPolicy::OnAttempt => true,
            ResetPolicy::OnSuccess => enforced,
        };
        let ledger_reset = if should_reset {
            match self.ledger.reset(chat_id, user_id) {
                Ok(()) => true,
                Err(e) => {
                    log::error!(
                        "failed to reset warnings for user {user_id} in chat {chat_id}: {e}"
                    );
                    false
                }
            }
        } else {
            false
        };

        let notice = match punishment {
            Punishment::Ban => format!("User {user_id} was banned after repeated violations."),
            Punishment::Mute => format!("User {user_id} was muted after repeated violations."),
            Punishment::Warn => format!("User {user_id} reached the warning limit."),
        };
        if let Err(e) = self.transport.send_message(chat_id, &notice).await {
            log::error!("failed to send escalation notice to chat {chat_id}: {e}");
        }

        EscalationOutcome {
            punishment,
            enforced,
            ledger_reset,
        }
    }
}
