//! Per-chat moderation policy, created lazily with defaults and mutated only
//! through validated field writes.

use crate::store::{Store, StoreError};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Action taken when a user reaches the warning limit. Closed set: policy
/// writes reject anything else at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Punishment {
    Warn,
    Mute,
    Ban,
}

impl Punishment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Punishment::Warn => "warn",
            Punishment::Mute => "mute",
            Punishment::Ban => "ban",
        }
    }
}

impl fmt::Display for Punishment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Punishment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warn" => Ok(Punishment::Warn),
            "mute" => Ok(Punishment::Mute),
            "ban" => Ok(Punishment::Ban),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatPolicy {
    pub chat_id: i64,
    /// Minimum spam probability that flags a message. In [0, 1].
    pub threshold: f64,
    /// Warnings before escalation. Always >= 1.
    pub max_warnings: u32,
    pub punishment: Punishment,
    pub logging_enabled: bool,
    pub anonymous_reports: bool,
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("unknown policy field: {0}")]
    InvalidField(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Read/write access to per-chat policy rows. A chat's row is created with
/// defaults the first time it is referenced; it is never deleted.
#[derive(Clone)]
pub struct PolicyStore {
    store: Store,
}

impl PolicyStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Fetch the policy for a chat, creating the default row if absent.
    pub fn policy(&self, chat_id: i64) -> Result<ChatPolicy, PolicyError> {
        let row = self.store.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO chats (chat_id) VALUES (?1)",
                [chat_id],
            )?;
            conn.query_row(
                "SELECT threshold, max_warnings, punishment, logging, anon_reports
                 FROM chats WHERE chat_id = ?1",
                [chat_id],
                |row| {
                    Ok((
                        row.get::<_, f64>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, bool>(3)?,
                        row.get::<_, bool>(4)?,
                    ))
                },
            )
        })?;

        let punishment =
            Punishment::from_str(&row.2).map_err(|_| PolicyError::InvalidValue {
                field: "punishment",
                value: row.2.clone(),
            })?;

        Ok(ChatPolicy {
            chat_id,
            threshold: row.0,
            max_warnings: row.1,
            punishment,
            logging_enabled: row.3,
            anonymous_reports: row.4,
        })
    }

    /// Write one policy field, validating name and value before touching the
    /// row. Unknown fields and malformed values leave the policy unchanged.
    pub fn set_field(&self, chat_id: i64, field: &str, value: &str) -> Result<(), PolicyError> {
        // Ensure the row exists so an UPDATE always lands.
        self.policy(chat_id)?;

        match field {
            "threshold" => {
                let threshold: f64 = value.parse().map_err(|_| PolicyError::InvalidValue {
                    field: "threshold",
                    value: value.to_string(),
                })?;
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(PolicyError::InvalidValue {
                        field: "threshold",
                        value: value.to_string(),
                    });
                }
                self.write(chat_id, "UPDATE chats SET threshold = ?1 WHERE chat_id = ?2", threshold)
            }
            "max_warnings" => {
                let max: u32 = value.parse().map_err(|_| PolicyError::InvalidValue {
                    field: "max_warnings",
                    value: value.to_string(),
                })?;
                if max == 0 {
                    return Err(PolicyError::InvalidValue {
                        field: "max_warnings",
                        value: value.to_string(),
                    });
                }
                self.write(chat_id, "UPDATE chats SET max_warnings = ?1 WHERE chat_id = ?2", max)
            }
            "punishment" => {
                let punishment =
                    Punishment::from_str(value).map_err(|_| PolicyError::InvalidValue {
                        field: "punishment",
                        value: value.to_string(),
                    })?;
                self.write(
                    chat_id,
                    "UPDATE chats SET punishment = ?1 WHERE chat_id = ?2",
                    punishment.as_str(),
                )
            }
            "logging" => {
                let enabled = parse_bool(value).ok_or_else(|| PolicyError::InvalidValue {
                    field: "logging",
                    value: value.to_string(),
                })?;
                self.write(chat_id, "UPDATE chats SET logging = ?1 WHERE chat_id = ?2", enabled)
            }
            "anon_reports" => {
                let enabled = parse_bool(value).ok_or_else(|| PolicyError::InvalidValue {
                    field: "anon_reports",
                    value: value.to_string(),
                })?;
                self.write(
                    chat_id,
                    "UPDATE chats SET anon_reports = ?1 WHERE chat_id = ?2",
                    enabled,
                )
            }
            other => Err(PolicyError::InvalidField(other.to_string())),
        }
    }

    fn write<V: rusqlite::ToSql>(
        &self,
        chat_id: i64,
        sql: &str,
        value: V,
    ) -> Result<(), PolicyError> {
        self.store.with_conn(|conn| {
            conn.execute(sql, params![value, chat_id])?;
            Ok(())
        })?;
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy_store() -> PolicyStore {
        PolicyStore::new(Store::open_in_memory().unwrap())
    }

    #[test]
    fn test_first_read_creates_defaults() {
        let policies = policy_store();
        let policy = policies.policy(-1001).unwrap();
        assert_eq!(policy.threshold, 0.9);
        assert_eq!(policy.max_warnings, 3);
        assert_eq!(policy.punishment, Punishment::Ban);
        assert!(policy.logging_enabled);
        assert!(policy.anonymous_reports);

        // Idempotent: a second read sees the same row.
        assert_eq!(policies.policy(-1001).unwrap(), policy);
    }

    #[test]
    fn test_set_field_round_trips() {
        let policies = policy_store();
        policies.set_field(-1, "threshold", "0.8").unwrap();
        policies.set_field(-1, "max_warnings", "5").unwrap();
        policies.set_field(-1, "punishment", "mute").unwrap();
        policies.set_field(-1, "logging", "off").unwrap();
        policies.set_field(-1, "anon_reports", "off").unwrap();

        let policy = policies.policy(-1).unwrap();
        assert_eq!(policy.threshold, 0.8);
        assert_eq!(policy.max_warnings, 5);
        assert_eq!(policy.punishment, Punishment::Mute);
        assert!(!policy.logging_enabled);
        assert!(!policy.anonymous_reports);
    }

    #[test]
    fn test_unknown_field_rejected_without_write() {
        let policies = policy_store();
        let before = policies.policy(-2).unwrap();

        let err = policies.set_field(-2, "warn_limit", "5").unwrap_err();
        assert!(matches!(err, PolicyError::InvalidField(ref f) if f == "warn_limit"));
        assert_eq!(policies.policy(-2).unwrap(), before);
    }

    #[test]
    fn test_invalid_values_rejected_without_write() {
        let policies = policy_store();
        let before = policies.policy(-3).unwrap();

        assert!(policies.set_field(-3, "threshold", "1.5").is_err());
        assert!(policies.set_field(-3, "threshold", "high").is_err());
        assert!(policies.set_field(-3, "max_warnings", "0").is_err());
        assert!(policies.set_field(-3, "punishment", "kick").is_err());
        assert!(policies.set_field(-3, "logging", "maybe").is_err());

        assert_eq!(policies.policy(-3).unwrap(), before);
    }

    #[test]
    fn test_threshold_bounds_accepted() {
        let policies = policy_store();
        policies.set_field(-4, "threshold", "0").unwrap();
        assert_eq!(policies.policy(-4).unwrap().threshold, 0.0);
        policies.set_field(-4, "threshold", "1").unwrap();
        assert_eq!(policies.policy(-4).unwrap().threshold, 1.0);
    }
}
