use crate::engine::ResetPolicy;
use serde::{Deserialize, Serialize};

/// Service-level configuration. Per-chat moderation policy lives in the
/// database; this file only carries deployment-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_path: String,
    /// Ledger reset behavior on escalation. `on_attempt` matches the shipped
    /// product behavior; confirm with the product owner before changing.
    #[serde(default)]
    pub reset_policy: ResetPolicy,
    #[serde(default)]
    pub presets: SensitivityPresets,
}

/// Named detection levels a moderator can pick instead of a raw threshold.
/// Weak flags aggressively (more false positives), high only flags blatant
/// spam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityPresets {
    pub weak: f64,
    pub normal: f64,
    pub high: f64,
}

impl SensitivityPresets {
    pub fn resolve(&self, level: &str) -> Option<f64> {
        match level {
            "weak" => Some(self.weak),
            "normal" => Some(self.normal),
            "high" => Some(self.high),
            _ => None,
        }
    }
}

impl Default for SensitivityPresets {
    fn default() -> Self {
        SensitivityPresets {
            weak: 0.8,
            normal: 0.9,
            high: 0.95,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: "/var/lib/chatguard/chatguard.db".to_string(),
            reset_policy: ResetPolicy::default(),
            presets: SensitivityPresets::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.database_path, config.database_path);
        assert_eq!(parsed.reset_policy, ResetPolicy::OnAttempt);
        assert_eq!(parsed.presets.normal, 0.9);
    }

    #[test]
    fn test_missing_optional_fields_use_defaults() {
        let parsed: Config = serde_yaml::from_str("database_path: /tmp/test.db\n").unwrap();
        assert_eq!(parsed.reset_policy, ResetPolicy::OnAttempt);
        assert_eq!(parsed.presets.weak, 0.8);
    }

    #[test]
    fn test_preset_resolution() {
        let presets = SensitivityPresets::default();
        assert_eq!(presets.resolve("weak"), Some(0.8));
        assert_eq!(presets.resolve("normal"), Some(0.9));
        assert_eq!(presets.resolve("high"), Some(0.95));
        assert_eq!(presets.resolve("paranoid"), None);
    }
}
