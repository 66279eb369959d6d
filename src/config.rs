use crate::error::DaoError;
use crate::signature::SignerPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Chain id used when none is configured
pub const DEFAULT_CHAIN_ID: u64 = 1337;

/// Nested call frames allowed before a call is rejected
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

/// Settings fixed for the lifetime of a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Domain separator mixed into every action digest
    pub chain_id: u64,

    /// Whether zero-weight signers are tolerated on the quorum path
    pub signer_policy: SignerPolicy,

    /// Reject actions whose timestamp is older than this many seconds
    pub max_action_age_secs: Option<u64>,

    pub max_call_depth: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            signer_policy: SignerPolicy::default(),
            max_action_age_secs: None,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl ChainConfig {
    pub fn from_json(json: &str) -> Result<Self, DaoError> {
        let config: ChainConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DaoError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), DaoError> {
        if self.max_call_depth == 0 {
            return Err(DaoError::Config("max_call_depth must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChainConfig::default();
        assert_eq!(config.chain_id, 1337);
        assert_eq!(config.signer_policy, SignerPolicy::AllowZeroWeight);
        assert_eq!(config.max_action_age_secs, None);
        assert_eq!(config.max_call_depth, 64);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ChainConfig::from_json(
            r#"{ "chain_id": 5, "signer_policy": "require_weight" }"#,
        )
        .unwrap();

        assert_eq!(config.chain_id, 5);
        assert_eq!(config.signer_policy, SignerPolicy::RequireWeight);
        assert_eq!(config.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
    }

    #[test]
    fn test_zero_call_depth_rejected() {
        let result = ChainConfig::from_json(r#"{ "max_call_depth": 0 }"#);
        assert!(matches!(result, Err(DaoError::Config(_))));
    }

    #[test]
    fn test_malformed_json() {
        let result = ChainConfig::from_json("{ chain_id: ");
        assert!(matches!(result, Err(DaoError::Serialization(_))));
    }
}
