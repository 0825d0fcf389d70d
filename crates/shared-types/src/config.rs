//! # Feeds Configuration
//!
//! Tunables of the feeds core. Defaults match the protocol constants;
//! `from_env` overrides them from `MURMUR_*` variables for deployment.

use serde::{Deserialize, Serialize};

/// Protocol and pagination tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedsConfig {
    /// Pagination ceiling for message queries.
    pub max_messages_per_response: usize,
    /// Hard member cap per group; rotations fail above this.
    pub max_group_size: usize,
    /// Blocks (inclusive of the rotation block) during which the previous
    /// key generation is still accepted on ingress.
    pub key_rotation_grace_blocks: u64,
    /// Minimum blocks between a self-leave and a self-rejoin of a public
    /// group. Admin adds bypass this.
    pub rejoin_cooldown_blocks: u64,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            max_messages_per_response: 100,
            max_group_size: 512,
            key_rotation_grace_blocks: 5,
            rejoin_cooldown_blocks: 100,
        }
    }
}

impl FeedsConfig {
    /// Build from environment, falling back to defaults per field.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `MURMUR_MAX_MESSAGES_PER_RESPONSE` | 100 |
    /// | `MURMUR_MAX_GROUP_SIZE` | 512 |
    /// | `MURMUR_KEY_ROTATION_GRACE_BLOCKS` | 5 |
    /// | `MURMUR_REJOIN_COOLDOWN_BLOCKS` | 100 |
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_messages_per_response: env_parse(
                "MURMUR_MAX_MESSAGES_PER_RESPONSE",
                defaults.max_messages_per_response,
            ),
            max_group_size: env_parse("MURMUR_MAX_GROUP_SIZE", defaults.max_group_size),
            key_rotation_grace_blocks: env_parse(
                "MURMUR_KEY_ROTATION_GRACE_BLOCKS",
                defaults.key_rotation_grace_blocks,
            ),
            rejoin_cooldown_blocks: env_parse(
                "MURMUR_REJOIN_COOLDOWN_BLOCKS",
                defaults.rejoin_cooldown_blocks,
            ),
        }
    }

    /// Last block (inclusive) at which the previous generation is still
    /// accepted, given the block a rotation landed in.
    #[must_use]
    pub fn grace_deadline(&self, rotation_block: u64) -> u64 {
        rotation_block.saturating_add(self.key_rotation_grace_blocks.saturating_sub(1))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol_constants() {
        let cfg = FeedsConfig::default();
        assert_eq!(cfg.max_messages_per_response, 100);
        assert_eq!(cfg.max_group_size, 512);
        assert_eq!(cfg.key_rotation_grace_blocks, 5);
        assert_eq!(cfg.rejoin_cooldown_blocks, 100);
    }

    #[test]
    fn test_grace_deadline_is_inclusive_five_block_window() {
        let cfg = FeedsConfig::default();
        // Rotation at block 100: previous generation valid through 104.
        assert_eq!(cfg.grace_deadline(100), 104);
    }
}
