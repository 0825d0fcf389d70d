//! Node configuration.

use shared_types::FeedsConfig;

/// Runtime configuration of the node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Data directory for the durable store (RocksDB backend).
    pub data_dir: String,
    /// Staging directory for attachment bytes.
    pub attachment_dir: String,
    /// Protocol limits of the feeds core.
    pub feeds: FeedsConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            attachment_dir: "./data/attachments".to_string(),
            feeds: FeedsConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Build from environment, falling back to defaults per field.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `MURMUR_DATA_DIR` | `./data` |
    /// | `MURMUR_ATTACHMENT_DIR` | `./data/attachments` |
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("MURMUR_DATA_DIR").unwrap_or(defaults.data_dir),
            attachment_dir: std::env::var("MURMUR_ATTACHMENT_DIR")
                .unwrap_or(defaults.attachment_dir),
            feeds: FeedsConfig::from_env(),
        }
    }
}
