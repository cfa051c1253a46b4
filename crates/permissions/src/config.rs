//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the [`RebuildOrchestrator`](crate::rebuild::RebuildOrchestrator).
///
/// # Example
///
/// ```
/// use basis_permissions::config::EngineConfig;
///
/// let config: EngineConfig = serde_json::from_str(r#"{ "insert_batch_size": 250 }"#).unwrap();
/// assert_eq!(config.insert_batch_size, 250);
/// assert!(config.strict_scoping);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of entries passed to a single insert call.
    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,

    /// Reject scoped rebuilds whose node and tenant filters are both empty.
    ///
    /// When disabled such calls are logged and skipped without touching
    /// storage.
    #[serde(default = "default_true")]
    pub strict_scoping: bool,
}

fn default_insert_batch_size() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            insert_batch_size: default_insert_batch_size(),
            strict_scoping: true,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the insert batch size. Zero is treated as one.
    pub fn with_insert_batch_size(mut self, size: usize) -> Self {
        self.insert_batch_size = size.max(1);
        self
    }

    /// Enables or disables strict scoping.
    pub fn with_strict_scoping(mut self, strict: bool) -> Self {
        self.strict_scoping = strict;
        self
    }
}
