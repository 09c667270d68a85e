use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{SourceConfig, SourceConfigWithoutSecrets, ValidationError};

/// Complete configuration of the replicator service.
///
/// Does not implement [`Serialize`] so that the connection password cannot leak, use
/// [`ReplicatorConfigWithoutSecrets`] for logging.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicatorConfig {
    pub source: SourceConfig,
}

impl ReplicatorConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate()
    }
}

impl Config for ReplicatorConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["source.tables"];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicatorConfigWithoutSecrets {
    pub source: SourceConfigWithoutSecrets,
}

impl From<ReplicatorConfig> for ReplicatorConfigWithoutSecrets {
    fn from(value: ReplicatorConfig) -> Self {
        ReplicatorConfigWithoutSecrets {
            source: value.source.into(),
        }
    }
}
