//! Engine configuration.

use crate::{cache::CacheConfig, source::SourceKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Retrieval strategy for raw per-day counts.
    pub source: SourceKind,
    /// Day-cache settings, applied only to large-seller accounts.
    pub cache:  CacheConfig,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::RelationalScan,
            cache:  CacheConfig::default(),
        }
    }
}
