//! Run metadata.
//!
//! Every scan run carries a metadata record identifying it in logs and in
//! exported data files: a unique run id, the start timestamp, the scan
//! parameters in effect and a free-form experiment tag.

use crate::config::ScanConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifying metadata of one scan run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Unique run identifier.
    pub run_id: String,
    /// Wall-clock start of the run.
    pub started_at: DateTime<Utc>,
    /// Free-form experiment tag (sample name, conditions, ...).
    pub tag: String,
    /// Scan parameters the run was started with.
    pub scan: ScanConfig,
}

impl RunMetadata {
    /// Create metadata for a run starting now.
    pub fn new(scan: &ScanConfig, tag: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            tag: tag.into(),
            scan: scan.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique() {
        let cfg = ScanConfig::default();
        let a = RunMetadata::new(&cfg, "a");
        let b = RunMetadata::new(&cfg, "b");
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn metadata_serializes_to_json() {
        let meta = RunMetadata::new(&ScanConfig::default(), "GaAs sample 3");
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("GaAs sample 3"));
        assert!(json.contains(&meta.run_id));
    }
}
