use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the append-only scan audit log. Written for every verification
/// attempt the policy deems auditable; never mutated, removed only when the
/// owning registration is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanHistoryEntry {
    pub id: i64,
    pub ticket_id: String,
    pub scanned_at: DateTime<Utc>,
    pub valid: bool,
}
