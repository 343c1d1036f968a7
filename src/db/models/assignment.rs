use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One append-only audit row in the rack/item scan trail.
///
/// Sequence 1 rows record a rack scan (no label); sequence 2 rows record an
/// item scan correlated by `scan_session_id`. Rows are written regardless of
/// the validation verdict and are never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RackItemAssignment {
    pub id: Option<i64>,
    pub location_id: String,
    pub label_id: Option<String>,
    pub scan_sequence: i64,
    pub scan_session_id: String,
    pub scan_timestamp: DateTime<Utc>,
}
