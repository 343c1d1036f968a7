use rusqlite::params;

use crate::db::{connection::Database, helpers::parse_datetime, models::RackItemAssignment};
use crate::error::Result;

impl Database {
    /// Append one audit row. The trail is append-only; there is no update or
    /// delete counterpart.
    pub async fn insert_assignment(&self, assignment: RackItemAssignment) -> Result<i64> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO rack_item_assignments
                     (location_id, label_id, scan_sequence, scan_session_id, scan_timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    assignment.location_id,
                    assignment.label_id,
                    assignment.scan_sequence,
                    assignment.scan_session_id,
                    assignment.scan_timestamp.to_rfc3339(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// All audit rows for one scan session, oldest first.
    pub async fn assignments_for_session(
        &self,
        scan_session_id: &str,
    ) -> Result<Vec<RackItemAssignment>> {
        let scan_session_id = scan_session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, location_id, label_id, scan_sequence, scan_session_id, scan_timestamp
                 FROM rack_item_assignments
                 WHERE scan_session_id = ?1
                 ORDER BY id ASC",
            )?;
            let mut rows = stmt.query(params![scan_session_id])?;
            let mut assignments = Vec::new();
            while let Some(row) = rows.next()? {
                let raw_ts: String = row.get("scan_timestamp")?;
                assignments.push(RackItemAssignment {
                    id: Some(row.get("id")?),
                    location_id: row.get("location_id")?,
                    label_id: row.get("label_id")?,
                    scan_sequence: row.get("scan_sequence")?,
                    scan_session_id: row.get("scan_session_id")?,
                    scan_timestamp: parse_datetime(&raw_ts, "scan_timestamp")?,
                });
            }
            Ok(assignments)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::db::test_support::open_temp_db;

    #[tokio::test]
    async fn trail_preserves_insertion_order() {
        let (_dir, db) = open_temp_db();

        let session = "sess-1".to_string();
        for (sequence, label) in [(1, None), (2, Some("R100".to_string()))] {
            db.insert_assignment(RackItemAssignment {
                id: None,
                location_id: "RACK-01".to_string(),
                label_id: label,
                scan_sequence: sequence,
                scan_session_id: session.clone(),
                scan_timestamp: Utc::now(),
            })
            .await
            .unwrap();
        }
        // Unrelated session must not leak into the result.
        db.insert_assignment(RackItemAssignment {
            id: None,
            location_id: "RACK-02".to_string(),
            label_id: None,
            scan_sequence: 1,
            scan_session_id: "sess-2".to_string(),
            scan_timestamp: Utc::now(),
        })
        .await
        .unwrap();

        let trail = db.assignments_for_session(&session).await.unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].scan_sequence, 1);
        assert_eq!(trail[0].label_id, None);
        assert_eq!(trail[1].scan_sequence, 2);
        assert_eq!(trail[1].label_id.as_deref(), Some("R100"));
    }
}
