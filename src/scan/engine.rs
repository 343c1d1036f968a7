use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::db::models::{LabelType, Location, RackItemAssignment};
use crate::db::Database;
use crate::error::{Error, Result};

use super::rules;
use super::session_store::{ScanSession, ScanSessionStore};

const RACK_SCAN_SEQUENCE: i64 = 1;
const ITEM_SCAN_SEQUENCE: i64 = 2;

const MSG_MATCH: &str = "Item is in correct rack and matches assigned location";
const MSG_WRONG_RACK_TYPE: &str = "WARNING: Item is in wrong rack type";
const MSG_WRONG_ASSIGNMENT: &str = "WARNING: Item is not in its assigned location";

/// Response to a rack scan: the session the drone must quote on the
/// follow-up item scan, plus the rack it scanned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RackScanAck {
    pub session_id: String,
    pub location: Location,
}

/// Outcome of an item scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanVerdict {
    pub label_id: String,
    pub label_type: LabelType,
    pub scanned_location: String,
    /// The label's recorded location before this scan, if any.
    pub current_location: Option<String>,
    pub correct_location_type: bool,
    pub in_assigned_location: bool,
    pub message: String,
}

/// Drives the two-step scan protocol: rack scan opens a session, item scan
/// validates against it. Every scan leaves an audit row whatever the verdict;
/// the label's location is only committed on a full match.
pub struct ScanEngine {
    db: Database,
    sessions: Arc<ScanSessionStore>,
    // Serializes concurrent item scans quoting the same session.
    session_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ScanEngine {
    pub fn new(db: Database) -> Self {
        Self::with_store(db, Arc::new(ScanSessionStore::new()))
    }

    pub fn with_store(db: Database, sessions: Arc<ScanSessionStore>) -> Self {
        Self {
            db,
            sessions,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Step one: the drone scans a rack location tag. Opens a session and
    /// records the rack scan in the audit trail.
    pub async fn rack_scan(&self, location_id: &str) -> Result<RackScanAck> {
        let location = self.db.get_location(location_id).await?;

        let session = self.sessions.open(&location.location_id).await;
        let audit = RackItemAssignment {
            id: None,
            location_id: location.location_id.clone(),
            label_id: None,
            scan_sequence: RACK_SCAN_SEQUENCE,
            scan_session_id: session.session_id.clone(),
            scan_timestamp: Utc::now(),
        };
        if let Err(err) = self.db.insert_assignment(audit).await {
            // A session with no recorded rack scan must not accept item scans.
            self.sessions.discard(&session.session_id).await;
            return Err(err);
        }

        info!(
            "Opened scan session {} for location {}",
            session.session_id, location.location_id
        );
        Ok(RackScanAck {
            session_id: session.session_id,
            location,
        })
    }

    /// Step two: the drone scans an item label and quotes the session from
    /// the rack scan. The audit row is written before the verdict decides
    /// whether to commit the location.
    pub async fn item_scan(&self, label_id: &str, session_id: &str) -> Result<ScanVerdict> {
        let lock = {
            let mut locks = self.session_locks.lock().await;
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let guard = lock.lock().await;

        let result = match self.sessions.resolve(session_id).await {
            Ok(session) => self.run_item_scan(&session, label_id).await,
            Err(err) => Err(err),
        };

        drop(guard);
        {
            // Evict the keyed lock once nobody waits on it. With no other
            // scanner holding a clone, exactly two counts remain: the map
            // entry and our own `lock`.
            let mut locks = self.session_locks.lock().await;
            if let Some(entry) = locks.get(session_id) {
                if Arc::strong_count(entry) <= 2 {
                    locks.remove(session_id);
                }
            }
        }

        result
    }

    async fn run_item_scan(&self, session: &ScanSession, label_id: &str) -> Result<ScanVerdict> {
        let label = self
            .db
            .get_label_by_id(label_id)
            .await
            .map_err(|err| match err {
                Error::NotFound(_) => Error::NotFound(format!("item {label_id}")),
                other => other,
            })?;
        let location = self.db.get_location(&session.location_id).await?;

        let correct_location_type = rules::is_compatible(label.label_type, location.type_name);
        let in_assigned_location =
            label.location_id.as_deref() == Some(session.location_id.as_str());

        self.db
            .insert_assignment(RackItemAssignment {
                id: None,
                location_id: session.location_id.clone(),
                label_id: Some(label.label_id.clone()),
                scan_sequence: ITEM_SCAN_SEQUENCE,
                scan_session_id: session.session_id.clone(),
                scan_timestamp: Utc::now(),
            })
            .await?;

        // Conservative commit: only a clean match moves the registry.
        if correct_location_type && in_assigned_location {
            self.db
                .update_label_location(label.label_type, &label.label_id, &session.location_id)
                .await?;
        } else {
            warn!(
                "Item {} scanned at {} without committing (type ok: {}, assignment ok: {})",
                label.label_id, session.location_id, correct_location_type, in_assigned_location
            );
        }

        let message = if !correct_location_type {
            MSG_WRONG_RACK_TYPE
        } else if !in_assigned_location {
            MSG_WRONG_ASSIGNMENT
        } else {
            MSG_MATCH
        };

        Ok(ScanVerdict {
            label_id: label.label_id,
            label_type: label.label_type,
            scanned_location: session.location_id.clone(),
            current_location: label.location_id,
            correct_location_type,
            in_assigned_location,
            message: message.to_string(),
        })
    }

    #[cfg(test)]
    async fn session_lock_count(&self) -> usize {
        self.session_locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::db::models::{LabelDetails, LabelFilter, LabelStatus, LocationType, NewLabel};
    use crate::db::test_support::open_temp_db;

    async fn seed(db: &Database) {
        db.create_location("RACK-01", LocationType::PaperRollLocation)
            .await
            .unwrap();
        db.create_location("RACK-02", LocationType::PaperRollLocation)
            .await
            .unwrap();
        db.create_location("FG-01", LocationType::FgPalletLocation)
            .await
            .unwrap();
        db.create_label(NewLabel {
            label_id: "R100".to_string(),
            label_type: LabelType::Roll,
            status: Some(LabelStatus::Available),
            location_id: Some("RACK-01".to_string()),
            details: LabelDetails::Roll {
                code: "C80".to_string(),
                name: "80gsm carrier".to_string(),
                size_mm: 1200,
            },
        })
        .await
        .unwrap();
        db.create_label(NewLabel {
            label_id: "P1".to_string(),
            label_type: LabelType::FgPallet,
            status: Some(LabelStatus::Available),
            location_id: Some("FG-01".to_string()),
            details: LabelDetails::FgPallet {
                work_order_id: Some("WO-77".to_string()),
                quantity: 40,
                total_pieces: Some(4000),
            },
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn matching_scan_commits_location_and_audits_both_steps() {
        let (_dir, db) = open_temp_db();
        seed(&db).await;
        let engine = ScanEngine::new(db.clone());

        let ack = engine.rack_scan("RACK-01").await.unwrap();
        let verdict = engine.item_scan("R100", &ack.session_id).await.unwrap();

        assert!(verdict.correct_location_type);
        assert!(verdict.in_assigned_location);
        assert_eq!(verdict.message, MSG_MATCH);

        let label = db.get_label(LabelType::Roll, "R100").await.unwrap();
        assert_eq!(label.location_id.as_deref(), Some("RACK-01"));

        let trail = db.assignments_for_session(&ack.session_id).await.unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].scan_sequence, 1);
        assert_eq!(trail[1].scan_sequence, 2);
        assert_eq!(trail[1].label_id.as_deref(), Some("R100"));
    }

    #[tokio::test]
    async fn right_type_wrong_assignment_audits_but_does_not_commit() {
        let (_dir, db) = open_temp_db();
        seed(&db).await;
        let engine = ScanEngine::new(db.clone());

        // R100 is assigned to RACK-01 but gets scanned at RACK-02.
        let before = db.get_label(LabelType::Roll, "R100").await.unwrap();
        let ack = engine.rack_scan("RACK-02").await.unwrap();
        let verdict = engine.item_scan("R100", &ack.session_id).await.unwrap();

        assert!(verdict.correct_location_type);
        assert!(!verdict.in_assigned_location);
        assert_eq!(verdict.message, MSG_WRONG_ASSIGNMENT);
        assert_eq!(verdict.current_location.as_deref(), Some("RACK-01"));

        let after = db.get_label(LabelType::Roll, "R100").await.unwrap();
        assert_eq!(after.location_id.as_deref(), Some("RACK-01"));
        assert_eq!(after.last_scan_time, before.last_scan_time);

        let trail = db.assignments_for_session(&ack.session_id).await.unwrap();
        assert_eq!(trail.len(), 2);
    }

    #[tokio::test]
    async fn wrong_rack_type_takes_precedence_in_message() {
        let (_dir, db) = open_temp_db();
        seed(&db).await;
        let engine = ScanEngine::new(db.clone());

        // An FG pallet scanned on a paper-roll rack is both the wrong type
        // and not in its assigned location; the type warning wins.
        let ack = engine.rack_scan("RACK-01").await.unwrap();
        let verdict = engine.item_scan("P1", &ack.session_id).await.unwrap();

        assert!(!verdict.correct_location_type);
        assert!(!verdict.in_assigned_location);
        assert_eq!(verdict.message, MSG_WRONG_RACK_TYPE);

        let pallet = db.get_label(LabelType::FgPallet, "P1").await.unwrap();
        assert_eq!(pallet.location_id.as_deref(), Some("FG-01"));
    }

    #[tokio::test]
    async fn wrong_rack_type_with_matching_assignment_does_not_commit() {
        let (_dir, db) = open_temp_db();
        seed(&db).await;
        // The registry does not enforce compatibility at creation, so a
        // pallet can be assigned to a paper-roll rack.
        db.create_label(NewLabel {
            label_id: "P2".to_string(),
            label_type: LabelType::FgPallet,
            status: Some(LabelStatus::Available),
            location_id: Some("RACK-01".to_string()),
            details: LabelDetails::FgPallet {
                work_order_id: None,
                quantity: 10,
                total_pieces: None,
            },
        })
        .await
        .unwrap();
        let engine = ScanEngine::new(db.clone());

        let before = db.get_label(LabelType::FgPallet, "P2").await.unwrap();
        let ack = engine.rack_scan("RACK-01").await.unwrap();
        let verdict = engine.item_scan("P2", &ack.session_id).await.unwrap();

        assert!(!verdict.correct_location_type);
        assert!(verdict.in_assigned_location);
        assert_eq!(verdict.message, MSG_WRONG_RACK_TYPE);

        let after = db.get_label(LabelType::FgPallet, "P2").await.unwrap();
        assert_eq!(after.location_id.as_deref(), Some("RACK-01"));
        assert_eq!(after.last_scan_time, before.last_scan_time);

        let trail = db.assignments_for_session(&ack.session_id).await.unwrap();
        assert_eq!(trail.len(), 2);
    }

    #[tokio::test]
    async fn completed_item_scans_leave_no_lock_entries() {
        let (_dir, db) = open_temp_db();
        seed(&db).await;
        let engine = ScanEngine::new(db);

        for _ in 0..5 {
            let ack = engine.rack_scan("RACK-01").await.unwrap();
            engine.item_scan("R100", &ack.session_id).await.unwrap();
        }
        assert_eq!(engine.session_lock_count().await, 0);

        let err = engine
            .item_scan("R100", &Uuid::new_v4().to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionRequired));
        assert_eq!(engine.session_lock_count().await, 0);
    }

    #[tokio::test]
    async fn item_scan_without_rack_scan_is_rejected() {
        let (_dir, db) = open_temp_db();
        seed(&db).await;
        let engine = ScanEngine::new(db);

        let err = engine
            .item_scan("R100", &Uuid::new_v4().to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionRequired));
    }

    #[tokio::test]
    async fn unknown_rack_and_unknown_item_are_not_found() {
        let (_dir, db) = open_temp_db();
        seed(&db).await;
        let engine = ScanEngine::new(db);

        let err = engine.rack_scan("RACK-99").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let ack = engine.rack_scan("RACK-01").await.unwrap();
        let err = engine.item_scan("R999", &ack.session_id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(msg) if msg.contains("item R999")));
    }

    #[tokio::test]
    async fn session_is_reusable_for_multiple_item_scans() {
        let (_dir, db) = open_temp_db();
        seed(&db).await;
        db.create_label(NewLabel {
            label_id: "R200".to_string(),
            label_type: LabelType::Roll,
            status: Some(LabelStatus::Available),
            location_id: Some("RACK-01".to_string()),
            details: LabelDetails::Roll {
                code: "C120".to_string(),
                name: "120gsm liner".to_string(),
                size_mm: 1400,
            },
        })
        .await
        .unwrap();
        let engine = ScanEngine::new(db.clone());

        let ack = engine.rack_scan("RACK-01").await.unwrap();
        engine.item_scan("R100", &ack.session_id).await.unwrap();
        engine.item_scan("R200", &ack.session_id).await.unwrap();

        let trail = db.assignments_for_session(&ack.session_id).await.unwrap();
        assert_eq!(trail.len(), 3);

        let at_rack = db
            .list_labels(LabelFilter {
                location_id: Some("RACK-01".to_string()),
                ..LabelFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(at_rack.len(), 2);
    }
}
