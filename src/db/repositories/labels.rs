use anyhow::anyhow;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_label_status, parse_label_type},
    models::{Label, LabelDetails, LabelFilter, LabelStatus, LabelType, NewLabel},
};
use crate::error::{Error, Result};

use super::locations::location_exists;

const LABEL_SELECT: &str = "SELECT l.label_id, l.label_type, l.status, l.location_id,
        l.status_notes, l.last_scan_time,
        pr.code, pr.name, pr.size_mm,
        fp.work_order_id, fp.quantity, fp.total_pieces
     FROM labels l
     LEFT JOIN paper_rolls pr ON pr.label_id = l.label_id
     LEFT JOIN fg_pallets fp ON fp.label_id = l.label_id";

fn row_to_label(row: &Row) -> Result<Label> {
    let label_type = parse_label_type(&row.get::<_, String>("label_type")?)?;
    let status = parse_label_status(&row.get::<_, String>("status")?)?;
    let last_scan_time: String = row.get("last_scan_time")?;

    let details = match label_type {
        LabelType::Roll => {
            let code: Option<String> = row.get("code")?;
            let name: Option<String> = row.get("name")?;
            let size_mm: Option<i64> = row.get("size_mm")?;
            match (code, name, size_mm) {
                (Some(code), Some(name), Some(size_mm)) => LabelDetails::Roll {
                    code,
                    name,
                    size_mm,
                },
                _ => {
                    return Err(Error::Dependency(anyhow!(
                        "paper roll extension row missing for roll label"
                    )))
                }
            }
        }
        LabelType::FgPallet => match row.get::<_, Option<i64>>("quantity")? {
            Some(quantity) => LabelDetails::FgPallet {
                work_order_id: row.get("work_order_id")?,
                quantity,
                total_pieces: row.get("total_pieces")?,
            },
            None => {
                return Err(Error::Dependency(anyhow!(
                    "pallet extension row missing for FG pallet label"
                )))
            }
        },
        LabelType::FgLocation | LabelType::PaperRollLocation | LabelType::RackLocation => {
            LabelDetails::None
        }
    };

    Ok(Label {
        label_id: row.get("label_id")?,
        label_type,
        status,
        location_id: row.get("location_id")?,
        status_notes: row.get("status_notes")?,
        last_scan_time: parse_datetime(&last_scan_time, "last_scan_time")?,
        details,
    })
}

fn fetch_label(
    conn: &Connection,
    label_type: Option<LabelType>,
    label_id: &str,
) -> Result<Option<Label>> {
    let (query, type_param);
    match label_type {
        Some(t) => {
            query = format!("{LABEL_SELECT} WHERE l.label_type = ?1 AND l.label_id = ?2");
            type_param = Some(t.as_str());
        }
        None => {
            // A label id may exist under more than one type; keep the
            // type-agnostic lookup deterministic.
            query =
                format!("{LABEL_SELECT} WHERE l.label_id = ?1 ORDER BY l.label_type ASC LIMIT 1");
            type_param = None;
        }
    }

    let mut stmt = conn.prepare(&query)?;
    let mut rows = match type_param {
        Some(t) => stmt.query(params![t, label_id])?,
        None => stmt.query(params![label_id])?,
    };

    match rows.next()? {
        Some(row) => Ok(Some(row_to_label(row)?)),
        None => Ok(None),
    }
}

fn insert_extension(conn: &Connection, label_id: &str, details: &LabelDetails) -> Result<()> {
    match details {
        LabelDetails::Roll {
            code,
            name,
            size_mm,
        } => {
            conn.execute(
                "INSERT INTO paper_rolls (label_id, code, name, size_mm)
                 VALUES (?1, ?2, ?3, ?4)",
                params![label_id, code, name, size_mm],
            )?;
        }
        LabelDetails::FgPallet {
            work_order_id,
            quantity,
            total_pieces,
        } => {
            conn.execute(
                "INSERT INTO fg_pallets (label_id, work_order_id, quantity, total_pieces)
                 VALUES (?1, ?2, ?3, ?4)",
                params![label_id, work_order_id, quantity, total_pieces],
            )?;
        }
        LabelDetails::None => {}
    }
    Ok(())
}

impl Database {
    /// Register a new label: base row plus type-specific extension row in
    /// one transaction (both-or-neither).
    pub async fn create_label(&self, input: NewLabel) -> Result<Label> {
        self.execute(move |conn| {
            if !input.details.matches(input.label_type) {
                return Err(Error::Validation(format!(
                    "details do not match label type {}",
                    input.label_type.as_str()
                )));
            }

            if let Some(location_id) = input.location_id.as_deref() {
                if !location_exists(conn, location_id)? {
                    return Err(Error::NotFound(format!("location {location_id}")));
                }
            }

            let exists: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM labels WHERE label_type = ?1 AND label_id = ?2",
                    params![input.label_type.as_str(), input.label_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_some() {
                return Err(Error::Conflict(format!(
                    "label {} ({}) already exists",
                    input.label_id,
                    input.label_type.as_str()
                )));
            }

            let now = Utc::now();
            let status = input.status.unwrap_or_default();

            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO labels (label_id, label_type, status, location_id, status_notes, last_scan_time)
                 VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
                params![
                    input.label_id,
                    input.label_type.as_str(),
                    status.as_str(),
                    input.location_id,
                    now.to_rfc3339(),
                ],
            )?;
            insert_extension(&tx, &input.label_id, &input.details)?;
            tx.commit()?;

            fetch_label(conn, Some(input.label_type), &input.label_id)?
                .ok_or_else(|| Error::Dependency(anyhow!("label not found after insert")))
        })
        .await
    }

    pub async fn get_label(&self, label_type: LabelType, label_id: &str) -> Result<Label> {
        let label_id = label_id.to_string();
        self.execute(move |conn| {
            fetch_label(conn, Some(label_type), &label_id)?
                .ok_or_else(|| Error::NotFound(format!("label {label_id}")))
        })
        .await
    }

    /// Look up a label by id alone — scanners read the printed id without
    /// knowing the label type.
    pub async fn get_label_by_id(&self, label_id: &str) -> Result<Label> {
        let label_id = label_id.to_string();
        self.execute(move |conn| {
            fetch_label(conn, None, &label_id)?
                .ok_or_else(|| Error::NotFound(format!("label {label_id}")))
        })
        .await
    }

    pub async fn list_labels(&self, filter: LabelFilter) -> Result<Vec<Label>> {
        self.execute(move |conn| {
            let mut query = format!("{LABEL_SELECT} WHERE 1=1");
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(label_type) = filter.label_type {
                query.push_str(" AND l.label_type = ?");
                params_vec.push(Box::new(label_type.as_str()));
            }
            if let Some(status) = filter.status {
                query.push_str(" AND l.status = ?");
                params_vec.push(Box::new(status.as_str()));
            }
            if let Some(location_id) = filter.location_id.clone() {
                query.push_str(" AND l.location_id = ?");
                params_vec.push(Box::new(location_id));
            }

            query.push_str(" ORDER BY l.last_scan_time DESC");

            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|b| b.as_ref()).collect();

            let mut stmt = conn.prepare(&query)?;
            let mut rows = stmt.query(params_refs.as_slice())?;
            let mut labels = Vec::new();
            while let Some(row) = rows.next()? {
                labels.push(row_to_label(row)?);
            }
            Ok(labels)
        })
        .await
    }

    /// Update a label's status. Setting the current status again is a no-op
    /// that returns the stored state without bumping `last_scan_time`.
    pub async fn update_label_status(
        &self,
        label_type: LabelType,
        label_id: &str,
        new_status: LabelStatus,
        notes: Option<String>,
    ) -> Result<Label> {
        let label_id = label_id.to_string();
        self.execute(move |conn| {
            let current = fetch_label(conn, Some(label_type), &label_id)?
                .ok_or_else(|| Error::NotFound(format!("label {label_id}")))?;

            if current.status == new_status {
                return Ok(current);
            }

            conn.execute(
                "UPDATE labels
                 SET status = ?1,
                     status_notes = ?2,
                     last_scan_time = ?3
                 WHERE label_type = ?4 AND label_id = ?5",
                params![
                    new_status.as_str(),
                    notes,
                    Utc::now().to_rfc3339(),
                    label_type.as_str(),
                    label_id,
                ],
            )?;

            fetch_label(conn, Some(label_type), &label_id)?
                .ok_or_else(|| Error::Dependency(anyhow!("label not found after update")))
        })
        .await
    }

    /// Move a label to a new location. Always bumps `last_scan_time`, even
    /// when the location value is unchanged.
    pub async fn update_label_location(
        &self,
        label_type: LabelType,
        label_id: &str,
        new_location_id: &str,
    ) -> Result<Label> {
        let label_id = label_id.to_string();
        let new_location_id = new_location_id.to_string();
        self.execute(move |conn| {
            if !location_exists(conn, &new_location_id)? {
                return Err(Error::NotFound(format!("location {new_location_id}")));
            }

            let rows_affected = conn.execute(
                "UPDATE labels
                 SET location_id = ?1,
                     last_scan_time = ?2
                 WHERE label_type = ?3 AND label_id = ?4",
                params![
                    new_location_id,
                    Utc::now().to_rfc3339(),
                    label_type.as_str(),
                    label_id,
                ],
            )?;
            if rows_affected == 0 {
                return Err(Error::NotFound(format!("label {label_id}")));
            }

            fetch_label(conn, Some(label_type), &label_id)?
                .ok_or_else(|| Error::Dependency(anyhow!("label not found after update")))
        })
        .await
    }

    /// Delete a label: extension row first, then the base row, in one
    /// transaction.
    pub async fn delete_label(&self, label_type: LabelType, label_id: &str) -> Result<()> {
        let label_id = label_id.to_string();
        self.execute(move |conn| {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM labels WHERE label_type = ?1 AND label_id = ?2",
                    params![label_type.as_str(), label_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(Error::NotFound(format!("label {label_id}")));
            }

            let tx = conn.transaction()?;
            match label_type {
                LabelType::Roll => {
                    tx.execute("DELETE FROM paper_rolls WHERE label_id = ?1", params![label_id])?;
                }
                LabelType::FgPallet => {
                    tx.execute("DELETE FROM fg_pallets WHERE label_id = ?1", params![label_id])?;
                }
                _ => {}
            }
            tx.execute(
                "DELETE FROM labels WHERE label_type = ?1 AND label_id = ?2",
                params![label_type.as_str(), label_id],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::LocationType;
    use crate::db::test_support::open_temp_db;

    fn roll_input(label_id: &str, location_id: Option<&str>) -> NewLabel {
        NewLabel {
            label_id: label_id.to_string(),
            label_type: LabelType::Roll,
            status: Some(LabelStatus::Available),
            location_id: location_id.map(str::to_string),
            details: LabelDetails::Roll {
                code: "C80".to_string(),
                name: "80gsm carrier".to_string(),
                size_mm: 1200,
            },
        }
    }

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let (_dir, db) = open_temp_db();
        db.create_location("RACK-01", LocationType::PaperRollLocation)
            .await
            .unwrap();

        let created = db.create_label(roll_input("R100", Some("RACK-01"))).await.unwrap();
        assert_eq!(created.status, LabelStatus::Available);
        assert_eq!(created.location_id.as_deref(), Some("RACK-01"));

        let fetched = db.get_label(LabelType::Roll, "R100").await.unwrap();
        assert_eq!(fetched.label_id, "R100");
        assert!(matches!(fetched.details, LabelDetails::Roll { size_mm: 1200, .. }));
    }

    #[tokio::test]
    async fn duplicate_create_is_conflict() {
        let (_dir, db) = open_temp_db();
        db.create_label(roll_input("R100", None)).await.unwrap();

        let err = db.create_label(roll_input("R100", None)).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // The rejection must not have produced a second row.
        let all = db.list_labels(LabelFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn mismatched_details_rejected_before_any_write() {
        let (_dir, db) = open_temp_db();
        let input = NewLabel {
            label_id: "P1".to_string(),
            label_type: LabelType::FgPallet,
            status: None,
            location_id: None,
            details: LabelDetails::Roll {
                code: "C80".to_string(),
                name: "wrong".to_string(),
                size_mm: 100,
            },
        };

        let err = db.create_label(input).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = db.get_label(LabelType::FgPallet, "P1").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn lookup_by_id_alone_is_deterministic_across_types() {
        let (_dir, db) = open_temp_db();
        // Same id registered under two label types; the PK is (type, id).
        db.create_label(roll_input("X1", None)).await.unwrap();
        db.create_label(NewLabel {
            label_id: "X1".to_string(),
            label_type: LabelType::FgPallet,
            status: None,
            location_id: None,
            details: LabelDetails::FgPallet {
                work_order_id: None,
                quantity: 5,
                total_pieces: None,
            },
        })
        .await
        .unwrap();

        for _ in 0..3 {
            let found = db.get_label_by_id("X1").await.unwrap();
            assert_eq!(found.label_type, LabelType::FgPallet);
        }
    }

    #[tokio::test]
    async fn status_defaults_to_unresolved() {
        let (_dir, db) = open_temp_db();
        let input = NewLabel {
            status: None,
            ..roll_input("R200", None)
        };
        let created = db.create_label(input).await.unwrap();
        assert_eq!(created.status, LabelStatus::Unresolved);
    }

    #[tokio::test]
    async fn same_status_update_keeps_last_scan_time() {
        let (_dir, db) = open_temp_db();
        let created = db.create_label(roll_input("R100", None)).await.unwrap();

        let unchanged = db
            .update_label_status(LabelType::Roll, "R100", LabelStatus::Available, None)
            .await
            .unwrap();
        assert_eq!(unchanged.last_scan_time, created.last_scan_time);

        let changed = db
            .update_label_status(
                LabelType::Roll,
                "R100",
                LabelStatus::Lost,
                Some("missing at stock take".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(changed.status, LabelStatus::Lost);
        assert_eq!(changed.status_notes.as_deref(), Some("missing at stock take"));
        assert_ne!(changed.last_scan_time, created.last_scan_time);
    }

    #[tokio::test]
    async fn update_location_always_bumps_last_scan_time() {
        let (_dir, db) = open_temp_db();
        db.create_location("RACK-01", LocationType::PaperRollLocation)
            .await
            .unwrap();
        let created = db.create_label(roll_input("R100", Some("RACK-01"))).await.unwrap();

        let updated = db
            .update_label_location(LabelType::Roll, "R100", "RACK-01")
            .await
            .unwrap();
        assert_eq!(updated.location_id.as_deref(), Some("RACK-01"));
        assert_ne!(updated.last_scan_time, created.last_scan_time);
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let (_dir, db) = open_temp_db();
        db.create_label(roll_input("R100", None)).await.unwrap();

        db.delete_label(LabelType::Roll, "R100").await.unwrap();

        let err = db.get_label(LabelType::Roll, "R100").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = db.delete_label(LabelType::Roll, "R100").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn list_labels_filters_by_type_and_location() {
        let (_dir, db) = open_temp_db();
        db.create_location("RACK-01", LocationType::PaperRollLocation)
            .await
            .unwrap();
        db.create_label(roll_input("R100", Some("RACK-01"))).await.unwrap();
        db.create_label(NewLabel {
            label_id: "P1".to_string(),
            label_type: LabelType::FgPallet,
            status: None,
            location_id: None,
            details: LabelDetails::FgPallet {
                work_order_id: Some("WO-77".to_string()),
                quantity: 40,
                total_pieces: Some(4000),
            },
        })
        .await
        .unwrap();

        let rolls = db
            .list_labels(LabelFilter {
                label_type: Some(LabelType::Roll),
                ..LabelFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(rolls.len(), 1);
        assert_eq!(rolls[0].label_id, "R100");

        let at_rack = db
            .list_labels(LabelFilter {
                location_id: Some("RACK-01".to_string()),
                ..LabelFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(at_rack.len(), 1);
    }
}
