use chrono::Utc;
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::parse_datetime,
    models::{
        FlightListRow, FlightRecord, FlightSession, FlightSummary, MovementActionStat,
        MovementLogEntry, NewMovementLog,
    },
};
use crate::error::{Error, Result};

const SESSION_COLUMNS: &str = "session_id, start_time, end_time, end_reason, battery_start,
        battery_end, total_commands, name, is_starred, last_modified";

fn row_to_session(row: &Row) -> Result<FlightSession> {
    let start_time: String = row.get("start_time")?;
    let end_time: String = row.get("end_time")?;
    let last_modified: String = row.get("last_modified")?;
    Ok(FlightSession {
        session_id: row.get("session_id")?,
        start_time: parse_datetime(&start_time, "start_time")?,
        end_time: parse_datetime(&end_time, "end_time")?,
        end_reason: row.get("end_reason")?,
        battery_start: row.get("battery_start")?,
        battery_end: row.get("battery_end")?,
        total_commands: row.get("total_commands")?,
        name: row.get("name")?,
        is_starred: row.get::<_, i64>("is_starred")? != 0,
        last_modified: parse_datetime(&last_modified, "last_modified")?,
    })
}

fn row_to_movement(row: &Row) -> Result<MovementLogEntry> {
    let timestamp: String = row.get("timestamp")?;
    Ok(MovementLogEntry {
        log_id: row.get("log_id")?,
        session_id: row.get("session_id")?,
        action: row.get("action")?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        battery_level: row.get("battery_level")?,
        distance: row.get("distance")?,
        label_id: row.get("label_id")?,
        error_type: row.get("error_type")?,
        error_message: row.get("error_message")?,
    })
}

impl Database {
    /// Persist a completed flight: header and every movement row in one
    /// transaction. An empty movement log is legal (header-only flight).
    /// Returns the generated session id.
    pub async fn record_flight(
        &self,
        summary: &FlightSummary,
        movements: &[NewMovementLog],
    ) -> Result<String> {
        let summary = summary.clone();
        let movements = movements.to_vec();
        self.execute(move |conn| {
            let session_id = Uuid::new_v4().to_string();
            let now = Utc::now().to_rfc3339();

            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO flight_sessions
                     (session_id, start_time, end_time, end_reason, battery_start,
                      battery_end, total_commands, last_modified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    session_id,
                    summary.start_time.to_rfc3339(),
                    summary.end_time.to_rfc3339(),
                    summary.end_reason,
                    summary.battery_start,
                    summary.battery_end,
                    summary.total_commands,
                    now,
                ],
            )?;
            for movement in &movements {
                tx.execute(
                    "INSERT INTO movement_logs
                         (session_id, action, timestamp, battery_level, distance,
                          label_id, error_type, error_message)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        session_id,
                        movement.action,
                        movement.timestamp.to_rfc3339(),
                        movement.battery_level,
                        movement.distance,
                        movement.label_id,
                        movement.error_type,
                        movement.error_message,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(session_id)
        })
        .await
    }

    /// Fetch one flight with its movement log in chronological order.
    pub async fn get_flight(&self, session_id: &str) -> Result<FlightRecord> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM flight_sessions WHERE session_id = ?1"
            ))?;
            let mut rows = stmt.query(params![session_id])?;
            let session = match rows.next()? {
                Some(row) => row_to_session(row)?,
                None => return Err(Error::NotFound(format!("flight session {session_id}"))),
            };

            let mut stmt = conn.prepare(
                "SELECT log_id, session_id, action, timestamp, battery_level, distance,
                        label_id, error_type, error_message
                 FROM movement_logs
                 WHERE session_id = ?1
                 ORDER BY timestamp ASC",
            )?;
            let mut rows = stmt.query(params![session_id])?;
            let mut movements = Vec::new();
            while let Some(row) = rows.next()? {
                movements.push(row_to_movement(row)?);
            }

            Ok(FlightRecord { session, movements })
        })
        .await
    }

    /// All flights, newest first, each with its movement count.
    pub async fn list_flights(&self) -> Result<Vec<FlightListRow>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS},
                        (SELECT COUNT(*) FROM movement_logs m
                         WHERE m.session_id = flight_sessions.session_id) AS total_movements
                 FROM flight_sessions
                 ORDER BY start_time DESC"
            ))?;
            let mut rows = stmt.query([])?;
            let mut flights = Vec::new();
            while let Some(row) = rows.next()? {
                flights.push(FlightListRow {
                    session: row_to_session(row)?,
                    total_movements: row.get("total_movements")?,
                });
            }
            Ok(flights)
        })
        .await
    }

    pub async fn set_flight_starred(&self, session_id: &str, starred: bool) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE flight_sessions SET is_starred = ?1, last_modified = ?2
                 WHERE session_id = ?3",
                params![starred as i64, Utc::now().to_rfc3339(), session_id],
            )?;
            if rows_affected == 0 {
                return Err(Error::NotFound(format!("flight session {session_id}")));
            }
            Ok(())
        })
        .await
    }

    pub async fn rename_flight(&self, session_id: &str, name: Option<String>) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE flight_sessions SET name = ?1, last_modified = ?2
                 WHERE session_id = ?3",
                params![name, Utc::now().to_rfc3339(), session_id],
            )?;
            if rows_affected == 0 {
                return Err(Error::NotFound(format!("flight session {session_id}")));
            }
            Ok(())
        })
        .await
    }

    /// Delete a flight and its movement log. Children first, then the header.
    pub async fn delete_flight(&self, session_id: &str) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM movement_logs WHERE session_id = ?1",
                params![session_id],
            )?;
            let rows_affected = tx.execute(
                "DELETE FROM flight_sessions WHERE session_id = ?1",
                params![session_id],
            )?;
            if rows_affected == 0 {
                return Err(Error::NotFound(format!("flight session {session_id}")));
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Per-action aggregates across every recorded flight, busiest first.
    pub async fn movement_action_stats(&self) -> Result<Vec<MovementActionStat>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT action,
                        COUNT(*) AS count,
                        AVG(battery_level) AS avg_battery_level,
                        AVG(distance) AS avg_distance
                 FROM movement_logs
                 GROUP BY action
                 ORDER BY count DESC",
            )?;
            let mut rows = stmt.query([])?;
            let mut stats = Vec::new();
            while let Some(row) = rows.next()? {
                stats.push(MovementActionStat {
                    action: row.get("action")?,
                    count: row.get("count")?,
                    avg_battery_level: row.get("avg_battery_level")?,
                    avg_distance: row.get("avg_distance")?,
                });
            }
            Ok(stats)
        })
        .await
    }
}
