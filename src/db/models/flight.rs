//! Flight session data models.
//!
//! A flight session is the immutable record of one completed drone flight:
//! a header row plus an ordered movement log, written atomically. Only the
//! star flag and the display name may change afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightSession {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub end_reason: Option<String>,
    pub battery_start: i64,
    pub battery_end: i64,
    pub total_commands: i64,
    pub name: Option<String>,
    pub is_starred: bool,
    pub last_modified: DateTime<Utc>,
}

/// Header fields supplied when recording a completed flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightSummary {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub end_reason: Option<String>,
    pub battery_start: i64,
    pub battery_end: i64,
    pub total_commands: i64,
}

/// One recorded action within a flight, as submitted by the drone client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMovementLog {
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub battery_level: i64,
    pub distance: Option<f64>,
    /// Set on scan actions so coverage analytics can tie the movement to a label.
    pub label_id: Option<String>,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

/// Stored movement log entry; immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementLogEntry {
    pub log_id: i64,
    pub session_id: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub battery_level: i64,
    pub distance: Option<f64>,
    pub label_id: Option<String>,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

/// A flight header together with its full movement log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightRecord {
    pub session: FlightSession,
    pub movements: Vec<MovementLogEntry>,
}

/// List-view row: header plus movement count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightListRow {
    pub session: FlightSession,
    pub total_movements: i64,
}

/// Per-action aggregate over all recorded movement logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementActionStat {
    pub action: String,
    pub count: i64,
    pub avg_battery_level: Option<f64>,
    pub avg_distance: Option<f64>,
}
