//! Aggregate analytics over recorded flights and movement logs, plus the
//! AI-backed report that wraps them.

mod advisor;

pub use advisor::{AdvisorError, AnalysisKind, OpenAiAdvisor, Summarizer, API_KEY_ENV};

use anyhow::anyhow;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::{helpers::parse_datetime, Database};
use crate::error::{Error, Result};

impl From<AdvisorError> for Error {
    fn from(err: AdvisorError) -> Self {
        Error::Dependency(anyhow::Error::new(err))
    }
}

/// Fleet-wide battery figures, averaged over flights that actually drained
/// battery. All fields are `None` when no such flight exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryEfficiencyMetrics {
    pub avg_battery_consumption: Option<f64>,
    pub avg_items_scanned: Option<f64>,
    pub avg_flight_duration: Option<f64>,
    pub battery_per_scan: Option<f64>,
    pub battery_per_minute: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementPatternStat {
    pub action: String,
    pub usage_count: i64,
    pub session_count: i64,
    pub avg_battery_level: Option<f64>,
    pub avg_distance: Option<f64>,
    pub usage_percentage: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub avg_battery_consumption: Option<f64>,
    pub avg_commands_per_flight: Option<f64>,
    pub avg_flight_duration: Option<f64>,
    pub avg_items_scanned: Option<f64>,
    pub avg_unique_movements: Option<f64>,
    pub items_per_minute: Option<f64>,
    pub items_per_battery_unit: Option<f64>,
}

/// How much of the registry one flight touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageStats {
    pub total_scans: i64,
    pub unique_locations: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockTakeStat {
    pub location_id: Option<String>,
    pub items_scanned: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelocationStat {
    pub location_id: Option<String>,
    pub relocations: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementHistoryEntry {
    pub action: String,
    pub location_id: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Metrics plus the advisor's prose summary of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub kind: AnalysisKind,
    pub metrics: Value,
    pub summary: String,
}

impl Database {
    /// Battery consumption averages across flights where the battery level
    /// dropped. Items scanned are counted from movement log rows carrying a
    /// label id.
    pub async fn battery_efficiency_metrics(&self) -> Result<BatteryEfficiencyMetrics> {
        self.execute(|conn| {
            let metrics = conn.query_row(
                "WITH battery_metrics AS (
                     SELECT fs.session_id,
                            fs.battery_start - fs.battery_end AS battery_consumed,
                            (SELECT COUNT(*) FROM movement_logs ml
                              WHERE ml.session_id = fs.session_id
                                AND ml.label_id IS NOT NULL) AS items_scanned,
                            (julianday(fs.end_time) - julianday(fs.start_time)) * 1440.0
                                AS duration_minutes
                     FROM flight_sessions fs
                     WHERE fs.battery_start > fs.battery_end
                 )
                 SELECT AVG(battery_consumed),
                        AVG(items_scanned),
                        AVG(duration_minutes),
                        AVG(CASE WHEN items_scanned > 0
                            THEN CAST(battery_consumed AS REAL) / items_scanned END),
                        AVG(CASE WHEN duration_minutes > 0
                            THEN battery_consumed / duration_minutes END)
                 FROM battery_metrics",
                [],
                |row| {
                    Ok(BatteryEfficiencyMetrics {
                        avg_battery_consumption: row.get(0)?,
                        avg_items_scanned: row.get(1)?,
                        avg_flight_duration: row.get(2)?,
                        battery_per_scan: row.get(3)?,
                        battery_per_minute: row.get(4)?,
                    })
                },
            )?;
            Ok(metrics)
        })
        .await
    }

    /// Per-action usage across all flights, busiest first, with each
    /// action's share of total movements.
    pub async fn movement_pattern_stats(&self) -> Result<Vec<MovementPatternStat>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "WITH movement_stats AS (
                     SELECT action,
                            COUNT(*) AS usage_count,
                            COUNT(DISTINCT session_id) AS session_count,
                            AVG(battery_level) AS avg_battery_level,
                            AVG(distance) AS avg_distance
                     FROM movement_logs
                     GROUP BY action
                 )
                 SELECT action, usage_count, session_count, avg_battery_level, avg_distance,
                        CAST(usage_count AS REAL)
                            / (SELECT SUM(usage_count) FROM movement_stats) * 100.0
                 FROM movement_stats
                 ORDER BY usage_count DESC",
            )?;
            let mut rows = stmt.query([])?;
            let mut stats = Vec::new();
            while let Some(row) = rows.next()? {
                stats.push(MovementPatternStat {
                    action: row.get(0)?,
                    usage_count: row.get(1)?,
                    session_count: row.get(2)?,
                    avg_battery_level: row.get(3)?,
                    avg_distance: row.get(4)?,
                    usage_percentage: row.get(5)?,
                });
            }
            Ok(stats)
        })
        .await
    }

    /// Whole-fleet performance averages over all recorded flights.
    pub async fn performance_metrics(&self) -> Result<PerformanceMetrics> {
        self.execute(|conn| {
            let metrics = conn.query_row(
                "WITH performance AS (
                     SELECT fs.session_id,
                            fs.battery_start - fs.battery_end AS battery_used,
                            fs.total_commands,
                            (julianday(fs.end_time) - julianday(fs.start_time)) * 1440.0
                                AS duration_minutes,
                            (SELECT COUNT(DISTINCT ml.label_id) FROM movement_logs ml
                              WHERE ml.session_id = fs.session_id
                                AND ml.label_id IS NOT NULL) AS unique_items_scanned,
                            (SELECT COUNT(DISTINCT ml.action) FROM movement_logs ml
                              WHERE ml.session_id = fs.session_id) AS unique_movements
                     FROM flight_sessions fs
                 )
                 SELECT AVG(battery_used),
                        AVG(total_commands),
                        AVG(duration_minutes),
                        AVG(unique_items_scanned),
                        AVG(unique_movements),
                        AVG(CASE WHEN duration_minutes > 0
                            THEN unique_items_scanned / duration_minutes END),
                        AVG(CASE WHEN battery_used > 0
                            THEN CAST(unique_items_scanned AS REAL) / battery_used END)
                 FROM performance",
                [],
                |row| {
                    Ok(PerformanceMetrics {
                        avg_battery_consumption: row.get(0)?,
                        avg_commands_per_flight: row.get(1)?,
                        avg_flight_duration: row.get(2)?,
                        avg_items_scanned: row.get(3)?,
                        avg_unique_movements: row.get(4)?,
                        items_per_minute: row.get(5)?,
                        items_per_battery_unit: row.get(6)?,
                    })
                },
            )?;
            Ok(metrics)
        })
        .await
    }

    /// Scans and distinct registry locations touched during one flight.
    pub async fn drone_coverage(&self, session_id: &str) -> Result<CoverageStats> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let stats = conn.query_row(
                "SELECT COUNT(*), COUNT(DISTINCT l.location_id)
                 FROM movement_logs ml
                 JOIN labels l ON ml.label_id = l.label_id
                 WHERE ml.session_id = ?1",
                params![session_id],
                |row| {
                    Ok(CoverageStats {
                        total_scans: row.get(0)?,
                        unique_locations: row.get(1)?,
                    })
                },
            )?;
            Ok(stats)
        })
        .await
    }

    /// Items scanned per registry location during one flight.
    pub async fn stock_take_stats(&self, session_id: &str) -> Result<Vec<StockTakeStat>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT l.location_id, COUNT(ml.label_id)
                 FROM movement_logs ml
                 JOIN labels l ON ml.label_id = l.label_id
                 WHERE ml.session_id = ?1
                 GROUP BY l.location_id
                 ORDER BY COUNT(ml.label_id) DESC",
            )?;
            let mut rows = stmt.query(params![session_id])?;
            let mut stats = Vec::new();
            while let Some(row) = rows.next()? {
                stats.push(StockTakeStat {
                    location_id: row.get(0)?,
                    items_scanned: row.get(1)?,
                });
            }
            Ok(stats)
        })
        .await
    }

    /// Relocation actions per registry location during one flight.
    pub async fn relocation_stats(&self, session_id: &str) -> Result<Vec<RelocationStat>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT l.location_id, COUNT(*)
                 FROM movement_logs ml
                 JOIN labels l ON ml.label_id = l.label_id
                 WHERE ml.session_id = ?1 AND ml.action = 'relocate'
                 GROUP BY l.location_id
                 ORDER BY COUNT(*) DESC",
            )?;
            let mut rows = stmt.query(params![session_id])?;
            let mut stats = Vec::new();
            while let Some(row) = rows.next()? {
                stats.push(RelocationStat {
                    location_id: row.get(0)?,
                    relocations: row.get(1)?,
                });
            }
            Ok(stats)
        })
        .await
    }

    /// Most recent label-touching movements of one flight, capped at 50.
    pub async fn movement_history(&self, session_id: &str) -> Result<Vec<MovementHistoryEntry>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT ml.action, l.location_id, ml.timestamp
                 FROM movement_logs ml
                 JOIN labels l ON ml.label_id = l.label_id
                 WHERE ml.session_id = ?1
                 ORDER BY ml.timestamp DESC
                 LIMIT 50",
            )?;
            let mut rows = stmt.query(params![session_id])?;
            let mut history = Vec::new();
            while let Some(row) = rows.next()? {
                let raw_ts: String = row.get(2)?;
                history.push(MovementHistoryEntry {
                    action: row.get(0)?,
                    location_id: row.get(1)?,
                    timestamp: parse_datetime(&raw_ts, "timestamp")?,
                });
            }
            Ok(history)
        })
        .await
    }
}

/// Run the aggregate query for `kind` and ask the summarizer to turn the
/// numbers into prose.
pub async fn analyze<S: Summarizer>(
    db: &Database,
    summarizer: &S,
    kind: AnalysisKind,
) -> Result<AnalysisReport> {
    let metrics = match kind {
        AnalysisKind::BatteryEfficiency => {
            serde_json::to_value(db.battery_efficiency_metrics().await?)
        }
        AnalysisKind::MovementPatterns => serde_json::to_value(db.movement_pattern_stats().await?),
        AnalysisKind::Performance => serde_json::to_value(db.performance_metrics().await?),
    }
    .map_err(|err| Error::Dependency(anyhow!("failed to serialize metrics: {err}")))?;

    let summary = summarizer.summarize(kind, &metrics).await?;

    Ok(AnalysisReport {
        kind,
        metrics,
        summary,
    })
}
