use anyhow::Context;
use chrono::{DateTime, Utc};

use crate::db::models::{LabelStatus, LabelType, LocationType};
use crate::error::{Error, Result};

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
        .map_err(Error::Dependency)
}

pub fn parse_label_type(value: &str) -> Result<LabelType> {
    match value {
        "Roll" => Ok(LabelType::Roll),
        "FG Pallet" => Ok(LabelType::FgPallet),
        "FG Location" => Ok(LabelType::FgLocation),
        "Paper Roll Location" => Ok(LabelType::PaperRollLocation),
        "Rack Location" => Ok(LabelType::RackLocation),
        other => Err(Error::Validation(format!("unknown label type '{other}'"))),
    }
}

pub fn parse_label_status(value: &str) -> Result<LabelStatus> {
    match value {
        "Available" => Ok(LabelStatus::Available),
        "Checked out" => Ok(LabelStatus::CheckedOut),
        "Lost" => Ok(LabelStatus::Lost),
        "Unresolved" => Ok(LabelStatus::Unresolved),
        other => Err(Error::Validation(format!("unknown label status '{other}'"))),
    }
}

pub fn parse_location_type(value: &str) -> Result<LocationType> {
    match value {
        "FG Pallet Location" => Ok(LocationType::FgPalletLocation),
        "Paper Roll Location" => Ok(LocationType::PaperRollLocation),
        "Rack Location" => Ok(LocationType::RackLocation),
        other => Err(Error::Validation(format!("unknown location type '{other}'"))),
    }
}

/// Comma-joined `LabelType` list, as stored in `locations.allowed_item_types`.
pub fn join_label_types(types: &[LabelType]) -> String {
    types
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn split_label_types(raw: &str) -> Result<Vec<LabelType>> {
    raw.split(',')
        .filter(|part| !part.is_empty())
        .map(parse_label_type)
        .collect()
}
