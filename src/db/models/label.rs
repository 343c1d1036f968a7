//! Label data models: the base record plus its type-specific extension.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of physical tag a label is printed on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LabelType {
    Roll,
    FgPallet,
    FgLocation,
    PaperRollLocation,
    RackLocation,
}

impl LabelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelType::Roll => "Roll",
            LabelType::FgPallet => "FG Pallet",
            LabelType::FgLocation => "FG Location",
            LabelType::PaperRollLocation => "Paper Roll Location",
            LabelType::RackLocation => "Rack Location",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LabelStatus {
    Available,
    CheckedOut,
    Lost,
    Unresolved,
}

impl LabelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelStatus::Available => "Available",
            LabelStatus::CheckedOut => "Checked out",
            LabelStatus::Lost => "Lost",
            LabelStatus::Unresolved => "Unresolved",
        }
    }
}

impl Default for LabelStatus {
    fn default() -> Self {
        LabelStatus::Unresolved
    }
}

/// Type-specific extension record, created and deleted together with the
/// base label. Location-tag label types carry no extension.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum LabelDetails {
    Roll {
        code: String,
        name: String,
        size_mm: i64,
    },
    FgPallet {
        work_order_id: Option<String>,
        quantity: i64,
        total_pieces: Option<i64>,
    },
    None,
}

impl LabelDetails {
    /// Whether this extension variant is the one `label_type` requires.
    pub fn matches(&self, label_type: LabelType) -> bool {
        match label_type {
            LabelType::Roll => matches!(self, LabelDetails::Roll { .. }),
            LabelType::FgPallet => matches!(self, LabelDetails::FgPallet { .. }),
            LabelType::FgLocation | LabelType::PaperRollLocation | LabelType::RackLocation => {
                matches!(self, LabelDetails::None)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub label_id: String,
    pub label_type: LabelType,
    pub status: LabelStatus,
    pub location_id: Option<String>,
    pub status_notes: Option<String>,
    pub last_scan_time: DateTime<Utc>,
    pub details: LabelDetails,
}

/// Input for registering a new label.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLabel {
    pub label_id: String,
    pub label_type: LabelType,
    pub status: Option<LabelStatus>,
    pub location_id: Option<String>,
    pub details: LabelDetails,
}

/// Optional filters for listing labels.
#[derive(Debug, Clone, Default)]
pub struct LabelFilter {
    pub label_type: Option<LabelType>,
    pub status: Option<LabelStatus>,
    pub location_id: Option<String>,
}
