use serde::{Deserialize, Serialize};

use super::LabelType;

/// Declared type of a location slot; constrains which label types may be
/// validly stored there.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LocationType {
    FgPalletLocation,
    PaperRollLocation,
    RackLocation,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::FgPalletLocation => "FG Pallet Location",
            LocationType::PaperRollLocation => "Paper Roll Location",
            LocationType::RackLocation => "Rack Location",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub location_id: String,
    pub type_name: LocationType,
    pub allowed_item_types: Vec<LabelType>,
}
