//! Item/location compatibility rules.

use crate::db::models::{LabelType, LocationType};

/// Whether an item of this label type belongs on this kind of location.
/// Location-marker label types are never storable items.
pub fn is_compatible(label_type: LabelType, location_type: LocationType) -> bool {
    match (label_type, location_type) {
        (LabelType::Roll, LocationType::PaperRollLocation) => true,
        (LabelType::FgPallet, LocationType::FgPalletLocation) => true,
        (LabelType::Roll, _) | (LabelType::FgPallet, _) => false,
        (LabelType::FgLocation | LabelType::PaperRollLocation | LabelType::RackLocation, _) => {
            false
        }
    }
}

/// The storable item types a location of this kind accepts.
pub fn allowed_label_types(location_type: LocationType) -> Vec<LabelType> {
    [LabelType::Roll, LabelType::FgPallet]
        .into_iter()
        .filter(|t| is_compatible(*t, location_type))
        .collect()
}
