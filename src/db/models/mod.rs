pub mod assignment;
pub mod flight;
pub mod label;
pub mod location;

pub use assignment::RackItemAssignment;
pub use flight::{
    FlightListRow, FlightRecord, FlightSession, FlightSummary, MovementActionStat,
    MovementLogEntry, NewMovementLog,
};
pub use label::{Label, LabelDetails, LabelFilter, LabelStatus, LabelType, NewLabel};
pub use location::{Location, LocationType};
