//! Typed lifecycle states with explicit transition tables.
//!
//! The database stores the wire strings; everything above the entity layer
//! works with these enums so an illegal transition cannot be expressed by
//! accident.

use serde::{Deserialize, Serialize};

use super::CirculationError;

/// Status of a physical copy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CopyStatus {
    Available,
    Reserved,
    OnLoan,
    Lost,
    Repair,
}

impl CopyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyStatus::Available => "AVAILABLE",
            CopyStatus::Reserved => "RESERVED",
            CopyStatus::OnLoan => "ON_LOAN",
            CopyStatus::Lost => "LOST",
            CopyStatus::Repair => "REPAIR",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CirculationError> {
        match s {
            "AVAILABLE" => Ok(CopyStatus::Available),
            "RESERVED" => Ok(CopyStatus::Reserved),
            "ON_LOAN" => Ok(CopyStatus::OnLoan),
            "LOST" => Ok(CopyStatus::Lost),
            "REPAIR" => Ok(CopyStatus::Repair),
            other => Err(CirculationError::Validation(format!(
                "unknown copy status '{}'",
                other
            ))),
        }
    }

    /// Transition table for normal circulation. LOST and REPAIR are staff
    /// overrides reachable from anywhere (and recoverable to AVAILABLE),
    /// so they are accepted unconditionally as targets.
    pub fn can_become(&self, next: CopyStatus) -> bool {
        use CopyStatus::*;
        match (self, next) {
            (_, Lost) | (_, Repair) => true,
            (Available, Reserved) => true,
            (Reserved, Available) => true,
            (Available, OnLoan) | (Reserved, OnLoan) => true,
            (OnLoan, Available) => true,
            // Staff recovery from the override states
            (Lost, Available) | (Repair, Available) => true,
            _ => false,
        }
    }
}

/// Status of a pickup request. Moves forward only, except Cancel from any
/// pre-picked-up state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Preparing,
    Ready,
    PickedUp,
    Canceled,
    Expired,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Preparing => "PREPARING",
            RequestStatus::Ready => "READY",
            RequestStatus::PickedUp => "PICKED_UP",
            RequestStatus::Canceled => "CANCELED",
            RequestStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CirculationError> {
        match s {
            "PENDING" => Ok(RequestStatus::Pending),
            "PREPARING" => Ok(RequestStatus::Preparing),
            "READY" => Ok(RequestStatus::Ready),
            "PICKED_UP" => Ok(RequestStatus::PickedUp),
            "CANCELED" => Ok(RequestStatus::Canceled),
            "EXPIRED" => Ok(RequestStatus::Expired),
            other => Err(CirculationError::Validation(format!(
                "unknown request status '{}'",
                other
            ))),
        }
    }

    pub fn can_become(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        match (self, next) {
            (Pending, Preparing) => true,
            (Preparing, Ready) => true,
            // Desks may confirm a prepared request without the ready step
            (Ready, PickedUp) | (Preparing, PickedUp) => true,
            (Ready, Expired) => true,
            (Pending, Canceled) | (Preparing, Canceled) | (Ready, Canceled) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::PickedUp | RequestStatus::Canceled | RequestStatus::Expired
        )
    }
}
