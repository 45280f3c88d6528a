//! Business error taxonomy
//!
//! Every variant is an expected, recoverable condition the caller can
//! surface to the user; none is fatal to the process.

use std::fmt;

#[derive(Debug)]
pub enum CirculationError {
    /// Resource not found
    NotFound,
    /// Copy not in the state required for the requested transition
    InventoryConflict { current: String, requested: String },
    /// Checkout against a copy that is not AVAILABLE
    CopyUnavailable(String),
    /// An open loan already references the copy
    DuplicateActiveLoan,
    /// Return requested for a loan that was already closed
    AlreadyReturned,
    /// Renewal cap reached or loan already returned
    RenewalNotAllowed,
    /// Borrower at or over the policy loan cap
    LoanLimitExceeded { limit: i64, active: i64 },
    /// User already has an active hold on the book
    DuplicateHold,
    /// Copy is promised to a hold ahead of this borrower
    HoldConflict,
    /// Assigned copy belongs to a different title than the item requested
    TitleMismatch,
    /// An item lacks an assigned copy
    IncompleteAssignment,
    /// Request cannot be marked ready without a pickup-by date
    NoPickupDate,
    /// Request status does not allow pickup confirmation
    NotReady(String),
    /// Confirmation attempted while an item lacks a copy
    MissingAssignment,
    /// Fine was already settled
    FineAlreadyPaid,
    /// Malformed input
    Validation(String),
    /// Database/persistence error
    Database(String),
}

impl fmt::Display for CirculationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CirculationError::NotFound => write!(f, "Resource not found"),
            CirculationError::InventoryConflict { current, requested } => {
                write!(f, "Copy is {} and cannot become {}", current, requested)
            }
            CirculationError::CopyUnavailable(status) => {
                write!(f, "Copy is currently {}", status)
            }
            CirculationError::DuplicateActiveLoan => {
                write!(f, "Copy already has an open loan")
            }
            CirculationError::AlreadyReturned => write!(f, "Loan is already returned"),
            CirculationError::RenewalNotAllowed => {
                write!(f, "Renewal not allowed (limit reached or returned)")
            }
            CirculationError::LoanLimitExceeded { limit, active } => {
                write!(f, "Borrower reached loan limit ({} of {})", active, limit)
            }
            CirculationError::DuplicateHold => {
                write!(f, "An active hold for this title already exists")
            }
            CirculationError::HoldConflict => {
                write!(f, "Copy is promised to a hold ahead of this borrower")
            }
            CirculationError::TitleMismatch => {
                write!(f, "Copy does not match the requested title")
            }
            CirculationError::IncompleteAssignment => {
                write!(f, "All items must be assigned before marking ready")
            }
            CirculationError::NoPickupDate => {
                write!(f, "Set a pickup date before marking ready")
            }
            CirculationError::NotReady(status) => {
                write!(f, "Request is {} and not ready for pickup", status)
            }
            CirculationError::MissingAssignment => {
                write!(f, "All items need assigned copies before pickup")
            }
            CirculationError::FineAlreadyPaid => write!(f, "Fine is already paid"),
            CirculationError::Validation(msg) => write!(f, "Validation error: {}", msg),
            CirculationError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for CirculationError {}

// Conversion from SeaORM errors (used in the service layer)
impl From<sea_orm::DbErr> for CirculationError {
    fn from(e: sea_orm::DbErr) -> Self {
        CirculationError::Database(e.to_string())
    }
}
