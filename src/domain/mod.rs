//! Domain layer - circulation rules without framework dependencies
//!
//! Status transition tables, the policy value object, domain events and
//! the business error taxonomy live here. No SeaORM queries, no Axum.

pub mod errors;
pub mod events;
pub mod policy;
pub mod status;

pub use errors::CirculationError;
pub use events::CirculationEvent;
pub use policy::{BorrowerTier, LoanPolicy};
pub use status::{CopyStatus, RequestStatus};
