//! Services Layer
//!
//! Pure circulation logic without the HTTP layer. Every function takes the
//! clock and the resolved `LoanPolicy` explicitly; handlers supply
//! `Utc::now()` and `policy_service::current_policy`.

pub mod fine_service;
pub mod hold_service;
pub mod inventory_service;
pub mod loan_service;
pub mod pickup_service;
pub mod policy_service;
pub mod sweeper;
