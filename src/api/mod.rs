pub mod books;
pub mod copy;
pub mod fine;
pub mod health;
pub mod hold;
pub mod loan;
pub mod pickup;
pub mod policy;

use axum::{
    Json,
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};

use crate::domain::CirculationError;

pub fn api_router(db: DatabaseConnection) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Policy
        .route("/policy", get(policy::get_policy))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/:id", get(books::get_book))
        // Copies
        .route("/copies", post(copy::create_copy))
        .route("/books/:id/copies", get(copy::get_book_copies))
        .route("/copies/:id/status", put(copy::override_status))
        // Loans
        .route("/loans", get(loan::list_loans).post(loan::checkout))
        .route("/loans/:id/renew", post(loan::renew_loan))
        .route("/loans/:id/return", post(loan::return_loan))
        // Holds
        .route("/books/:id/holds", post(hold::place_hold))
        .route("/holds/:id/cancel", post(hold::cancel_hold))
        .route("/books/:id/holds/promote", post(hold::promote_next))
        .route("/books/:id/holds/expire", post(hold::expire_ready))
        // Pickup requests
        .route(
            "/requests",
            get(pickup::list_queue).post(pickup::create_request),
        )
        .route("/users/:id/requests", get(pickup::list_for_user))
        .route("/requests/:id/items/:item_id/assign", post(pickup::assign_copy))
        .route(
            "/requests/:id/items/:item_id/unassign",
            post(pickup::unassign_copy),
        )
        .route("/requests/:id/pickup-by", put(pickup::set_pickup_by))
        .route("/requests/:id/ready", post(pickup::mark_ready))
        .route("/requests/:id/confirm", post(pickup::confirm_pickup))
        .route("/requests/:id/cancel", post(pickup::cancel_request))
        // Fines
        .route("/users/:id/fines", get(fine::list_fines))
        .route("/fines/:id/pay", post(fine::pay_fine))
        .with_state(db)
}

/// Map a domain failure to an HTTP rejection. Business-rule violations are
/// 409s the caller can surface as-is; only Database is a server fault.
pub fn reject(e: CirculationError) -> (StatusCode, Json<Value>) {
    let status = match e {
        CirculationError::NotFound => StatusCode::NOT_FOUND,
        CirculationError::Validation(_) => StatusCode::BAD_REQUEST,
        CirculationError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::CONFLICT,
    };
    (status, Json(json!({ "error": e.to_string() })))
}
