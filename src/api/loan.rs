use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{json, Value};

use super::reject;
use crate::services::loan_service::{self, LoanFilter};
use crate::services::{inventory_service, policy_service};

#[derive(Deserialize)]
pub struct ListLoansQuery {
    pub borrower_id: Option<i32>,
    #[serde(default)]
    pub open_only: bool,
}

pub async fn list_loans(
    State(db): State<DatabaseConnection>,
    Query(query): Query<ListLoansQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let loans = loan_service::list_loans(
        &db,
        LoanFilter {
            borrower_id: query.borrower_id,
            open_only: query.open_only,
        },
    )
    .await
    .map_err(reject)?;

    Ok(Json(json!({ "loans": loans })))
}

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub borrower_id: i32,
    /// Either a copy id or a scanned barcode identifies the copy.
    pub copy_id: Option<i32>,
    pub barcode: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/loans",
    responses(
        (status = 201, description = "Loan created"),
        (status = 409, description = "Copy unavailable, hold conflict or loan limit reached")
    )
)]
pub async fn checkout(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let now = Utc::now();

    let copy_id = match (payload.copy_id, payload.barcode.as_deref()) {
        (Some(id), _) => id,
        (None, Some(barcode)) => {
            inventory_service::find_by_barcode(&db, barcode)
                .await
                .map_err(reject)?
                .id
        }
        (None, None) => {
            return Err(reject(crate::domain::CirculationError::Validation(
                "copy_id or barcode is required".into(),
            )));
        }
    };

    let policy = policy_service::current_policy(&db).await;
    let loan = loan_service::checkout(
        &db,
        &policy,
        payload.borrower_id,
        copy_id,
        payload.due_at,
        payload.note,
        now,
    )
    .await
    .map_err(reject)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "loan": loan, "message": "Loan created successfully" })),
    ))
}

pub async fn renew_loan(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let policy = policy_service::current_policy(&db).await;
    let loan = loan_service::renew(&db, &policy, id, Utc::now())
        .await
        .map_err(reject)?;

    Ok(Json(
        json!({ "loan": loan, "message": "Loan renewed successfully" }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/loans/{id}/return",
    responses(
        (status = 200, description = "Loan returned; fine and follow-up events included"),
        (status = 409, description = "Loan already returned")
    )
)]
pub async fn return_loan(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let policy = policy_service::current_policy(&db).await;
    let outcome = loan_service::return_copy(&db, &policy, id, Utc::now())
        .await
        .map_err(reject)?;

    Ok(Json(json!({
        "loan": outcome.loan,
        "fine": outcome.fine,
        "events": outcome.events,
        "message": "Loan returned successfully"
    })))
}
