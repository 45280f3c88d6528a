use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{json, Value};

use super::reject;
use crate::services::fine_service;

pub async fn list_fines(
    State(db): State<DatabaseConnection>,
    Path(user_id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let fines = fine_service::list_for_user(&db, user_id)
        .await
        .map_err(reject)?;

    let (unpaid, paid): (Vec<_>, Vec<_>) = fines.into_iter().partition(|f| !f.is_paid());
    Ok(Json(json!({ "unpaid": unpaid, "paid": paid })))
}

#[derive(Deserialize)]
pub struct PayFineRequest {
    pub payment_reference: Option<String>,
}

pub async fn pay_fine(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<PayFineRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let fine = fine_service::mark_paid(&db, id, payload.payment_reference, Utc::now())
        .await
        .map_err(reject)?;

    Ok(Json(json!({ "fine": fine, "message": "Fine marked as paid" })))
}
