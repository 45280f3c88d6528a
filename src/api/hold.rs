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
use crate::services::{hold_service, policy_service};

#[derive(Deserialize)]
pub struct PlaceHoldRequest {
    pub user_id: i32,
}

pub async fn place_hold(
    State(db): State<DatabaseConnection>,
    Path(book_id): Path<i32>,
    Json(payload): Json<PlaceHoldRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let hold = hold_service::place_hold(&db, book_id, payload.user_id, Utc::now())
        .await
        .map_err(reject)?;

    Ok((StatusCode::CREATED, Json(json!({ "hold": hold }))))
}

pub async fn cancel_hold(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let policy = policy_service::current_policy(&db).await;
    let hold = hold_service::cancel_hold(&db, &policy, id, Utc::now())
        .await
        .map_err(reject)?;

    Ok(Json(json!({ "hold": hold })))
}

/// Staff: mark the first queued hold ready for pickup.
pub async fn promote_next(
    State(db): State<DatabaseConnection>,
    Path(book_id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let policy = policy_service::current_policy(&db).await;
    let promoted = hold_service::promote_next(&db, &policy, book_id, Utc::now())
        .await
        .map_err(reject)?;

    match promoted {
        Some(hold) => Ok(Json(json!({ "hold": hold }))),
        None => Ok(Json(json!({ "hold": null, "message": "No queued holds" }))),
    }
}

/// Staff: expire lapsed ready holds for one title.
pub async fn expire_ready(
    State(db): State<DatabaseConnection>,
    Path(book_id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let policy = policy_service::current_policy(&db).await;
    let expired = hold_service::expire_ready(&db, &policy, Some(book_id), Utc::now())
        .await
        .map_err(reject)?;

    Ok(Json(json!({ "expired": expired })))
}
