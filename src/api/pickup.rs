use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{NaiveDate, Utc};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{json, Value};

use super::reject;
use crate::services::pickup_service::{self, NewRequestItem};
use crate::services::policy_service;

#[derive(Deserialize)]
pub struct CreateRequestPayload {
    pub requester_id: i32,
    pub pickup_location: Option<String>,
    pub pickup_by: Option<NaiveDate>,
    pub items: Vec<NewRequestItem>,
}

pub async fn create_request(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<CreateRequestPayload>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let policy = policy_service::current_policy(&db).await;
    let request = pickup_service::create_request(
        &db,
        &policy,
        payload.requester_id,
        payload.pickup_location,
        payload.pickup_by,
        payload.items,
        Utc::now(),
    )
    .await
    .map_err(reject)?;

    Ok((StatusCode::CREATED, Json(json!({ "request": request }))))
}

pub async fn list_queue(
    State(db): State<DatabaseConnection>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let requests = pickup_service::list_queue(&db).await.map_err(reject)?;
    Ok(Json(json!({ "requests": requests })))
}

pub async fn list_for_user(
    State(db): State<DatabaseConnection>,
    Path(user_id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let requests = pickup_service::list_for_user(&db, user_id)
        .await
        .map_err(reject)?;
    Ok(Json(json!({ "requests": requests })))
}

#[derive(Deserialize)]
pub struct AssignCopyPayload {
    pub barcode: String,
}

pub async fn assign_copy(
    State(db): State<DatabaseConnection>,
    Path((request_id, item_id)): Path<(i32, i32)>,
    Json(payload): Json<AssignCopyPayload>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let item = pickup_service::assign_copy(&db, request_id, item_id, &payload.barcode, Utc::now())
        .await
        .map_err(reject)?;

    Ok(Json(json!({ "item": item })))
}

pub async fn unassign_copy(
    State(db): State<DatabaseConnection>,
    Path((request_id, item_id)): Path<(i32, i32)>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let item = pickup_service::unassign_copy(&db, request_id, item_id, Utc::now())
        .await
        .map_err(reject)?;

    Ok(Json(json!({ "item": item })))
}

#[derive(Deserialize)]
pub struct PickupByPayload {
    pub pickup_by: Option<NaiveDate>,
}

pub async fn set_pickup_by(
    State(db): State<DatabaseConnection>,
    Path(request_id): Path<i32>,
    Json(payload): Json<PickupByPayload>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let request = pickup_service::set_pickup_by(&db, request_id, payload.pickup_by)
        .await
        .map_err(reject)?;

    Ok(Json(json!({ "request": request })))
}

pub async fn mark_ready(
    State(db): State<DatabaseConnection>,
    Path(request_id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let request = pickup_service::mark_ready(&db, request_id, Utc::now())
        .await
        .map_err(reject)?;

    Ok(Json(json!({ "request": request })))
}

#[utoipa::path(
    post,
    path = "/api/requests/{id}/confirm",
    responses(
        (status = 200, description = "All items converted to loans"),
        (status = 409, description = "Request not ready, items unassigned, or loan limit reached")
    )
)]
pub async fn confirm_pickup(
    State(db): State<DatabaseConnection>,
    Path(request_id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let policy = policy_service::current_policy(&db).await;
    let loans = pickup_service::confirm_pickup(&db, &policy, request_id, Utc::now())
        .await
        .map_err(reject)?;

    Ok(Json(
        json!({ "loans": loans, "message": "Pickup confirmed and loans created" }),
    ))
}

pub async fn cancel_request(
    State(db): State<DatabaseConnection>,
    Path(request_id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let request = pickup_service::cancel_request(&db, request_id, Utc::now())
        .await
        .map_err(reject)?;

    Ok(Json(
        json!({ "request": request, "message": "Request canceled and reservations released" }),
    ))
}
