use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::reject;
use crate::domain::{CirculationError, CopyStatus};
use crate::models::copy::{self, Entity as Copy};
use crate::services::inventory_service;

#[derive(Deserialize)]
pub struct CreateCopyRequest {
    pub book_id: i32,
    /// Generated when omitted (accession without pre-printed labels).
    pub barcode: Option<String>,
    pub location: Option<String>,
    pub condition_note: Option<String>,
}

pub async fn create_copy(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<CreateCopyRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let barcode = payload
        .barcode
        .unwrap_or_else(|| format!("BC-{}", Uuid::new_v4().simple()));

    let saved = inventory_service::create_copy(
        &db,
        payload.book_id,
        barcode,
        payload.location,
        payload.condition_note,
        Utc::now(),
    )
    .await
    .map_err(reject)?;

    Ok((StatusCode::CREATED, Json(json!({ "copy": saved }))))
}

pub async fn get_book_copies(
    State(db): State<DatabaseConnection>,
    Path(book_id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let copies = Copy::find()
        .filter(copy::Column::BookId.eq(book_id))
        .order_by_asc(copy::Column::Barcode)
        .all(&db)
        .await
        .map_err(|e| reject(CirculationError::from(e)))?;

    Ok(Json(json!({ "copies": copies })))
}

#[derive(Deserialize)]
pub struct OverrideStatusRequest {
    pub status: String,
}

/// Staff override: LOST, REPAIR, or recovery back to AVAILABLE.
pub async fn override_status(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<OverrideStatusRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let next = CopyStatus::parse(&payload.status).map_err(reject)?;
    if !matches!(
        next,
        CopyStatus::Lost | CopyStatus::Repair | CopyStatus::Available
    ) {
        return Err(reject(CirculationError::Validation(
            "status override must be LOST, REPAIR or AVAILABLE".into(),
        )));
    }

    let copy = inventory_service::find_copy(&db, id).await.map_err(reject)?;
    let updated = inventory_service::transition(&db, copy, next, Utc::now())
        .await
        .map_err(reject)?;

    Ok(Json(json!({ "copy": updated })))
}
