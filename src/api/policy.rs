use axum::{Json, extract::State, http::StatusCode};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};

use crate::services::policy_service;

/// Effective policy (configured row or compiled defaults).
pub async fn get_policy(
    State(db): State<DatabaseConnection>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let policy = policy_service::current_policy(&db).await;
    Ok(Json(json!({ "policy": policy })))
}
