use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};

use super::reject;
use crate::domain::CirculationError;
use crate::models::book::{self, Entity as Book};

pub async fn list_books(
    State(db): State<DatabaseConnection>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let books = Book::find()
        .order_by_asc(book::Column::Title)
        .all(&db)
        .await
        .map_err(|e| reject(CirculationError::from(e)))?;

    Ok(Json(json!({ "books": books })))
}

#[derive(Deserialize)]
pub struct CreateBookRequest {
    pub isbn13: String,
    pub title: String,
    pub language: Option<String>,
    pub publish_year: Option<i32>,
}

pub async fn create_book(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<CreateBookRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    if payload.isbn13.len() != 13 || !payload.isbn13.chars().all(|c| c.is_ascii_digit()) {
        return Err(reject(CirculationError::Validation(
            "isbn13 must be 13 digits".into(),
        )));
    }

    let now = Utc::now();
    let new_book = book::ActiveModel {
        isbn13: Set(payload.isbn13),
        title: Set(payload.title),
        language: Set(payload.language),
        publish_year: Set(payload.publish_year),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let saved = new_book
        .insert(&db)
        .await
        .map_err(|e| reject(CirculationError::from(e)))?;

    Ok((StatusCode::CREATED, Json(json!({ "book": saved }))))
}

pub async fn get_book(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let book = Book::find_by_id(id)
        .one(&db)
        .await
        .map_err(|e| reject(CirculationError::from(e)))?
        .ok_or_else(|| reject(CirculationError::NotFound))?;

    Ok(Json(json!({ "book": book })))
}
