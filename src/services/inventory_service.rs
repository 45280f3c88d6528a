//! Inventory ledger - sole owner of `copies.status`.
//!
//! Every status write in the crate goes through `transition`, which
//! validates the move against the `CopyStatus` table. Callers that hit an
//! `InventoryConflict` must re-fetch and re-validate rather than retry
//! blindly.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};

use crate::domain::{CirculationError, CopyStatus};
use crate::models::copy;

pub async fn find_copy<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<copy::Model, CirculationError> {
    copy::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(CirculationError::NotFound)
}

pub async fn find_by_barcode<C: ConnectionTrait>(
    db: &C,
    barcode: &str,
) -> Result<copy::Model, CirculationError> {
    copy::Entity::find()
        .filter(copy::Column::Barcode.eq(barcode))
        .one(db)
        .await?
        .ok_or(CirculationError::NotFound)
}

/// Move a copy to `next`, enforcing the transition table.
pub async fn transition<C: ConnectionTrait>(
    db: &C,
    copy: copy::Model,
    next: CopyStatus,
    now: DateTime<Utc>,
) -> Result<copy::Model, CirculationError> {
    let current = CopyStatus::parse(&copy.status)?;
    if !current.can_become(next) {
        return Err(CirculationError::InventoryConflict {
            current: current.as_str().to_owned(),
            requested: next.as_str().to_owned(),
        });
    }

    tracing::info!(
        copy_id = copy.id,
        barcode = %copy.barcode,
        "copy {} -> {}",
        current.as_str(),
        next.as_str()
    );

    let mut active: copy::ActiveModel = copy.into();
    active.status = Set(next.as_str().to_owned());
    active.updated_at = Set(now);
    Ok(active.update(db).await?)
}

/// Staff override: pull a copy from circulation.
pub async fn mark_lost<C: ConnectionTrait>(
    db: &C,
    copy: copy::Model,
    now: DateTime<Utc>,
) -> Result<copy::Model, CirculationError> {
    transition(db, copy, CopyStatus::Lost, now).await
}

/// Staff override: send a copy to repair.
pub async fn mark_repair<C: ConnectionTrait>(
    db: &C,
    copy: copy::Model,
    now: DateTime<Utc>,
) -> Result<copy::Model, CirculationError> {
    transition(db, copy, CopyStatus::Repair, now).await
}

/// Accession a new copy; starts AVAILABLE.
pub async fn create_copy<C: ConnectionTrait>(
    db: &C,
    book_id: i32,
    barcode: String,
    location: Option<String>,
    condition_note: Option<String>,
    now: DateTime<Utc>,
) -> Result<copy::Model, CirculationError> {
    if barcode.trim().is_empty() {
        return Err(CirculationError::Validation("barcode is required".into()));
    }

    let new_copy = copy::ActiveModel {
        book_id: Set(book_id),
        barcode: Set(barcode),
        location: Set(location),
        condition_note: Set(condition_note),
        status: Set(CopyStatus::Available.as_str().to_owned()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    Ok(new_copy.insert(db).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::models::book;
    use sea_orm::DatabaseConnection;

    async fn seed_copy(db: &DatabaseConnection) -> copy::Model {
        let now = Utc::now();
        let book = book::ActiveModel {
            isbn13: Set("9780000000001".to_owned()),
            title: Set("Dune".to_owned()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to insert book");

        create_copy(db, book.id, "BC-0001".to_owned(), None, None, now)
            .await
            .expect("Failed to create copy")
    }

    #[tokio::test]
    async fn legal_transitions_update_the_row() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let copy = seed_copy(&db).await;
        let now = Utc::now();

        let copy = transition(&db, copy, CopyStatus::Reserved, now).await.unwrap();
        assert_eq!(copy.status, "RESERVED");

        let copy = transition(&db, copy, CopyStatus::OnLoan, now).await.unwrap();
        assert_eq!(copy.status, "ON_LOAN");

        let copy = transition(&db, copy, CopyStatus::Available, now).await.unwrap();
        assert_eq!(copy.status, "AVAILABLE");
    }

    #[tokio::test]
    async fn illegal_transition_is_an_inventory_conflict() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let copy = seed_copy(&db).await;
        let now = Utc::now();

        let copy = transition(&db, copy, CopyStatus::OnLoan, now).await.unwrap();
        let err = transition(&db, copy.clone(), CopyStatus::Reserved, now)
            .await
            .unwrap_err();
        assert!(matches!(err, CirculationError::InventoryConflict { .. }));

        // Row untouched after the rejection
        let reloaded = find_copy(&db, copy.id).await.unwrap();
        assert_eq!(reloaded.status, "ON_LOAN");
    }

    #[tokio::test]
    async fn staff_can_pull_and_recover_a_copy() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let copy = seed_copy(&db).await;
        let now = Utc::now();

        let copy = transition(&db, copy, CopyStatus::OnLoan, now).await.unwrap();
        let copy = mark_lost(&db, copy, now).await.unwrap();
        assert_eq!(copy.status, "LOST");

        let copy = transition(&db, copy, CopyStatus::Available, now).await.unwrap();
        assert_eq!(copy.status, "AVAILABLE");

        let copy = mark_repair(&db, copy, now).await.unwrap();
        assert_eq!(copy.status, "REPAIR");
    }
}
