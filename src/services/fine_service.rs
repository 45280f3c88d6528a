//! Fine settlement. Fines are created by the loan engine at return time;
//! this module only lists and settles them.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::domain::CirculationError;
use crate::models::{fine, loan};

/// A user's fines, unpaid first.
pub async fn list_for_user(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Vec<fine::Model>, CirculationError> {
    let loan_ids: Vec<i32> = loan::Entity::find()
        .filter(loan::Column::BorrowerId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|l| l.id)
        .collect();

    if loan_ids.is_empty() {
        return Ok(Vec::new());
    }

    Ok(fine::Entity::find()
        .filter(fine::Column::LoanId.is_in(loan_ids))
        .order_by_asc(fine::Column::PaidAt)
        .order_by_desc(fine::Column::CreatedAt)
        .all(db)
        .await?)
}

/// Settle a fine. Paying twice is rejected, not overwritten.
pub async fn mark_paid<C: ConnectionTrait>(
    db: &C,
    fine_id: i32,
    payment_reference: Option<String>,
    now: DateTime<Utc>,
) -> Result<fine::Model, CirculationError> {
    let fine = fine::Entity::find_by_id(fine_id)
        .one(db)
        .await?
        .ok_or(CirculationError::NotFound)?;

    if fine.paid_at.is_some() {
        return Err(CirculationError::FineAlreadyPaid);
    }

    let mut active: fine::ActiveModel = fine.into();
    active.paid_at = Set(Some(now));
    active.payment_reference = Set(payment_reference);
    Ok(active.update(db).await?)
}
