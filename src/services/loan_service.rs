//! Loan engine - checkout, renewal, return and overdue fines.
//!
//! Multi-row operations run inside one transaction; preconditions are
//! evaluated on rows read inside that transaction, so the storage layer
//! serializes two desks racing on the same copy.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::HashMap;

use crate::domain::{CirculationError, CirculationEvent, CopyStatus, LoanPolicy};
use crate::models::fine::{self, to_minor_units};
use crate::models::{book, copy, loan, user};
use crate::services::{hold_service, inventory_service};

/// Enriched loan for the desk UI
#[derive(Debug, Clone, serde::Serialize)]
pub struct LoanWithDetails {
    pub id: i32,
    pub copy_id: i32,
    pub barcode: String,
    pub borrower_id: i32,
    pub borrower_name: String,
    pub book_title: String,
    pub checked_out_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub renew_count: i32,
    pub note: Option<String>,
}

/// Filter parameters for listing loans
#[derive(Debug, Default, Clone)]
pub struct LoanFilter {
    pub borrower_id: Option<i32>,
    pub open_only: bool,
}

/// Everything a return produced, in the order it happened.
#[derive(Debug)]
pub struct ReturnOutcome {
    pub loan: loan::Model,
    pub fine: Option<fine::Model>,
    pub events: Vec<CirculationEvent>,
}

pub async fn count_open_loans<C: ConnectionTrait>(
    db: &C,
    borrower_id: i32,
) -> Result<i64, CirculationError> {
    let count = loan::Entity::find()
        .filter(loan::Column::BorrowerId.eq(borrower_id))
        .filter(loan::Column::ReturnedAt.is_null())
        .count(db)
        .await?;
    Ok(count as i64)
}

/// Check a copy out to a borrower. The in-flight loan counts toward the
/// policy limit: a borrower at `limit - 1` open loans may take exactly one
/// more.
pub async fn checkout(
    db: &DatabaseConnection,
    policy: &LoanPolicy,
    borrower_id: i32,
    copy_id: i32,
    due_at: Option<DateTime<Utc>>,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<loan::Model, CirculationError> {
    let txn = db.begin().await?;
    let loan = checkout_in(&txn, policy, borrower_id, copy_id, due_at, note, now).await?;
    txn.commit().await?;
    Ok(loan)
}

async fn checkout_in<C: ConnectionTrait>(
    db: &C,
    policy: &LoanPolicy,
    borrower_id: i32,
    copy_id: i32,
    due_at: Option<DateTime<Utc>>,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<loan::Model, CirculationError> {
    let borrower = user::Entity::find_by_id(borrower_id)
        .one(db)
        .await?
        .ok_or(CirculationError::NotFound)?;
    let copy = inventory_service::find_copy(db, copy_id).await?;

    let status = CopyStatus::parse(&copy.status)?;
    match status {
        CopyStatus::Available => {}
        // A reserved copy may only go to the holder it was set aside for.
        CopyStatus::Reserved => match hold_service::holder_of_reserved_copy(db, copy.id).await? {
            Some(hold) if hold.user_id == borrower_id => {}
            Some(_) => return Err(CirculationError::HoldConflict),
            None => {
                // Reserved by the pickup-request workflow, not a hold
                return Err(CirculationError::CopyUnavailable(status.as_str().to_owned()));
            }
        },
        _ => return Err(CirculationError::CopyUnavailable(status.as_str().to_owned())),
    }

    // At most one open loan per copy (also enforced by the partial unique index)
    let open_loan = loan::Entity::find()
        .filter(loan::Column::CopyId.eq(copy_id))
        .filter(loan::Column::ReturnedAt.is_null())
        .one(db)
        .await?;
    if open_loan.is_some() {
        return Err(CirculationError::DuplicateActiveLoan);
    }

    hold_service::ensure_no_hold_conflict(db, copy.book_id, borrower_id, now).await?;

    let limit = policy.loan_limit(&borrower);
    let active = count_open_loans(db, borrower_id).await?;
    if active + 1 > limit {
        return Err(CirculationError::LoanLimitExceeded { limit, active });
    }

    let due_at = due_at.unwrap_or_else(|| policy.due_date(now, &borrower));
    let new_loan = loan::ActiveModel {
        borrower_id: Set(borrower_id),
        copy_id: Set(copy_id),
        checked_out_at: Set(now),
        due_at: Set(due_at),
        returned_at: Set(None),
        renew_count: Set(0),
        note: Set(note),
        ..Default::default()
    };
    let saved = new_loan.insert(db).await?;

    let book_id = copy.book_id;
    inventory_service::transition(db, copy, CopyStatus::OnLoan, now).await?;

    // A ready or first-in-line holder checking out fulfills their hold.
    hold_service::fulfill_for_checkout(db, book_id, borrower_id, now).await?;

    tracing::info!(
        loan_id = saved.id,
        borrower_id,
        copy_id,
        "checked out, due {}",
        due_at
    );

    Ok(saved)
}

/// Renew an open loan. New due date extends from the later of the current
/// due date and now.
pub async fn renew(
    db: &DatabaseConnection,
    policy: &LoanPolicy,
    loan_id: i32,
    now: DateTime<Utc>,
) -> Result<loan::Model, CirculationError> {
    let txn = db.begin().await?;

    let loan = loan::Entity::find_by_id(loan_id)
        .one(&txn)
        .await?
        .ok_or(CirculationError::NotFound)?;

    if !loan.is_open() || loan.renew_count >= policy.max_renewals {
        return Err(CirculationError::RenewalNotAllowed);
    }

    let borrower = user::Entity::find_by_id(loan.borrower_id)
        .one(&txn)
        .await?
        .ok_or(CirculationError::NotFound)?;

    let new_due = policy.renewal_due_date(now, loan.due_at, &borrower);
    let renew_count = loan.renew_count + 1;

    let mut active: loan::ActiveModel = loan.into();
    active.due_at = Set(new_due);
    active.renew_count = Set(renew_count);
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    Ok(updated)
}

/// Return a loaned copy: close the loan, assess the overdue fine, and let
/// the hold queue claim the copy. The outcome's event list records the
/// cascade in order.
pub async fn return_copy(
    db: &DatabaseConnection,
    policy: &LoanPolicy,
    loan_id: i32,
    now: DateTime<Utc>,
) -> Result<ReturnOutcome, CirculationError> {
    let txn = db.begin().await?;
    let outcome = return_copy_in(&txn, policy, loan_id, now).await?;
    txn.commit().await?;
    Ok(outcome)
}

async fn return_copy_in<C: ConnectionTrait>(
    db: &C,
    policy: &LoanPolicy,
    loan_id: i32,
    now: DateTime<Utc>,
) -> Result<ReturnOutcome, CirculationError> {
    let loan = loan::Entity::find_by_id(loan_id)
        .one(db)
        .await?
        .ok_or(CirculationError::NotFound)?;

    if !loan.is_open() {
        return Err(CirculationError::AlreadyReturned);
    }

    let mut events = Vec::new();

    let mut active: loan::ActiveModel = loan.clone().into();
    active.returned_at = Set(Some(now));
    let closed = active.update(db).await?;
    events.push(CirculationEvent::LoanClosed {
        loan_id: closed.id,
        copy_id: closed.copy_id,
    });

    let copy = inventory_service::find_copy(db, loan.copy_id).await?;
    let copy_id = copy.id;
    let shelved = inventory_service::transition(db, copy, CopyStatus::Available, now).await?;
    events.push(CirculationEvent::CopyShelved { copy_id });

    let fine = match policy.overdue_fine(loan.due_at, now) {
        Some((days_over, amount)) => {
            let fine = fine::ActiveModel {
                loan_id: Set(closed.id),
                amount_minor: Set(to_minor_units(amount)),
                reason: Set(format!("Overdue {} day(s)", days_over)),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            events.push(CirculationEvent::FineAssessed {
                loan_id: closed.id,
                fine_id: fine.id,
                days_overdue: days_over,
            });
            Some(fine)
        }
        None => None,
    };

    // The copy may go straight back off the shelf for the next hold.
    let (_copy, hold_events) =
        hold_service::claim_returned_copy(db, policy, shelved, now).await?;
    events.extend(hold_events);

    Ok(ReturnOutcome {
        loan: closed,
        fine,
        events,
    })
}

/// List loans with borrower and title details.
pub async fn list_loans(
    db: &DatabaseConnection,
    filter: LoanFilter,
) -> Result<Vec<LoanWithDetails>, CirculationError> {
    let mut query = loan::Entity::find().order_by_desc(loan::Column::CheckedOutAt);
    if let Some(borrower_id) = filter.borrower_id {
        query = query.filter(loan::Column::BorrowerId.eq(borrower_id));
    }
    if filter.open_only {
        query = query.filter(loan::Column::ReturnedAt.is_null());
    }

    let loans_with_borrowers = query.find_also_related(user::Entity).all(db).await?;

    // Collect copy IDs to fetch barcodes and titles
    let copy_ids: Vec<i32> = loans_with_borrowers.iter().map(|(l, _)| l.copy_id).collect();

    let mut copy_map: HashMap<i32, (String, String)> = HashMap::new();
    if !copy_ids.is_empty() {
        let copies_with_books = copy::Entity::find()
            .filter(copy::Column::Id.is_in(copy_ids))
            .find_also_related(book::Entity)
            .all(db)
            .await?;
        for (copy, book) in copies_with_books {
            let title = book.map(|b| b.title).unwrap_or_else(|| "Unknown".to_string());
            copy_map.insert(copy.id, (copy.barcode, title));
        }
    }

    let result = loans_with_borrowers
        .into_iter()
        .map(|(loan, borrower)| {
            let (barcode, book_title) = copy_map
                .get(&loan.copy_id)
                .cloned()
                .unwrap_or_else(|| ("Unknown".to_string(), "Unknown".to_string()));
            LoanWithDetails {
                id: loan.id,
                copy_id: loan.copy_id,
                barcode,
                borrower_id: loan.borrower_id,
                borrower_name: borrower
                    .map(|u| u.username)
                    .unwrap_or_else(|| "Unknown".to_string()),
                book_title,
                checked_out_at: loan.checked_out_at,
                due_at: loan.due_at,
                returned_at: loan.returned_at,
                renew_count: loan.renew_count,
                note: loan.note,
            }
        })
        .collect();

    Ok(result)
}
