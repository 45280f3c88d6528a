//! Pickup request workflow - cart-style aggregate reservations that staff
//! prepare and convert to loans in one atomic step.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};

use crate::domain::{CirculationError, CopyStatus, LoanPolicy, RequestStatus};
use crate::models::{copy, loan, pickup_request, pickup_request_item, user};
use crate::services::{inventory_service, loan_service};

/// One requested title, optionally with a caller-selected copy to reserve
/// up front.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewRequestItem {
    pub book_id: i32,
    pub copy_id: Option<i32>,
}

/// A request with its items, for queue and detail views.
#[derive(Debug, serde::Serialize)]
pub struct RequestWithItems {
    #[serde(flatten)]
    pub request: pickup_request::Model,
    pub items: Vec<pickup_request_item::Model>,
}

async fn find_request<C: ConnectionTrait>(
    db: &C,
    request_id: i32,
) -> Result<pickup_request::Model, CirculationError> {
    pickup_request::Entity::find_by_id(request_id)
        .one(db)
        .await?
        .ok_or(CirculationError::NotFound)
}

async fn request_items<C: ConnectionTrait>(
    db: &C,
    request_id: i32,
) -> Result<Vec<pickup_request_item::Model>, CirculationError> {
    Ok(pickup_request_item::Entity::find()
        .filter(pickup_request_item::Column::RequestId.eq(request_id))
        .order_by_asc(pickup_request_item::Column::Id)
        .all(db)
        .await?)
}

/// Place a pickup request for a set of titles. Copy selections are
/// best-effort at this stage: a selected copy that is gone or no longer
/// available is simply left for staff to assign later.
pub async fn create_request(
    db: &DatabaseConnection,
    policy: &LoanPolicy,
    requester_id: i32,
    pickup_location: Option<String>,
    pickup_by: Option<NaiveDate>,
    items: Vec<NewRequestItem>,
    now: DateTime<Utc>,
) -> Result<RequestWithItems, CirculationError> {
    if items.is_empty() {
        return Err(CirculationError::Validation("request has no items".into()));
    }

    let txn = db.begin().await?;

    user::Entity::find_by_id(requester_id)
        .one(&txn)
        .await?
        .ok_or(CirculationError::NotFound)?;

    let pickup_by =
        pickup_by.unwrap_or_else(|| (now + Duration::days(policy.hold_pickup_days)).date_naive());

    let request = pickup_request::ActiveModel {
        requester_id: Set(requester_id),
        status: Set(RequestStatus::Pending.as_str().to_owned()),
        pickup_location: Set(pickup_location),
        pickup_by: Set(Some(pickup_by)),
        requested_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut saved_items = Vec::with_capacity(items.len());
    for item in items {
        let mut saved = pickup_request_item::ActiveModel {
            request_id: Set(request.id),
            book_id: Set(item.book_id),
            assigned_copy_id: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        if let Some(copy_id) = item.copy_id {
            match try_reserve_selected(&txn, item.book_id, copy_id, now).await? {
                Some(copy) => {
                    let mut active: pickup_request_item::ActiveModel = saved.into();
                    active.assigned_copy_id = Set(Some(copy.id));
                    saved = active.update(&txn).await?;
                }
                None => {
                    tracing::warn!(
                        request_id = request.id,
                        copy_id,
                        "selected copy not reservable, leaving item unassigned"
                    );
                }
            }
        }

        saved_items.push(saved);
    }

    txn.commit().await?;
    Ok(RequestWithItems {
        request,
        items: saved_items,
    })
}

/// Cart-time reservation is opportunistic: wrong title or unavailable copy
/// just means no tentative assignment.
async fn try_reserve_selected<C: ConnectionTrait>(
    db: &C,
    book_id: i32,
    copy_id: i32,
    now: DateTime<Utc>,
) -> Result<Option<copy::Model>, CirculationError> {
    let Some(copy) = copy::Entity::find_by_id(copy_id).one(db).await? else {
        return Ok(None);
    };
    if copy.book_id != book_id || CopyStatus::parse(&copy.status)? != CopyStatus::Available {
        return Ok(None);
    }
    let reserved = inventory_service::transition(db, copy, CopyStatus::Reserved, now).await?;
    Ok(Some(reserved))
}

/// Staff binds a specific copy (scanned by barcode) to an item and
/// reserves it. First assignment moves the request PENDING -> PREPARING.
pub async fn assign_copy(
    db: &DatabaseConnection,
    request_id: i32,
    item_id: i32,
    barcode: &str,
    now: DateTime<Utc>,
) -> Result<pickup_request_item::Model, CirculationError> {
    let txn = db.begin().await?;

    let request = find_request(&txn, request_id).await?;
    let status = RequestStatus::parse(&request.status)?;
    if status.is_terminal() {
        return Err(CirculationError::Validation(format!(
            "request is {}",
            status.as_str()
        )));
    }

    let item = pickup_request_item::Entity::find_by_id(item_id)
        .filter(pickup_request_item::Column::RequestId.eq(request_id))
        .one(&txn)
        .await?
        .ok_or(CirculationError::NotFound)?;

    let copy = inventory_service::find_by_barcode(&txn, barcode).await?;
    if copy.book_id != item.book_id {
        return Err(CirculationError::TitleMismatch);
    }
    let copy_status = CopyStatus::parse(&copy.status)?;
    if copy_status != CopyStatus::Available {
        return Err(CirculationError::CopyUnavailable(
            copy_status.as_str().to_owned(),
        ));
    }

    let reserved = inventory_service::transition(&txn, copy, CopyStatus::Reserved, now).await?;

    let mut item_active: pickup_request_item::ActiveModel = item.into();
    item_active.assigned_copy_id = Set(Some(reserved.id));
    let updated_item = item_active.update(&txn).await?;

    if status == RequestStatus::Pending {
        let mut req_active: pickup_request::ActiveModel = request.into();
        req_active.status = Set(RequestStatus::Preparing.as_str().to_owned());
        req_active.prepared_at = Set(Some(now));
        req_active.update(&txn).await?;
    }

    txn.commit().await?;
    Ok(updated_item)
}

/// Release an item's reserved copy and clear the assignment. Request
/// status is left alone.
pub async fn unassign_copy(
    db: &DatabaseConnection,
    request_id: i32,
    item_id: i32,
    now: DateTime<Utc>,
) -> Result<pickup_request_item::Model, CirculationError> {
    let txn = db.begin().await?;

    find_request(&txn, request_id).await?;
    let item = pickup_request_item::Entity::find_by_id(item_id)
        .filter(pickup_request_item::Column::RequestId.eq(request_id))
        .one(&txn)
        .await?
        .ok_or(CirculationError::NotFound)?;

    if let Some(copy_id) = item.assigned_copy_id {
        let copy = inventory_service::find_copy(&txn, copy_id).await?;
        if CopyStatus::parse(&copy.status)? == CopyStatus::Reserved {
            inventory_service::transition(&txn, copy, CopyStatus::Available, now).await?;
        }
    }

    let mut active: pickup_request_item::ActiveModel = item.into();
    active.assigned_copy_id = Set(None);
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    Ok(updated)
}

/// Set or clear the pickup deadline.
pub async fn set_pickup_by(
    db: &DatabaseConnection,
    request_id: i32,
    pickup_by: Option<NaiveDate>,
) -> Result<pickup_request::Model, CirculationError> {
    let request = find_request(db, request_id).await?;
    let mut active: pickup_request::ActiveModel = request.into();
    active.pickup_by = Set(pickup_by);
    Ok(active.update(db).await?)
}

/// Mark a fully-assigned request ready for collection.
pub async fn mark_ready(
    db: &DatabaseConnection,
    request_id: i32,
    now: DateTime<Utc>,
) -> Result<pickup_request::Model, CirculationError> {
    let txn = db.begin().await?;

    let request = find_request(&txn, request_id).await?;
    let items = request_items(&txn, request_id).await?;

    if items.iter().any(|it| it.assigned_copy_id.is_none()) {
        return Err(CirculationError::IncompleteAssignment);
    }
    if request.pickup_by.is_none() {
        return Err(CirculationError::NoPickupDate);
    }

    let status = RequestStatus::parse(&request.status)?;
    if !status.can_become(RequestStatus::Ready) {
        return Err(CirculationError::NotReady(status.as_str().to_owned()));
    }

    let mut active: pickup_request::ActiveModel = request.into();
    active.status = Set(RequestStatus::Ready.as_str().to_owned());
    active.ready_at = Set(Some(now));
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    Ok(updated)
}

/// Convert every item of a request into a loan, atomically. All
/// preconditions (status, assignments, reservability, loan limit) are
/// checked before the first write, so a failure leaves no loans behind.
pub async fn confirm_pickup(
    db: &DatabaseConnection,
    policy: &LoanPolicy,
    request_id: i32,
    now: DateTime<Utc>,
) -> Result<Vec<loan::Model>, CirculationError> {
    let txn = db.begin().await?;

    let request = find_request(&txn, request_id).await?;
    let status = RequestStatus::parse(&request.status)?;
    if !matches!(status, RequestStatus::Ready | RequestStatus::Preparing) {
        return Err(CirculationError::NotReady(status.as_str().to_owned()));
    }

    let items = request_items(&txn, request_id).await?;
    let mut copy_ids = Vec::with_capacity(items.len());
    for item in &items {
        match item.assigned_copy_id {
            Some(id) => copy_ids.push(id),
            None => return Err(CirculationError::MissingAssignment),
        }
    }

    let requester = user::Entity::find_by_id(request.requester_id)
        .one(&txn)
        .await?
        .ok_or(CirculationError::NotFound)?;

    let limit = policy.loan_limit(&requester);
    let active = loan_service::count_open_loans(&txn, requester.id).await?;
    if active + copy_ids.len() as i64 > limit {
        return Err(CirculationError::LoanLimitExceeded { limit, active });
    }

    // Validate every copy before mutating any of them
    let mut copies = Vec::with_capacity(copy_ids.len());
    for copy_id in copy_ids {
        let copy = inventory_service::find_copy(&txn, copy_id).await?;
        let copy_status = CopyStatus::parse(&copy.status)?;
        if !matches!(copy_status, CopyStatus::Reserved | CopyStatus::Available) {
            return Err(CirculationError::CopyUnavailable(
                copy_status.as_str().to_owned(),
            ));
        }
        copies.push(copy);
    }

    let due_at = policy.due_date(now, &requester);
    let mut loans = Vec::with_capacity(copies.len());
    for copy in copies {
        let copy_id = copy.id;
        let saved = loan::ActiveModel {
            borrower_id: Set(requester.id),
            copy_id: Set(copy_id),
            checked_out_at: Set(now),
            due_at: Set(due_at),
            returned_at: Set(None),
            renew_count: Set(0),
            note: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        inventory_service::transition(&txn, copy, CopyStatus::OnLoan, now).await?;
        loans.push(saved);
    }

    let mut req_active: pickup_request::ActiveModel = request.into();
    req_active.status = Set(RequestStatus::PickedUp.as_str().to_owned());
    req_active.picked_up_at = Set(Some(now));
    req_active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(request_id, loans = loans.len(), "pickup confirmed");
    Ok(loans)
}

/// Cancel a request and release its reserved copies.
pub async fn cancel_request(
    db: &DatabaseConnection,
    request_id: i32,
    now: DateTime<Utc>,
) -> Result<pickup_request::Model, CirculationError> {
    let txn = db.begin().await?;

    let request = find_request(&txn, request_id).await?;
    let status = RequestStatus::parse(&request.status)?;
    if !status.can_become(RequestStatus::Canceled) {
        return Err(CirculationError::Validation(format!(
            "request is {}",
            status.as_str()
        )));
    }

    release_reserved_items(&txn, request_id, now).await?;

    let mut active: pickup_request::ActiveModel = request.into();
    active.status = Set(RequestStatus::Canceled.as_str().to_owned());
    active.canceled_at = Set(Some(now));
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    Ok(updated)
}

async fn release_reserved_items<C: ConnectionTrait>(
    db: &C,
    request_id: i32,
    now: DateTime<Utc>,
) -> Result<(), CirculationError> {
    for item in request_items(db, request_id).await? {
        if let Some(copy_id) = item.assigned_copy_id {
            let copy = inventory_service::find_copy(db, copy_id).await?;
            if CopyStatus::parse(&copy.status)? == CopyStatus::Reserved {
                inventory_service::transition(db, copy, CopyStatus::Available, now).await?;
            }
        }
    }
    Ok(())
}

/// Sweep: expire READY requests whose pickup-by date has passed, releasing
/// their reserved copies. Returns how many were expired.
pub async fn expire_overdue(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
) -> Result<u64, CirculationError> {
    let today = now.date_naive();
    let lapsed = pickup_request::Entity::find()
        .filter(pickup_request::Column::Status.eq(RequestStatus::Ready.as_str()))
        .filter(pickup_request::Column::PickupBy.lt(today))
        .all(db)
        .await?;

    let count = lapsed.len() as u64;
    for request in lapsed {
        let txn = db.begin().await?;
        tracing::info!(request_id = request.id, "pickup request expired");
        release_reserved_items(&txn, request.id, now).await?;
        let mut active: pickup_request::ActiveModel = request.into();
        active.status = Set(RequestStatus::Expired.as_str().to_owned());
        active.update(&txn).await?;
        txn.commit().await?;
    }

    Ok(count)
}

/// Requests a user has placed, newest first.
pub async fn list_for_user(
    db: &DatabaseConnection,
    requester_id: i32,
) -> Result<Vec<RequestWithItems>, CirculationError> {
    let requests = pickup_request::Entity::find()
        .filter(pickup_request::Column::RequesterId.eq(requester_id))
        .order_by_desc(pickup_request::Column::RequestedAt)
        .all(db)
        .await?;
    with_items(db, requests).await
}

/// Staff queue: everything not yet in a terminal state, oldest first.
pub async fn list_queue(db: &DatabaseConnection) -> Result<Vec<RequestWithItems>, CirculationError> {
    let requests = pickup_request::Entity::find()
        .filter(pickup_request::Column::Status.is_in([
            RequestStatus::Pending.as_str(),
            RequestStatus::Preparing.as_str(),
            RequestStatus::Ready.as_str(),
        ]))
        .order_by_asc(pickup_request::Column::Status)
        .order_by_asc(pickup_request::Column::RequestedAt)
        .all(db)
        .await?;
    with_items(db, requests).await
}

async fn with_items(
    db: &DatabaseConnection,
    requests: Vec<pickup_request::Model>,
) -> Result<Vec<RequestWithItems>, CirculationError> {
    let mut result = Vec::with_capacity(requests.len());
    for request in requests {
        let items = request_items(db, request.id).await?;
        result.push(RequestWithItems { request, items });
    }
    Ok(result)
}
