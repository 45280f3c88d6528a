//! Hold queue - per-book FIFO reservations for a title (not a copy).

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::domain::{CirculationError, CirculationEvent, CopyStatus, LoanPolicy};
use crate::models::{book, copy, hold};
use crate::services::inventory_service;

/// Place a hold for a user on a title. Queue position is max+1 among
/// non-canceled holds, starting at 1.
pub async fn place_hold<C: ConnectionTrait>(
    db: &C,
    book_id: i32,
    user_id: i32,
    now: DateTime<Utc>,
) -> Result<hold::Model, CirculationError> {
    book::Entity::find_by_id(book_id)
        .one(db)
        .await?
        .ok_or(CirculationError::NotFound)?;

    let existing = hold::Entity::find()
        .filter(hold::Column::BookId.eq(book_id))
        .filter(hold::Column::UserId.eq(user_id))
        .filter(hold::Column::CanceledAt.is_null())
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(CirculationError::DuplicateHold);
    }

    let last = hold::Entity::find()
        .filter(hold::Column::BookId.eq(book_id))
        .filter(hold::Column::CanceledAt.is_null())
        .order_by_desc(hold::Column::QueuePosition)
        .one(db)
        .await?;
    let next_pos = last.map(|h| h.queue_position + 1).unwrap_or(1);

    let new_hold = hold::ActiveModel {
        book_id: Set(book_id),
        user_id: Set(user_id),
        queue_position: Set(next_pos),
        is_ready: Set(false),
        created_at: Set(now),
        ..Default::default()
    };

    Ok(new_hold.insert(db).await?)
}

/// Promote the first queued hold to ready with a pickup deadline. No-op
/// (returns None) when nothing is queued.
pub async fn promote_next<C: ConnectionTrait>(
    db: &C,
    policy: &LoanPolicy,
    book_id: i32,
    now: DateTime<Utc>,
) -> Result<Option<hold::Model>, CirculationError> {
    let next = hold::Entity::find()
        .filter(hold::Column::BookId.eq(book_id))
        .filter(hold::Column::CanceledAt.is_null())
        .filter(hold::Column::IsReady.eq(false))
        .order_by_asc(hold::Column::QueuePosition)
        .order_by_asc(hold::Column::CreatedAt)
        .one(db)
        .await?;

    let Some(next) = next else {
        return Ok(None);
    };

    let expires_at = policy.hold_expiry(now);
    let mut active: hold::ActiveModel = next.into();
    active.is_ready = Set(true);
    active.expires_at = Set(Some(expires_at));
    let promoted = active.update(db).await?;

    tracing::info!(
        hold_id = promoted.id,
        book_id,
        user_id = promoted.user_id,
        "hold ready, expires {}",
        expires_at
    );

    Ok(Some(promoted))
}

/// Cancel a hold. Safe to call on an already-canceled hold (no-op). A
/// copy set aside for the hold goes back on shelf, or straight to the
/// next person in line.
pub async fn cancel_hold<C: ConnectionTrait>(
    db: &C,
    policy: &LoanPolicy,
    hold_id: i32,
    now: DateTime<Utc>,
) -> Result<hold::Model, CirculationError> {
    let hold = hold::Entity::find_by_id(hold_id)
        .one(db)
        .await?
        .ok_or(CirculationError::NotFound)?;

    if hold.canceled_at.is_some() {
        return Ok(hold);
    }

    let reserved_copy_id = hold.reserved_copy_id;
    let mut active: hold::ActiveModel = hold.into();
    active.canceled_at = Set(Some(now));
    let canceled = active.update(db).await?;

    if let Some(copy_id) = reserved_copy_id {
        release_reserved_copy(db, policy, copy_id, now).await?;
    }

    Ok(canceled)
}

/// Sweep: cancel ready holds whose pickup deadline has lapsed, releasing
/// any copy set aside for them. When `book_id` is None the whole table is
/// swept. Returns how many were expired.
pub async fn expire_ready<C: ConnectionTrait>(
    db: &C,
    policy: &LoanPolicy,
    book_id: Option<i32>,
    now: DateTime<Utc>,
) -> Result<u64, CirculationError> {
    let mut query = hold::Entity::find()
        .filter(hold::Column::IsReady.eq(true))
        .filter(hold::Column::CanceledAt.is_null())
        .filter(hold::Column::ExpiresAt.lt(now));
    if let Some(book_id) = book_id {
        query = query.filter(hold::Column::BookId.eq(book_id));
    }

    let lapsed = query.all(db).await?;
    let count = lapsed.len() as u64;

    for hold in lapsed {
        tracing::info!(hold_id = hold.id, book_id = hold.book_id, "ready hold expired");
        let reserved_copy_id = hold.reserved_copy_id;
        let mut active: hold::ActiveModel = hold.into();
        active.canceled_at = Set(Some(now));
        active.update(db).await?;

        if let Some(copy_id) = reserved_copy_id {
            release_reserved_copy(db, policy, copy_id, now).await?;
        }
    }

    Ok(count)
}

/// Put a no-longer-claimed reserved copy back on shelf, then let the next
/// hold in line claim it immediately. No-op unless the copy is still
/// RESERVED (the holder may have checked it out already).
async fn release_reserved_copy<C: ConnectionTrait>(
    db: &C,
    policy: &LoanPolicy,
    copy_id: i32,
    now: DateTime<Utc>,
) -> Result<(), CirculationError> {
    let Some(copy) = copy::Entity::find_by_id(copy_id).one(db).await? else {
        return Ok(());
    };
    if CopyStatus::parse(&copy.status)? != CopyStatus::Reserved {
        return Ok(());
    }

    let shelved = inventory_service::transition(db, copy, CopyStatus::Available, now).await?;
    claim_returned_copy(db, policy, shelved, now).await?;
    Ok(())
}

/// The active hold a RESERVED copy is set aside for, if any. None for a
/// copy reserved by the pickup-request workflow.
pub async fn holder_of_reserved_copy<C: ConnectionTrait>(
    db: &C,
    copy_id: i32,
) -> Result<Option<hold::Model>, CirculationError> {
    Ok(hold::Entity::find()
        .filter(hold::Column::ReservedCopyId.eq(copy_id))
        .filter(hold::Column::CanceledAt.is_null())
        .one(db)
        .await?)
}

/// Queue-fairness guard for direct checkout: the borrower must either
/// hold the ready reservation for the title or be first in line; any
/// other active hold state blocks the checkout.
pub async fn ensure_no_hold_conflict<C: ConnectionTrait>(
    db: &C,
    book_id: i32,
    borrower_id: i32,
    now: DateTime<Utc>,
) -> Result<(), CirculationError> {
    let active: Vec<hold::Model> = hold::Entity::find()
        .filter(hold::Column::BookId.eq(book_id))
        .filter(hold::Column::CanceledAt.is_null())
        .order_by_asc(hold::Column::QueuePosition)
        .order_by_asc(hold::Column::CreatedAt)
        .all(db)
        .await?;

    // A ready hold that has lapsed but not yet been swept does not block.
    if let Some(ready) = active
        .iter()
        .find(|h| h.is_ready && h.expires_at.map(|e| e > now).unwrap_or(true))
    {
        if ready.user_id != borrower_id {
            return Err(CirculationError::HoldConflict);
        }
        return Ok(());
    }

    if let Some(first) = active.first() {
        if first.user_id != borrower_id {
            return Err(CirculationError::HoldConflict);
        }
    }

    Ok(())
}

/// Fulfill the borrower's active hold on the title after a successful
/// checkout, if one exists.
pub async fn fulfill_for_checkout<C: ConnectionTrait>(
    db: &C,
    book_id: i32,
    borrower_id: i32,
    now: DateTime<Utc>,
) -> Result<Option<hold::Model>, CirculationError> {
    let hold = hold::Entity::find()
        .filter(hold::Column::BookId.eq(book_id))
        .filter(hold::Column::UserId.eq(borrower_id))
        .filter(hold::Column::CanceledAt.is_null())
        .one(db)
        .await?;

    match hold {
        Some(hold) => {
            let mut active: hold::ActiveModel = hold.into();
            active.canceled_at = Set(Some(now));
            Ok(Some(active.update(db).await?))
        }
        None => Ok(None),
    }
}

/// A copy of the title just came back on shelf: promote the next hold and
/// reserve the copy for it. Returns the (possibly re-reserved) copy and
/// the events describing what happened.
pub async fn claim_returned_copy<C: ConnectionTrait>(
    db: &C,
    policy: &LoanPolicy,
    returned: copy::Model,
    now: DateTime<Utc>,
) -> Result<(copy::Model, Vec<CirculationEvent>), CirculationError> {
    let mut events = Vec::new();

    let Some(promoted) = promote_next(db, policy, returned.book_id, now).await? else {
        return Ok((returned, events));
    };

    events.push(CirculationEvent::HoldReady {
        hold_id: promoted.id,
        book_id: promoted.book_id,
        user_id: promoted.user_id,
        expires_at: promoted.expires_at.unwrap_or_else(|| policy.hold_expiry(now)),
    });

    let copy_id = returned.id;
    let reserved = inventory_service::transition(db, returned, CopyStatus::Reserved, now).await?;

    // Remember which copy the hold owns so cancel/expiry can release it.
    let hold_id = promoted.id;
    let mut active: hold::ActiveModel = promoted.into();
    active.reserved_copy_id = Set(Some(reserved.id));
    active.update(db).await?;

    events.push(CirculationEvent::CopyReservedForHold { copy_id, hold_id });

    Ok((reserved, events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::models::user;
    use chrono::Duration;
    use sea_orm::DatabaseConnection;

    async fn seed_book(db: &DatabaseConnection, isbn: &str) -> book::Model {
        let now = Utc::now();
        book::ActiveModel {
            isbn13: Set(isbn.to_owned()),
            title: Set("Foundation".to_owned()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to insert book")
    }

    async fn seed_user(db: &DatabaseConnection, name: &str) -> user::Model {
        let now = Utc::now();
        user::ActiveModel {
            username: Set(name.to_owned()),
            role: Set("member".to_owned()),
            is_staff: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to insert user")
    }

    #[tokio::test]
    async fn queue_positions_increase_and_duplicates_are_rejected() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let book = seed_book(&db, "9780000000010").await;
        let alice = seed_user(&db, "alice").await;
        let carol = seed_user(&db, "carol").await;
        let now = Utc::now();

        let h1 = place_hold(&db, book.id, alice.id, now).await.unwrap();
        let h2 = place_hold(&db, book.id, carol.id, now).await.unwrap();
        assert_eq!(h1.queue_position, 1);
        assert_eq!(h2.queue_position, 2);

        let err = place_hold(&db, book.id, alice.id, now).await.unwrap_err();
        assert!(matches!(err, CirculationError::DuplicateHold));

        // Canceling frees the user for a new hold at the tail
        cancel_hold(&db, &LoanPolicy::default(), h1.id, now).await.unwrap();
        let h3 = place_hold(&db, book.id, alice.id, now).await.unwrap();
        assert_eq!(h3.queue_position, 3);
    }

    #[tokio::test]
    async fn promote_next_picks_the_head_and_sets_expiry() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let book = seed_book(&db, "9780000000011").await;
        let alice = seed_user(&db, "alice").await;
        let carol = seed_user(&db, "carol").await;
        let policy = LoanPolicy::default();
        let now = Utc::now();

        place_hold(&db, book.id, alice.id, now).await.unwrap();
        place_hold(&db, book.id, carol.id, now).await.unwrap();

        let promoted = promote_next(&db, &policy, book.id, now).await.unwrap().unwrap();
        assert_eq!(promoted.user_id, alice.id);
        assert!(promoted.is_ready);
        assert_eq!(promoted.expires_at.unwrap(), now + Duration::days(3));

        // Next promotion takes the second in line
        let promoted = promote_next(&db, &policy, book.id, now).await.unwrap().unwrap();
        assert_eq!(promoted.user_id, carol.id);

        // Queue drained
        assert!(promote_next(&db, &policy, book.id, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let book = seed_book(&db, "9780000000012").await;
        let alice = seed_user(&db, "alice").await;
        let now = Utc::now();

        let policy = LoanPolicy::default();
        let hold = place_hold(&db, book.id, alice.id, now).await.unwrap();
        let first = cancel_hold(&db, &policy, hold.id, now).await.unwrap();
        let later = now + Duration::hours(1);
        let second = cancel_hold(&db, &policy, hold.id, later).await.unwrap();
        assert_eq!(first.canceled_at, second.canceled_at);
    }

    #[tokio::test]
    async fn sweep_expires_only_lapsed_ready_holds() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let book = seed_book(&db, "9780000000013").await;
        let alice = seed_user(&db, "alice").await;
        let carol = seed_user(&db, "carol").await;
        let policy = LoanPolicy::default();
        let now = Utc::now();

        place_hold(&db, book.id, alice.id, now).await.unwrap();
        place_hold(&db, book.id, carol.id, now).await.unwrap();
        promote_next(&db, &policy, book.id, now).await.unwrap();

        // Not lapsed yet
        assert_eq!(expire_ready(&db, &policy, Some(book.id), now).await.unwrap(), 0);

        let after_window = now + Duration::days(policy.hold_pickup_days) + Duration::hours(1);
        assert_eq!(
            expire_ready(&db, &policy, Some(book.id), after_window).await.unwrap(),
            1
        );

        // Carol's queued (non-ready) hold survives the sweep
        let remaining = hold::Entity::find()
            .filter(hold::Column::BookId.eq(book.id))
            .filter(hold::Column::CanceledAt.is_null())
            .all(&db)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user_id, carol.id);
    }

    #[tokio::test]
    async fn expired_ready_hold_passes_its_copy_to_the_next_in_line() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let book = seed_book(&db, "9780000000015").await;
        let alice = seed_user(&db, "alice").await;
        let carol = seed_user(&db, "carol").await;
        let policy = LoanPolicy::default();
        let now = Utc::now();

        let copy = inventory_service::create_copy(&db, book.id, "BC-0015".to_owned(), None, None, now)
            .await
            .unwrap();
        let h_alice = place_hold(&db, book.id, alice.id, now).await.unwrap();
        let h_carol = place_hold(&db, book.id, carol.id, now).await.unwrap();

        // A return reserves the copy for Alice
        claim_returned_copy(&db, &policy, copy.clone(), now).await.unwrap();
        let reserved = hold::Entity::find_by_id(h_alice.id).one(&db).await.unwrap().unwrap();
        assert_eq!(reserved.reserved_copy_id, Some(copy.id));

        // Alice never shows up: her hold lapses and the copy moves on to
        // Carol instead of stranding in RESERVED
        let after_window = now + Duration::days(policy.hold_pickup_days) + Duration::hours(1);
        assert_eq!(
            expire_ready(&db, &policy, Some(book.id), after_window).await.unwrap(),
            1
        );
        let lapsed = hold::Entity::find_by_id(h_alice.id).one(&db).await.unwrap().unwrap();
        assert!(lapsed.canceled_at.is_some());

        let next = hold::Entity::find_by_id(h_carol.id).one(&db).await.unwrap().unwrap();
        assert!(next.is_ready);
        assert_eq!(next.reserved_copy_id, Some(copy.id));
        assert_eq!(
            inventory_service::find_copy(&db, copy.id).await.unwrap().status,
            "RESERVED"
        );

        // Carol lapses too and nobody is queued: back on shelf
        let after_second = after_window + Duration::days(policy.hold_pickup_days) + Duration::hours(1);
        assert_eq!(
            expire_ready(&db, &policy, Some(book.id), after_second).await.unwrap(),
            1
        );
        assert_eq!(
            inventory_service::find_copy(&db, copy.id).await.unwrap().status,
            "AVAILABLE"
        );
    }

    #[tokio::test]
    async fn canceling_a_ready_hold_frees_its_reserved_copy() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let book = seed_book(&db, "9780000000016").await;
        let alice = seed_user(&db, "alice").await;
        let policy = LoanPolicy::default();
        let now = Utc::now();

        let copy = inventory_service::create_copy(&db, book.id, "BC-0016".to_owned(), None, None, now)
            .await
            .unwrap();
        let hold = place_hold(&db, book.id, alice.id, now).await.unwrap();
        claim_returned_copy(&db, &policy, copy.clone(), now).await.unwrap();
        assert_eq!(
            inventory_service::find_copy(&db, copy.id).await.unwrap().status,
            "RESERVED"
        );

        let canceled = cancel_hold(&db, &policy, hold.id, now).await.unwrap();
        assert!(canceled.canceled_at.is_some());
        assert_eq!(
            inventory_service::find_copy(&db, copy.id).await.unwrap().status,
            "AVAILABLE"
        );
    }

    #[tokio::test]
    async fn hold_conflict_blocks_third_parties_but_not_the_holder() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let book = seed_book(&db, "9780000000014").await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;
        let policy = LoanPolicy::default();
        let now = Utc::now();

        place_hold(&db, book.id, alice.id, now).await.unwrap();

        // Alice is first in line; Bob is not
        assert!(ensure_no_hold_conflict(&db, book.id, alice.id, now).await.is_ok());
        let err = ensure_no_hold_conflict(&db, book.id, bob.id, now).await.unwrap_err();
        assert!(matches!(err, CirculationError::HoldConflict));

        // Same once the hold is ready
        promote_next(&db, &policy, book.id, now).await.unwrap();
        assert!(ensure_no_hold_conflict(&db, book.id, alice.id, now).await.is_ok());
        assert!(ensure_no_hold_conflict(&db, book.id, bob.id, now).await.is_err());
    }
}
