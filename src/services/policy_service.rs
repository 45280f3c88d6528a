//! Policy provider - resolves the singleton policy row into a `LoanPolicy`
//! value, falling back silently to compiled defaults when the row is
//! missing or malformed.

use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, EntityTrait};

use crate::domain::LoanPolicy;
use crate::models::policy;

/// Current effective policy. Never fails: a missing or unreadable
/// configuration row yields the defaults.
pub async fn current_policy<C: ConnectionTrait>(db: &C) -> LoanPolicy {
    match policy::Entity::find().one(db).await {
        Ok(Some(row)) => match from_row(&row) {
            Some(policy) => policy,
            None => {
                tracing::warn!("policy row {} is malformed, using defaults", row.id);
                LoanPolicy::default()
            }
        },
        Ok(None) => LoanPolicy::default(),
        Err(e) => {
            tracing::warn!("failed to read policy row, using defaults: {}", e);
            LoanPolicy::default()
        }
    }
}

fn from_row(row: &policy::Model) -> Option<LoanPolicy> {
    // A zero or negative limit would brick circulation; treat it as
    // malformed configuration.
    if row.member_loan_days <= 0
        || row.lecturer_loan_days <= 0
        || row.member_loan_limit <= 0
        || row.lecturer_loan_limit <= 0
        || row.max_renewals < 0
        || row.fine_rate_minor_per_day < 0
        || row.hold_pickup_days <= 0
    {
        return None;
    }

    Some(LoanPolicy {
        member_loan_days: row.member_loan_days,
        lecturer_loan_days: row.lecturer_loan_days,
        member_loan_limit: row.member_loan_limit,
        lecturer_loan_limit: row.lecturer_loan_limit,
        max_renewals: row.max_renewals,
        fine_rate_per_day: Decimal::new(row.fine_rate_minor_per_day, 2),
        hold_pickup_days: row.hold_pickup_days,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use chrono::Utc;
    use sea_orm::{ActiveModelTrait, Set};

    #[tokio::test]
    async fn missing_row_falls_back_to_defaults() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        let policy = current_policy(&db).await;
        assert_eq!(policy.member_loan_days, 14);
        assert_eq!(policy.lecturer_loan_limit, 10);
        assert_eq!(policy.fine_rate_per_day, Decimal::from(5));
    }

    #[tokio::test]
    async fn configured_row_overrides_defaults() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        policy::ActiveModel {
            member_loan_days: Set(7),
            lecturer_loan_days: Set(21),
            member_loan_limit: Set(3),
            lecturer_loan_limit: Set(8),
            max_renewals: Set(1),
            fine_rate_minor_per_day: Set(250),
            hold_pickup_days: Set(2),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .expect("Failed to insert policy");

        let policy = current_policy(&db).await;
        assert_eq!(policy.member_loan_days, 7);
        assert_eq!(policy.max_renewals, 1);
        assert_eq!(policy.fine_rate_per_day, Decimal::new(250, 2));
    }

    #[tokio::test]
    async fn malformed_row_falls_back_silently() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        policy::ActiveModel {
            member_loan_days: Set(0), // invalid
            lecturer_loan_days: Set(21),
            member_loan_limit: Set(3),
            lecturer_loan_limit: Set(8),
            max_renewals: Set(1),
            fine_rate_minor_per_day: Set(250),
            hold_pickup_days: Set(2),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .expect("Failed to insert policy");

        let policy = current_policy(&db).await;
        assert_eq!(policy.member_loan_days, 14);
    }
}
