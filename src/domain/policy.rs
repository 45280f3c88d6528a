//! Loan policy value object.
//!
//! Resolved once per request by the policy service and passed explicitly
//! into every engine call; the engine never reads configuration behind the
//! caller's back.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::user;

/// Policy tier a borrower falls into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BorrowerTier {
    Member,
    Lecturer,
}

impl BorrowerTier {
    /// Staff always get the lecturer tier; otherwise the profile role
    /// decides, with anything unrecognized treated as a plain member.
    pub fn for_user(user: &user::Model) -> Self {
        if user.is_staff || user.role.eq_ignore_ascii_case("lecturer") {
            BorrowerTier::Lecturer
        } else {
            BorrowerTier::Member
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct LoanPolicy {
    pub member_loan_days: i64,
    pub lecturer_loan_days: i64,
    pub member_loan_limit: i64,
    pub lecturer_loan_limit: i64,
    pub max_renewals: i32,
    pub fine_rate_per_day: Decimal,
    pub hold_pickup_days: i64,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            member_loan_days: 14,
            lecturer_loan_days: 28,
            member_loan_limit: 5,
            lecturer_loan_limit: 10,
            max_renewals: 2,
            fine_rate_per_day: Decimal::from(5),
            hold_pickup_days: 3,
        }
    }
}

impl LoanPolicy {
    pub fn loan_period_days(&self, user: &user::Model) -> i64 {
        match BorrowerTier::for_user(user) {
            BorrowerTier::Member => self.member_loan_days,
            BorrowerTier::Lecturer => self.lecturer_loan_days,
        }
    }

    pub fn loan_limit(&self, user: &user::Model) -> i64 {
        match BorrowerTier::for_user(user) {
            BorrowerTier::Member => self.member_loan_limit,
            BorrowerTier::Lecturer => self.lecturer_loan_limit,
        }
    }

    pub fn due_date(&self, now: DateTime<Utc>, user: &user::Model) -> DateTime<Utc> {
        now + Duration::days(self.loan_period_days(user))
    }

    /// Renewal extends from the later of the current due date and now.
    pub fn renewal_due_date(
        &self,
        now: DateTime<Utc>,
        current_due: DateTime<Utc>,
        user: &user::Model,
    ) -> DateTime<Utc> {
        current_due.max(now) + Duration::days(self.loan_period_days(user))
    }

    pub fn hold_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.hold_pickup_days)
    }

    /// Fine for a late return: whole days between the return and due
    /// *dates* (time of day dropped), floored at zero.
    pub fn overdue_fine(
        &self,
        due_at: DateTime<Utc>,
        returned_at: DateTime<Utc>,
    ) -> Option<(i64, Decimal)> {
        let days_over = (returned_at.date_naive() - due_at.date_naive()).num_days();
        if days_over > 0 {
            Some((days_over, Decimal::from(days_over) * self.fine_rate_per_day))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user(role: &str, is_staff: bool) -> user::Model {
        user::Model {
            id: 1,
            username: "t".into(),
            email: None,
            role: role.into(),
            is_staff,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn staff_and_lecturers_get_the_long_tier() {
        let p = LoanPolicy::default();
        assert_eq!(p.loan_period_days(&user("member", true)), 28);
        assert_eq!(p.loan_period_days(&user("lecturer", false)), 28);
        assert_eq!(p.loan_limit(&user("student", true)), 10);
    }

    #[test]
    fn unknown_roles_fall_back_to_member_tier() {
        let p = LoanPolicy::default();
        assert_eq!(p.loan_period_days(&user("visitor", false)), 14);
        assert_eq!(p.loan_limit(&user("", false)), 5);
    }

    #[test]
    fn renewal_extends_from_the_later_of_due_and_now() {
        let p = LoanPolicy::default();
        let u = user("member", false);
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();

        // Not yet due: extend from the due date
        let due = Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap();
        assert_eq!(
            p.renewal_due_date(now, due, &u),
            due + Duration::days(14)
        );

        // Overdue: extend from now
        let past_due = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            p.renewal_due_date(now, past_due, &u),
            now + Duration::days(14)
        );
    }

    #[test]
    fn fine_is_zero_on_the_due_date_and_one_rate_per_day_after() {
        let p = LoanPolicy::default();
        let due = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();

        // Same calendar date, later time of day: no fine
        let same_day = Utc.with_ymd_and_hms(2025, 3, 10, 23, 0, 0).unwrap();
        assert!(p.overdue_fine(due, same_day).is_none());

        // One calendar day late: exactly one day's rate
        let next_day = Utc.with_ymd_and_hms(2025, 3, 11, 0, 30, 0).unwrap();
        let (days, amount) = p.overdue_fine(due, next_day).unwrap();
        assert_eq!(days, 1);
        assert_eq!(amount, Decimal::from(5));

        // Early return: no fine
        let early = Utc.with_ymd_and_hms(2025, 3, 8, 9, 0, 0).unwrap();
        assert!(p.overdue_fine(due, early).is_none());
    }
}
