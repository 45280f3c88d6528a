//! Domain events emitted by the circulation engine.
//!
//! A return can cascade (close loan, assess fine, promote a hold,
//! re-reserve the copy). The engine records the cascade as an ordered
//! event list so callers and tests can observe exactly what happened
//! instead of inferring it from row diffs.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CirculationEvent {
    LoanClosed {
        loan_id: i32,
        copy_id: i32,
    },
    FineAssessed {
        loan_id: i32,
        fine_id: i32,
        days_overdue: i64,
    },
    CopyShelved {
        copy_id: i32,
    },
    HoldReady {
        hold_id: i32,
        book_id: i32,
        user_id: i32,
        expires_at: DateTime<Utc>,
    },
    CopyReservedForHold {
        copy_id: i32,
        hold_id: i32,
    },
}
