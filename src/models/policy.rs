use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Singleton configuration row. The engine never reads this directly; the
/// policy service resolves it into a `LoanPolicy` value, falling back to
/// defaults when the row is missing.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "policy")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub member_loan_days: i64,
    pub lecturer_loan_days: i64,
    pub member_loan_limit: i64,
    pub lecturer_loan_limit: i64,
    pub max_renewals: i32,
    pub fine_rate_minor_per_day: i64,
    pub hold_pickup_days: i64,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
