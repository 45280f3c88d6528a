use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Scale factor between the stored integer amount and currency units.
/// Amounts are persisted as minor units (satang) because SQLite has no
/// decimal column type; all arithmetic happens on `Decimal`.
pub const MINOR_UNITS_PER_UNIT: i64 = 100;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "fines")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub loan_id: i32,
    pub amount_minor: i64,
    pub reason: String,
    pub created_at: DateTimeUtc,
    pub paid_at: Option<DateTimeUtc>,
    pub payment_reference: Option<String>,
}

impl Model {
    pub fn amount(&self) -> Decimal {
        Decimal::new(self.amount_minor, 2)
    }

    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some()
    }
}

/// Convert a decimal currency amount into stored minor units.
pub fn to_minor_units(amount: Decimal) -> i64 {
    (amount * Decimal::from(MINOR_UNITS_PER_UNIT))
        .round()
        .to_i64()
        .unwrap_or(i64::MAX)
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::loan::Entity",
        from = "Column::LoanId",
        to = "super::loan::Column::Id"
    )]
    Loan,
}

impl Related<super::loan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Loan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
