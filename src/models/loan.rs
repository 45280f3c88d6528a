use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "loans")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub borrower_id: i32,
    pub copy_id: i32,
    pub checked_out_at: DateTimeUtc,
    pub due_at: DateTimeUtc,
    /// NULL while the loan is open. A partial unique index on
    /// (copy_id WHERE returned_at IS NULL) guarantees at most one open
    /// loan per copy.
    pub returned_at: Option<DateTimeUtc>,
    pub renew_count: i32,
    pub note: Option<String>,
}

impl Model {
    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::copy::Entity",
        from = "Column::CopyId",
        to = "super::copy::Column::Id"
    )]
    Copy,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::BorrowerId",
        to = "super::user::Column::Id"
    )]
    Borrower,
    #[sea_orm(has_many = "super::fine::Entity")]
    Fine,
}

impl Related<super::copy::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Copy.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Borrower.def()
    }
}

impl Related<super::fine::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Fine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
