use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "copies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub book_id: i32,
    pub barcode: String,
    pub location: Option<String>,
    pub condition_note: Option<String>,
    /// Circulation status of this physical copy. Stored as one of the
    /// `CopyStatus` wire values:
    /// - `AVAILABLE`: on shelf, can be loaned
    /// - `RESERVED`: set aside for a pickup request or a promoted hold
    /// - `ON_LOAN`: has an open loan
    /// - `LOST` / `REPAIR`: pulled from circulation by staff
    pub status: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::book::Entity",
        from = "Column::BookId",
        to = "super::book::Column::Id"
    )]
    Book,
    #[sea_orm(has_many = "super::loan::Entity")]
    Loan,
}

impl Related<super::book::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Book.def()
    }
}

impl Related<super::loan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Loan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
