use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pickup_request_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub request_id: i32,
    pub book_id: i32,
    /// NULL until staff binds a specific copy; the copy is RESERVED while
    /// assigned.
    pub assigned_copy_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pickup_request::Entity",
        from = "Column::RequestId",
        to = "super::pickup_request::Column::Id"
    )]
    Request,
    #[sea_orm(
        belongs_to = "super::book::Entity",
        from = "Column::BookId",
        to = "super::book::Column::Id"
    )]
    Book,
    #[sea_orm(
        belongs_to = "super::copy::Entity",
        from = "Column::AssignedCopyId",
        to = "super::copy::Column::Id"
    )]
    AssignedCopy,
}

impl Related<super::pickup_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Request.def()
    }
}

impl Related<super::book::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Book.def()
    }
}

impl Related<super::copy::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AssignedCopy.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
