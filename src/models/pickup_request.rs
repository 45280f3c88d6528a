use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pickup_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub requester_id: i32,
    /// One of the `RequestStatus` wire values: PENDING, PREPARING, READY,
    /// PICKED_UP, CANCELED, EXPIRED.
    pub status: String,
    pub pickup_location: Option<String>,
    /// Date the reserved items must be collected by.
    pub pickup_by: Option<Date>,
    pub requested_at: DateTimeUtc,
    pub prepared_at: Option<DateTimeUtc>,
    pub ready_at: Option<DateTimeUtc>,
    pub picked_up_at: Option<DateTimeUtc>,
    pub canceled_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::RequesterId",
        to = "super::user::Column::Id"
    )]
    Requester,
    #[sea_orm(has_many = "super::pickup_request_item::Entity")]
    Item,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Requester.def()
    }
}

impl Related<super::pickup_request_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
