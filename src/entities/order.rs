use crate::entities::buyer::Entity as Buyer;
use sea_orm::entity::prelude::*;
use serde::Serialize;
use std::str::FromStr;
use validator::Validate;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Validate)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub buyer_id: i32,
    pub address_id: i32,
    pub status: Status,
    #[validate(length(min = 1))]
    pub payment_method: String,
    #[validate(length(min = 1))]
    pub shipping_method: String,
    pub placed_at: DateTime,
    #[sea_orm(column_type = "Text", nullable)]
    pub note: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Buyer",
        from = "Column::BuyerId",
        to = "crate::entities::buyer::Column::UserId"
    )]
    Buyer,
    #[sea_orm(
        belongs_to = "crate::entities::address::Entity",
        from = "Column::AddressId",
        to = "crate::entities::address::Column::Id"
    )]
    Address,
}
impl ActiveModelBehavior for ActiveModel {}

/// Order life cycle. `Delivered` is the only terminal state that can be reviewed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, DeriveActiveEnum, Serialize)]
#[sea_orm(
    enum_name = "status_enum",
    db_type = "String(StringLen::N(255))",
    rs_type = "String"
)]
pub enum Status {
    #[sea_orm(string_value = "unpaid")]
    Unpaid,
    #[sea_orm(string_value = "preparing")]
    Preparing,
    #[sea_orm(string_value = "shipping")]
    Shipping,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Unpaid,
        Status::Preparing,
        Status::Shipping,
        Status::Delivered,
        Status::Cancelled,
    ];
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(Self::Unpaid),
            "preparing" => Ok(Self::Preparing),
            "shipping" => Ok(Self::Shipping),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::Unpaid => "unpaid",
            Self::Preparing => "preparing",
            Self::Shipping => "shipping",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{value}")
    }
}

impl Related<crate::entities::buyer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Buyer.def()
    }
}

impl Related<crate::entities::address::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Address.def()
    }
}
