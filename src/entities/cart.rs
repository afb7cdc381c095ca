use sea_orm::entity::prelude::*;
use validator::Validate;

use crate::entities::buyer::Entity as Buyer;
use crate::entities::variant::Entity as Variant;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Validate)]
#[sea_orm(table_name = "cart_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub buyer_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub sku: String,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Buyer",
        from = "crate::entities::cart::Column::BuyerId",
        to = "crate::entities::buyer::Column::UserId",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Buyer,
    #[sea_orm(
        belongs_to = "Variant",
        from = "crate::entities::cart::Column::Sku",
        to = "crate::entities::variant::Column::Sku"
    )]
    Variant,
}

impl ActiveModelBehavior for ActiveModel {}

impl Related<crate::entities::buyer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Buyer.def()
    }
}

impl Related<crate::entities::variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Variant.def()
    }
}
