use sea_orm::entity::prelude::*;
use validator::Validate;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Validate)]
#[sea_orm(table_name = "order_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub order_id: i32,
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
        belongs_to = "crate::entities::variant::Entity",
        from = "Column::Sku",
        to = "crate::entities::variant::Column::Sku"
    )]
    Variant,
    #[sea_orm(
        belongs_to = "crate::entities::order::Entity",
        from = "Column::OrderId",
        to = "crate::entities::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
}

impl Related<crate::entities::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<crate::entities::variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Variant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
