use sea_orm::entity::prelude::*;
use validator::Validate;

/// Product names are unique per seller, enforced by `idx_products_seller_name`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Validate)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    #[validate(length(min = 1))]
    pub name: String,
    #[sea_orm(column_type = "Text")]
    #[validate(length(min = 1))]
    pub description: String,
    #[sea_orm(indexed)]
    pub seller_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::entities::seller::Entity",
        from = "Column::SellerId",
        to = "crate::entities::seller::Column::UserId",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Seller,
}

impl Related<crate::entities::seller::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Seller.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
