use sea_orm::entity::prelude::*;
use validator::Validate;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Validate)]
#[sea_orm(table_name = "addresses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub buyer_id: i32,
    #[validate(length(min = 1))]
    pub province: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub street: String,
    pub is_primary: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::entities::buyer::Entity",
        from = "Column::BuyerId",
        to = "crate::entities::buyer::Column::UserId",
        on_delete = "Cascade"
    )]
    Buyer,
}

impl Related<crate::entities::buyer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Buyer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
