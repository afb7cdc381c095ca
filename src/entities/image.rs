use sea_orm::entity::prelude::*;
use std::str::FromStr;
use validator::Validate;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Validate)]
#[sea_orm(table_name = "product_images")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    #[validate(length(min = 1))]
    pub file_name: String,
    pub extension: FileExtension,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::entities::product::Entity",
        from = "Column::ProductId",
        to = "crate::entities::product::Column::Id",
        on_delete = "Cascade"
    )]
    Product,
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Copy, PartialEq, Debug, EnumIter, DeriveActiveEnum)]
#[sea_orm(
    enum_name = "extension_enum",
    db_type = "String(StringLen::N(255))",
    rs_type = "String"
)]
pub enum FileExtension {
    #[sea_orm(string_value = "jpg")]
    JPG,
    #[sea_orm(string_value = "png")]
    PNG,
}

impl FromStr for FileExtension {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jpg" => Ok(FileExtension::JPG),
            "png" => Ok(FileExtension::PNG),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for FileExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileExtension::JPG => write!(f, "jpg"),
            FileExtension::PNG => write!(f, "png"),
        }
    }
}
