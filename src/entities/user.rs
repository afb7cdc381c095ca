use sea_orm::entity::prelude::*;
use std::str::FromStr;
use validator::Validate;

use crate::entities::PHONE_REGEX;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Validate)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    #[sea_orm(unique)]
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password_hash: String,
    #[validate(length(min = 1))]
    pub full_name: String,
    pub birth_date: Date,
    #[validate(regex(path = *PHONE_REGEX))]
    pub phone: String,
    #[validate(length(min = 1))]
    pub profile_photo: String,
    /// Unset until the role assignment stage partitions the users.
    pub role: Option<Role>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, DeriveActiveEnum)]
#[sea_orm(
    enum_name = "role_enum",
    db_type = "String(StringLen::N(255))",
    rs_type = "String"
)]
pub enum Role {
    #[sea_orm(string_value = "Buyer")]
    Buyer,
    #[sea_orm(string_value = "Seller")]
    Seller,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Buyer" => Ok(Role::Buyer),
            "Seller" => Ok(Role::Seller),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Buyer => write!(f, "Buyer"),
            Role::Seller => write!(f, "Seller"),
        }
    }
}
