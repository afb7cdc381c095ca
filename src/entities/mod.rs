pub mod address;
pub mod buyer;
pub mod cart;
pub mod friendship;
pub mod image;
pub mod order;
pub mod order_line;
pub mod phone;
pub mod product;
pub mod review;
pub mod seller;
pub mod tag;
pub mod user;
pub mod variant;
pub mod wishlist;

use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::sea_query::{Index, Table};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Schema};
use serde::Serialize;
use std::fmt;

/// Indonesian mobile numbers: `08` followed by 9 to 11 digits.
pub static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^08[0-9]{9,11}$").unwrap());

/// Every table the seeder writes, in dependency order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Buyer,
    Seller,
    Friendship,
    Phone,
    Address,
    Product,
    Variant,
    Tag,
    Image,
    CartItem,
    WishlistItem,
    Order,
    OrderLine,
    Review,
}

impl EntityKind {
    pub const ALL: [EntityKind; 15] = [
        EntityKind::User,
        EntityKind::Buyer,
        EntityKind::Seller,
        EntityKind::Friendship,
        EntityKind::Phone,
        EntityKind::Address,
        EntityKind::Product,
        EntityKind::Variant,
        EntityKind::Tag,
        EntityKind::Image,
        EntityKind::CartItem,
        EntityKind::WishlistItem,
        EntityKind::Order,
        EntityKind::OrderLine,
        EntityKind::Review,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::Buyer => "buyers",
            EntityKind::Seller => "sellers",
            EntityKind::Friendship => "friendships",
            EntityKind::Phone => "phone_numbers",
            EntityKind::Address => "addresses",
            EntityKind::Product => "products",
            EntityKind::Variant => "product_variants",
            EntityKind::Tag => "product_tags",
            EntityKind::Image => "product_images",
            EntityKind::CartItem => "cart_items",
            EntityKind::WishlistItem => "wishlist_items",
            EntityKind::Order => "orders",
            EntityKind::OrderLine => "order_lines",
            EntityKind::Review => "reviews",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

pub async fn setup_schema(db: &DatabaseConnection, reset: bool) -> Result<(), DbErr> {
    if reset {
        drop_table(db, review::Entity).await?;
        drop_table(db, order_line::Entity).await?;
        drop_table(db, order::Entity).await?;
        drop_table(db, wishlist::Entity).await?;
        drop_table(db, cart::Entity).await?;
        drop_table(db, image::Entity).await?;
        drop_table(db, tag::Entity).await?;
        drop_table(db, variant::Entity).await?;
        drop_table(db, product::Entity).await?;
        drop_table(db, address::Entity).await?;
        drop_table(db, phone::Entity).await?;
        drop_table(db, friendship::Entity).await?;
        drop_table(db, seller::Entity).await?;
        drop_table(db, buyer::Entity).await?;
        drop_table(db, user::Entity).await?;
    }

    create_table(db, user::Entity).await?;
    create_table(db, buyer::Entity).await?;
    create_table(db, seller::Entity).await?;
    create_table(db, friendship::Entity).await?;
    create_table(db, phone::Entity).await?;
    create_table(db, address::Entity).await?;
    create_table(db, product::Entity).await?;
    create_table(db, variant::Entity).await?;
    create_table(db, tag::Entity).await?;
    create_table(db, image::Entity).await?;
    create_table(db, cart::Entity).await?;
    create_table(db, wishlist::Entity).await?;
    create_table(db, order::Entity).await?;
    create_table(db, order_line::Entity).await?;
    create_table(db, review::Entity).await?;

    let product_name_per_seller = Index::create()
        .name("idx_products_seller_name")
        .table(product::Entity)
        .col(product::Column::SellerId)
        .col(product::Column::Name)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(db.get_database_backend().build(&product_name_per_seller))
        .await?;

    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(backend.build(&statement)).await?;
    Ok(())
}

async fn drop_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let statement = Table::drop().table(entity).if_exists().to_owned();
    db.execute(db.get_database_backend().build(&statement))
        .await?;
    Ok(())
}
