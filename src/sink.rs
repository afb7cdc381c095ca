//! Persistence side of the pipeline.
//!
//! A [`SeedSink`] takes whole stage batches inside one transaction. Keys are
//! allocated in memory, so inserting never has to hand generated keys back.

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use tracing::debug;

use crate::entities::user::Role;
use crate::entities::{
    address, buyer, cart, friendship, image, order, order_line, phone, product, review, seller,
    tag, user, variant, wishlist, EntityKind,
};
use crate::error::SeedError;

/// Rows per INSERT statement; keeps SQLite under its bound-parameter limit.
pub const CHUNK_SIZE: usize = 500;

/// Rows of one entity type, ready to be written.
#[derive(Debug, Clone)]
pub enum Batch {
    Users(Vec<user::Model>),
    Buyers(Vec<buyer::Model>),
    Sellers(Vec<seller::Model>),
    Friendships(Vec<friendship::Model>),
    Phones(Vec<phone::Model>),
    Addresses(Vec<address::Model>),
    Products(Vec<product::Model>),
    Variants(Vec<variant::Model>),
    Tags(Vec<tag::Model>),
    Images(Vec<image::Model>),
    CartItems(Vec<cart::Model>),
    WishlistItems(Vec<wishlist::Model>),
    Orders(Vec<order::Model>),
    OrderLines(Vec<order_line::Model>),
    Reviews(Vec<review::Model>),
}

impl Batch {
    pub fn kind(&self) -> EntityKind {
        match self {
            Batch::Users(_) => EntityKind::User,
            Batch::Buyers(_) => EntityKind::Buyer,
            Batch::Sellers(_) => EntityKind::Seller,
            Batch::Friendships(_) => EntityKind::Friendship,
            Batch::Phones(_) => EntityKind::Phone,
            Batch::Addresses(_) => EntityKind::Address,
            Batch::Products(_) => EntityKind::Product,
            Batch::Variants(_) => EntityKind::Variant,
            Batch::Tags(_) => EntityKind::Tag,
            Batch::Images(_) => EntityKind::Image,
            Batch::CartItems(_) => EntityKind::CartItem,
            Batch::WishlistItems(_) => EntityKind::WishlistItem,
            Batch::Orders(_) => EntityKind::Order,
            Batch::OrderLines(_) => EntityKind::OrderLine,
            Batch::Reviews(_) => EntityKind::Review,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Batch::Users(rows) => rows.len(),
            Batch::Buyers(rows) => rows.len(),
            Batch::Sellers(rows) => rows.len(),
            Batch::Friendships(rows) => rows.len(),
            Batch::Phones(rows) => rows.len(),
            Batch::Addresses(rows) => rows.len(),
            Batch::Products(rows) => rows.len(),
            Batch::Variants(rows) => rows.len(),
            Batch::Tags(rows) => rows.len(),
            Batch::Images(rows) => rows.len(),
            Batch::CartItems(rows) => rows.len(),
            Batch::WishlistItems(rows) => rows.len(),
            Batch::Orders(rows) => rows.len(),
            Batch::OrderLines(rows) => rows.len(),
            Batch::Reviews(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Transactional store the pipeline writes into.
#[async_trait]
pub trait SeedSink: Send {
    async fn begin(&mut self) -> Result<(), SeedError>;

    /// Writes every row of `batch`, returning how many were written.
    async fn bulk_insert(&mut self, batch: Batch) -> Result<u64, SeedError>;

    /// Sets the role column of already inserted users.
    async fn assign_roles(&mut self, updates: &[(i32, Role)]) -> Result<(), SeedError>;

    /// Highest integer key stored for `kind`, 0 when empty or not integer keyed.
    async fn max_id(&mut self, kind: EntityKind) -> Result<i32, SeedError>;

    async fn count(&mut self, kind: EntityKind) -> Result<u64, SeedError>;

    async fn commit(&mut self) -> Result<(), SeedError>;

    async fn rollback(&mut self) -> Result<(), SeedError>;
}

pub struct SeaOrmSink {
    db: DatabaseConnection,
    txn: Option<DatabaseTransaction>,
}

impl SeaOrmSink {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, txn: None }
    }
}

#[async_trait]
impl SeedSink for SeaOrmSink {
    async fn begin(&mut self) -> Result<(), SeedError> {
        if self.txn.is_some() {
            return Err(SeedError::Transaction(DbErr::Custom(
                "transaction already open".to_string(),
            )));
        }
        self.txn = Some(self.db.begin().await.map_err(SeedError::Transaction)?);
        Ok(())
    }

    async fn bulk_insert(&mut self, batch: Batch) -> Result<u64, SeedError> {
        let entity = batch.kind();
        let rows = batch.len();
        let written = match &self.txn {
            Some(txn) => write_batch(txn, batch).await,
            None => write_batch(&self.db, batch).await,
        }
        .map_err(|source| SeedError::Persistence { entity, source })?;
        debug!(entity = %entity, rows, written, "batch inserted");
        Ok(written)
    }

    async fn assign_roles(&mut self, updates: &[(i32, Role)]) -> Result<(), SeedError> {
        let result = match &self.txn {
            Some(txn) => update_roles(txn, updates).await,
            None => update_roles(&self.db, updates).await,
        };
        result.map_err(|source| SeedError::Persistence {
            entity: EntityKind::User,
            source,
        })
    }

    async fn max_id(&mut self, kind: EntityKind) -> Result<i32, SeedError> {
        let result = match &self.txn {
            Some(txn) => highest_id(txn, kind).await,
            None => highest_id(&self.db, kind).await,
        };
        result.map_err(|source| SeedError::Persistence {
            entity: kind,
            source,
        })
    }

    async fn count(&mut self, kind: EntityKind) -> Result<u64, SeedError> {
        let result = match &self.txn {
            Some(txn) => count_rows(txn, kind).await,
            None => count_rows(&self.db, kind).await,
        };
        result.map_err(|source| SeedError::Persistence {
            entity: kind,
            source,
        })
    }

    async fn commit(&mut self) -> Result<(), SeedError> {
        match self.txn.take() {
            Some(txn) => txn.commit().await.map_err(SeedError::Transaction),
            None => Ok(()),
        }
    }

    async fn rollback(&mut self) -> Result<(), SeedError> {
        match self.txn.take() {
            Some(txn) => txn.rollback().await.map_err(SeedError::Transaction),
            None => Ok(()),
        }
    }
}

async fn write_batch<C: ConnectionTrait>(conn: &C, batch: Batch) -> Result<u64, DbErr> {
    match batch {
        Batch::Users(rows) => insert_chunked::<user::ActiveModel, _>(conn, rows).await,
        Batch::Buyers(rows) => insert_chunked::<buyer::ActiveModel, _>(conn, rows).await,
        Batch::Sellers(rows) => insert_chunked::<seller::ActiveModel, _>(conn, rows).await,
        Batch::Friendships(rows) => {
            insert_chunked::<friendship::ActiveModel, _>(conn, rows).await
        }
        Batch::Phones(rows) => insert_chunked::<phone::ActiveModel, _>(conn, rows).await,
        Batch::Addresses(rows) => insert_chunked::<address::ActiveModel, _>(conn, rows).await,
        Batch::Products(rows) => insert_chunked::<product::ActiveModel, _>(conn, rows).await,
        Batch::Variants(rows) => insert_chunked::<variant::ActiveModel, _>(conn, rows).await,
        Batch::Tags(rows) => insert_chunked::<tag::ActiveModel, _>(conn, rows).await,
        Batch::Images(rows) => insert_chunked::<image::ActiveModel, _>(conn, rows).await,
        Batch::CartItems(rows) => insert_chunked::<cart::ActiveModel, _>(conn, rows).await,
        Batch::WishlistItems(rows) => {
            insert_chunked::<wishlist::ActiveModel, _>(conn, rows).await
        }
        Batch::Orders(rows) => insert_chunked::<order::ActiveModel, _>(conn, rows).await,
        Batch::OrderLines(rows) => {
            insert_chunked::<order_line::ActiveModel, _>(conn, rows).await
        }
        Batch::Reviews(rows) => insert_chunked::<review::ActiveModel, _>(conn, rows).await,
    }
}

async fn insert_chunked<A, C>(
    conn: &C,
    rows: Vec<<A::Entity as EntityTrait>::Model>,
) -> Result<u64, DbErr>
where
    A: ActiveModelTrait + Send,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A> + Send,
    C: ConnectionTrait,
{
    let mut written = 0;
    let mut rows = rows.into_iter().map(IntoActiveModel::into_active_model);
    loop {
        let chunk: Vec<A> = rows.by_ref().take(CHUNK_SIZE).collect();
        if chunk.is_empty() {
            break;
        }
        written += A::Entity::insert_many(chunk)
            .exec_without_returning(conn)
            .await?;
    }
    Ok(written)
}

async fn update_roles<C: ConnectionTrait>(conn: &C, updates: &[(i32, Role)]) -> Result<(), DbErr> {
    for role in [Role::Buyer, Role::Seller] {
        let ids: Vec<i32> = updates
            .iter()
            .filter(|(_, r)| *r == role)
            .map(|(id, _)| *id)
            .collect();
        for chunk in ids.chunks(CHUNK_SIZE) {
            user::Entity::update_many()
                .col_expr(user::Column::Role, Expr::value(role.to_value()))
                .filter(user::Column::Id.is_in(chunk.to_vec()))
                .exec(conn)
                .await?;
        }
    }
    Ok(())
}

async fn highest_id<C: ConnectionTrait>(conn: &C, kind: EntityKind) -> Result<i32, DbErr> {
    let id = match kind {
        EntityKind::User => user::Entity::find()
            .order_by_desc(user::Column::Id)
            .one(conn)
            .await?
            .map(|row| row.id),
        EntityKind::Address => address::Entity::find()
            .order_by_desc(address::Column::Id)
            .one(conn)
            .await?
            .map(|row| row.id),
        EntityKind::Product => product::Entity::find()
            .order_by_desc(product::Column::Id)
            .one(conn)
            .await?
            .map(|row| row.id),
        EntityKind::Order => order::Entity::find()
            .order_by_desc(order::Column::Id)
            .one(conn)
            .await?
            .map(|row| row.id),
        _ => None,
    };
    Ok(id.unwrap_or(0))
}

async fn count_rows<C: ConnectionTrait>(conn: &C, kind: EntityKind) -> Result<u64, DbErr> {
    match kind {
        EntityKind::User => user::Entity::find().count(conn).await,
        EntityKind::Buyer => buyer::Entity::find().count(conn).await,
        EntityKind::Seller => seller::Entity::find().count(conn).await,
        EntityKind::Friendship => friendship::Entity::find().count(conn).await,
        EntityKind::Phone => phone::Entity::find().count(conn).await,
        EntityKind::Address => address::Entity::find().count(conn).await,
        EntityKind::Product => product::Entity::find().count(conn).await,
        EntityKind::Variant => variant::Entity::find().count(conn).await,
        EntityKind::Tag => tag::Entity::find().count(conn).await,
        EntityKind::Image => image::Entity::find().count(conn).await,
        EntityKind::CartItem => cart::Entity::find().count(conn).await,
        EntityKind::WishlistItem => wishlist::Entity::find().count(conn).await,
        EntityKind::Order => order::Entity::find().count(conn).await,
        EntityKind::OrderLine => order_line::Entity::find().count(conn).await,
        EntityKind::Review => review::Entity::find().count(conn).await,
    }
}
