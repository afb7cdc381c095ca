mod common;

use async_trait::async_trait;
use baranki_seeder::entities::user::Role;
use baranki_seeder::entities::{order, product, user, EntityKind};
use baranki_seeder::{
    Batch, FakerSource, SeaOrmSink, SeedConfig, SeedError, SeedSink, SeedingPipeline, Stage,
    StageStatus, ValueSource,
};
use rand::RngCore;
use sea_orm::{DbErr, EntityTrait, PaginatorTrait};

/// Delegates to a real sink but rejects every batch of one entity kind.
struct FailingSink {
    inner: SeaOrmSink,
    fail_on: EntityKind,
}

#[async_trait]
impl SeedSink for FailingSink {
    async fn begin(&mut self) -> Result<(), SeedError> {
        self.inner.begin().await
    }

    async fn bulk_insert(&mut self, batch: Batch) -> Result<u64, SeedError> {
        if batch.kind() == self.fail_on {
            return Err(SeedError::Persistence {
                entity: batch.kind(),
                source: DbErr::Custom("disk full".to_string()),
            });
        }
        self.inner.bulk_insert(batch).await
    }

    async fn assign_roles(&mut self, updates: &[(i32, Role)]) -> Result<(), SeedError> {
        self.inner.assign_roles(updates).await
    }

    async fn max_id(&mut self, kind: EntityKind) -> Result<i32, SeedError> {
        self.inner.max_id(kind).await
    }

    async fn count(&mut self, kind: EntityKind) -> Result<u64, SeedError> {
        self.inner.count(kind).await
    }

    async fn commit(&mut self) -> Result<(), SeedError> {
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> Result<(), SeedError> {
        self.inner.rollback().await
    }
}

/// Knows exactly one name, so distinct names run out after the first user.
struct OneNameSource;

impl ValueSource for OneNameSource {
    fn name(&self, _rng: &mut dyn RngCore) -> String {
        "Budi Santoso".to_string()
    }

    fn sentence(&self, rng: &mut dyn RngCore, words: usize) -> String {
        FakerSource.sentence(rng, words)
    }

    fn address_line(&self, rng: &mut dyn RngCore) -> String {
        FakerSource.address_line(rng)
    }

    fn color_name(&self, rng: &mut dyn RngCore) -> String {
        FakerSource.color_name(rng)
    }

    fn word(&self, rng: &mut dyn RngCore) -> String {
        FakerSource.word(rng)
    }
}

#[tokio::test]
async fn test_no_verified_sellers_leaves_catalog_and_dependents_empty() {
    let (_dir, db) = common::fresh_db().await;
    let config = SeedConfig {
        verified_ratio: 0.0,
        ..common::small_config()
    };
    let mut pipeline =
        SeedingPipeline::new(config, SeaOrmSink::new(db.clone()), Box::new(FakerSource));

    let report = pipeline.run().await.expect("Run should not fail without verified sellers");

    for stage in [Stage::Catalog, Stage::Baskets, Stage::Orders] {
        let stage_report = report.stage(stage).expect("Stage missing from report");
        assert!(
            matches!(stage_report.status, StageStatus::Skipped { .. }),
            "{stage} should be skipped"
        );
    }
    assert_eq!(
        report.stage(Stage::Addresses).map(|s| s.status.clone()),
        Some(StageStatus::Committed)
    );
    for kind in [
        EntityKind::Product,
        EntityKind::Variant,
        EntityKind::CartItem,
        EntityKind::WishlistItem,
        EntityKind::Order,
        EntityKind::Review,
    ] {
        assert_eq!(report.stored[&kind], 0, "{kind}");
    }
    assert_eq!(report.stored[&EntityKind::Seller], 6);
}

#[tokio::test]
async fn test_more_sellers_than_users_is_insufficient_population() {
    let (_dir, db) = common::fresh_db().await;
    let config = SeedConfig {
        users: 40,
        sellers: 50,
        ..common::small_config()
    };
    let mut pipeline =
        SeedingPipeline::new(config, SeaOrmSink::new(db.clone()), Box::new(FakerSource));

    let err = pipeline.run().await.expect_err("Run should fail");

    assert_eq!(err.stage, Stage::RoleAssignment);
    assert!(matches!(
        err.source,
        SeedError::InsufficientPopulation {
            requested: 50,
            available: 40,
            ..
        }
    ));
    assert_eq!(err.completed.len(), 1);
    assert_eq!(err.completed[0].stage, Stage::Users);

    // the committed user stage stays, nothing after it was written
    let users = user::Entity::find().count(&db).await.expect("Failed to count users");
    assert_eq!(users, 40);
    let unassigned = user::Entity::find()
        .all(&db)
        .await
        .expect("Failed to load users")
        .into_iter()
        .filter(|u| u.role.is_none())
        .count();
    assert_eq!(unassigned, 40);
}

#[tokio::test]
async fn test_rejected_batch_rolls_back_whole_stage() {
    let (_dir, db) = common::fresh_db().await;
    let sink = FailingSink {
        inner: SeaOrmSink::new(db.clone()),
        fail_on: EntityKind::Variant,
    };
    let mut pipeline = SeedingPipeline::new(common::small_config(), sink, Box::new(FakerSource));

    let err = pipeline.run().await.expect_err("Run should fail");

    assert_eq!(err.stage, Stage::Catalog);
    assert!(matches!(
        err.source,
        SeedError::Persistence {
            entity: EntityKind::Variant,
            ..
        }
    ));
    assert_eq!(err.completed.len(), 5);

    // products went into the same transaction as the rejected variants
    let products = product::Entity::find()
        .count(&db)
        .await
        .expect("Failed to count products");
    assert_eq!(products, 0);
    let orders = order::Entity::find().count(&db).await.expect("Failed to count orders");
    assert_eq!(orders, 0);
    let users = user::Entity::find().count(&db).await.expect("Failed to count users");
    assert_eq!(users, 30);

    // the index only holds what was committed
    assert_eq!(pipeline.index().count(EntityKind::Product), 0);
    assert_eq!(pipeline.index().count(EntityKind::User), 30);
}

#[tokio::test]
async fn test_exhausted_retries_abort_before_writing() {
    let (_dir, db) = common::fresh_db().await;
    let mut pipeline = SeedingPipeline::new(
        common::small_config(),
        SeaOrmSink::new(db.clone()),
        Box::new(OneNameSource),
    );

    let err = pipeline.run().await.expect_err("Run should fail");

    assert_eq!(err.stage, Stage::Users);
    assert!(matches!(err.source, SeedError::ConstraintExhausted { .. }));
    assert!(err.completed.is_empty());
    let users = user::Entity::find().count(&db).await.expect("Failed to count users");
    assert_eq!(users, 0);
}

#[tokio::test]
async fn test_invalid_config_is_rejected_up_front() {
    let (_dir, db) = common::fresh_db().await;
    let config = SeedConfig {
        review_probability: 2.0,
        ..common::small_config()
    };
    let mut pipeline =
        SeedingPipeline::new(config, SeaOrmSink::new(db.clone()), Box::new(FakerSource));

    let err = pipeline.run().await.expect_err("Run should fail");
    assert!(matches!(err.source, SeedError::Config(_)));
    let users = user::Entity::find().count(&db).await.expect("Failed to count users");
    assert_eq!(users, 0);
}
