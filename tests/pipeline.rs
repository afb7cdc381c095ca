mod common;

use std::collections::{HashMap, HashSet};

use baranki_seeder::entities::order::Status;
use baranki_seeder::entities::user::Role;
use baranki_seeder::entities::{
    address, buyer, cart, friendship, order, order_line, phone, product, review, seller, user,
    variant, wishlist, EntityKind, PHONE_REGEX,
};
use baranki_seeder::{FakerSource, SeaOrmSink, SeedingPipeline, Stage, StageStatus};
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder};

async fn seeded() -> (tempfile::TempDir, DatabaseConnection, baranki_seeder::RunReport) {
    let (dir, db) = common::fresh_db().await;
    let mut pipeline = SeedingPipeline::new(
        common::small_config(),
        SeaOrmSink::new(db.clone()),
        Box::new(FakerSource),
    );
    let report = pipeline.run().await.expect("Seeding run failed");
    (dir, db, report)
}

#[tokio::test]
async fn test_every_stage_commits() {
    let (_dir, _db, report) = seeded().await;

    let stages: Vec<Stage> = report.stages.iter().map(|s| s.stage).collect();
    assert_eq!(stages, Stage::ORDER.to_vec());
    for stage in &report.stages {
        assert_eq!(stage.status, StageStatus::Committed, "{}", stage.stage);
    }
    assert_eq!(report.seed, 42);

    let users = report.stage(Stage::Users).expect("Users stage missing");
    assert_eq!(users.rows_of(EntityKind::User), 30);
    assert_eq!(report.stored[&EntityKind::User], 30);
    assert_eq!(report.stored[&EntityKind::Order], 60);
}

#[tokio::test]
async fn test_roles_partition_users_exactly() {
    let (_dir, db, _report) = seeded().await;

    let users = user::Entity::find().all(&db).await.expect("Failed to load users");
    let sellers = seller::Entity::find().all(&db).await.expect("Failed to load sellers");
    let buyers = buyer::Entity::find().all(&db).await.expect("Failed to load buyers");

    assert_eq!(sellers.len(), 6);
    assert_eq!(buyers.len(), 24);

    let seller_ids: HashSet<i32> = sellers.iter().map(|s| s.user_id).collect();
    for u in &users {
        let expected = if seller_ids.contains(&u.id) {
            Role::Seller
        } else {
            Role::Buyer
        };
        assert_eq!(u.role, Some(expected), "user {}", u.id);
        assert!(PHONE_REGEX.is_match(&u.phone));
        assert!(u.email.ends_with("@bustbuy.id"));
    }
    let emails: HashSet<&str> = users.iter().map(|u| u.email.as_str()).collect();
    assert_eq!(emails.len(), users.len());

    for s in &sellers {
        assert_ne!(s.id_card_photo, s.selfie_photo);
    }
}

#[tokio::test]
async fn test_friendships_are_undirected_without_self_pairs() {
    let (_dir, db, _report) = seeded().await;

    let pairs = friendship::Entity::find()
        .all(&db)
        .await
        .expect("Failed to load friendships");
    assert!(!pairs.is_empty());

    let set: HashSet<(i32, i32)> = pairs.iter().map(|p| (p.user_id, p.friend_id)).collect();
    for p in &pairs {
        assert_ne!(p.user_id, p.friend_id);
        assert!(!set.contains(&(p.friend_id, p.user_id)));
    }
}

#[tokio::test]
async fn test_each_buyer_has_one_primary_address() {
    let (_dir, db, _report) = seeded().await;

    let addresses = address::Entity::find()
        .all(&db)
        .await
        .expect("Failed to load addresses");
    let mut primaries: HashMap<i32, usize> = HashMap::new();
    for a in &addresses {
        assert!(!a.province.is_empty() && !a.city.is_empty() && !a.street.is_empty());
        let entry = primaries.entry(a.buyer_id).or_default();
        if a.is_primary {
            *entry += 1;
        }
    }
    assert_eq!(primaries.len(), 24);
    for (buyer_id, count) in primaries {
        assert_eq!(count, 1, "buyer {buyer_id}");
    }

    let phones = phone::Entity::find().all(&db).await.expect("Failed to load phones");
    assert!(phones.iter().all(|p| PHONE_REGEX.is_match(&p.number)));
}

#[tokio::test]
async fn test_orders_ship_to_primary_address() {
    let (_dir, db, _report) = seeded().await;

    let addresses: HashMap<i32, address::Model> = address::Entity::find()
        .all(&db)
        .await
        .expect("Failed to load addresses")
        .into_iter()
        .map(|a| (a.id, a))
        .collect();
    let orders = order::Entity::find()
        .order_by_asc(order::Column::Id)
        .all(&db)
        .await
        .expect("Failed to load orders");

    assert_eq!(orders.len(), 60);
    for o in &orders {
        let address = &addresses[&o.address_id];
        assert_eq!(address.buyer_id, o.buyer_id);
        assert!(address.is_primary);
    }

    let lines = order_line::Entity::find()
        .all(&db)
        .await
        .expect("Failed to load order lines");
    for o in &orders {
        let count = lines.iter().filter(|l| l.order_id == o.id).count();
        assert!((1..=3).contains(&count), "order {} has {count} lines", o.id);
    }
}

#[tokio::test]
async fn test_reviews_only_for_delivered_orders() {
    let (_dir, db, _report) = seeded().await;

    let status: HashMap<i32, Status> = order::Entity::find()
        .all(&db)
        .await
        .expect("Failed to load orders")
        .into_iter()
        .map(|o| (o.id, o.status))
        .collect();
    let reviews = review::Entity::find().all(&db).await.expect("Failed to load reviews");

    for r in &reviews {
        assert_eq!(status[&r.order_id], Status::Delivered);
        assert!((1..=5).contains(&r.rating));
    }
}

#[tokio::test]
async fn test_catalog_belongs_to_verified_sellers() {
    let (_dir, db, _report) = seeded().await;

    let verified: HashSet<i32> = seller::Entity::find()
        .all(&db)
        .await
        .expect("Failed to load sellers")
        .into_iter()
        .filter(|s| s.is_verified)
        .map(|s| s.user_id)
        .collect();
    let products = product::Entity::find().all(&db).await.expect("Failed to load products");
    assert_eq!(products.len(), 40);

    let mut names = HashSet::new();
    for p in &products {
        assert!(verified.contains(&p.seller_id));
        assert!(names.insert((p.seller_id, p.name.clone())));
    }

    let variants = variant::Entity::find().all(&db).await.expect("Failed to load variants");
    let skus: HashSet<&str> = variants.iter().map(|v| v.sku.as_str()).collect();
    assert_eq!(skus.len(), variants.len());
    assert!(variants.iter().all(|v| v.price > 0 && v.stock >= 0));
}

#[tokio::test]
async fn test_baskets_meet_minimums_and_stay_disjoint() {
    let (_dir, db, _report) = seeded().await;

    let stock: HashMap<String, i32> = variant::Entity::find()
        .all(&db)
        .await
        .expect("Failed to load variants")
        .into_iter()
        .map(|v| (v.sku, v.stock))
        .collect();
    let cart = cart::Entity::find().all(&db).await.expect("Failed to load cart");
    let wishlist = wishlist::Entity::find()
        .all(&db)
        .await
        .expect("Failed to load wishlist");

    assert!(cart.len() >= 150, "cart has {}", cart.len());
    assert!(wishlist.len() >= 100, "wishlist has {}", wishlist.len());

    let in_cart: HashSet<(i32, i32)> = cart.iter().map(|c| (c.buyer_id, c.product_id)).collect();
    for c in &cart {
        assert!(c.quantity >= 1 && c.quantity <= stock[&c.sku]);
    }
    for w in &wishlist {
        assert!(!in_cart.contains(&(w.buyer_id, w.product_id)));
    }
}

#[tokio::test]
async fn test_same_seed_same_dataset() {
    let (_dir_a, db_a, _) = seeded().await;
    let (_dir_b, db_b, _) = seeded().await;

    let emails = |users: Vec<user::Model>| users.into_iter().map(|u| u.email).collect::<Vec<_>>();
    let a = user::Entity::find()
        .order_by_asc(user::Column::Id)
        .all(&db_a)
        .await
        .expect("Failed to load users");
    let b = user::Entity::find()
        .order_by_asc(user::Column::Id)
        .all(&db_b)
        .await
        .expect("Failed to load users");
    assert_eq!(emails(a), emails(b));

    let skus = |variants: Vec<variant::Model>| {
        variants.into_iter().map(|v| (v.sku, v.price)).collect::<Vec<_>>()
    };
    let a = variant::Entity::find()
        .order_by_asc(variant::Column::Sku)
        .all(&db_a)
        .await
        .expect("Failed to load variants");
    let b = variant::Entity::find()
        .order_by_asc(variant::Column::Sku)
        .all(&db_b)
        .await
        .expect("Failed to load variants");
    assert_eq!(skus(a), skus(b));
}

#[tokio::test]
async fn test_report_serializes_to_json() {
    let (_dir, _db, report) = seeded().await;

    let json = serde_json::to_value(&report).expect("Failed to serialize report");
    assert_eq!(json["seed"], 42);
    assert_eq!(json["stages"][0]["stage"], "users");
    assert_eq!(json["stages"][0]["status"], "committed");
    assert_eq!(json["stored"]["user"], 30);
}

#[tokio::test]
async fn test_second_run_starts_from_a_fresh_index() {
    let (_dir, db) = common::fresh_db().await;
    let mut pipeline = SeedingPipeline::new(
        common::small_config(),
        SeaOrmSink::new(db.clone()),
        Box::new(FakerSource),
    );
    pipeline.run().await.expect("First run failed");
    let first_users: HashSet<i32> = user::Entity::find()
        .all(&db)
        .await
        .expect("Failed to load users")
        .into_iter()
        .map(|u| u.id)
        .collect();

    let report = pipeline.run().await.expect("Second run failed");

    let roles = report
        .stage(Stage::RoleAssignment)
        .expect("Role stage missing");
    assert_eq!(roles.rows_of(EntityKind::Seller), 6);
    assert_eq!(roles.rows_of(EntityKind::Buyer), 24);
    assert_eq!(report.stored[&EntityKind::User], 60);
    assert_eq!(report.stored[&EntityKind::Seller], 12);
    assert_eq!(report.stored[&EntityKind::Buyer], 48);
    assert_eq!(pipeline.index().count(EntityKind::User), 30);

    let orders = order::Entity::find().all(&db).await.expect("Failed to load orders");
    assert_eq!(orders.len(), 120);
    let fresh_orders = orders
        .iter()
        .filter(|o| !first_users.contains(&o.buyer_id))
        .count();
    assert_eq!(fresh_orders, 60);
}
