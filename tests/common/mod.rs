#![allow(dead_code)]

use baranki_seeder::entities::setup_schema;
use baranki_seeder::SeedConfig;
use sea_orm::{Database, DatabaseConnection};
use tempfile::TempDir;

/// A fresh file-backed SQLite database with the full schema. Keep the
/// returned directory alive for as long as the connection is used.
pub async fn fresh_db() -> (TempDir, DatabaseConnection) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("seed.db").display());
    let db = Database::connect(&url)
        .await
        .expect("Failed to connect to sqlite");
    setup_schema(&db, true)
        .await
        .expect("Failed to create schema");
    (dir, db)
}

/// Small but complete configuration with a fixed seed.
pub fn small_config() -> SeedConfig {
    SeedConfig {
        rng_seed: Some(42),
        users: 30,
        sellers: 6,
        verified_ratio: 1.0,
        products: 40,
        orders: 60,
        ..SeedConfig::default()
    }
}
