//! Fixture generator for the BustBuy storefront schema.
//!
//! [`SeedingPipeline`] fills a fresh database with users, sellers and buyers,
//! their friends, phones and addresses, a product catalog, carts, wishlists,
//! orders and reviews, keeping every foreign key and uniqueness rule intact.

pub mod config;
pub mod constraints;
pub mod entities;
pub mod error;
pub mod factory;
pub mod index;
pub mod pipeline;
pub mod sink;
pub mod synth;

pub use config::SeedConfig;
pub use error::{RunError, SeedError};
pub use pipeline::{RunReport, SeedingPipeline, Stage, StageReport, StageStatus};
pub use sink::{Batch, SeaOrmSink, SeedSink};
pub use synth::{FakerSource, ValueSource};

/// Domain every generated email address lives under.
pub const EMAIL_DOMAIN: &str = "bustbuy.id";
