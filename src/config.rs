use std::fmt::Display;
use std::str::FromStr;

use serde::Serialize;
use validator::{Validate, ValidationError};

use crate::entities::order::Status;
use crate::error::SeedError;

/// Relative weights for order statuses, in `Status::ALL` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusWeights(pub [u32; 5]);

impl StatusWeights {
    pub fn weight(&self, status: Status) -> u32 {
        Status::ALL
            .iter()
            .position(|s| *s == status)
            .map(|i| self.0[i])
            .unwrap_or(0)
    }
}

impl Default for StatusWeights {
    // most orders have already arrived
    fn default() -> Self {
        StatusWeights([10, 20, 20, 40, 10])
    }
}

impl FromStr for StatusWeights {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|part| part.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| format!("Invalid status weight: {err}"))?;
        let weights: [u32; 5] = parts
            .try_into()
            .map_err(|parts: Vec<u32>| format!("Expected 5 status weights, got {}", parts.len()))?;
        Ok(StatusWeights(weights))
    }
}

fn validate_weights(weights: &StatusWeights) -> Result<(), ValidationError> {
    if weights.0.iter().all(|w| *w == 0) {
        return Err(ValidationError::new("status_weights_all_zero"));
    }
    Ok(())
}

#[derive(Debug, Clone, Validate, Serialize)]
pub struct SeedConfig {
    #[serde(skip)]
    pub database_url: String,
    /// Drop and recreate every table before seeding.
    pub reset: bool,
    pub rng_seed: Option<u64>,
    #[validate(range(min = 1))]
    pub users: usize,
    pub sellers: usize,
    #[validate(range(min = 0.0, max = 1.0))]
    pub verified_ratio: f64,
    #[validate(range(min = 1))]
    pub max_friends: usize,
    #[validate(range(min = 1))]
    pub max_phones: usize,
    #[validate(range(min = 1))]
    pub max_addresses: usize,
    pub products: usize,
    pub min_cart: usize,
    pub min_wishlist: usize,
    pub orders: usize,
    #[validate(custom(function = "validate_weights"))]
    pub status_weights: StatusWeights,
    #[validate(range(min = 0.0, max = 1.0))]
    pub review_probability: f64,
    #[validate(range(min = 1))]
    pub retry_cap: u32,
}

impl Default for SeedConfig {
    fn default() -> Self {
        SeedConfig {
            database_url: "sqlite://bustbuy.db?mode=rwc".to_string(),
            reset: true,
            rng_seed: None,
            users: 50,
            sellers: 10,
            verified_ratio: 0.5,
            max_friends: 8,
            max_phones: 2,
            max_addresses: 3,
            products: 100,
            min_cart: 150,
            min_wishlist: 100,
            orders: 200,
            status_weights: StatusWeights::default(),
            review_probability: 0.5,
            retry_cap: 64,
        }
    }
}

impl SeedConfig {
    /// Reads `DATABASE_URL` and the `SEED_*` variables, falling back to the defaults.
    pub fn from_env() -> Result<Self, SeedError> {
        dotenvy::dotenv().ok();
        let defaults = SeedConfig::default();

        let config = SeedConfig {
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            reset: env_or("SEED_RESET", defaults.reset)?,
            rng_seed: match std::env::var("SEED_RNG") {
                Ok(raw) => Some(parse_var("SEED_RNG", &raw)?),
                Err(_) => None,
            },
            users: env_or("SEED_USERS", defaults.users)?,
            sellers: env_or("SEED_SELLERS", defaults.sellers)?,
            verified_ratio: env_or("SEED_VERIFIED_RATIO", defaults.verified_ratio)?,
            max_friends: env_or("SEED_MAX_FRIENDS", defaults.max_friends)?,
            max_phones: env_or("SEED_MAX_PHONES", defaults.max_phones)?,
            max_addresses: env_or("SEED_MAX_ADDRESSES", defaults.max_addresses)?,
            products: env_or("SEED_PRODUCTS", defaults.products)?,
            min_cart: env_or("SEED_MIN_CART", defaults.min_cart)?,
            min_wishlist: env_or("SEED_MIN_WISHLIST", defaults.min_wishlist)?,
            orders: env_or("SEED_ORDERS", defaults.orders)?,
            status_weights: env_or("SEED_STATUS_WEIGHTS", defaults.status_weights)?,
            review_probability: env_or("SEED_REVIEW_PROBABILITY", defaults.review_probability)?,
            retry_cap: env_or("SEED_RETRY_CAP", defaults.retry_cap)?,
        };

        config.check()?;
        Ok(config)
    }

    pub fn check(&self) -> Result<(), SeedError> {
        self.validate()
            .map_err(|err| SeedError::Config(err.to_string()))
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T, SeedError>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => parse_var(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, SeedError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|err| SeedError::Config(format!("{key}={raw}: {err}")))
}
