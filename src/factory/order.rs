use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::SeedConfig;
use crate::constraints::retry_until_valid;
use crate::entities::order::Status;
use crate::entities::{order, order_line, review, EntityKind};
use crate::error::SeedError;
use crate::factory::{Built, PAYMENT_METHODS, SHIPPING_METHODS};
use crate::index::{Fact, Pool, ReferenceIndex};
use crate::synth::{Constraints, FieldKind, Synthesizer, Value};

const MAX_AGE_SECONDS: i64 = 90 * 24 * 60 * 60;
const NOTE_PROBABILITY: f64 = 0.3;
const NOTE_WORDS: usize = 5;
const COMMENT_PROBABILITY: f64 = 0.5;
const MAX_LINES: usize = 3;
const MAX_LINE_QUANTITY: i64 = 5;

#[derive(Debug, Default)]
pub struct Orders {
    pub orders: Vec<order::Model>,
    pub lines: Vec<order_line::Model>,
    pub reviews: Vec<review::Model>,
}

/// Exactly `config.orders` orders, each shipped to its buyer's primary address.
///
/// Needs at least one buyer with a primary address and one product with a variant.
pub fn build_orders(
    synth: &mut Synthesizer,
    index: &mut ReferenceIndex,
    config: &SeedConfig,
) -> Result<Orders, SeedError> {
    let buyers = index.all(EntityKind::Buyer, Some(Pool::BuyerWithPrimaryAddress));
    let products = index.products_with_variants();
    if config.orders > 0 {
        if buyers.is_empty() {
            return Err(SeedError::insufficient("buyers with a primary address", 1, 0));
        }
        if products.is_empty() {
            return Err(SeedError::insufficient("products with variants", 1, 0));
        }
    }
    let statuses = WeightedIndex::new(config.status_weights.0)
        .map_err(|err| SeedError::Config(format!("status weights: {err}")))?;

    let mut out = Orders::default();
    for _ in 0..config.orders {
        let buyer_id = buyers[synth.rng().gen_range(0..buyers.len())];
        let status = Status::ALL[statuses.sample(synth.rng())];
        let order = build_order(synth, index, config.retry_cap, buyer_id, status)?.register(index);

        let count = synth.rng().gen_range(1..=MAX_LINES);
        let picked: Vec<i32> = products
            .choose_multiple(synth.rng(), count)
            .copied()
            .collect();
        for product_id in picked {
            let line = build_order_line(synth, index, config.retry_cap, order.id, product_id)?
                .register(index);
            if status == Status::Delivered && synth.chance(config.review_probability) {
                let review = build_review(synth, index, config.retry_cap, order.id, product_id)?;
                out.reviews.push(review.register(index));
            }
            out.lines.push(line);
        }
        out.orders.push(order);
    }
    Ok(out)
}

pub fn build_order(
    synth: &mut Synthesizer,
    index: &mut ReferenceIndex,
    retry_cap: u32,
    buyer_id: i32,
    status: Status,
) -> Result<Built<order::Model>, SeedError> {
    let id = index.next_id(EntityKind::Order);
    let address_id = index
        .primary_key_for(EntityKind::Address, buyer_id)
        .ok_or_else(|| SeedError::insufficient(format!("primary address of buyer {buyer_id}"), 1, 0))?;
    let row = retry_until_valid(retry_cap, index, || {
        let placed_at = match synth.synthesize(
            FieldKind::PastDateTime,
            &Constraints::new().range(0..=MAX_AGE_SECONDS),
        )? {
            Value::DateTime(at) => at,
            _ => synth.now(),
        };
        let note = if synth.chance(NOTE_PROBABILITY) {
            Some(synth.text(
                FieldKind::Text,
                &Constraints::new().length(NOTE_WORDS..=NOTE_WORDS),
            )?)
        } else {
            None
        };
        Ok(order::Model {
            id,
            buyer_id,
            address_id,
            status,
            payment_method: pick(synth, PAYMENT_METHODS),
            shipping_method: pick(synth, SHIPPING_METHODS),
            placed_at,
            note,
        })
    })?;
    let facts = vec![Fact::Order {
        id,
        buyer_id,
        address_id,
        status,
    }];
    Ok(Built::new(row, facts))
}

/// One line for `product_id` using a random variant of it.
pub fn build_order_line(
    synth: &mut Synthesizer,
    index: &ReferenceIndex,
    retry_cap: u32,
    order_id: i32,
    product_id: i32,
) -> Result<Built<order_line::Model>, SeedError> {
    let skus: Vec<String> = index
        .variants_of(product_id)
        .into_iter()
        .map(|v| v.sku.clone())
        .collect();
    if skus.is_empty() {
        return Err(SeedError::insufficient(
            format!("variants of product {product_id}"),
            1,
            0,
        ));
    }
    let row = retry_until_valid(retry_cap, index, || {
        Ok(order_line::Model {
            order_id,
            product_id,
            sku: skus[synth.rng().gen_range(0..skus.len())].clone(),
            quantity: synth.int(1..=MAX_LINE_QUANTITY)? as i32,
        })
    })?;
    let facts = vec![Fact::OrderLine {
        order_id,
        product_id,
        sku: row.sku.clone(),
    }];
    Ok(Built::new(row, facts))
}

pub fn build_review(
    synth: &mut Synthesizer,
    index: &ReferenceIndex,
    retry_cap: u32,
    order_id: i32,
    product_id: i32,
) -> Result<Built<review::Model>, SeedError> {
    let row = retry_until_valid(retry_cap, index, || {
        let comment = if synth.chance(COMMENT_PROBABILITY) {
            Some(synth.text(FieldKind::Text, &Constraints::new())?)
        } else {
            None
        };
        Ok(review::Model {
            order_id,
            product_id,
            rating: synth.int(1..=5)? as i32,
            comment,
        })
    })?;
    Ok(Built::new(
        row,
        vec![Fact::Review {
            order_id,
            product_id,
        }],
    ))
}

fn pick(synth: &mut Synthesizer, choices: &[&str]) -> String {
    choices
        .choose(synth.rng())
        .map(|choice| choice.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StatusWeights;
    use crate::synth::FakerSource;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn synth() -> Synthesizer {
        let now = NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        Synthesizer::new(ChaCha8Rng::seed_from_u64(31), Box::new(FakerSource), now)
    }

    fn shop() -> ReferenceIndex {
        let mut index = ReferenceIndex::new();
        for id in 1..=3 {
            index.register(Fact::User {
                id,
                email: format!("b{id}@bustbuy.id"),
            });
            index.register(Fact::Buyer { user_id: id });
        }
        // buyer 3 never got an address
        for (id, buyer_id) in [(10, 1), (11, 1), (12, 2)] {
            let primary = index.primary_key_for(EntityKind::Address, buyer_id).is_none();
            index.register(Fact::Address {
                id,
                buyer_id,
                primary,
            });
        }
        for id in 1..=5 {
            index.register(Fact::Product {
                id,
                seller_id: 9,
                name: format!("Produk {id}"),
            });
            index.register(Fact::Variant {
                sku: format!("SKU-{id:04}-01"),
                product_id: id,
                stock: 10,
            });
        }
        index
    }

    #[test]
    fn orders_go_to_primary_addresses() {
        let mut synth = synth();
        let mut index = shop();
        let config = SeedConfig {
            orders: 30,
            ..SeedConfig::default()
        };
        let out = build_orders(&mut synth, &mut index, &config).unwrap();

        assert_eq!(out.orders.len(), 30);
        for order in &out.orders {
            assert_ne!(order.buyer_id, 3);
            assert_eq!(
                Some(order.address_id),
                index.primary_key_for(EntityKind::Address, order.buyer_id)
            );
            let lines = out.lines.iter().filter(|l| l.order_id == order.id).count();
            assert!((1..=MAX_LINES).contains(&lines));
        }
    }

    #[test]
    fn only_delivered_orders_get_reviews() {
        let mut synth = synth();
        let mut index = shop();
        let config = SeedConfig {
            orders: 40,
            review_probability: 1.0,
            status_weights: StatusWeights([1, 0, 0, 1, 0]),
            ..SeedConfig::default()
        };
        let out = build_orders(&mut synth, &mut index, &config).unwrap();

        assert!(!out.reviews.is_empty());
        for review in &out.reviews {
            assert_eq!(index.order_status(review.order_id), Some(Status::Delivered));
            assert!((1..=5).contains(&review.rating));
        }
        let delivered_lines = out
            .lines
            .iter()
            .filter(|l| index.order_status(l.order_id) == Some(Status::Delivered))
            .count();
        assert_eq!(out.reviews.len(), delivered_lines);
    }

    #[test]
    fn no_addresses_means_no_orders() {
        let mut synth = synth();
        let mut index = ReferenceIndex::new();
        index.register(Fact::User {
            id: 1,
            email: "a@bustbuy.id".into(),
        });
        index.register(Fact::Buyer { user_id: 1 });
        let err = build_orders(&mut synth, &mut index, &SeedConfig::default()).unwrap_err();
        assert!(matches!(err, SeedError::InsufficientPopulation { .. }));
    }
}
