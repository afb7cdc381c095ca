//! Cart and wishlist rows.
//!
//! A random initial pass gives every buyer up to five items of each kind, then
//! top-up loops add one valid row at a time until the configured minimum totals
//! are met. A (buyer, product) pair is never both in the cart and wished for.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::config::SeedConfig;
use crate::constraints::retry_until_valid;
use crate::entities::{cart, wishlist, EntityKind};
use crate::error::SeedError;
use crate::factory::Built;
use crate::index::{Fact, ReferenceIndex, VariantFacts};
use crate::synth::Synthesizer;

const MAX_INITIAL_ITEMS: usize = 5;
const MAX_CART_QUANTITY: i32 = 5;

#[derive(Debug, Default)]
pub struct Baskets {
    pub cart: Vec<cart::Model>,
    pub wishlist: Vec<wishlist::Model>,
}

pub fn build_baskets(
    synth: &mut Synthesizer,
    index: &mut ReferenceIndex,
    config: &SeedConfig,
) -> Result<Baskets, SeedError> {
    if index.variants().is_empty() {
        return Err(SeedError::insufficient("product variants", 1, 0));
    }
    let buyers = index.all(EntityKind::Buyer, None);
    if buyers.is_empty() {
        return Err(SeedError::insufficient("buyers", 1, 0));
    }

    let mut baskets = Baskets::default();
    for &buyer_id in &buyers {
        let wanted = synth.rng().gen_range(0..=MAX_INITIAL_ITEMS);
        for _ in 0..wanted {
            let options = cart_options(index, buyer_id);
            let Some(variant) = options.choose(synth.rng()) else {
                break;
            };
            let row = build_cart_item(synth, index, config.retry_cap, buyer_id, variant)?;
            baskets.cart.push(row.register(index));
        }
    }
    for &buyer_id in &buyers {
        let wanted = synth.rng().gen_range(0..=MAX_INITIAL_ITEMS);
        for _ in 0..wanted {
            let options = wishlist_options(index, buyer_id);
            let Some(&product_id) = options.choose(synth.rng()) else {
                break;
            };
            let row = build_wishlist_item(index, config.retry_cap, buyer_id, product_id)?;
            baskets.wishlist.push(row.register(index));
        }
    }
    debug!(
        cart = baskets.cart.len(),
        wishlist = baskets.wishlist.len(),
        "initial basket pass done"
    );

    top_up_cart(synth, index, config, &buyers, &mut baskets.cart)?;
    top_up_wishlist(synth, index, config, &buyers, &mut baskets.wishlist)?;
    Ok(baskets)
}

pub fn build_cart_item(
    synth: &mut Synthesizer,
    index: &ReferenceIndex,
    retry_cap: u32,
    buyer_id: i32,
    variant: &VariantFacts,
) -> Result<Built<cart::Model>, SeedError> {
    let max_quantity = variant.stock.min(MAX_CART_QUANTITY).max(1);
    let row = retry_until_valid(retry_cap, index, || {
        Ok(cart::Model {
            buyer_id,
            product_id: variant.product_id,
            sku: variant.sku.clone(),
            quantity: synth.int(1..=i64::from(max_quantity))? as i32,
        })
    })?;
    let facts = vec![Fact::CartItem {
        buyer_id,
        product_id: row.product_id,
        sku: row.sku.clone(),
    }];
    Ok(Built::new(row, facts))
}

pub fn build_wishlist_item(
    index: &ReferenceIndex,
    retry_cap: u32,
    buyer_id: i32,
    product_id: i32,
) -> Result<Built<wishlist::Model>, SeedError> {
    let row = retry_until_valid(retry_cap, index, || {
        Ok(wishlist::Model {
            buyer_id,
            product_id,
        })
    })?;
    Ok(Built::new(
        row,
        vec![Fact::WishlistItem {
            buyer_id,
            product_id,
        }],
    ))
}

/// In-stock variants the buyer could still put in their cart.
fn cart_options(index: &ReferenceIndex, buyer_id: i32) -> Vec<VariantFacts> {
    index
        .variants()
        .iter()
        .filter(|v| {
            v.stock > 0
                && !index.in_cart(buyer_id, &v.sku)
                && !index.in_wishlist(buyer_id, v.product_id)
        })
        .cloned()
        .collect()
}

/// Products the buyer could still wish for.
fn wishlist_options(index: &ReferenceIndex, buyer_id: i32) -> Vec<i32> {
    index
        .all(EntityKind::Product, None)
        .into_iter()
        .filter(|&p| !index.in_wishlist(buyer_id, p) && !index.product_in_cart(buyer_id, p))
        .collect()
}

/// Lowers `minimum` to what the open slots allow, warning when it had to.
fn reachable_target(kind: EntityKind, minimum: usize, current: usize, capacity: usize) -> usize {
    let reachable = current + capacity;
    if minimum > reachable {
        warn!(
            entity = %kind,
            requested = minimum,
            reachable,
            "minimum total is out of reach, clamping"
        );
        return reachable;
    }
    minimum
}

fn top_up_cart(
    synth: &mut Synthesizer,
    index: &mut ReferenceIndex,
    config: &SeedConfig,
    buyers: &[i32],
    rows: &mut Vec<cart::Model>,
) -> Result<(), SeedError> {
    let capacity = buyers.iter().map(|&b| cart_options(index, b).len()).sum();
    let target = reachable_target(
        EntityKind::CartItem,
        config.min_cart,
        index.count(EntityKind::CartItem),
        capacity,
    );

    while index.count(EntityKind::CartItem) < target {
        let view: &ReferenceIndex = &*index;
        let row = retry_until_valid(config.retry_cap, view, || {
            let open: Vec<(i32, Vec<VariantFacts>)> = buyers
                .iter()
                .map(|&b| (b, cart_options(view, b)))
                .filter(|(_, options)| !options.is_empty())
                .collect();
            let (buyer_id, options) = open
                .choose(synth.rng())
                .ok_or_else(|| SeedError::insufficient("open cart slots", 1, 0))?;
            let variant = &options[synth.rng().gen_range(0..options.len())];
            build_cart_item(synth, view, config.retry_cap, *buyer_id, variant).map(|b| b.row)
        })?;
        index.register(Fact::CartItem {
            buyer_id: row.buyer_id,
            product_id: row.product_id,
            sku: row.sku.clone(),
        });
        rows.push(row);
    }
    Ok(())
}

fn top_up_wishlist(
    synth: &mut Synthesizer,
    index: &mut ReferenceIndex,
    config: &SeedConfig,
    buyers: &[i32],
    rows: &mut Vec<wishlist::Model>,
) -> Result<(), SeedError> {
    let capacity = buyers.iter().map(|&b| wishlist_options(index, b).len()).sum();
    let target = reachable_target(
        EntityKind::WishlistItem,
        config.min_wishlist,
        index.count(EntityKind::WishlistItem),
        capacity,
    );

    while index.count(EntityKind::WishlistItem) < target {
        let view: &ReferenceIndex = &*index;
        let row = retry_until_valid(config.retry_cap, view, || {
            let open: Vec<(i32, Vec<i32>)> = buyers
                .iter()
                .map(|&b| (b, wishlist_options(view, b)))
                .filter(|(_, options)| !options.is_empty())
                .collect();
            let (buyer_id, options) = open
                .choose(synth.rng())
                .ok_or_else(|| SeedError::insufficient("open wishlist slots", 1, 0))?;
            let product_id = options[synth.rng().gen_range(0..options.len())];
            Ok(wishlist::Model {
                buyer_id: *buyer_id,
                product_id,
            })
        })?;
        index.register(Fact::WishlistItem {
            buyer_id: row.buyer_id,
            product_id: row.product_id,
        });
        rows.push(row);
    }
    Ok(())
}
