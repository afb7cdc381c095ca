//! In-memory registry of every key generated during one run.
//!
//! Stages sample parent keys from here and consult it for uniqueness. The
//! pipeline works on a clone while a stage is being built and swaps it in
//! only after the stage has been committed, so the index never holds keys
//! the store does not.

use std::collections::{HashMap, HashSet};

use rand::seq::index;
use rand::Rng;

use crate::entities::order::Status;
use crate::entities::EntityKind;
use crate::error::SeedError;

/// Role subsets a sample can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pool {
    VerifiedSeller,
    BuyerWithPrimaryAddress,
}

impl Pool {
    pub fn kind(self) -> EntityKind {
        match self {
            Pool::VerifiedSeller => EntityKind::Seller,
            Pool::BuyerWithPrimaryAddress => EntityKind::Buyer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplePolicy {
    /// Fail with `InsufficientPopulation` when the population is too small.
    Exact,
    /// Return `min(n, population)` keys.
    Clamp,
}

/// What a committed row tells later stages.
#[derive(Debug, Clone, PartialEq)]
pub enum Fact {
    User { id: i32, email: String },
    Buyer { user_id: i32 },
    Seller { user_id: i32, verified: bool, documents: [String; 2] },
    Friendship { user_id: i32, friend_id: i32 },
    Phone { user_id: i32, number: String },
    Address { id: i32, buyer_id: i32, primary: bool },
    Product { id: i32, seller_id: i32, name: String },
    Variant { sku: String, product_id: i32, stock: i32 },
    Tag { product_id: i32, tag: String },
    Image { product_id: i32, file_name: String },
    CartItem { buyer_id: i32, product_id: i32, sku: String },
    WishlistItem { buyer_id: i32, product_id: i32 },
    Order { id: i32, buyer_id: i32, address_id: i32, status: Status },
    OrderLine { order_id: i32, product_id: i32, sku: String },
    Review { order_id: i32, product_id: i32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantFacts {
    pub sku: String,
    pub product_id: i32,
    pub stock: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    next_ids: HashMap<EntityKind, i32>,
    counts: HashMap<EntityKind, usize>,
    keys: HashMap<EntityKind, Vec<i32>>,
    key_set: HashSet<(EntityKind, i32)>,
    verified_sellers: Vec<i32>,
    emails: HashSet<String>,
    documents: HashSet<String>,
    friendships: HashSet<(i32, i32)>,
    phones: HashSet<(i32, String)>,
    primary_addresses: HashMap<i32, i32>,
    product_names: HashSet<(i32, String)>,
    variants: Vec<VariantFacts>,
    sku_index: HashMap<String, usize>,
    variants_by_product: HashMap<i32, Vec<usize>>,
    tags: HashSet<(i32, String)>,
    images: HashSet<(i32, String)>,
    cart: HashSet<(i32, String)>,
    cart_products: HashSet<(i32, i32)>,
    wishlist: HashSet<(i32, i32)>,
    order_status: HashMap<i32, Status>,
    order_lines: HashSet<(i32, i32)>,
    reviews: HashSet<(i32, i32)>,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next allocated id for `kind` start after `max`.
    pub fn reserve_ids(&mut self, kind: EntityKind, max: i32) {
        let next = self.next_ids.entry(kind).or_insert(1);
        *next = (*next).max(max + 1);
    }

    pub fn next_id(&mut self, kind: EntityKind) -> i32 {
        let next = self.next_ids.entry(kind).or_insert(1);
        let id = *next;
        *next += 1;
        id
    }

    pub fn register(&mut self, fact: Fact) {
        let kind = match fact {
            Fact::User { id, email } => {
                self.emails.insert(email);
                self.push_key(EntityKind::User, id);
                EntityKind::User
            }
            Fact::Buyer { user_id } => {
                self.push_key(EntityKind::Buyer, user_id);
                EntityKind::Buyer
            }
            Fact::Seller {
                user_id,
                verified,
                documents,
            } => {
                self.push_key(EntityKind::Seller, user_id);
                if verified {
                    self.verified_sellers.push(user_id);
                }
                self.documents.extend(documents);
                EntityKind::Seller
            }
            Fact::Friendship { user_id, friend_id } => {
                self.friendships.insert((user_id, friend_id));
                EntityKind::Friendship
            }
            Fact::Phone { user_id, number } => {
                self.phones.insert((user_id, number));
                EntityKind::Phone
            }
            Fact::Address {
                id,
                buyer_id,
                primary,
            } => {
                self.push_key(EntityKind::Address, id);
                if primary {
                    self.primary_addresses.insert(buyer_id, id);
                }
                EntityKind::Address
            }
            Fact::Product {
                id,
                seller_id,
                name,
            } => {
                self.push_key(EntityKind::Product, id);
                self.product_names.insert((seller_id, name));
                EntityKind::Product
            }
            Fact::Variant {
                sku,
                product_id,
                stock,
            } => {
                let position = self.variants.len();
                self.sku_index.insert(sku.clone(), position);
                self.variants_by_product
                    .entry(product_id)
                    .or_default()
                    .push(position);
                self.variants.push(VariantFacts {
                    sku,
                    product_id,
                    stock,
                });
                EntityKind::Variant
            }
            Fact::Tag { product_id, tag } => {
                self.tags.insert((product_id, tag));
                EntityKind::Tag
            }
            Fact::Image {
                product_id,
                file_name,
            } => {
                self.images.insert((product_id, file_name));
                EntityKind::Image
            }
            Fact::CartItem {
                buyer_id,
                product_id,
                sku,
            } => {
                self.cart.insert((buyer_id, sku));
                self.cart_products.insert((buyer_id, product_id));
                EntityKind::CartItem
            }
            Fact::WishlistItem {
                buyer_id,
                product_id,
            } => {
                self.wishlist.insert((buyer_id, product_id));
                EntityKind::WishlistItem
            }
            Fact::Order { id, status, .. } => {
                self.push_key(EntityKind::Order, id);
                self.order_status.insert(id, status);
                EntityKind::Order
            }
            Fact::OrderLine {
                order_id,
                product_id,
                ..
            } => {
                self.order_lines.insert((order_id, product_id));
                EntityKind::OrderLine
            }
            Fact::Review {
                order_id,
                product_id,
            } => {
                self.reviews.insert((order_id, product_id));
                EntityKind::Review
            }
        };
        *self.counts.entry(kind).or_default() += 1;
    }

    pub fn register_all(&mut self, facts: impl IntoIterator<Item = Fact>) {
        for fact in facts {
            self.register(fact);
        }
    }

    fn push_key(&mut self, kind: EntityKind, id: i32) {
        if self.key_set.insert((kind, id)) {
            self.keys.entry(kind).or_default().push(id);
        }
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn contains(&self, kind: EntityKind, id: i32) -> bool {
        self.key_set.contains(&(kind, id))
    }

    /// Keys of `kind` in registration order, optionally narrowed to a role subset.
    pub fn all(&self, kind: EntityKind, role: Option<Pool>) -> Vec<i32> {
        match role {
            None => self.keys.get(&kind).cloned().unwrap_or_default(),
            Some(pool) if pool.kind() != kind => Vec::new(),
            Some(Pool::VerifiedSeller) => self.verified_sellers.clone(),
            Some(Pool::BuyerWithPrimaryAddress) => self
                .keys
                .get(&EntityKind::Buyer)
                .map(|buyers| {
                    buyers
                        .iter()
                        .copied()
                        .filter(|b| self.primary_addresses.contains_key(b))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Samples `n` distinct keys without replacement.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        kind: EntityKind,
        n: usize,
        role: Option<Pool>,
        policy: SamplePolicy,
        rng: &mut R,
    ) -> Result<Vec<i32>, SeedError> {
        let population = self.all(kind, role);
        let amount = match policy {
            SamplePolicy::Exact if population.len() < n => {
                let name = match role {
                    Some(pool) => format!("{pool:?} {kind}"),
                    None => kind.to_string(),
                };
                return Err(SeedError::insufficient(name, n, population.len()));
            }
            SamplePolicy::Exact => n,
            SamplePolicy::Clamp => n.min(population.len()),
        };
        Ok(index::sample(rng, population.len(), amount)
            .into_iter()
            .map(|i| population[i])
            .collect())
    }

    /// The primary key of the single primary row related to `related`; only
    /// addresses (per buyer) have one.
    pub fn primary_key_for(&self, kind: EntityKind, related: i32) -> Option<i32> {
        match kind {
            EntityKind::Address => self.primary_addresses.get(&related).copied(),
            _ => None,
        }
    }

    pub fn is_verified_seller(&self, seller_id: i32) -> bool {
        self.verified_sellers.contains(&seller_id)
    }

    pub fn has_email(&self, email: &str) -> bool {
        self.emails.contains(email)
    }

    pub fn has_document(&self, file_name: &str) -> bool {
        self.documents.contains(file_name)
    }

    /// True when the pair exists in either direction.
    pub fn has_friendship(&self, a: i32, b: i32) -> bool {
        self.friendships.contains(&(a, b)) || self.friendships.contains(&(b, a))
    }

    pub fn has_phone(&self, user_id: i32, number: &str) -> bool {
        self.phones.contains(&(user_id, number.to_string()))
    }

    pub fn has_product_name(&self, seller_id: i32, name: &str) -> bool {
        self.product_names.contains(&(seller_id, name.to_string()))
    }

    pub fn variant(&self, sku: &str) -> Option<&VariantFacts> {
        self.sku_index.get(sku).map(|&i| &self.variants[i])
    }

    pub fn variants(&self) -> &[VariantFacts] {
        &self.variants
    }

    pub fn variants_of(&self, product_id: i32) -> Vec<&VariantFacts> {
        self.variants_by_product
            .get(&product_id)
            .map(|positions| positions.iter().map(|&i| &self.variants[i]).collect())
            .unwrap_or_default()
    }

    /// Products that have at least one variant, in registration order.
    pub fn products_with_variants(&self) -> Vec<i32> {
        self.all(EntityKind::Product, None)
            .into_iter()
            .filter(|p| self.variants_by_product.contains_key(p))
            .collect()
    }

    pub fn has_tag(&self, product_id: i32, tag: &str) -> bool {
        self.tags.contains(&(product_id, tag.to_string()))
    }

    pub fn has_image(&self, product_id: i32, file_name: &str) -> bool {
        self.images.contains(&(product_id, file_name.to_string()))
    }

    pub fn in_cart(&self, buyer_id: i32, sku: &str) -> bool {
        self.cart.contains(&(buyer_id, sku.to_string()))
    }

    pub fn product_in_cart(&self, buyer_id: i32, product_id: i32) -> bool {
        self.cart_products.contains(&(buyer_id, product_id))
    }

    pub fn in_wishlist(&self, buyer_id: i32, product_id: i32) -> bool {
        self.wishlist.contains(&(buyer_id, product_id))
    }

    pub fn order_status(&self, order_id: i32) -> Option<Status> {
        self.order_status.get(&order_id).copied()
    }

    pub fn has_order_line(&self, order_id: i32, product_id: i32) -> bool {
        self.order_lines.contains(&(order_id, product_id))
    }

    pub fn has_review(&self, order_id: i32, product_id: i32) -> bool {
        self.reviews.contains(&(order_id, product_id))
    }
}
