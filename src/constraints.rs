//! Per-entity invariants and the bounded generate → validate → retry loop.
//!
//! Field-level rules (formats, non-empty, numeric bounds) are declared on the
//! entity models with `validator`; the rules that need to look at other rows
//! (uniqueness scopes, parent existence, cross-field checks) live in each
//! [`Constrained::check_scope`].

use std::fmt;

use tracing::trace;
use validator::Validate;

use crate::entities::order::Status;
use crate::entities::{
    address, buyer, cart, friendship, image, order, order_line, phone, product, review, seller,
    tag, user, variant, wishlist, EntityKind,
};
use crate::error::SeedError;
use crate::index::ReferenceIndex;

#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub entity: EntityKind,
    pub reason: String,
}

impl Violation {
    pub fn new(entity: EntityKind, reason: impl Into<String>) -> Self {
        Self {
            entity,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entity, self.reason)
    }
}

pub trait Constrained: Validate {
    const KIND: EntityKind;

    fn check_scope(&self, _index: &ReferenceIndex) -> Result<(), Violation> {
        Ok(())
    }
}

/// Checks a candidate row against its field rules and everything already in `index`.
pub fn validate<R: Constrained>(row: &R, index: &ReferenceIndex) -> Result<(), Violation> {
    row.validate()
        .map_err(|errors| Violation::new(R::KIND, errors.to_string()))?;
    row.check_scope(index)
}

/// Calls `candidate` until it yields a row that passes [`validate`], at most `cap` times.
pub fn retry_until_valid<R, F>(
    cap: u32,
    index: &ReferenceIndex,
    mut candidate: F,
) -> Result<R, SeedError>
where
    R: Constrained,
    F: FnMut() -> Result<R, SeedError>,
{
    let mut last = None;
    for attempt in 1..=cap {
        let row = candidate()?;
        match validate(&row, index) {
            Ok(()) => return Ok(row),
            Err(violation) => {
                trace!(entity = %R::KIND, attempt, reason = %violation.reason, "rejected candidate");
                last = Some(violation);
            }
        }
    }
    Err(SeedError::ConstraintExhausted {
        target: format!("{} row", R::KIND),
        attempts: cap,
        reason: last.map(|v| v.reason).unwrap_or_default(),
    })
}

fn require(entity: EntityKind, ok: bool, reason: impl FnOnce() -> String) -> Result<(), Violation> {
    if ok {
        Ok(())
    } else {
        Err(Violation::new(entity, reason()))
    }
}

fn parent(
    entity: EntityKind,
    index: &ReferenceIndex,
    kind: EntityKind,
    id: i32,
) -> Result<(), Violation> {
    require(entity, index.contains(kind, id), || {
        format!("{kind} {id} does not exist")
    })
}

impl Constrained for user::Model {
    const KIND: EntityKind = EntityKind::User;

    fn check_scope(&self, index: &ReferenceIndex) -> Result<(), Violation> {
        require(Self::KIND, !index.has_email(&self.email), || {
            format!("email {} already taken", self.email)
        })
    }
}

impl Constrained for buyer::Model {
    const KIND: EntityKind = EntityKind::Buyer;

    fn check_scope(&self, index: &ReferenceIndex) -> Result<(), Violation> {
        parent(Self::KIND, index, EntityKind::User, self.user_id)?;
        require(Self::KIND, !index.contains(EntityKind::Seller, self.user_id), || {
            format!("user {} is already a seller", self.user_id)
        })
    }
}

impl Constrained for seller::Model {
    const KIND: EntityKind = EntityKind::Seller;

    fn check_scope(&self, index: &ReferenceIndex) -> Result<(), Violation> {
        parent(Self::KIND, index, EntityKind::User, self.user_id)?;
        require(Self::KIND, !index.contains(EntityKind::Buyer, self.user_id), || {
            format!("user {} is already a buyer", self.user_id)
        })?;
        require(Self::KIND, self.id_card_photo != self.selfie_photo, || {
            "identity documents must differ".to_string()
        })?;
        for document in [&self.id_card_photo, &self.selfie_photo] {
            require(Self::KIND, !index.has_document(document), || {
                format!("document {document} already used")
            })?;
        }
        Ok(())
    }
}

impl Constrained for friendship::Model {
    const KIND: EntityKind = EntityKind::Friendship;

    fn check_scope(&self, index: &ReferenceIndex) -> Result<(), Violation> {
        require(Self::KIND, self.user_id != self.friend_id, || {
            format!("user {} cannot befriend themselves", self.user_id)
        })?;
        parent(Self::KIND, index, EntityKind::User, self.user_id)?;
        parent(Self::KIND, index, EntityKind::User, self.friend_id)?;
        require(
            Self::KIND,
            !index.has_friendship(self.user_id, self.friend_id),
            || format!("{} and {} are already friends", self.user_id, self.friend_id),
        )
    }
}

impl Constrained for phone::Model {
    const KIND: EntityKind = EntityKind::Phone;

    fn check_scope(&self, index: &ReferenceIndex) -> Result<(), Violation> {
        parent(Self::KIND, index, EntityKind::User, self.user_id)?;
        require(Self::KIND, !index.has_phone(self.user_id, &self.number), || {
            format!("user {} already has {}", self.user_id, self.number)
        })
    }
}

impl Constrained for address::Model {
    const KIND: EntityKind = EntityKind::Address;

    fn check_scope(&self, index: &ReferenceIndex) -> Result<(), Violation> {
        parent(Self::KIND, index, EntityKind::Buyer, self.buyer_id)?;
        let existing_primary = index.primary_key_for(EntityKind::Address, self.buyer_id);
        require(Self::KIND, !(self.is_primary && existing_primary.is_some()), || {
            format!("buyer {} already has a primary address", self.buyer_id)
        })?;
        require(Self::KIND, self.is_primary || existing_primary.is_some(), || {
            format!("first address of buyer {} must be primary", self.buyer_id)
        })
    }
}

impl Constrained for product::Model {
    const KIND: EntityKind = EntityKind::Product;

    fn check_scope(&self, index: &ReferenceIndex) -> Result<(), Violation> {
        require(Self::KIND, index.is_verified_seller(self.seller_id), || {
            format!("seller {} is not verified", self.seller_id)
        })?;
        require(
            Self::KIND,
            !index.has_product_name(self.seller_id, &self.name),
            || format!("seller {} already sells {}", self.seller_id, self.name),
        )
    }
}

impl Constrained for variant::Model {
    const KIND: EntityKind = EntityKind::Variant;

    fn check_scope(&self, index: &ReferenceIndex) -> Result<(), Violation> {
        parent(Self::KIND, index, EntityKind::Product, self.product_id)?;
        require(Self::KIND, index.variant(&self.sku).is_none(), || {
            format!("sku {} already exists", self.sku)
        })
    }
}

impl Constrained for tag::Model {
    const KIND: EntityKind = EntityKind::Tag;

    fn check_scope(&self, index: &ReferenceIndex) -> Result<(), Violation> {
        parent(Self::KIND, index, EntityKind::Product, self.product_id)?;
        require(Self::KIND, !index.has_tag(self.product_id, &self.tag), || {
            format!("product {} already tagged {}", self.product_id, self.tag)
        })
    }
}

impl Constrained for image::Model {
    const KIND: EntityKind = EntityKind::Image;

    fn check_scope(&self, index: &ReferenceIndex) -> Result<(), Violation> {
        parent(Self::KIND, index, EntityKind::Product, self.product_id)?;
        require(
            Self::KIND,
            !index.has_image(self.product_id, &self.file_name),
            || format!("product {} already has {}", self.product_id, self.file_name),
        )
    }
}

impl Constrained for cart::Model {
    const KIND: EntityKind = EntityKind::CartItem;

    fn check_scope(&self, index: &ReferenceIndex) -> Result<(), Violation> {
        parent(Self::KIND, index, EntityKind::Buyer, self.buyer_id)?;
        let variant = index
            .variant(&self.sku)
            .ok_or_else(|| Violation::new(Self::KIND, format!("sku {} does not exist", self.sku)))?;
        require(Self::KIND, variant.product_id == self.product_id, || {
            format!("sku {} is not a variant of {}", self.sku, self.product_id)
        })?;
        require(Self::KIND, self.quantity <= variant.stock, || {
            format!("quantity {} exceeds stock {}", self.quantity, variant.stock)
        })?;
        require(Self::KIND, !index.in_cart(self.buyer_id, &self.sku), || {
            format!("buyer {} already has {} in cart", self.buyer_id, self.sku)
        })?;
        require(
            Self::KIND,
            !index.in_wishlist(self.buyer_id, self.product_id),
            || format!("product {} is on buyer {}'s wishlist", self.product_id, self.buyer_id),
        )
    }
}

impl Constrained for wishlist::Model {
    const KIND: EntityKind = EntityKind::WishlistItem;

    fn check_scope(&self, index: &ReferenceIndex) -> Result<(), Violation> {
        parent(Self::KIND, index, EntityKind::Buyer, self.buyer_id)?;
        parent(Self::KIND, index, EntityKind::Product, self.product_id)?;
        require(
            Self::KIND,
            !index.in_wishlist(self.buyer_id, self.product_id),
            || format!("product {} already wished by {}", self.product_id, self.buyer_id),
        )?;
        require(
            Self::KIND,
            !index.product_in_cart(self.buyer_id, self.product_id),
            || format!("product {} is in buyer {}'s cart", self.product_id, self.buyer_id),
        )
    }
}

impl Constrained for order::Model {
    const KIND: EntityKind = EntityKind::Order;

    fn check_scope(&self, index: &ReferenceIndex) -> Result<(), Violation> {
        parent(Self::KIND, index, EntityKind::Buyer, self.buyer_id)?;
        let primary = index.primary_key_for(EntityKind::Address, self.buyer_id);
        require(Self::KIND, primary == Some(self.address_id), || {
            format!(
                "address {} is not the primary address of buyer {}",
                self.address_id, self.buyer_id
            )
        })
    }
}

impl Constrained for order_line::Model {
    const KIND: EntityKind = EntityKind::OrderLine;

    fn check_scope(&self, index: &ReferenceIndex) -> Result<(), Violation> {
        parent(Self::KIND, index, EntityKind::Order, self.order_id)?;
        let variant = index
            .variant(&self.sku)
            .ok_or_else(|| Violation::new(Self::KIND, format!("sku {} does not exist", self.sku)))?;
        require(Self::KIND, variant.product_id == self.product_id, || {
            format!("sku {} is not a variant of {}", self.sku, self.product_id)
        })?;
        require(
            Self::KIND,
            !index.has_order_line(self.order_id, self.product_id),
            || format!("order {} already contains {}", self.order_id, self.product_id),
        )
    }
}

impl Constrained for review::Model {
    const KIND: EntityKind = EntityKind::Review;

    fn check_scope(&self, index: &ReferenceIndex) -> Result<(), Violation> {
        require(
            Self::KIND,
            index.order_status(self.order_id) == Some(Status::Delivered),
            || format!("order {} was not delivered", self.order_id),
        )?;
        require(
            Self::KIND,
            index.has_order_line(self.order_id, self.product_id),
            || format!("order {} does not contain {}", self.order_id, self.product_id),
        )?;
        require(
            Self::KIND,
            !index.has_review(self.order_id, self.product_id),
            || format!("order {} already reviewed {}", self.order_id, self.product_id),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Fact;

    fn index_with_buyer() -> ReferenceIndex {
        let mut index = ReferenceIndex::new();
        index.register(Fact::User {
            id: 1,
            email: "a1@bustbuy.id".into(),
        });
        index.register(Fact::Buyer { user_id: 1 });
        index
    }

    #[test]
    fn first_address_must_be_primary() {
        let index = index_with_buyer();
        let mut address = address::Model {
            id: 1,
            buyer_id: 1,
            province: "Banten".into(),
            city: "Serang".into(),
            street: "Jl. Melati No. 4".into(),
            is_primary: false,
        };
        assert!(validate(&address, &index).is_err());
        address.is_primary = true;
        assert!(validate(&address, &index).is_ok());
    }

    #[test]
    fn blank_street_is_rejected() {
        let index = index_with_buyer();
        let address = address::Model {
            id: 1,
            buyer_id: 1,
            province: "Banten".into(),
            city: "Serang".into(),
            street: String::new(),
            is_primary: true,
        };
        let violation = validate(&address, &index).unwrap_err();
        assert_eq!(violation.entity, EntityKind::Address);
    }

    #[test]
    fn seller_documents_must_differ() {
        let index = {
            let mut index = ReferenceIndex::new();
            index.register(Fact::User {
                id: 2,
                email: "b2@bustbuy.id".into(),
            });
            index
        };
        let seller = seller::Model {
            user_id: 2,
            id_card_photo: "doc_abc.jpg".into(),
            selfie_photo: "doc_abc.jpg".into(),
            is_verified: true,
        };
        assert!(validate(&seller, &index).is_err());
    }

    #[test]
    fn retry_gives_up_after_cap() {
        let index = index_with_buyer();
        let mut calls = 0;
        let result = retry_until_valid(5, &index, || {
            calls += 1;
            Ok(friendship::Model {
                user_id: 1,
                friend_id: 1,
            })
        });
        assert_eq!(calls, 5);
        assert!(matches!(
            result,
            Err(SeedError::ConstraintExhausted { attempts: 5, .. })
        ));
    }

    #[test]
    fn retry_returns_first_valid_candidate() {
        let mut index = index_with_buyer();
        index.register(Fact::User {
            id: 2,
            email: "c2@bustbuy.id".into(),
        });
        index.register(Fact::Product {
            id: 9,
            seller_id: 2,
            name: "Kaos Merah".into(),
        });
        index.register(Fact::Variant {
            sku: "SKU-0009-01".into(),
            product_id: 9,
            stock: 3,
        });
        let mut quantities = vec![1, 0, -3].into_iter().rev();
        let row = retry_until_valid(3, &index, || {
            Ok(cart::Model {
                buyer_id: 1,
                product_id: 9,
                sku: "SKU-0009-01".into(),
                quantity: quantities.next().unwrap_or(0),
            })
        })
        .unwrap();
        assert_eq!(row.quantity, 1);
    }

    #[test]
    fn cart_and_wishlist_exclude_each_other() {
        let mut index = index_with_buyer();
        index.register(Fact::User {
            id: 2,
            email: "c2@bustbuy.id".into(),
        });
        index.register(Fact::Product {
            id: 9,
            seller_id: 2,
            name: "Kaos Merah".into(),
        });
        index.register(Fact::Variant {
            sku: "SKU-0009-01".into(),
            product_id: 9,
            stock: 3,
        });
        index.register(Fact::WishlistItem {
            buyer_id: 1,
            product_id: 9,
        });
        let item = cart::Model {
            buyer_id: 1,
            product_id: 9,
            sku: "SKU-0009-01".into(),
            quantity: 1,
        };
        assert!(validate(&item, &index).is_err());
    }
}
