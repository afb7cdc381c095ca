use std::collections::HashSet;

use crate::config::SeedConfig;
use crate::constraints::retry_until_valid;
use crate::entities::user::Role;
use crate::entities::{buyer, seller, user, EntityKind};
use crate::error::SeedError;
use crate::factory::Built;
use crate::index::{Fact, ReferenceIndex, SamplePolicy};
use crate::synth::{CharDomain, Constraints, FieldKind, Synthesizer, Value};

const MIN_AGE_DAYS: i64 = 18 * 365;
const MAX_AGE_DAYS: i64 = 60 * 365;

pub fn build_user(
    synth: &mut Synthesizer,
    index: &mut ReferenceIndex,
    retry_cap: u32,
) -> Result<Built<user::Model>, SeedError> {
    let id = index.next_id(EntityKind::User);
    let row = retry_until_valid(retry_cap, index, || {
        let full_name = synth.text(FieldKind::PersonName, &Constraints::new().distinct())?;
        let email = synth.text(
            FieldKind::Email,
            &Constraints::new().basis(full_name.clone()),
        )?;
        let birth_date = match synth.synthesize(
            FieldKind::PastDate,
            &Constraints::new().range(MIN_AGE_DAYS..=MAX_AGE_DAYS),
        )? {
            Value::Date(date) => date,
            _ => synth.now().date(),
        };
        let phone = synth.text(
            FieldKind::Phone,
            &Constraints::new()
                .domain(CharDomain::Digits)
                .prefix("08")
                .length(11..=13),
        )?;
        Ok(user::Model {
            id,
            email,
            password_hash: synth.text(FieldKind::PasswordHash, &Constraints::new())?,
            full_name,
            birth_date,
            phone,
            profile_photo: format!("profile_{id}.jpg"),
            role: None,
        })
    })?;
    let facts = vec![Fact::User {
        id,
        email: row.email.clone(),
    }];
    Ok(Built::new(row, facts))
}

/// Rows produced by partitioning the generated users.
#[derive(Debug, Default)]
pub struct RoleAssignment {
    pub updates: Vec<(i32, Role)>,
    pub buyers: Vec<buyer::Model>,
    pub sellers: Vec<seller::Model>,
}

/// Picks exactly `config.sellers` users as sellers and makes everybody else a buyer.
///
/// Fails with `InsufficientPopulation` when fewer users exist than sellers requested.
pub fn assign_roles(
    synth: &mut Synthesizer,
    index: &mut ReferenceIndex,
    config: &SeedConfig,
) -> Result<RoleAssignment, SeedError> {
    let chosen: HashSet<i32> = index
        .sample(
            EntityKind::User,
            config.sellers,
            None,
            SamplePolicy::Exact,
            synth.rng(),
        )?
        .into_iter()
        .collect();

    let mut assignment = RoleAssignment::default();
    for user_id in index.all(EntityKind::User, None) {
        if index.contains(EntityKind::Buyer, user_id) || index.contains(EntityKind::Seller, user_id) {
            continue;
        }
        if chosen.contains(&user_id) {
            let seller = build_seller(synth, index, config, user_id)?.register(index);
            assignment.updates.push((user_id, Role::Seller));
            assignment.sellers.push(seller);
        } else {
            let buyer = build_buyer(index, config.retry_cap, user_id)?.register(index);
            assignment.updates.push((user_id, Role::Buyer));
            assignment.buyers.push(buyer);
        }
    }
    Ok(assignment)
}

pub fn build_buyer(
    index: &ReferenceIndex,
    retry_cap: u32,
    user_id: i32,
) -> Result<Built<buyer::Model>, SeedError> {
    let row = retry_until_valid(retry_cap, index, || Ok(buyer::Model { user_id }))?;
    Ok(Built::new(row, vec![Fact::Buyer { user_id }]))
}

pub fn build_seller(
    synth: &mut Synthesizer,
    index: &ReferenceIndex,
    config: &SeedConfig,
    user_id: i32,
) -> Result<Built<seller::Model>, SeedError> {
    let is_verified = synth.chance(config.verified_ratio);
    let document = Constraints::new()
        .domain(CharDomain::Slug)
        .prefix("doc_")
        .length(6..=6);
    let row = retry_until_valid(config.retry_cap, index, || {
        Ok(seller::Model {
            user_id,
            id_card_photo: format!("{}.jpg", synth.text(FieldKind::Token, &document)?),
            selfie_photo: format!("{}.jpg", synth.text(FieldKind::Token, &document)?),
            is_verified,
        })
    })?;
    let facts = vec![Fact::Seller {
        user_id,
        verified: is_verified,
        documents: [row.id_card_photo.clone(), row.selfie_photo.clone()],
    }];
    Ok(Built::new(row, facts))
}
