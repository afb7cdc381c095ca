use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::SeedConfig;
use crate::constraints::{retry_until_valid, validate};
use crate::entities::{friendship, phone, EntityKind};
use crate::error::SeedError;
use crate::factory::Built;
use crate::index::{Fact, ReferenceIndex};
use crate::synth::{CharDomain, Constraints, FieldKind, Synthesizer};

/// Undirected friend graph: every user gets up to `max_friends` new edges.
///
/// Pairs that already exist in either direction are skipped rather than retried.
pub fn build_friendships(
    synth: &mut Synthesizer,
    index: &mut ReferenceIndex,
    config: &SeedConfig,
) -> Vec<friendship::Model> {
    let users = index.all(EntityKind::User, None);
    let mut rows = Vec::new();
    for &user_id in &users {
        let others: Vec<i32> = users.iter().copied().filter(|&u| u != user_id).collect();
        if others.is_empty() {
            break;
        }
        let size = synth.rng().gen_range(1..=config.max_friends.min(others.len()));
        let friends: Vec<i32> = others
            .choose_multiple(synth.rng(), size)
            .copied()
            .collect();
        for friend_id in friends {
            let row = friendship::Model { user_id, friend_id };
            if validate(&row, index).is_err() {
                continue;
            }
            index.register(Fact::Friendship { user_id, friend_id });
            rows.push(row);
        }
    }
    rows
}

pub fn build_phone(
    synth: &mut Synthesizer,
    index: &ReferenceIndex,
    retry_cap: u32,
    user_id: i32,
) -> Result<Built<phone::Model>, SeedError> {
    let digits = Constraints::new()
        .domain(CharDomain::Digits)
        .prefix("08")
        .length(11..=13);
    let row = retry_until_valid(retry_cap, index, || {
        Ok(phone::Model {
            user_id,
            number: synth.text(FieldKind::Phone, &digits)?,
        })
    })?;
    let facts = vec![Fact::Phone {
        user_id,
        number: row.number.clone(),
    }];
    Ok(Built::new(row, facts))
}

/// Between one and `max_phones` phone records for every user.
pub fn build_phones(
    synth: &mut Synthesizer,
    index: &mut ReferenceIndex,
    config: &SeedConfig,
) -> Result<Vec<phone::Model>, SeedError> {
    let mut rows = Vec::new();
    for user_id in index.all(EntityKind::User, None) {
        let count = synth.rng().gen_range(1..=config.max_phones);
        for _ in 0..count {
            rows.push(build_phone(synth, index, config.retry_cap, user_id)?.register(index));
        }
    }
    Ok(rows)
}
