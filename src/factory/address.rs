use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::SeedConfig;
use crate::constraints::retry_until_valid;
use crate::entities::{address, EntityKind};
use crate::error::SeedError;
use crate::factory::{Built, PROVINCES};
use crate::index::{Fact, ReferenceIndex};
use crate::synth::{Constraints, FieldKind, Synthesizer};

/// One address for `buyer_id`. The buyer's first address becomes the primary one.
pub fn build_address(
    synth: &mut Synthesizer,
    index: &mut ReferenceIndex,
    retry_cap: u32,
    buyer_id: i32,
) -> Result<Built<address::Model>, SeedError> {
    let id = index.next_id(EntityKind::Address);
    let is_primary = index
        .primary_key_for(EntityKind::Address, buyer_id)
        .is_none();
    let row = retry_until_valid(retry_cap, index, || {
        let (province, cities) = PROVINCES[synth.rng().gen_range(0..PROVINCES.len())];
        let city = cities.choose(synth.rng()).copied().unwrap_or(province);
        Ok(address::Model {
            id,
            buyer_id,
            province: province.to_string(),
            city: city.to_string(),
            street: synth.text(FieldKind::AddressLine, &Constraints::new())?,
            is_primary,
        })
    })?;
    Ok(Built::new(
        row,
        vec![Fact::Address {
            id,
            buyer_id,
            primary: is_primary,
        }],
    ))
}

pub fn build_addresses(
    synth: &mut Synthesizer,
    index: &mut ReferenceIndex,
    config: &SeedConfig,
) -> Result<Vec<address::Model>, SeedError> {
    let mut rows = Vec::new();
    for buyer_id in index.all(EntityKind::Buyer, None) {
        let count = synth.rng().gen_range(1..=config.max_addresses);
        for _ in 0..count {
            rows.push(build_address(synth, index, config.retry_cap, buyer_id)?.register(index));
        }
    }
    Ok(rows)
}
