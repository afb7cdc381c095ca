use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::SeedConfig;
use crate::constraints::retry_until_valid;
use crate::entities::image::FileExtension;
use crate::entities::{image, product, tag, variant, EntityKind};
use crate::error::SeedError;
use crate::factory::{Built, CATEGORIES};
use crate::index::{Fact, Pool, ReferenceIndex};
use crate::synth::{Constraints, FieldKind, Synthesizer};

const DESCRIPTION_WORDS: usize = 10;

/// Rows of the catalog stage.
#[derive(Debug, Default)]
pub struct Catalog {
    pub products: Vec<product::Model>,
    pub variants: Vec<variant::Model>,
    pub tags: Vec<tag::Model>,
    pub images: Vec<image::Model>,
}

impl Catalog {
    fn extend(&mut self, listing: Listing) {
        self.products.push(listing.product);
        self.variants.extend(listing.variants);
        self.tags.extend(listing.tags);
        self.images.extend(listing.images);
    }
}

/// A product together with its children.
#[derive(Debug)]
pub struct Listing {
    pub product: product::Model,
    pub variants: Vec<variant::Model>,
    pub tags: Vec<tag::Model>,
    pub images: Vec<image::Model>,
}

/// `config.products` products, each owned by a random verified seller.
///
/// Fails with `InsufficientPopulation` when there is no verified seller at all.
pub fn build_catalog(
    synth: &mut Synthesizer,
    index: &mut ReferenceIndex,
    config: &SeedConfig,
) -> Result<Catalog, SeedError> {
    let sellers = index.all(EntityKind::Seller, Some(Pool::VerifiedSeller));
    if sellers.is_empty() && config.products > 0 {
        return Err(SeedError::insufficient("verified sellers", 1, 0));
    }

    let mut catalog = Catalog::default();
    for _ in 0..config.products {
        let seller_id = sellers[synth.rng().gen_range(0..sellers.len())];
        catalog.extend(build_listing(synth, index, config.retry_cap, seller_id)?);
    }
    Ok(catalog)
}

/// Builds and registers one product with 1–3 variants, tags and images.
pub fn build_listing(
    synth: &mut Synthesizer,
    index: &mut ReferenceIndex,
    retry_cap: u32,
    seller_id: i32,
) -> Result<Listing, SeedError> {
    let (category, subcategories) = CATEGORIES[synth.rng().gen_range(0..CATEGORIES.len())];
    let product = build_product(synth, index, retry_cap, seller_id, subcategories)?.register(index);
    let product_id = product.id;

    let mut next_ordinal = 0;
    let mut variants = Vec::new();
    for n in 1..=synth.rng().gen_range(1..=3) {
        let built = build_variant(synth, index, retry_cap, product_id, n, &mut next_ordinal)?;
        variants.push(built.register(index));
    }

    let mut labels: Vec<&str> = CATEGORIES
        .iter()
        .map(|(name, _)| *name)
        .filter(|name| *name != category)
        .collect();
    labels.shuffle(synth.rng());
    labels.truncate(synth.rng().gen_range(0..=2));
    labels.insert(0, category);
    let mut tags = Vec::new();
    for label in labels {
        let row = retry_until_valid(retry_cap, index, || {
            Ok(tag::Model {
                product_id,
                tag: label.to_string(),
            })
        })?;
        index.register(Fact::Tag {
            product_id,
            tag: row.tag.clone(),
        });
        tags.push(row);
    }

    let mut images = Vec::new();
    for k in 1..=synth.rng().gen_range(1..=3) {
        let extension = if synth.chance(0.5) {
            FileExtension::JPG
        } else {
            FileExtension::PNG
        };
        let row = retry_until_valid(retry_cap, index, || {
            Ok(image::Model {
                product_id,
                file_name: format!("produk_{product_id}_img_{k}.{extension}"),
                extension,
            })
        })?;
        index.register(Fact::Image {
            product_id,
            file_name: row.file_name.clone(),
        });
        images.push(row);
    }

    Ok(Listing {
        product,
        variants,
        tags,
        images,
    })
}

pub fn build_product(
    synth: &mut Synthesizer,
    index: &mut ReferenceIndex,
    retry_cap: u32,
    seller_id: i32,
    subcategories: &[&str],
) -> Result<Built<product::Model>, SeedError> {
    let id = index.next_id(EntityKind::Product);
    let row = retry_until_valid(retry_cap, index, || {
        let subcategory = subcategories.choose(synth.rng()).copied().unwrap_or("Produk");
        let word = synth.text(FieldKind::Word, &Constraints::new())?;
        let description = synth.text(
            FieldKind::Text,
            &Constraints::new().length(DESCRIPTION_WORDS..=DESCRIPTION_WORDS),
        )?;
        Ok(product::Model {
            id,
            name: format!("{subcategory} {word}"),
            description,
            seller_id,
        })
    })?;
    let facts = vec![Fact::Product {
        id,
        seller_id,
        name: row.name.clone(),
    }];
    Ok(Built::new(row, facts))
}

/// Variant number `n` of a product. SKUs derive from the product id and an
/// ordinal that moves forward on every collision.
pub fn build_variant(
    synth: &mut Synthesizer,
    index: &ReferenceIndex,
    retry_cap: u32,
    product_id: i32,
    n: u32,
    next_ordinal: &mut u32,
) -> Result<Built<variant::Model>, SeedError> {
    let row = retry_until_valid(retry_cap, index, || {
        *next_ordinal += 1;
        let color = synth.text(FieldKind::ColorName, &Constraints::new())?;
        Ok(variant::Model {
            sku: format!("SKU-{product_id:04}-{:02}", *next_ordinal),
            product_id,
            name: format!("Varian {n} - {color}"),
            price: synth.int(10_000..=5_000_000)?,
            stock: synth.int(0..=100)? as i32,
        })
    })?;
    let facts = vec![Fact::Variant {
        sku: row.sku.clone(),
        product_id,
        stock: row.stock,
    }];
    Ok(Built::new(row, facts))
}
