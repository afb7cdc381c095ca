//! One builder per entity type.
//!
//! Builders sample parent keys from the stage's [`ReferenceIndex`], draw field
//! values from the [`Synthesizer`](crate::synth::Synthesizer) and run every
//! candidate through [`retry_until_valid`](crate::constraints::retry_until_valid).
//! What they return is a [`Built`] row plus the facts later rows depend on.

pub mod address;
pub mod basket;
pub mod catalog;
pub mod order;
pub mod social;
pub mod user;

use crate::index::{Fact, ReferenceIndex};

/// Province → cities used for addresses.
pub const PROVINCES: &[(&str, &[&str])] = &[
    (
        "Jakarta",
        &[
            "Jakarta Pusat",
            "Jakarta Selatan",
            "Jakarta Barat",
            "Jakarta Timur",
            "Jakarta Utara",
        ],
    ),
    ("Jawa Barat", &["Bandung", "Bogor", "Bekasi", "Depok", "Cimahi"]),
    (
        "Jawa Tengah",
        &["Semarang", "Surakarta", "Yogyakarta", "Magelang", "Pekalongan"],
    ),
    ("Jawa Timur", &["Surabaya", "Malang", "Sidoarjo", "Madiun", "Kediri"]),
    ("Banten", &["Tangerang", "Serang", "Cilegon", "Tangerang Selatan"]),
];

/// Product category → subcategories. Category names double as tags.
pub const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Elektronik",
        &["Smartphone", "Laptop", "Kamera", "Headphone", "Smartwatch"],
    ),
    ("Fashion", &["Kaos", "Celana", "Jaket", "Sepatu", "Tas"]),
    (
        "Rumah Tangga",
        &["Furniture", "Dekorasi", "Perlengkapan Dapur", "Alat Kebersihan"],
    ),
    (
        "Hobi",
        &["Alat Musik", "Buku", "Alat Lukis", "Peralatan Olahraga"],
    ),
];

pub const PAYMENT_METHODS: &[&str] = &["Transfer Bank", "Kartu Kredit", "OVO", "Gopay", "Dana", "COD"];

pub const SHIPPING_METHODS: &[&str] = &["JNE", "J&T", "SiCepat", "Ninja Express", "AnterAja"];

/// A validated row and the facts it contributes to the index.
#[derive(Debug, Clone)]
pub struct Built<R> {
    pub row: R,
    pub facts: Vec<Fact>,
}

impl<R> Built<R> {
    pub fn new(row: R, facts: Vec<Fact>) -> Self {
        Self { row, facts }
    }

    /// Records the facts in `index` and hands back the row.
    pub fn register(self, index: &mut ReferenceIndex) -> R {
        index.register_all(self.facts);
        self.row
    }
}
