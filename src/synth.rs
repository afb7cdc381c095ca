//! Schema-conformant scalar values.
//!
//! [`Synthesizer::synthesize`] turns a [`FieldKind`] plus [`Constraints`] into a
//! [`Value`] that satisfies them, re-drawing until it does. Human-looking text
//! (names, sentences, street lines) comes from a pluggable [`ValueSource`].

use std::collections::HashSet;
use std::ops::RangeInclusive;

use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Algorithm, Argon2, Params, Version,
};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use fake::faker::address::en::{BuildingNumber, StreetName};
use fake::faker::lorem::en::{Sentence, Word};
use fake::faker::name::en::Name;
use fake::Fake;
use rand::{Rng, RngCore};
use rand_chacha::ChaCha8Rng;

use crate::error::SeedError;

const MAX_SYNTH_ATTEMPTS: u32 = 32;

const SLUG_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

const COLOR_NAMES: &[&str] = &[
    "Black", "White", "Silver", "Gold", "Navy", "Maroon", "Olive", "Teal", "Crimson", "Coral",
    "Indigo", "Ivory", "Khaki", "Lavender", "Mint", "Peach", "Plum", "Salmon", "Sand", "Turquoise",
];

/// Locale-specific source of realistic text.
pub trait ValueSource: Send {
    fn name(&self, rng: &mut dyn RngCore) -> String;
    fn sentence(&self, rng: &mut dyn RngCore, words: usize) -> String;
    fn address_line(&self, rng: &mut dyn RngCore) -> String;
    fn color_name(&self, rng: &mut dyn RngCore) -> String;
    fn word(&self, rng: &mut dyn RngCore) -> String;
}

/// [`ValueSource`] backed by the `fake` crate's English tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct FakerSource;

impl ValueSource for FakerSource {
    fn name(&self, rng: &mut dyn RngCore) -> String {
        Name().fake_with_rng(rng)
    }

    fn sentence(&self, rng: &mut dyn RngCore, words: usize) -> String {
        Sentence(words..words + 1).fake_with_rng(rng)
    }

    fn address_line(&self, rng: &mut dyn RngCore) -> String {
        let street: String = StreetName().fake_with_rng(rng);
        let number: String = BuildingNumber().fake_with_rng(rng);
        format!("Jl. {} No. {}", street, number)
    }

    fn color_name(&self, rng: &mut dyn RngCore) -> String {
        COLOR_NAMES[rng.gen_range(0..COLOR_NAMES.len())].to_string()
    }

    fn word(&self, rng: &mut dyn RngCore) -> String {
        Word().fake_with_rng(rng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    PersonName,
    /// Derived from [`Constraints::basis`] (usually a person name).
    Email,
    Phone,
    PasswordHash,
    /// Integer amount, drawn from [`Constraints::range`].
    Amount,
    /// Day in the past; the range is in days before the reference date.
    PastDate,
    /// Instant in the past; the range is in seconds before the reference time.
    PastDateTime,
    /// Sentence; the length bounds count words.
    Text,
    Word,
    AddressLine,
    ColorName,
    /// Random characters from [`Constraints::domain`].
    Token,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharDomain {
    Digits,
    Slug,
    #[default]
    FreeText,
}

#[derive(Debug, Clone, Default)]
pub struct Constraints {
    pub length: Option<RangeInclusive<usize>>,
    pub domain: CharDomain,
    pub range: Option<RangeInclusive<i64>>,
    pub prefix: Option<String>,
    pub basis: Option<String>,
    /// Never hand out the same value twice for this field kind within a run.
    pub distinct: bool,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn length(mut self, length: RangeInclusive<usize>) -> Self {
        self.length = Some(length);
        self
    }

    pub fn domain(mut self, domain: CharDomain) -> Self {
        self.domain = domain;
        self
    }

    pub fn range(mut self, range: RangeInclusive<i64>) -> Self {
        self.range = Some(range);
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn basis(mut self, basis: impl Into<String>) -> Self {
        self.basis = Some(basis.into());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn into_text(self) -> String {
        match self {
            Value::Text(text) => text,
            Value::Int(n) => n.to_string(),
            Value::Date(d) => d.to_string(),
            Value::DateTime(dt) => dt.to_string(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }
}

pub struct Synthesizer {
    rng: ChaCha8Rng,
    source: Box<dyn ValueSource>,
    now: NaiveDateTime,
    hasher: Argon2<'static>,
    seen: HashSet<(FieldKind, String)>,
}

impl Synthesizer {
    pub fn new(rng: ChaCha8Rng, source: Box<dyn ValueSource>, now: NaiveDateTime) -> Self {
        // fixture passwords, so the cheapest parameters argon2 accepts are fine
        let params = Params::new(Params::MIN_M_COST, 1, 1, None).unwrap_or_default();
        Self {
            rng,
            source,
            now,
            hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            seen: HashSet::new(),
        }
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Forgets every value handed out under [`Constraints::distinct`].
    pub fn forget_distinct(&mut self) {
        self.seen.clear();
    }

    /// Draws values until one satisfies `constraints`.
    pub fn synthesize(
        &mut self,
        kind: FieldKind,
        constraints: &Constraints,
    ) -> Result<Value, SeedError> {
        let mut last_reason = String::new();
        for _ in 0..MAX_SYNTH_ATTEMPTS {
            let value = self.draw(kind, constraints)?;
            match conforms(&value, constraints) {
                Ok(()) => {
                    if constraints.distinct {
                        let key = (kind, value.clone().into_text());
                        if !self.seen.insert(key) {
                            last_reason = "value already handed out".to_string();
                            continue;
                        }
                    }
                    return Ok(value);
                }
                Err(reason) => last_reason = reason,
            }
        }
        Err(SeedError::ConstraintExhausted {
            target: format!("{kind:?} value"),
            attempts: MAX_SYNTH_ATTEMPTS,
            reason: last_reason,
        })
    }

    pub fn text(&mut self, kind: FieldKind, constraints: &Constraints) -> Result<String, SeedError> {
        self.synthesize(kind, constraints).map(Value::into_text)
    }

    pub fn int(&mut self, range: RangeInclusive<i64>) -> Result<i64, SeedError> {
        let value = self.synthesize(FieldKind::Amount, &Constraints::new().range(range))?;
        Ok(value.as_int().unwrap_or_default())
    }

    pub fn chance(&mut self, probability: f64) -> bool {
        self.rng.gen_bool(probability.clamp(0.0, 1.0))
    }

    fn draw(&mut self, kind: FieldKind, constraints: &Constraints) -> Result<Value, SeedError> {
        let value = match kind {
            FieldKind::PersonName => Value::Text(self.source.name(&mut self.rng)),
            FieldKind::Email => {
                let basis = match &constraints.basis {
                    Some(basis) => basis.clone(),
                    None => self.source.name(&mut self.rng),
                };
                let local: String = basis
                    .to_lowercase()
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect();
                let suffix = self.rng.gen_range(1..1000);
                Value::Text(format!("{}{}@{}", local, suffix, crate::EMAIL_DOMAIN))
            }
            FieldKind::Phone => {
                let prefix = constraints.prefix.as_deref().unwrap_or("08");
                let total = self.pick_len(constraints, 11..=13);
                let digits = self.chars(b"0123456789", total.saturating_sub(prefix.len()));
                Value::Text(format!("{prefix}{digits}"))
            }
            FieldKind::PasswordHash => {
                let password = self.chars(SLUG_CHARS, 12);
                let salt_bytes: [u8; 16] = self.rng.gen();
                let salt = SaltString::b64_encode(&salt_bytes).map_err(|err| hash_error(&err))?;
                let hash = self
                    .hasher
                    .hash_password(password.as_bytes(), &salt)
                    .map_err(|err| hash_error(&err))?;
                Value::Text(hash.to_string())
            }
            FieldKind::Amount => {
                let range = constraints.range.clone().unwrap_or(0..=i64::from(i32::MAX));
                Value::Int(self.rng.gen_range(range))
            }
            FieldKind::PastDate => {
                let range = constraints.range.clone().unwrap_or(0..=365);
                let days = self.rng.gen_range(range);
                Value::Date(self.now.date() - Duration::days(days))
            }
            FieldKind::PastDateTime => {
                let range = constraints.range.clone().unwrap_or(0..=86_400);
                let seconds = self.rng.gen_range(range);
                Value::DateTime(self.now - Duration::seconds(seconds))
            }
            FieldKind::Text => {
                let words = self.pick_len(constraints, 5..=10);
                Value::Text(self.source.sentence(&mut self.rng, words.max(1)))
            }
            FieldKind::Word => Value::Text(capitalize(&self.source.word(&mut self.rng))),
            FieldKind::AddressLine => Value::Text(self.source.address_line(&mut self.rng)),
            FieldKind::ColorName => Value::Text(self.source.color_name(&mut self.rng)),
            FieldKind::Token => {
                let len = self.pick_len(constraints, 8..=8);
                let alphabet: &[u8] = match constraints.domain {
                    CharDomain::Digits => b"0123456789",
                    CharDomain::Slug | CharDomain::FreeText => SLUG_CHARS,
                };
                let body = self.chars(alphabet, len);
                Value::Text(format!(
                    "{}{}",
                    constraints.prefix.as_deref().unwrap_or_default(),
                    body
                ))
            }
        };
        Ok(value)
    }

    fn pick_len(&mut self, constraints: &Constraints, default: RangeInclusive<usize>) -> usize {
        let range = constraints.length.clone().unwrap_or(default);
        if range.is_empty() {
            return *range.start();
        }
        self.rng.gen_range(range)
    }

    fn chars(&mut self, alphabet: &[u8], len: usize) -> String {
        (0..len)
            .map(|_| alphabet[self.rng.gen_range(0..alphabet.len())] as char)
            .collect()
    }
}

fn hash_error(err: &argon2::password_hash::Error) -> SeedError {
    SeedError::ConstraintExhausted {
        target: "password hash".to_string(),
        attempts: 1,
        reason: err.to_string(),
    }
}

/// Checks a drawn value against the constraints that apply to its shape.
fn conforms(value: &Value, constraints: &Constraints) -> Result<(), String> {
    match value {
        Value::Text(text) => {
            if text.trim().is_empty() {
                return Err("blank value".to_string());
            }
            let body = match &constraints.prefix {
                Some(prefix) => text
                    .strip_prefix(prefix.as_str())
                    .ok_or_else(|| format!("missing prefix {prefix}"))?,
                None => text.as_str(),
            };
            match constraints.domain {
                CharDomain::Digits if !body.chars().all(|c| c.is_ascii_digit()) => {
                    return Err(format!("{text:?} is not digits only"));
                }
                CharDomain::Slug
                    if !body
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_') =>
                {
                    return Err(format!("{text:?} is not a slug"));
                }
                _ => {}
            }
            Ok(())
        }
        Value::Int(n) => match &constraints.range {
            Some(range) if !range.contains(n) => Err(format!("{n} outside {range:?}")),
            _ => Ok(()),
        },
        Value::Date(_) | Value::DateTime(_) => Ok(()),
    }
}

pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::cell::Cell;

    fn synth(seed: u64) -> Synthesizer {
        let now = NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap();
        Synthesizer::new(ChaCha8Rng::seed_from_u64(seed), Box::new(FakerSource), now)
    }

    #[test]
    fn same_seed_same_values() {
        let mut a = synth(7);
        let mut b = synth(7);
        let c = Constraints::new();
        for kind in [FieldKind::PersonName, FieldKind::Text, FieldKind::AddressLine] {
            assert_eq!(a.synthesize(kind, &c).unwrap(), b.synthesize(kind, &c).unwrap());
        }
    }

    #[test]
    fn phone_numbers_are_digits_with_prefix() {
        let mut s = synth(1);
        let c = Constraints::new()
            .domain(CharDomain::Digits)
            .prefix("08")
            .length(11..=13);
        for _ in 0..50 {
            let phone = s.text(FieldKind::Phone, &c).unwrap();
            assert!(crate::entities::PHONE_REGEX.is_match(&phone), "{phone}");
        }
    }

    #[test]
    fn amounts_stay_in_range() {
        let mut s = synth(2);
        for _ in 0..100 {
            let n = s.int(10_000..=5_000_000).unwrap();
            assert!((10_000..=5_000_000).contains(&n));
        }
    }

    #[test]
    fn distinct_names_never_repeat() {
        let mut s = synth(3);
        let c = Constraints::new().distinct();
        let mut names = HashSet::new();
        for _ in 0..40 {
            let name = s.text(FieldKind::PersonName, &c).unwrap();
            assert!(names.insert(name));
        }
    }

    #[test]
    fn email_uses_basis() {
        let mut s = synth(4);
        let email = s
            .text(FieldKind::Email, &Constraints::new().basis("Budi Santoso"))
            .unwrap();
        assert!(email.starts_with("budisantoso"));
        assert!(email.ends_with("@bustbuy.id"));
    }

    #[test]
    fn past_dates_are_before_now() {
        let mut s = synth(5);
        let c = Constraints::new().range(18 * 365..=60 * 365);
        let value = s.synthesize(FieldKind::PastDate, &c).unwrap();
        match value {
            Value::Date(d) => assert!(d < s.now().date()),
            other => panic!("unexpected {other:?}"),
        }
    }

    /// Hands out blank street lines for the first `blanks` calls.
    struct BlankFirst {
        blanks: Cell<u32>,
    }

    impl ValueSource for BlankFirst {
        fn name(&self, rng: &mut dyn RngCore) -> String {
            FakerSource.name(rng)
        }

        fn sentence(&self, rng: &mut dyn RngCore, words: usize) -> String {
            FakerSource.sentence(rng, words)
        }

        fn address_line(&self, rng: &mut dyn RngCore) -> String {
            let left = self.blanks.get();
            if left > 0 {
                self.blanks.set(left - 1);
                return "   ".to_string();
            }
            FakerSource.address_line(rng)
        }

        fn color_name(&self, rng: &mut dyn RngCore) -> String {
            FakerSource.color_name(rng)
        }

        fn word(&self, rng: &mut dyn RngCore) -> String {
            FakerSource.word(rng)
        }
    }

    fn synth_with(blanks: u32) -> Synthesizer {
        let mut s = synth(8);
        s.source = Box::new(BlankFirst {
            blanks: Cell::new(blanks),
        });
        s
    }

    #[test]
    fn blank_values_are_drawn_again() {
        let mut s = synth_with(3);
        let street = s.text(FieldKind::AddressLine, &Constraints::new()).unwrap();
        assert!(!street.trim().is_empty());
        assert!(street.starts_with("Jl. "), "{street}");
    }

    #[test]
    fn endless_blanks_exhaust_the_attempts() {
        let mut s = synth_with(u32::MAX);
        let err = s
            .synthesize(FieldKind::AddressLine, &Constraints::new())
            .unwrap_err();
        match err {
            SeedError::ConstraintExhausted {
                attempts, reason, ..
            } => {
                assert_eq!(attempts, MAX_SYNTH_ATTEMPTS);
                assert_eq!(reason, "blank value");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn forgetting_clears_the_distinct_cache() {
        let mut s = synth(9);
        s.text(FieldKind::PersonName, &Constraints::new().distinct())
            .unwrap();
        assert_eq!(s.seen.len(), 1);
        s.forget_distinct();
        assert!(s.seen.is_empty());
    }

    #[test]
    fn password_hashes_are_phc_strings() {
        let mut s = synth(6);
        let hash = s.text(FieldKind::PasswordHash, &Constraints::new()).unwrap();
        assert!(hash.starts_with("$argon2id$"));
    }
}
