// utils/reference.rs
use chrono::{DateTime, Utc};
use rand::Rng;

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SUFFIX_LEN: usize = 4;

/// Source of candidate reference numbers. Uniqueness is enforced by the store,
/// callers retry with a fresh candidate on collision.
pub trait ReferenceSource: Send + Sync {
    fn next_reference(&self, now: DateTime<Utc>) -> String;
}

#[derive(Debug, Clone)]
pub struct RandomReference {
    prefix: String,
}

impl RandomReference {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl ReferenceSource for RandomReference {
    fn next_reference(&self, now: DateTime<Utc>) -> String {
        generate_reference(&self.prefix, now)
    }
}

/// `<PREFIX>-<base36 millis>-<4 random base36 chars>`, upper-cased.
pub fn generate_reference(prefix: &str, now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().max(0) as u64;
    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect();

    normalize_reference(&format!("{}-{}-{}", prefix, to_base36(millis), suffix))
}

pub fn normalize_reference(reference: &str) -> String {
    reference.trim().to_uppercase()
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}
