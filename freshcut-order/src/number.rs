use chrono::{DateTime, Utc};
use rand::Rng;

/// Uppercase alphanumerics minus the look-alikes 0/O and 1/I, so numbers read out over
/// the phone survive.
const SUFFIX_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
const SUFFIX_LEN: usize = 6;

pub const DEFAULT_ORDER_PREFIX: &str = "FC";

/// Generates order numbers of the form `FC-20261018-7K3QZP`.
///
/// There is no central sequence: the date keeps numbers sortable and readable, the
/// random suffix gives 32^6 (about 10^9) values per day. The store's unique constraint
/// is the real guarantee; the assembler regenerates on collision.
#[derive(Debug, Clone)]
pub struct OrderNumberGenerator {
    prefix: String,
}

impl OrderNumberGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim().to_uppercase();
        let prefix = if prefix.is_empty() { DEFAULT_ORDER_PREFIX.to_string() } else { prefix };
        Self { prefix }
    }

    pub fn generate(&self) -> String {
        self.generate_at(Utc::now())
    }

    pub fn generate_at(&self, now: DateTime<Utc>) -> String {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect();
        format!("{}-{}-{}", self.prefix, now.format("%Y%m%d"), suffix)
    }
}

impl Default for OrderNumberGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ORDER_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn test_format() {
        let generator = OrderNumberGenerator::new("fc");
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();
        let number = generator.generate_at(now);

        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "FC");
        assert_eq!(parts[1], "20261018");
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2].bytes().all(|b| SUFFIX_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_blank_prefix_falls_back_to_default() {
        let number = OrderNumberGenerator::new("  ").generate();
        assert!(number.starts_with("FC-"));
    }

    #[test]
    fn test_concurrent_generation_is_distinct() {
        let generator = std::sync::Arc::new(OrderNumberGenerator::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = generator.clone();
                std::thread::spawn(move || (0..50).map(|_| generator.generate()).collect::<Vec<_>>())
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for number in handle.join().unwrap() {
                assert!(all.insert(number), "duplicate order number generated");
            }
        }
        assert_eq!(all.len(), 400);
    }
}
