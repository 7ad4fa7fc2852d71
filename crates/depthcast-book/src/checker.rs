//! Structural comparison of two books.
//!
//! A publisher and a consumer that agree on every level and entry produce
//! the same [`book_digest`]. The digest covers sides, prices, sizes, entry
//! counts and entry ids/sizes in order; times, actions and pending deltas
//! are ignored. Decimals are normalized first, so `5` and `5.00` hash alike.

use depthcast_types::Side;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::orderbook::OrderBook;
use crate::price_level::PriceLevel;

/// SHA-256 over the structural content of `book`.
#[must_use]
pub fn book_digest(book: &OrderBook) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"depthcast:book:v1:");
    for side in [Side::Bid, Side::Ask] {
        let levels: Vec<&PriceLevel> = side_levels(book, side).collect();
        hasher.update(side.to_string().as_bytes());
        hasher.update((levels.len() as u64).to_le_bytes());
        for level in levels {
            hasher.update(decimal_bytes(level.price()));
            hasher.update(decimal_bytes(level.size()));
            hasher.update(level.num_entries().to_le_bytes());
            hasher.update((level.entries().len() as u64).to_le_bytes());
            for entry in level.entries() {
                hasher.update((entry.id.as_str().len() as u64).to_le_bytes());
                hasher.update(entry.id.as_str().as_bytes());
                hasher.update(decimal_bytes(entry.size));
            }
        }
    }

    let result = hasher.finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&result);
    digest
}

/// Lowercase hex rendering for logs.
#[must_use]
pub fn digest_hex(digest: &[u8; 32]) -> String {
    hex::encode(digest)
}

#[must_use]
pub fn books_equal(a: &OrderBook, b: &OrderBook) -> bool {
    book_digest(a) == book_digest(b)
}

/// Describe the first structural mismatch between `a` and `b`, walking bids
/// then asks from the best price.
#[must_use]
pub fn first_difference(a: &OrderBook, b: &OrderBook) -> Option<String> {
    for side in [Side::Bid, Side::Ask] {
        let mut left = side_levels(a, side);
        let mut right = side_levels(b, side);
        loop {
            match (left.next(), right.next()) {
                (None, None) => break,
                (Some(l), None) => return Some(format!("{side} {} only in first", l.price())),
                (None, Some(r)) => return Some(format!("{side} {} only in second", r.price())),
                (Some(l), Some(r)) => {
                    if let Some(diff) = level_difference(l, r) {
                        return Some(format!("{side} {}: {diff}", l.price()));
                    }
                }
            }
        }
    }
    None
}

fn level_difference(l: &PriceLevel, r: &PriceLevel) -> Option<String> {
    if l.price() != r.price() {
        return Some(format!("price {} vs {}", l.price(), r.price()));
    }
    if l.size() != r.size() {
        return Some(format!("size {} vs {}", l.size(), r.size()));
    }
    if l.num_entries() != r.num_entries() {
        return Some(format!(
            "entry count {} vs {}",
            l.num_entries(),
            r.num_entries()
        ));
    }
    for (i, (le, re)) in l.entries().iter().zip(r.entries()).enumerate() {
        if le.id != re.id {
            return Some(format!("entry {i} id {} vs {}", le.id, re.id));
        }
        if le.size != re.size {
            return Some(format!("entry {} size {} vs {}", le.id, le.size, re.size));
        }
    }
    if l.entries().len() != r.entries().len() {
        return Some(format!(
            "tracked entries {} vs {}",
            l.entries().len(),
            r.entries().len()
        ));
    }
    None
}

fn side_levels(book: &OrderBook, side: Side) -> Box<dyn Iterator<Item = &PriceLevel> + '_> {
    match side {
        Side::Bid => Box::new(book.bid_levels()),
        Side::Ask => Box::new(book.ask_levels()),
    }
}

fn decimal_bytes(value: Decimal) -> Vec<u8> {
    value.normalize().to_string().into_bytes()
}
