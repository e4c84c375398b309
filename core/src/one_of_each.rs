//! `one_of_each`: at most one record per combination of attribute values
//!
//! Given `{country: [US, DE], asn: [7018, 3320]}`, the selector walks the
//! Cartesian product in declaration order (first attribute is the outer loop):
//! `(US, 7018)`, `(US, 3320)`, `(DE, 7018)`, `(DE, 3320)`. For each combination it
//! takes the first record, in input order, whose attributes equal every element.
//! Combinations without a record contribute nothing.
//!
//! The result depends on input order. Catalog order is not guaranteed to be
//! stable across fetches, so neither is the choice among equivalent records.

use crate::{AttributePath, ConfigError, Record, MAX_COMBINATIONS};
use std::collections::HashMap;

/// A compiled `one_of_each` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneOfEach {
    keys: Vec<(AttributePath, Vec<String>)>,
}

impl OneOfEach {
    /// Build from attribute → candidate values, in declaration order.
    ///
    /// Repeated candidates within one attribute are dropped (first occurrence kept).
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MalformedRule`] if no attributes are given
    /// - [`ConfigError::TooManyCombinations`] if the product exceeds [`MAX_COMBINATIONS`]
    pub fn new(keys: Vec<(AttributePath, Vec<String>)>) -> Result<Self, ConfigError> {
        if keys.is_empty() {
            return Err(ConfigError::MalformedRule {
                reason: "one_of_each requires at least one attribute".into(),
            });
        }
        let keys: Vec<_> = keys
            .into_iter()
            .map(|(path, values)| {
                let mut unique: Vec<String> = Vec::with_capacity(values.len());
                for v in values {
                    if !unique.contains(&v) {
                        unique.push(v);
                    }
                }
                (path, unique)
            })
            .collect();
        let this = Self { keys };
        let count = this.combinations();
        if count > MAX_COMBINATIONS {
            return Err(ConfigError::TooManyCombinations {
                count,
                max: MAX_COMBINATIONS,
            });
        }
        Ok(this)
    }

    /// The attributes and their candidate values, in declaration order.
    #[must_use]
    pub fn keys(&self) -> &[(AttributePath, Vec<String>)] {
        &self.keys
    }

    /// Number of combinations (saturating). Zero if any candidate list is empty.
    #[must_use]
    pub fn combinations(&self) -> usize {
        self.keys
            .iter()
            .try_fold(1usize, |acc, (_, values)| acc.checked_mul(values.len()))
            .unwrap_or(usize::MAX)
    }

    /// The key tuple of a record, if every attribute has a scalar value.
    fn key_of(&self, record: &Record) -> Option<Vec<String>> {
        self.keys
            .iter()
            .map(|(path, _)| {
                let value = path.get(record)?;
                if value.is_list() {
                    return None;
                }
                value.match_string().map(|s| s.into_owned())
            })
            .collect()
    }

    /// Select at most one record per combination.
    ///
    /// Output order is Cartesian-product order; within a combination the first
    /// matching input record wins.
    #[must_use]
    pub fn select<'a>(&self, records: &[&'a Record]) -> Vec<&'a Record> {
        let total = self.combinations();
        if total == 0 {
            tracing::debug!("one_of_each has an empty candidate list, nothing to select");
            return Vec::new();
        }

        let mut index: HashMap<Vec<String>, &'a Record> = HashMap::new();
        for record in records {
            if let Some(key) = self.key_of(record) {
                index.entry(key).or_insert(*record);
            }
        }

        let mut selected = Vec::new();
        let mut cursor = vec![0usize; self.keys.len()];
        let mut combination: Vec<String> = Vec::with_capacity(self.keys.len());
        for _ in 0..total {
            combination.clear();
            combination.extend(
                self.keys
                    .iter()
                    .zip(&cursor)
                    .map(|((_, values), &i)| values[i].clone()),
            );
            match index.get(&combination) {
                Some(record) => {
                    tracing::trace!(
                        combination = ?combination,
                        record = %record.label(),
                        "one_of_each selected"
                    );
                    selected.push(*record);
                }
                None => tracing::trace!(combination = ?combination, "one_of_each: no record"),
            }
            advance(&mut cursor, &self.keys);
        }
        tracing::debug!(
            combinations = total,
            selected = selected.len(),
            candidates = records.len(),
            "one_of_each done"
        );
        selected
    }
}

/// Odometer increment: the last attribute varies fastest.
fn advance(cursor: &mut [usize], keys: &[(AttributePath, Vec<String>)]) {
    for (pos, (_, values)) in cursor.iter_mut().zip(keys).rev() {
        *pos += 1;
        if *pos < values.len() {
            return;
        }
        *pos = 0;
    }
}
