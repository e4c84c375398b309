//! Selection pipeline
//!
//! 1. Filter records with the rule set (including `one_of_each`).
//! 2. Optionally replace devices with their extracted addresses.
//! 3. Enforce `min_matches`, then truncate to `max_matches` (shuffling first
//!    when `randomize` is set).

use crate::{
    AddressSelector, CatalogProvider, ConfigError, EvalContext, Record, RecordKind, RuleSet,
    SelectError,
};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::net::IpAddr;

/// Result-count bounds applied after filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionBounds {
    min_matches: Option<usize>,
    max_matches: Option<usize>,
    randomize: bool,
}

impl SelectionBounds {
    /// Create bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBounds`] if `min > max`.
    pub fn new(
        min_matches: Option<usize>,
        max_matches: Option<usize>,
        randomize: bool,
    ) -> Result<Self, ConfigError> {
        if let (Some(min), Some(max)) = (min_matches, max_matches) {
            if min > max {
                return Err(ConfigError::InvalidBounds { min, max });
            }
        }
        Ok(Self {
            min_matches,
            max_matches,
            randomize,
        })
    }

    /// No bounds.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Minimum number of results.
    #[must_use]
    pub fn min_matches(&self) -> Option<usize> {
        self.min_matches
    }

    /// Maximum number of results.
    #[must_use]
    pub fn max_matches(&self) -> Option<usize> {
        self.max_matches
    }

    /// Shuffle before truncating.
    #[must_use]
    pub fn randomize(&self) -> bool {
        self.randomize
    }

    /// Enforce the bounds on an ordered result list.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::InsufficientMatches`] below `min_matches`.
    pub fn apply<T, R: Rng + ?Sized>(
        &self,
        mut items: Vec<T>,
        rng: &mut R,
    ) -> Result<Vec<T>, SelectError> {
        if let Some(required) = self.min_matches {
            if items.len() < required {
                return Err(SelectError::InsufficientMatches {
                    found: items.len(),
                    required,
                });
            }
        }
        if let Some(max) = self.max_matches {
            if items.len() > max {
                if self.randomize {
                    items.shuffle(rng);
                }
                tracing::debug!(found = items.len(), max, randomize = self.randomize, "truncating");
                items.truncate(max);
            }
        }
        Ok(items)
    }
}

/// Output of a selection run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Selection {
    /// Selected records, in selection order.
    Records(Vec<Record>),
    /// Target addresses, in selection order.
    Addresses(Vec<IpAddr>),
    /// Explicitly listed ids, passed through unchanged.
    Ids(Vec<String>),
}

impl Selection {
    /// Number of selected items.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Records(r) => r.len(),
            Self::Addresses(a) => a.len(),
            Self::Ids(i) => i.len(),
        }
    }

    /// Returns `true` if nothing was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A compiled selection: rules, optional address extraction, and bounds.
///
/// # Example
///
/// ```
/// use sift::prelude::*;
///
/// let records: Vec<Record> = ["r1-west-a", "r2-east-b", "r3-west-c"]
///     .into_iter()
///     .map(|n| Record::new().with("name", n))
///     .collect();
///
/// let rules = RuleSet::new(vec![Rule::attribute("name", "regex(-west-)").unwrap()], None);
/// let bounds = SelectionBounds::new(Some(1), Some(1), false).unwrap();
/// let pipeline = Pipeline::records(rules, bounds);
///
/// let selection = pipeline.select(&records, &EvalContext::now()).unwrap();
/// assert_eq!(selection.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    rules: RuleSet,
    addresses: Option<AddressSelector>,
    bounds: SelectionBounds,
}

impl Pipeline {
    /// A pipeline producing records.
    #[must_use]
    pub fn records(rules: RuleSet, bounds: SelectionBounds) -> Self {
        Self {
            rules,
            addresses: None,
            bounds,
        }
    }

    /// A pipeline producing addresses from the selected devices.
    #[must_use]
    pub fn addresses(rules: RuleSet, addresses: AddressSelector, bounds: SelectionBounds) -> Self {
        Self {
            rules,
            addresses: Some(addresses),
            bounds,
        }
    }

    /// The rule set.
    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// The bounds.
    #[must_use]
    pub fn bounds(&self) -> &SelectionBounds {
        &self.bounds
    }

    /// Run over a record snapshot, randomizing with the thread RNG.
    ///
    /// # Errors
    ///
    /// See [`select_with_rng`](Self::select_with_rng).
    pub fn select(&self, records: &[Record], ctx: &EvalContext) -> Result<Selection, SelectError> {
        self.select_with_rng(records, ctx, &mut rand::thread_rng())
    }

    /// Run over a record snapshot with an explicit RNG.
    ///
    /// # Errors
    ///
    /// - [`SelectError::NoAddressSource`] if address extraction has no sources
    /// - [`SelectError::InsufficientMatches`] below `min_matches`
    pub fn select_with_rng<R: Rng + ?Sized>(
        &self,
        records: &[Record],
        ctx: &EvalContext,
        rng: &mut R,
    ) -> Result<Selection, SelectError> {
        let selected = self.rules.apply(records, ctx);
        match &self.addresses {
            Some(extractor) => {
                let addresses = extractor.extract(&selected, ctx)?;
                Ok(Selection::Addresses(self.bounds.apply(addresses, rng)?))
            }
            None => {
                let selected = self.bounds.apply(selected, rng)?;
                Ok(Selection::Records(selected.into_iter().cloned().collect()))
            }
        }
    }

    /// Fetch a snapshot from the provider once, then select.
    ///
    /// # Errors
    ///
    /// [`SelectError::Provider`] if the fetch fails, otherwise as
    /// [`select_with_rng`](Self::select_with_rng).
    pub fn run<P: CatalogProvider + ?Sized>(
        &self,
        provider: &P,
        kind: RecordKind,
        ctx: &EvalContext,
    ) -> Result<Selection, SelectError> {
        self.run_with_rng(provider, kind, ctx, &mut rand::thread_rng())
    }

    /// [`run`](Self::run) with an explicit RNG.
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run).
    pub fn run_with_rng<P: CatalogProvider + ?Sized, R: Rng + ?Sized>(
        &self,
        provider: &P,
        kind: RecordKind,
        ctx: &EvalContext,
        rng: &mut R,
    ) -> Result<Selection, SelectError> {
        let records = provider.fetch(kind).map_err(SelectError::provider)?;
        tracing::debug!(%kind, count = records.len(), "fetched catalog snapshot");
        self.select_with_rng(&records, ctx, rng)
    }
}
