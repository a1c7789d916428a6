//! Style Value Cache
//!
//! Two-tier cache of calculated property values:
//! - Tier 1 is keyed by the style-map ids of the node and its ancestors
//!   ("which rule sets apply along this path")
//! - Tier 2 is keyed by the pseudo-class states along that path, filtered
//!   to the pseudo-classes some selector on the path cares about
//!
//! The shared [`StyleCache`] is owned by the manager and replaced wholesale
//! when stylesheets change; each replacement bumps its [`Generation`].
//! Per-node [`CacheEntry`]s hold values that must not be shared: anything
//! from an inline or user origin, or sized relative to such a font.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::bitset::PseudoClassSet;
use crate::rule::Origin;
use crate::value::{Font, StyleValue};

/// Cache generation; values from an older generation are never read
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Generation(u32);

impl Generation {
    pub const INITIAL: Self = Generation(0);

    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }
}

/// Result of resolving one property
#[derive(Debug, Clone, PartialEq)]
pub enum CalculatedValue {
    /// Leave the property alone
    Skip,
    /// Apply `value`. `origin` is `None` for a reset to the initial value.
    Value {
        value: StyleValue,
        origin: Option<Origin>,
        /// Converted from a size relative to the font in effect
        relative: bool,
    },
}

impl CalculatedValue {
    pub fn new(value: StyleValue, origin: Option<Origin>, relative: bool) -> Self {
        CalculatedValue::Value {
            value,
            origin,
            relative,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, CalculatedValue::Skip)
    }

    pub fn origin(&self) -> Option<Origin> {
        match self {
            CalculatedValue::Value { origin, .. } => *origin,
            CalculatedValue::Skip => None,
        }
    }

    pub fn is_relative(&self) -> bool {
        matches!(self, CalculatedValue::Value { relative: true, .. })
    }

    pub fn value(&self) -> Option<&StyleValue> {
        match self {
            CalculatedValue::Value { value, .. } => Some(value),
            CalculatedValue::Skip => None,
        }
    }

    pub fn font(&self) -> Option<&Font> {
        self.value().and_then(StyleValue::as_font)
    }
}

/// Style-map ids of the node and each ancestor, node first
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StyleCacheKey(pub SmallVec<[u32; 4]>);

/// Relevant pseudo-class states of the node and each ancestor, node first
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StatesKey(pub SmallVec<[PseudoClassSet; 4]>);

impl StatesKey {
    /// Keep only the states each depth's mask marks as relevant
    pub fn filtered(states: &[PseudoClassSet], masks: &[PseudoClassSet]) -> Self {
        StatesKey(
            masks
                .iter()
                .enumerate()
                .map(|(depth, mask)| match states.get(depth) {
                    Some(s) => s.intersect(mask),
                    None => PseudoClassSet::new(),
                })
                .collect(),
        )
    }
}

type Bucket = HashMap<StatesKey, HashMap<String, CalculatedValue>>;

/// Shared values, reusable by every node with the same key path
#[derive(Debug, Default)]
pub struct StyleCache {
    generation: Generation,
    buckets: HashMap<StyleCacheKey, Bucket>,
    hits: u64,
    misses: u64,
}

impl StyleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn get(
        &mut self,
        key: &StyleCacheKey,
        states: &StatesKey,
        property: &str,
    ) -> Option<CalculatedValue> {
        let found = self
            .buckets
            .get(key)
            .and_then(|bucket| bucket.get(states))
            .and_then(|values| values.get(property))
            .cloned();
        match found {
            Some(_) => self.hits += 1,
            None => self.misses += 1,
        }
        found
    }

    /// Store a value unless one is already cached for the property
    pub fn put(
        &mut self,
        key: &StyleCacheKey,
        states: &StatesKey,
        property: &str,
        value: CalculatedValue,
    ) {
        self.buckets
            .entry(key.clone())
            .or_default()
            .entry(states.clone())
            .or_default()
            .entry(property.to_string())
            .or_insert(value);
    }

    /// Drop every value and start a new generation
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.generation = self.generation.next();
        tracing::debug!("Style cache cleared, generation {}", self.generation.value());
    }

    /// Number of Tier-1 buckets
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            buckets: self.buckets.len(),
        }
    }
}

/// Shared cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub buckets: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Node-local values for one pseudo-class state
#[derive(Debug, Default)]
pub struct CacheEntry {
    values: HashMap<String, CalculatedValue>,
    /// Font for relative size conversion, computed on first use
    pub font: Option<CalculatedValue>,
    /// The font was derived from an inline or user font further up
    pub font_is_personal: bool,
}

impl CacheEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local value first, then the shared one
    pub fn get(
        &self,
        shared: &mut StyleCache,
        key: &StyleCacheKey,
        states: &StatesKey,
        property: &str,
    ) -> Option<CalculatedValue> {
        if let Some(value) = self.values.get(property) {
            return Some(value.clone());
        }
        shared.get(key, states, property)
    }

    /// Keep node-specific values local, share the rest
    pub fn put(
        &mut self,
        shared: &mut StyleCache,
        key: &StyleCacheKey,
        states: &StatesKey,
        property: &str,
        value: CalculatedValue,
    ) {
        if self.is_local(&value) {
            self.values.insert(property.to_string(), value);
        } else {
            shared.put(key, states, property, value);
        }
    }

    fn is_local(&self, value: &CalculatedValue) -> bool {
        let personal =
            |origin: Option<Origin>| matches!(origin, Some(Origin::Inline | Origin::User));
        let personal_font = self.font_is_personal
            || personal(self.font.as_ref().and_then(CalculatedValue::origin));
        personal(value.origin()) || (value.is_relative() && personal_font)
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.font = None;
        self.font_is_personal = false;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
