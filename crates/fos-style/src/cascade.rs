//! Cascade Resolution
//!
//! Turns the candidate rules for a node shape into a [`StyleMap`]:
//! 1. Test which selectors of each candidate rule apply to the node
//! 2. Use the resulting masks as the cache key
//! 3. On a miss, explode matches into [`CascadingStyle`]s, sort, bucket
//!
//! The expensive part (step 3) runs once per distinct combination of
//! candidate rules and applying selectors, not once per node.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::bitset::PseudoClassSet;
use crate::node::Styleable;
use crate::rule::{Origin, Rule, Style};

/// One declaration as it competes in the cascade
#[derive(Debug, Clone)]
pub struct CascadingStyle {
    style: Style,
    pseudo_classes: PseudoClassSet,
    specificity: u32,
    ordinal: usize,
    origin: Origin,
}

impl CascadingStyle {
    pub fn new(
        style: Style,
        pseudo_classes: PseudoClassSet,
        specificity: u32,
        ordinal: usize,
    ) -> Self {
        let origin = style.rule().origin();
        Self {
            style,
            pseudo_classes,
            specificity,
            ordinal,
            origin,
        }
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    pub fn property(&self) -> &str {
        &self.style.declaration().property
    }

    pub fn is_important(&self) -> bool {
        self.style.declaration().important
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn specificity(&self) -> u32 {
        self.specificity
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Pseudo-classes the selector requires
    pub fn pseudo_classes(&self) -> &PseudoClassSet {
        &self.pseudo_classes
    }
}

/// Greater wins: importance, then origin, then specificity, then the
/// later source position
impl Ord for CascadingStyle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.is_important()
            .cmp(&other.is_important())
            .then(self.origin.cmp(&other.origin))
            .then(self.specificity.cmp(&other.specificity))
            .then(self.ordinal.cmp(&other.ordinal))
    }
}

impl PartialOrd for CascadingStyle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for CascadingStyle {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal && self.style == other.style
    }
}

impl Eq for CascadingStyle {}

/// Property name to competing styles, best first
#[derive(Debug, Default)]
pub struct StyleMap {
    id: u32,
    styles: HashMap<String, Vec<CascadingStyle>>,
}

impl StyleMap {
    /// Id shared by every empty map
    pub const EMPTY_ID: u32 = 0;

    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a map from styles, sorting each bucket best first
    pub fn from_styles(id: u32, mut styles: Vec<CascadingStyle>) -> Self {
        styles.sort_by(|a, b| b.cmp(a));
        let mut map: HashMap<String, Vec<CascadingStyle>> = HashMap::new();
        for style in styles {
            map.entry(style.property().to_string()).or_default().push(style);
        }
        Self { id, styles: map }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Styles for `property`, best first
    pub fn get(&self, property: &str) -> Option<&[CascadingStyle]> {
        self.styles.get(property).map(Vec::as_slice)
    }

    pub fn contains(&self, property: &str) -> bool {
        self.styles.contains_key(property)
    }

    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.styles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Same styles in the same order, regardless of id
    pub fn same_styles(&self, other: &StyleMap) -> bool {
        self.styles == other.styles
    }
}

/// Which selectors of which candidate rules apply
pub type MatchKey = SmallVec<[(u32, u64); 4]>;

/// Candidate rules for one node shape and the style maps built from them
#[derive(Debug)]
pub struct RuleCache {
    rules: Vec<Arc<Rule>>,
    maps: HashMap<MatchKey, Arc<StyleMap>>,
}

impl RuleCache {
    pub fn new(rules: Vec<Arc<Rule>>) -> Self {
        Self {
            rules,
            maps: HashMap::new(),
        }
    }

    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    /// Number of distinct style maps built for this shape
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Style map for `node`. `next_id` is called only when a new map has
    /// to be built; the bool reports whether that happened.
    pub fn style_map<N: Styleable>(
        &mut self,
        node: &N,
        triggers: &mut [PseudoClassSet],
        next_id: &mut dyn FnMut() -> u32,
    ) -> (Arc<StyleMap>, bool) {
        let mut key = MatchKey::new();
        for (i, rule) in self.rules.iter().enumerate() {
            let mask = rule.applies(node, triggers);
            if mask != 0 {
                key.push((i as u32, mask));
            }
        }

        if key.is_empty() {
            return (Arc::new(StyleMap::empty()), false);
        }
        if let Some(map) = self.maps.get(&key) {
            return (map.clone(), false);
        }

        let mut styles = Vec::new();
        let mut ordinal = 0usize;
        for &(i, _) in &key {
            let rule = &self.rules[i as usize];
            for m in rule.matches(node) {
                let specificity = m.specificity();
                for d in 0..rule.declarations().len() {
                    if let Some(style) = Style::new(rule.clone(), m.selector_index, d) {
                        let states = m.pseudo_classes.clone();
                        styles.push(CascadingStyle::new(style, states, specificity, ordinal));
                    }
                    ordinal += 1;
                }
            }
        }

        let map = Arc::new(StyleMap::from_styles(next_id(), styles));
        tracing::debug!(
            "Built style map {} from {} rules ({} properties)",
            map.id(),
            key.len(),
            map.len()
        );
        self.maps.insert(key, map.clone());
        (map, true)
    }
}
