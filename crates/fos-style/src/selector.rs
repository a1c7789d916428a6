//! Selector Model
//!
//! A [`SimpleSelector`] tests one node: type, id, style-classes and
//! pseudo-classes. A [`CompoundSelector`] chains simple selectors with
//! child and descendant combinators; the rightmost part is the node itself.
//!
//! Three tests are offered:
//! - `applies`: static shape only (type, id, classes), cheapest
//! - `matches`: static shape plus the counts needed for specificity
//! - `state_matches`: the pseudo-class requirements against live state

use std::fmt;

use smallvec::{SmallVec, smallvec};

use crate::bitset::{PseudoClassSet, StyleClassSet};
use crate::error::StyleError;
use crate::node::Styleable;
use crate::pseudo_class::{PseudoClass, StyleClass};

/// Relationship between two parts of a compound selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Combinator {
    /// `A > B`: immediate parent
    Child,
    /// `A B`: any ancestor
    Descendant,
}

/// Result of a successful `matches`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Index of the selector within its rule
    pub selector_index: usize,
    /// Pseudo-classes required by every part of the selector
    pub pseudo_classes: PseudoClassSet,
    pub id_count: u32,
    pub style_class_count: u32,
}

impl Match {
    /// Packed `(ids << 8) | (classes << 4) | pseudo-classes`.
    /// Class and pseudo-class counts saturate at 15.
    pub fn specificity(&self) -> u32 {
        let pseudo_count = (self.pseudo_classes.len() as u32).min(15);
        (self.id_count << 8) | (self.style_class_count.min(15) << 4) | pseudo_count
    }
}

/// Single-node selector, e.g. `Button#ok.primary:hover`
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleSelector {
    type_name: String,
    id: Option<String>,
    style_class_names: Vec<String>,
    style_classes: StyleClassSet,
    pseudo_class_names: Vec<String>,
    pseudo_classes: PseudoClassSet,
}

impl SimpleSelector {
    /// Universal type name
    pub const ANY: &'static str = "*";

    pub fn new(
        type_name: Option<&str>,
        id: Option<&str>,
        style_classes: &[&str],
        pseudo_classes: &[&str],
    ) -> Result<Self, StyleError> {
        let mut class_set = StyleClassSet::new();
        for name in style_classes {
            class_set.add(StyleClass::intern(name)?);
        }
        let mut pseudo_set = PseudoClassSet::new();
        for name in pseudo_classes {
            pseudo_set.add(PseudoClass::intern(name)?);
        }

        Ok(Self {
            type_name: type_name.filter(|t| !t.is_empty()).unwrap_or(Self::ANY).to_string(),
            id: id.filter(|i| !i.is_empty()).map(str::to_string),
            style_class_names: style_classes.iter().map(|s| s.to_string()).collect(),
            style_classes: class_set,
            pseudo_class_names: pseudo_classes.iter().map(|s| s.to_string()).collect(),
            pseudo_classes: pseudo_set,
        })
    }

    /// `*`
    pub fn universal() -> Self {
        Self {
            type_name: Self::ANY.to_string(),
            id: None,
            style_class_names: Vec::new(),
            style_classes: StyleClassSet::new(),
            pseudo_class_names: Vec::new(),
            pseudo_classes: PseudoClassSet::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Last dotted segment of the type name
    pub fn short_type_name(&self) -> &str {
        short_type_name(&self.type_name)
    }

    pub fn is_any_type(&self) -> bool {
        self.type_name == Self::ANY
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn style_classes(&self) -> &StyleClassSet {
        &self.style_classes
    }

    pub fn style_class_names(&self) -> &[String] {
        &self.style_class_names
    }

    pub fn pseudo_classes(&self) -> &PseudoClassSet {
        &self.pseudo_classes
    }

    pub fn pseudo_class_names(&self) -> &[String] {
        &self.pseudo_class_names
    }

    /// Static test: type, id and style-classes
    pub fn applies<N: Styleable>(&self, node: &N) -> bool {
        if !self.is_any_type() && !type_matches(&self.type_name, node.type_name()) {
            return false;
        }
        if let Some(id) = &self.id {
            if node.id() != Some(id.as_str()) {
                return false;
            }
        }
        self.style_classes.is_subset_of(node.style_classes())
    }

    /// Required pseudo-classes are all present in `states`
    pub fn state_matches(&self, states: &PseudoClassSet) -> bool {
        self.pseudo_classes.is_subset_of(states)
    }

    fn id_count(&self) -> u32 {
        self.id.is_some() as u32
    }

    fn style_class_count(&self) -> u32 {
        self.style_class_names.len() as u32
    }
}

impl fmt::Display for SimpleSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bare_any = self.is_any_type()
            && (self.id.is_some()
                || !self.style_class_names.is_empty()
                || !self.pseudo_class_names.is_empty());
        if !bare_any {
            f.write_str(&self.type_name)?;
        }
        if let Some(id) = &self.id {
            write!(f, "#{id}")?;
        }
        for class in &self.style_class_names {
            write!(f, ".{class}")?;
        }
        for pseudo in &self.pseudo_class_names {
            write!(f, ":{pseudo}")?;
        }
        Ok(())
    }
}

/// Chain of simple selectors, leftmost = outermost ancestor
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundSelector {
    parts: Vec<SimpleSelector>,
    combinators: Vec<Combinator>,
}

type DepthPath = SmallVec<[usize; 4]>;

impl CompoundSelector {
    /// `combinators.len()` must be `parts.len() - 1`
    pub fn new(
        parts: Vec<SimpleSelector>,
        combinators: Vec<Combinator>,
    ) -> Result<Self, StyleError> {
        if parts.is_empty() || combinators.len() + 1 != parts.len() {
            return Err(StyleError::Parse {
                line: 0,
                message: format!(
                    "compound selector needs one combinator between each of {} parts, got {}",
                    parts.len(),
                    combinators.len()
                ),
            });
        }
        Ok(Self { parts, combinators })
    }

    pub fn parts(&self) -> &[SimpleSelector] {
        &self.parts
    }

    pub fn combinators(&self) -> &[Combinator] {
        &self.combinators
    }

    /// Part tested against the node itself
    pub fn rightmost(&self) -> &SimpleSelector {
        &self.parts[self.parts.len() - 1]
    }

    /// Find the depth at which each part matched, walking from the node up.
    /// With `states`, parts must also be satisfied by live pseudo-class
    /// state: `states` for the node, each ancestor's own state above it.
    fn find_path<N: Styleable>(
        &self,
        node: &N,
        states: Option<&PseudoClassSet>,
    ) -> Option<DepthPath> {
        let mut path: DepthPath = smallvec![0; self.parts.len()];
        self.walk(node, self.parts.len() - 1, 0, states, &mut path)
            .then_some(path)
    }

    fn walk<N: Styleable>(
        &self,
        node: &N,
        index: usize,
        depth: usize,
        states: Option<&PseudoClassSet>,
        path: &mut DepthPath,
    ) -> bool {
        let part = &self.parts[index];
        if !part.applies(node) {
            return false;
        }
        if let Some(states) = states {
            let live = if depth == 0 { states } else { node.pseudo_class_states() };
            if !part.state_matches(live) {
                return false;
            }
        }
        path[index] = depth;
        if index == 0 {
            return true;
        }

        match self.combinators[index - 1] {
            Combinator::Child => node
                .parent()
                .is_some_and(|parent| self.walk(&parent, index - 1, depth + 1, states, path)),
            Combinator::Descendant => {
                let mut ancestor = node.parent();
                let mut d = depth + 1;
                while let Some(a) = ancestor {
                    if self.walk(&a, index - 1, d, states, path) {
                        return true;
                    }
                    ancestor = a.parent();
                    d += 1;
                }
                false
            }
        }
    }
}

impl fmt::Display for CompoundSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                match self.combinators[i - 1] {
                    Combinator::Child => f.write_str(" > ")?,
                    Combinator::Descendant => f.write_str(" ")?,
                }
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

/// A selector of either shape
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Simple(SimpleSelector),
    Compound(CompoundSelector),
}

impl Selector {
    /// The part that must match the node itself
    pub fn rightmost(&self) -> &SimpleSelector {
        match self {
            Selector::Simple(s) => s,
            Selector::Compound(c) => c.rightmost(),
        }
    }

    /// Static test against the node and its ancestors
    pub fn applies<N: Styleable>(&self, node: &N) -> bool {
        match self {
            Selector::Simple(s) => s.applies(node),
            Selector::Compound(c) => c.find_path(node, None).is_some(),
        }
    }

    /// Like [`applies`](Self::applies), also recording the pseudo-classes
    /// each part needs at its depth (`triggers[0]` is the node itself).
    /// Depths beyond `triggers.len()` are not recorded.
    pub fn applies_with_triggers<N: Styleable>(
        &self,
        node: &N,
        triggers: &mut [PseudoClassSet],
    ) -> bool {
        match self {
            Selector::Simple(s) => {
                if !s.applies(node) {
                    return false;
                }
                if let Some(slot) = triggers.first_mut() {
                    slot.add_all(s.pseudo_classes());
                }
                true
            }
            Selector::Compound(c) => match c.find_path(node, None) {
                Some(path) => {
                    for (part, &depth) in c.parts.iter().zip(path.iter()) {
                        if let Some(slot) = triggers.get_mut(depth) {
                            slot.add_all(part.pseudo_classes());
                        }
                    }
                    true
                }
                None => false,
            },
        }
    }

    /// Static test returning what the cascade needs to rank the match
    pub fn matches<N: Styleable>(&self, node: &N, selector_index: usize) -> Option<Match> {
        match self {
            Selector::Simple(s) => s.applies(node).then(|| Match {
                selector_index,
                pseudo_classes: s.pseudo_classes().clone(),
                id_count: s.id_count(),
                style_class_count: s.style_class_count(),
            }),
            Selector::Compound(c) => {
                c.find_path(node, None)?;
                let mut pseudo_classes = PseudoClassSet::new();
                let mut id_count = 0;
                let mut style_class_count = 0;
                for part in &c.parts {
                    pseudo_classes.add_all(part.pseudo_classes());
                    id_count += part.id_count();
                    style_class_count += part.style_class_count();
                }
                Some(Match {
                    selector_index,
                    pseudo_classes,
                    id_count,
                    style_class_count,
                })
            }
        }
    }

    /// Pseudo-class requirements hold for `states` on the node and the
    /// live state of its ancestors
    pub fn state_matches<N: Styleable>(&self, node: &N, states: &PseudoClassSet) -> bool {
        match self {
            Selector::Simple(s) => s.state_matches(states),
            Selector::Compound(c) => c.find_path(node, Some(states)).is_some(),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Simple(s) => write!(f, "{s}"),
            Selector::Compound(c) => write!(f, "{c}"),
        }
    }
}

impl From<SimpleSelector> for Selector {
    fn from(s: SimpleSelector) -> Self {
        Selector::Simple(s)
    }
}

impl From<CompoundSelector> for Selector {
    fn from(c: CompoundSelector) -> Self {
        Selector::Compound(c)
    }
}

/// Last dotted segment of a type name
pub fn short_type_name(type_name: &str) -> &str {
    type_name.rsplit('.').next().unwrap_or(type_name)
}

/// `Button` matches `Button` and `ui.controls.Button`, not `MyButton`
fn type_matches(selector_type: &str, node_type: &str) -> bool {
    match node_type.strip_suffix(selector_type) {
        Some("") => true,
        Some(prefix) => prefix.ends_with('.'),
        None => false,
    }
}
