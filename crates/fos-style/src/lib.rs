//! fOS Style Engine
//!
//! Selector matching, cascade resolution and value caching for a styleable
//! node tree. The engine does not own the tree; nodes are reached through
//! the [`Styleable`] trait.
//!
//! Typical flow:
//! 1. Register stylesheets with a [`StyleManager`]
//! 2. Walk the tree parents first, attaching a [`StyleHelper`] to each node
//! 3. On every pseudo-class change, apply the [`StyleUpdate`]s returned by
//!    [`StyleHelper::transition_to_state`]

mod bitset;
mod cascade;
mod config;
mod error;
mod helper;
mod manager;
mod node;
mod parser;
mod partition;
mod property;
mod pseudo_class;
mod rule;
mod selector;
mod style_cache;
mod value;

#[cfg(test)]
mod testing;

pub use bitset::{BitSet, ItemSet, PseudoClassSet, StyleClassSet};
pub use cascade::{CascadingStyle, MatchKey, RuleCache, StyleMap};
pub use config::{DEFAULT_MAX_LOOKUP_DEPTH, StyleConfig};
pub use error::{ConvertError, CssError, StyleError};
pub use helper::{StyleHelper, StyleUpdate};
pub use manager::{InlineStyles, LoadError, MatchStats, ScopeId, StyleManager, StylesheetLoader};
pub use node::Styleable;
pub use parser::{
    parse_declarations, parse_selector, parse_selector_list, parse_stylesheet, parse_value,
};
pub use partition::SelectorPartitioning;
pub use property::{CssMetaData, FONT, FONT_FAMILY, FONT_SIZE, FONT_STYLE, FONT_WEIGHT};
pub use pseudo_class::{Interned, MAX_INTERNED, PseudoClass, StyleClass};
pub use rule::{Declaration, FontFace, Origin, Rule, Style, Stylesheet};
pub use selector::{Combinator, CompoundSelector, Match, Selector, SimpleSelector, short_type_name};
pub use style_cache::{
    CacheEntry, CacheStats, CalculatedValue, Generation, StatesKey, StyleCache, StyleCacheKey,
};
pub use value::{
    Color, Converter, DEFAULT_FONT_SIZE, Font, FontPosture, ParsedValue, Size, SizeUnit,
    StyleValue, weight,
};
