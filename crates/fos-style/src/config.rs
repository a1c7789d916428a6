//! Style Engine Configuration

use crate::value::Font;

/// Default bound on nested lookup resolution
pub const DEFAULT_MAX_LOOKUP_DEPTH: usize = 32;

/// Tunables for a [`StyleManager`](crate::StyleManager)
#[derive(Debug, Clone)]
pub struct StyleConfig {
    /// Properties applied after every other property, whatever their
    /// position in the node's property list
    pub deferred_properties: Vec<String>,
    /// Font used when neither the node nor any ancestor provides one
    pub default_font: Font,
    /// Maximum chain length of lookup references
    pub max_lookup_depth: usize,
    /// Keep diagnostics for later inspection
    pub collect_errors: bool,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleConfig {
    pub fn new() -> Self {
        Self {
            deferred_properties: Vec::new(),
            default_font: Font::default(),
            max_lookup_depth: DEFAULT_MAX_LOOKUP_DEPTH,
            collect_errors: true,
        }
    }

    /// Apply `property` last during every transition
    pub fn with_deferred_property(mut self, property: impl Into<String>) -> Self {
        self.deferred_properties.push(property.into());
        self
    }

    pub fn with_default_font(mut self, font: Font) -> Self {
        self.default_font = font;
        self
    }

    pub fn with_max_lookup_depth(mut self, depth: usize) -> Self {
        self.max_lookup_depth = depth.max(1);
        self
    }

    pub fn with_collect_errors(mut self, collect: bool) -> Self {
        self.collect_errors = collect;
        self
    }

    /// Whether `property` is held back until the end of a transition
    pub fn is_deferred(&self, property: &str) -> bool {
        self.deferred_properties.iter().any(|p| p == property)
    }
}
