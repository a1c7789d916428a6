//! Styleable Node Contract
//!
//! The engine never owns the tree. Anything that can answer these queries
//! (a handle into an arena, a reference-counted node) can be styled.

use std::sync::Arc;

use crate::bitset::{PseudoClassSet, StyleClassSet};
use crate::helper::StyleHelper;
use crate::manager::ScopeId;
use crate::property::CssMetaData;
use crate::rule::Origin;
use crate::value::Font;

/// A node in the styled tree
pub trait Styleable: Clone {
    /// Fully qualified type name, e.g. `controls.Button`
    fn type_name(&self) -> &str;

    fn id(&self) -> Option<&str>;

    fn style_classes(&self) -> &StyleClassSet;

    /// Currently active pseudo-classes
    fn pseudo_class_states(&self) -> &PseudoClassSet;

    fn parent(&self) -> Option<Self>;

    /// Declarations from the node's `style` attribute
    fn inline_style(&self) -> Option<&str> {
        None
    }

    /// Helper attached by the last styling pass
    fn style_helper(&self) -> Option<&StyleHelper> {
        None
    }

    /// Properties this node exposes to styling, in application order
    fn css_meta_data(&self) -> &[Arc<CssMetaData>];

    /// Origin of the value currently held by `property`
    fn property_origin(&self, _property: &str) -> Option<Origin> {
        None
    }

    /// False for properties that cannot take a styled value (e.g. bound)
    fn is_settable(&self, _property: &str) -> bool {
        true
    }

    /// The node's own font value, if it exposes one
    fn font_property(&self) -> Option<(Font, Option<Origin>)> {
        None
    }

    /// Someone wants to know which styles produced each value
    fn has_style_observer(&self) -> bool {
        false
    }

    /// Scope of stylesheets owned by this node
    fn style_scope(&self) -> Option<ScopeId> {
        None
    }

    /// Short description used in diagnostics
    fn describe(&self) -> String {
        match self.id() {
            Some(id) => format!("{}#{}", self.type_name(), id),
            None => self.type_name().to_string(),
        }
    }
}
