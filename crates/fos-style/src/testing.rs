//! In-memory tree for unit tests

use std::collections::HashMap;
use std::sync::Arc;

use crate::bitset::{PseudoClassSet, StyleClassSet};
use crate::helper::StyleHelper;
use crate::manager::{ScopeId, StyleManager};
use crate::node::Styleable;
use crate::property::CssMetaData;
use crate::pseudo_class::{PseudoClass, StyleClass};
use crate::rule::Origin;
use crate::value::Font;

#[derive(Default)]
pub(crate) struct MockNode {
    type_name: String,
    id: Option<String>,
    classes: StyleClassSet,
    states: PseudoClassSet,
    parent: Option<usize>,
    inline: Option<String>,
    meta: Vec<Arc<CssMetaData>>,
    origins: HashMap<String, Origin>,
    font: Option<(Font, Option<Origin>)>,
    helper: Option<StyleHelper>,
    scope: Option<ScopeId>,
    observer: bool,
}

#[derive(Default)]
pub(crate) struct MockTree {
    nodes: Vec<MockNode>,
}

impl MockTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, type_name: &str, parent: Option<usize>) -> usize {
        self.nodes.push(MockNode {
            type_name: type_name.to_string(),
            parent,
            ..Default::default()
        });
        self.nodes.len() - 1
    }

    pub fn set_id(&mut self, node: usize, id: &str) {
        self.nodes[node].id = Some(id.to_string());
    }

    pub fn add_class(&mut self, node: usize, class: &str) {
        self.nodes[node].classes.add(StyleClass::intern(class).unwrap());
    }

    pub fn set_state(&mut self, node: usize, state: &str, active: bool) {
        let pc = PseudoClass::intern(state).unwrap();
        if active {
            self.nodes[node].states.add(pc);
        } else {
            self.nodes[node].states.remove(pc);
        }
    }

    pub fn set_inline(&mut self, node: usize, style: &str) {
        self.nodes[node].inline = Some(style.to_string());
    }

    pub fn set_meta(&mut self, node: usize, meta: Vec<Arc<CssMetaData>>) {
        self.nodes[node].meta = meta;
    }

    pub fn set_origin(&mut self, node: usize, property: &str, origin: Origin) {
        self.nodes[node].origins.insert(property.to_string(), origin);
    }

    pub fn set_font(&mut self, node: usize, font: Font, origin: Option<Origin>) {
        self.nodes[node].font = Some((font, origin));
    }

    pub fn set_scope(&mut self, node: usize, scope: ScopeId) {
        self.nodes[node].scope = Some(scope);
    }

    pub fn set_observer(&mut self, node: usize, observer: bool) {
        self.nodes[node].observer = observer;
    }

    pub fn node(&self, node: usize) -> MockRef<'_> {
        MockRef { tree: self, index: node }
    }

    /// Create (or recreate) the helper for `node`
    pub fn attach_helper(&mut self, node: usize, manager: &StyleManager) {
        let helper = StyleHelper::create(&self.node(node), manager);
        self.nodes[node].helper = Some(helper);
    }

    /// Attach helpers to `nodes`, parents first
    pub fn attach_all(&mut self, nodes: &[usize], manager: &StyleManager) {
        for &n in nodes {
            self.attach_helper(n, manager);
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) struct MockRef<'a> {
    tree: &'a MockTree,
    index: usize,
}

impl MockRef<'_> {
    fn data(&self) -> &MockNode {
        &self.tree.nodes[self.index]
    }
}

impl Styleable for MockRef<'_> {
    fn type_name(&self) -> &str {
        &self.data().type_name
    }

    fn id(&self) -> Option<&str> {
        self.data().id.as_deref()
    }

    fn style_classes(&self) -> &StyleClassSet {
        &self.data().classes
    }

    fn pseudo_class_states(&self) -> &PseudoClassSet {
        &self.data().states
    }

    fn parent(&self) -> Option<Self> {
        self.data().parent.map(|index| MockRef { tree: self.tree, index })
    }

    fn inline_style(&self) -> Option<&str> {
        self.data().inline.as_deref()
    }

    fn style_helper(&self) -> Option<&StyleHelper> {
        self.data().helper.as_ref()
    }

    fn css_meta_data(&self) -> &[Arc<CssMetaData>] {
        &self.data().meta
    }

    fn property_origin(&self, property: &str) -> Option<Origin> {
        self.data().origins.get(property).copied()
    }

    fn font_property(&self) -> Option<(Font, Option<Origin>)> {
        self.data().font.clone()
    }

    fn has_style_observer(&self) -> bool {
        self.data().observer
    }

    fn style_scope(&self) -> Option<ScopeId> {
        self.data().scope
    }
}
