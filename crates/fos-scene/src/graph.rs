//! Scene Graph (arena-based allocation)

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use fos_style::{
    CssMetaData, FONT, Font, Origin, PseudoClass, PseudoClassSet, ScopeId, Style, StyleClass,
    StyleClassSet, StyleHelper, StyleValue, Styleable,
};

use crate::{NodeId, SceneError};

/// A property value and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValue {
    pub value: StyleValue,
    /// `None` once a style reset the property to its initial value
    pub origin: Option<Origin>,
}

/// A styleable node
#[derive(Debug)]
pub struct SceneNode {
    type_name: String,
    id: Option<String>,
    classes: StyleClassSet,
    states: PseudoClassSet,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    inline_style: Option<String>,
    meta: Vec<Arc<CssMetaData>>,
    values: HashMap<String, PropertyValue>,
    bound: HashSet<String>,
    scope: Option<ScopeId>,
    observed: bool,
    applied_styles: HashMap<String, Vec<Style>>,
    pub(crate) helper: Option<StyleHelper>,
    pub(crate) needs_reapply: bool,
}

impl SceneNode {
    fn new(type_name: &str, parent: Option<NodeId>) -> Self {
        Self {
            type_name: type_name.to_string(),
            id: None,
            classes: StyleClassSet::new(),
            states: PseudoClassSet::new(),
            parent,
            children: Vec::new(),
            inline_style: None,
            meta: Vec::new(),
            values: HashMap::new(),
            bound: HashSet::new(),
            scope: None,
            observed: false,
            applied_styles: HashMap::new(),
            helper: None,
            needs_reapply: true,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn style_classes(&self) -> &StyleClassSet {
        &self.classes
    }

    pub fn pseudo_class_states(&self) -> &PseudoClassSet {
        &self.states
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.inline_style.as_deref()
    }

    pub fn css_meta_data(&self) -> &[Arc<CssMetaData>] {
        &self.meta
    }

    /// Current value of `property`
    pub fn value(&self, property: &str) -> Option<&PropertyValue> {
        self.values.get(property)
    }

    /// Styles that produced the last styled value of `property`; only
    /// kept while the node is observed
    pub fn applied_styles(&self, property: &str) -> Option<&[Style]> {
        self.applied_styles.get(property).map(Vec::as_slice)
    }

    pub fn style_helper(&self) -> Option<&StyleHelper> {
        self.helper.as_ref()
    }

    pub fn needs_reapply(&self) -> bool {
        self.needs_reapply
    }

    pub(crate) fn meta(&self, property: &str) -> Option<&Arc<CssMetaData>> {
        self.meta.iter().find(|m| m.name() == property)
    }

    pub(crate) fn set_styled_value(
        &mut self,
        property: &str,
        value: StyleValue,
        origin: Option<Origin>,
    ) {
        self.values.insert(property.to_string(), PropertyValue { value, origin });
    }

    pub(crate) fn set_applied_styles(&mut self, property: &str, styles: Option<Vec<Style>>) {
        match styles {
            Some(styles) => {
                self.applied_styles.insert(property.to_string(), styles);
            }
            None => {
                self.applied_styles.remove(property);
            }
        }
    }
}

/// Arena of styleable nodes
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Add a node under `parent`, or as a new root
    pub fn add_node(
        &mut self,
        type_name: &str,
        parent: Option<NodeId>,
    ) -> Result<NodeId, SceneError> {
        if let Some(p) = parent {
            self.get(p)?;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(SceneNode::new(type_name, parent));
        if let Some(p) = parent {
            self.get_mut(p)?.children.push(id);
        }
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> Result<&SceneNode, SceneError> {
        self.nodes.get(id.index()).ok_or(SceneError::UnknownNode(id))
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Result<&mut SceneNode, SceneError> {
        self.nodes.get_mut(id.index()).ok_or(SceneError::UnknownNode(id))
    }

    /// Styleable view of a node
    pub fn node(&self, id: NodeId) -> Result<NodeRef<'_>, SceneError> {
        self.get(id)?;
        Ok(NodeRef { graph: self, id })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `root` and its descendants, parents before children
    pub fn preorder(&self, root: NodeId) -> Result<Vec<NodeId>, SceneError> {
        self.get(root)?;
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.index()].children.iter().rev());
        }
        Ok(order)
    }

    /// Flag `id` and its subtree for matching on the next pass
    fn invalidate(&mut self, id: NodeId) -> Result<(), SceneError> {
        for n in self.preorder(id)? {
            self.nodes[n.index()].needs_reapply = true;
        }
        Ok(())
    }

    pub fn set_id(&mut self, node: NodeId, id: Option<&str>) -> Result<(), SceneError> {
        self.get_mut(node)?.id = id.map(str::to_string);
        self.invalidate(node)
    }

    pub fn add_style_class(&mut self, node: NodeId, class: &str) -> Result<(), SceneError> {
        let class = StyleClass::intern(class)?;
        if self.get_mut(node)?.classes.add(class) {
            self.invalidate(node)?;
        }
        Ok(())
    }

    pub fn remove_style_class(&mut self, node: NodeId, class: &str) -> Result<(), SceneError> {
        let Some(class) = StyleClass::lookup(class) else {
            return Ok(());
        };
        if self.get_mut(node)?.classes.remove(class) {
            self.invalidate(node)?;
        }
        Ok(())
    }

    pub fn set_inline_style(
        &mut self,
        node: NodeId,
        style: Option<&str>,
    ) -> Result<(), SceneError> {
        self.get_mut(node)?.inline_style = style.map(str::to_string);
        self.invalidate(node)
    }

    pub fn set_css_meta_data(
        &mut self,
        node: NodeId,
        meta: Vec<Arc<CssMetaData>>,
    ) -> Result<(), SceneError> {
        self.get_mut(node)?.meta = meta;
        self.invalidate(node)
    }

    pub fn set_style_scope(
        &mut self,
        node: NodeId,
        scope: Option<ScopeId>,
    ) -> Result<(), SceneError> {
        self.get_mut(node)?.scope = scope;
        self.invalidate(node)
    }

    pub fn set_style_observer(&mut self, node: NodeId, observed: bool) -> Result<(), SceneError> {
        let n = self.get_mut(node)?;
        n.observed = observed;
        if !observed {
            n.applied_styles.clear();
        }
        Ok(())
    }

    /// Turn a pseudo-class on or off. Returns whether the state changed.
    /// Values follow on the next pass without rematching.
    pub fn set_pseudo_class_state(
        &mut self,
        node: NodeId,
        pseudo_class: &str,
        active: bool,
    ) -> Result<bool, SceneError> {
        let pc = PseudoClass::intern(pseudo_class)?;
        let n = self.get_mut(node)?;
        Ok(if active { n.states.add(pc) } else { n.states.remove(pc) })
    }

    /// Set a value from application code; styles of lower rank than the
    /// user origin no longer override it
    pub fn set_user_value(
        &mut self,
        node: NodeId,
        property: &str,
        value: StyleValue,
    ) -> Result<(), SceneError> {
        self.get_mut(node)?.set_styled_value(property, value, Some(Origin::User));
        Ok(())
    }

    /// Bind `property` to something else; styling leaves it alone
    pub fn bind_property(&mut self, node: NodeId, property: &str) -> Result<(), SceneError> {
        self.get_mut(node)?.bound.insert(property.to_string());
        Ok(())
    }

    pub fn unbind_property(&mut self, node: NodeId, property: &str) -> Result<(), SceneError> {
        self.get_mut(node)?.bound.remove(property);
        Ok(())
    }
}

/// Borrowed handle implementing [`Styleable`]
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    graph: &'a SceneGraph,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    fn data(&self) -> &'a SceneNode {
        &self.graph.nodes[self.id.index()]
    }
}

impl Styleable for NodeRef<'_> {
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
        self.data().parent.map(|id| NodeRef { graph: self.graph, id })
    }

    fn inline_style(&self) -> Option<&str> {
        self.data().inline_style.as_deref()
    }

    fn style_helper(&self) -> Option<&StyleHelper> {
        self.data().helper.as_ref()
    }

    fn css_meta_data(&self) -> &[Arc<CssMetaData>] {
        &self.data().meta
    }

    fn property_origin(&self, property: &str) -> Option<Origin> {
        self.data().values.get(property).and_then(|v| v.origin)
    }

    fn is_settable(&self, property: &str) -> bool {
        !self.data().bound.contains(property)
    }

    fn font_property(&self) -> Option<(Font, Option<Origin>)> {
        let value = self.data().values.get(FONT)?;
        value.value.as_font().map(|font| (font.clone(), value.origin))
    }

    fn has_style_observer(&self) -> bool {
        self.data().observed
    }

    fn style_scope(&self) -> Option<ScopeId> {
        self.data().scope
    }

    fn describe(&self) -> String {
        match self.data().id.as_deref() {
            Some(id) => format!("{}#{}", self.data().type_name, id),
            None => format!("{}[{}]", self.data().type_name, self.id.index()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_structure() {
        let mut graph = SceneGraph::new();
        let root = graph.add_node("Pane", None).unwrap();
        let a = graph.add_node("Label", Some(root)).unwrap();
        let b = graph.add_node("Button", Some(root)).unwrap();
        let c = graph.add_node("Text", Some(a)).unwrap();

        assert_eq!(graph.len(), 4);
        assert_eq!(graph.get(root).unwrap().children(), &[a, b]);
        assert_eq!(graph.preorder(root).unwrap(), vec![root, a, c, b]);
        assert_eq!(graph.node(c).unwrap().parent().map(|p| p.node_id()), Some(a));
    }

    #[test]
    fn test_unknown_node() {
        let mut graph = SceneGraph::new();
        let bogus = NodeId(3);
        assert_eq!(
            graph.add_node("Label", Some(bogus)).unwrap_err(),
            SceneError::UnknownNode(bogus)
        );
        assert!(graph.get(bogus).is_err());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_shape_changes_invalidate_subtree() {
        let mut graph = SceneGraph::new();
        let root = graph.add_node("Pane", None).unwrap();
        let leaf = graph.add_node("Label", Some(root)).unwrap();
        for id in [root, leaf] {
            graph.get_mut(id).unwrap().needs_reapply = false;
        }

        graph.add_style_class(root, "sg-card").unwrap();
        assert!(graph.get(root).unwrap().needs_reapply());
        assert!(graph.get(leaf).unwrap().needs_reapply());
    }

    #[test]
    fn test_pseudo_class_state_does_not_invalidate() {
        let mut graph = SceneGraph::new();
        let n = graph.add_node("Button", None).unwrap();
        graph.get_mut(n).unwrap().needs_reapply = false;

        assert!(graph.set_pseudo_class_state(n, "sg-pressed", true).unwrap());
        assert!(!graph.set_pseudo_class_state(n, "sg-pressed", true).unwrap());
        assert!(!graph.get(n).unwrap().needs_reapply());
        let pressed = PseudoClass::lookup("sg-pressed").unwrap();
        assert!(graph.get(n).unwrap().pseudo_class_states().contains(pressed));
    }

    #[test]
    fn test_styleable_view() {
        let mut graph = SceneGraph::new();
        let n = graph.add_node("controls.Label", None).unwrap();
        graph.set_user_value(n, "-x", StyleValue::Number(1.0)).unwrap();
        graph.set_user_value(n, FONT, StyleValue::Font(Font::new("Mono", 18.0))).unwrap();
        graph.bind_property(n, "-bound").unwrap();

        let node = graph.node(n).unwrap();
        assert_eq!(node.property_origin("-x"), Some(Origin::User));
        assert_eq!(node.property_origin("-y"), None);
        assert!(!node.is_settable("-bound"));
        assert_eq!(node.font_property().unwrap().0.size, 18.0);
        assert_eq!(node.describe(), "controls.Label[0]");
    }
}
