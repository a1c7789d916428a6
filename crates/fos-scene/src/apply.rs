//! CSS Application Pass
//!
//! Walks a subtree parents first. Nodes whose shape changed, or whose helper
//! belongs to an older cache generation, are matched again; every node is
//! then transitioned to its current pseudo-class state and the resulting
//! values are written back.

use fos_style::{
    CssError, StyleError, StyleHelper, StyleManager, StyleUpdate, StyleValue, Styleable,
};

use crate::{NodeId, SceneError, SceneGraph};

/// Work done by one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub nodes_visited: usize,
    pub helpers_created: usize,
    pub values_applied: usize,
    /// Values rejected by the property's type
    pub values_rejected: usize,
}

/// Style `root` and its descendants
pub fn apply_css(
    graph: &mut SceneGraph,
    root: NodeId,
    manager: &StyleManager,
) -> Result<ApplyStats, SceneError> {
    let mut stats = ApplyStats::default();
    let generation = manager.generation();

    // (node, an ancestor was matched again in this pass)
    let mut stack = vec![(root, false)];
    graph.get(root)?;

    while let Some((id, ancestor_rematched)) = stack.pop() {
        stats.nodes_visited += 1;

        let node = graph.get(id)?;
        let stale = node.style_helper().is_none_or(|h| h.generation() != generation);
        let rematch = ancestor_rematched || node.needs_reapply() || stale;
        if rematch {
            rematch_node(graph, id, manager)?;
            stats.helpers_created += 1;
        }

        let updates = match transition(graph, id, manager) {
            Err(SceneError::Style(StyleError::StaleCache { .. })) => {
                rematch_node(graph, id, manager)?;
                stats.helpers_created += 1;
                transition(graph, id, manager)?
            }
            result => result?,
        };
        write_back(graph, id, updates, manager, &mut stats)?;

        let children = graph.get(id)?.children();
        stack.extend(children.iter().rev().map(|&child| (child, rematch)));
    }

    tracing::debug!(
        "Applied CSS to {} nodes ({} matched, {} values)",
        stats.nodes_visited,
        stats.helpers_created,
        stats.values_applied
    );
    Ok(stats)
}

fn rematch_node(
    graph: &mut SceneGraph,
    id: NodeId,
    manager: &StyleManager,
) -> Result<(), SceneError> {
    let helper = StyleHelper::create(&graph.node(id)?, manager);
    let node = graph.get_mut(id)?;
    node.helper = Some(helper);
    node.needs_reapply = false;
    Ok(())
}

fn transition(
    graph: &SceneGraph,
    id: NodeId,
    manager: &StyleManager,
) -> Result<Vec<StyleUpdate>, SceneError> {
    let node = graph.node(id)?;
    match graph.get(id)?.style_helper() {
        Some(helper) => Ok(helper.transition_to_state(&node, manager)?),
        None => Ok(Vec::new()),
    }
}

fn write_back(
    graph: &mut SceneGraph,
    id: NodeId,
    updates: Vec<StyleUpdate>,
    manager: &StyleManager,
    stats: &mut ApplyStats,
) -> Result<(), SceneError> {
    let description = graph.node(id)?.describe();
    let node = graph.get_mut(id)?;
    for update in updates {
        let expected = node.meta(&update.property).map(|m| m.initial_value().kind());
        if let Some(expected) = expected {
            if !compatible(expected, &update.value) {
                manager.report_error(CssError::PropertySet {
                    node: description.clone(),
                    property: update.property.clone(),
                    message: format!("expected {expected}, found {}", update.value.kind()),
                });
                stats.values_rejected += 1;
                continue;
            }
        }
        node.set_styled_value(&update.property, update.value, update.origin);
        node.set_applied_styles(&update.property, update.styles);
        stats.values_applied += 1;
    }
    Ok(())
}

fn compatible(expected: &str, value: &StyleValue) -> bool {
    let kind = value.kind();
    kind == expected
        || kind == "null"
        || expected == "null"
        || matches!((expected, kind), ("number", "percent") | ("percent", "number"))
}
