//! End-to-end styling tests for fos-scene
//!
//! Builds small scene graphs, registers stylesheets and checks the values
//! written back by `apply_css`.

use std::sync::Arc;

use fos_scene::{NodeId, SceneGraph, apply_css};
use fos_style::{
    Color, Converter, CssError, CssMetaData, LoadError, Origin, ScopeId, StyleConfig, StyleManager,
    StyleValue, Stylesheet, parse_stylesheet,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn manager_with(css: &str, origin: Origin) -> StyleManager {
    init_tracing();
    let mut manager = StyleManager::new();
    manager.add_stylesheet(parse_stylesheet(css, origin, None).unwrap());
    manager
}

fn number(name: &str, initial: f64) -> Arc<CssMetaData> {
    Arc::new(CssMetaData::new(name, Converter::Number, StyleValue::Number(initial)))
}

fn size(name: &str) -> Arc<CssMetaData> {
    Arc::new(CssMetaData::new(name, Converter::Size, StyleValue::Number(0.0)))
}

fn text_fill() -> Arc<CssMetaData> {
    Arc::new(
        CssMetaData::new("-fx-text-fill", Converter::Color, StyleValue::Color(Color::BLACK))
            .with_inherits(true),
    )
}

fn value(graph: &SceneGraph, node: NodeId, property: &str) -> Option<StyleValue> {
    graph.get(node).unwrap().value(property).map(|v| v.value.clone())
}

fn origin(graph: &SceneGraph, node: NodeId, property: &str) -> Option<Origin> {
    graph.get(node).unwrap().value(property).and_then(|v| v.origin)
}

#[test]
fn test_important_beats_specificity() {
    let manager = manager_with(".st-a { -x: 1; } .st-a.st-b { -x: 2 !important; }", Origin::Author);
    let mut graph = SceneGraph::new();
    let n = graph.add_node("Label", None).unwrap();
    graph.add_style_class(n, "st-a").unwrap();
    graph.add_style_class(n, "st-b").unwrap();
    graph.set_css_meta_data(n, vec![number("-x", 0.0)]).unwrap();

    apply_css(&mut graph, n, &manager).unwrap();
    assert_eq!(value(&graph, n, "-x"), Some(StyleValue::Number(2.0)));
}

#[test]
fn test_id_beats_type() {
    let manager = manager_with("#st-main { -y: 10px; } Type { -y: 20px; }", Origin::Author);
    let mut graph = SceneGraph::new();
    let n = graph.add_node("Type", None).unwrap();
    graph.set_id(n, Some("st-main")).unwrap();
    graph.set_css_meta_data(n, vec![size("-y")]).unwrap();

    apply_css(&mut graph, n, &manager).unwrap();
    assert_eq!(value(&graph, n, "-y"), Some(StyleValue::Number(10.0)));
}

#[test]
fn test_inherited_color_keeps_origin() {
    let manager = manager_with("Pane { -fx-text-fill: red; }", Origin::Author);
    let mut graph = SceneGraph::new();
    let root = graph.add_node("Pane", None).unwrap();
    let child = graph.add_node("Label", Some(root)).unwrap();
    for n in [root, child] {
        graph.set_css_meta_data(n, vec![text_fill()]).unwrap();
    }

    apply_css(&mut graph, root, &manager).unwrap();
    assert_eq!(
        value(&graph, child, "-fx-text-fill"),
        Some(StyleValue::Color(Color::rgb(255, 0, 0)))
    );
    assert_eq!(origin(&graph, child, "-fx-text-fill"), Some(Origin::Author));
}

#[test]
fn test_user_value_survives_user_agent_style() {
    let manager = manager_with("Label { -fx-opacity: 0.5; }", Origin::UserAgent);
    let mut graph = SceneGraph::new();
    let n = graph.add_node("Label", None).unwrap();
    graph.set_css_meta_data(n, vec![number("-fx-opacity", 1.0)]).unwrap();
    graph.set_user_value(n, "-fx-opacity", StyleValue::Number(1.0)).unwrap();

    apply_css(&mut graph, n, &manager).unwrap();
    assert_eq!(value(&graph, n, "-fx-opacity"), Some(StyleValue::Number(1.0)));
    assert_eq!(origin(&graph, n, "-fx-opacity"), Some(Origin::User));
}

#[test]
fn test_user_agent_style_applies_without_user_value() {
    let manager = manager_with("Label { -fx-opacity: 0.5; }", Origin::UserAgent);
    let mut graph = SceneGraph::new();
    let n = graph.add_node("Label", None).unwrap();
    graph.set_css_meta_data(n, vec![number("-fx-opacity", 1.0)]).unwrap();

    apply_css(&mut graph, n, &manager).unwrap();
    assert_eq!(value(&graph, n, "-fx-opacity"), Some(StyleValue::Number(0.5)));
    assert_eq!(origin(&graph, n, "-fx-opacity"), Some(Origin::UserAgent));
}

#[test]
fn test_em_relative_to_font_size() {
    let manager = manager_with("Label { -fx-font-size: 20px; -fx-padding: 2em; }", Origin::Author);
    let mut graph = SceneGraph::new();
    let n = graph.add_node("Label", None).unwrap();
    graph
        .set_css_meta_data(n, vec![Arc::new(CssMetaData::font()), size("-fx-padding")])
        .unwrap();

    apply_css(&mut graph, n, &manager).unwrap();
    assert_eq!(value(&graph, n, "-fx-padding"), Some(StyleValue::Number(40.0)));
    let font = value(&graph, n, fos_style::FONT).unwrap();
    assert_eq!(font.as_font().unwrap().size, 20.0);
}

#[test]
fn test_second_pass_hits_caches() {
    let manager = manager_with("Label { -x: 3; } Pane { -x: 4; }", Origin::Author);
    let mut graph = SceneGraph::new();
    let root = graph.add_node("Pane", None).unwrap();
    let a = graph.add_node("Label", Some(root)).unwrap();
    let b = graph.add_node("Label", Some(root)).unwrap();
    for n in [root, a, b] {
        graph.set_css_meta_data(n, vec![number("-x", 0.0)]).unwrap();
    }

    let first = apply_css(&mut graph, root, &manager).unwrap();
    assert_eq!(first.helpers_created, 3);
    let builds = manager.stats().style_map_builds;
    assert_eq!(builds, 2);

    let second = apply_css(&mut graph, root, &manager).unwrap();
    assert_eq!(second.helpers_created, 0);
    assert_eq!(manager.stats().style_map_builds, builds);
    assert_eq!(value(&graph, a, "-x"), Some(StyleValue::Number(3.0)));
    assert_eq!(value(&graph, root, "-x"), Some(StyleValue::Number(4.0)));
    // b reused a's value on the first pass; everything hits on the second
    assert!(manager.stats().value_hits >= 4);
}

#[test]
fn test_hover_then_reset_to_initial() {
    let manager = manager_with("Button:st-hover { -x: 7; }", Origin::Author);
    let mut graph = SceneGraph::new();
    let n = graph.add_node("Button", None).unwrap();
    graph.set_css_meta_data(n, vec![number("-x", 1.0)]).unwrap();

    graph.set_pseudo_class_state(n, "st-hover", true).unwrap();
    apply_css(&mut graph, n, &manager).unwrap();
    assert_eq!(value(&graph, n, "-x"), Some(StyleValue::Number(7.0)));

    graph.set_pseudo_class_state(n, "st-hover", false).unwrap();
    let stats = apply_css(&mut graph, n, &manager).unwrap();
    assert_eq!(stats.helpers_created, 0);
    assert_eq!(value(&graph, n, "-x"), Some(StyleValue::Number(1.0)));
    assert_eq!(origin(&graph, n, "-x"), None);
}

#[test]
fn test_lookup_defined_on_root() {
    let manager = manager_with(
        ".st-root { -st-accent: #0000ff; } Label { -fx-text-fill: -st-accent; }",
        Origin::Author,
    );
    let mut graph = SceneGraph::new();
    let root = graph.add_node("Pane", None).unwrap();
    graph.add_style_class(root, "st-root").unwrap();
    let label = graph.add_node("Label", Some(root)).unwrap();
    graph.set_css_meta_data(label, vec![text_fill()]).unwrap();

    apply_css(&mut graph, root, &manager).unwrap();
    assert_eq!(
        value(&graph, label, "-fx-text-fill"),
        Some(StyleValue::Color(Color::rgb(0, 0, 255)))
    );
    assert!(manager.errors().is_empty());
}

#[test]
fn test_inline_style_and_its_removal() {
    let manager = manager_with("Label { -x: 1; }", Origin::Author);
    let mut graph = SceneGraph::new();
    let n = graph.add_node("Label", None).unwrap();
    graph.set_css_meta_data(n, vec![number("-x", 0.0)]).unwrap();
    graph.set_inline_style(n, Some("-x: 5")).unwrap();

    apply_css(&mut graph, n, &manager).unwrap();
    assert_eq!(value(&graph, n, "-x"), Some(StyleValue::Number(5.0)));
    assert_eq!(origin(&graph, n, "-x"), Some(Origin::Inline));

    graph.set_inline_style(n, None).unwrap();
    let stats = apply_css(&mut graph, n, &manager).unwrap();
    assert_eq!(stats.helpers_created, 1);
    assert_eq!(value(&graph, n, "-x"), Some(StyleValue::Number(1.0)));
    assert_eq!(origin(&graph, n, "-x"), Some(Origin::Author));
}

#[test]
fn test_bad_inline_style_is_reported() {
    let manager = manager_with("Label { -x: 1; }", Origin::Author);
    let mut graph = SceneGraph::new();
    let n = graph.add_node("Label", None).unwrap();
    graph.set_css_meta_data(n, vec![number("-x", 0.0)]).unwrap();
    graph.set_inline_style(n, Some("-x 5")).unwrap();

    apply_css(&mut graph, n, &manager).unwrap();
    assert_eq!(value(&graph, n, "-x"), Some(StyleValue::Number(1.0)));
    assert!(matches!(&manager.errors()[..], [CssError::InlineStyleParse { .. }]));
}

#[test]
fn test_failed_stylesheet_load_is_not_fatal() {
    init_tracing();
    let mut manager = StyleManager::new();
    let loader = |url: &str, origin: Origin| -> Result<Arc<Stylesheet>, LoadError> {
        match url {
            "theme.css" => Ok(parse_stylesheet("Label { -x: 2; }", origin, Some(url.to_string()))?),
            _ => Err(format!("{url}: not found").into()),
        }
    };
    manager.load_stylesheet(&loader, "theme.css", Origin::Author);
    manager.load_stylesheet(&loader, "missing.css", Origin::Author);

    let mut graph = SceneGraph::new();
    let n = graph.add_node("Label", None).unwrap();
    graph.set_css_meta_data(n, vec![number("-x", 0.0)]).unwrap();
    apply_css(&mut graph, n, &manager).unwrap();

    assert_eq!(value(&graph, n, "-x"), Some(StyleValue::Number(2.0)));
    assert_eq!(manager.stylesheets().count(), 2);
    assert!(matches!(
        &manager.errors()[..],
        [CssError::StylesheetLoad { url, .. }] if url == "missing.css"
    ));
}

#[test]
fn test_new_stylesheet_restyles_everything() {
    let mut manager = manager_with("Label { -x: 1; }", Origin::Author);
    let mut graph = SceneGraph::new();
    let n = graph.add_node("Label", None).unwrap();
    graph.set_css_meta_data(n, vec![number("-x", 0.0)]).unwrap();
    apply_css(&mut graph, n, &manager).unwrap();

    manager.add_stylesheet(parse_stylesheet("Label { -x: 9; }", Origin::Author, None).unwrap());
    let stats = apply_css(&mut graph, n, &manager).unwrap();
    assert_eq!(stats.helpers_created, 1);
    assert_eq!(value(&graph, n, "-x"), Some(StyleValue::Number(9.0)));
}

#[test]
fn test_bound_property_is_left_alone() {
    let manager = manager_with("Label { -x: 1; -y: 2; }", Origin::Author);
    let mut graph = SceneGraph::new();
    let n = graph.add_node("Label", None).unwrap();
    graph.set_css_meta_data(n, vec![number("-x", 0.0), number("-y", 0.0)]).unwrap();
    graph.bind_property(n, "-x").unwrap();

    apply_css(&mut graph, n, &manager).unwrap();
    assert_eq!(value(&graph, n, "-x"), None);
    assert_eq!(value(&graph, n, "-y"), Some(StyleValue::Number(2.0)));
}

#[test]
fn test_type_mismatch_is_rejected() {
    let manager = manager_with("Label { -x: fancy; }", Origin::Author);
    let mut graph = SceneGraph::new();
    let n = graph.add_node("Label", None).unwrap();
    let meta = Arc::new(CssMetaData::new("-x", Converter::Ident, StyleValue::Number(0.0)));
    graph.set_css_meta_data(n, vec![meta]).unwrap();

    let stats = apply_css(&mut graph, n, &manager).unwrap();
    assert_eq!(stats.values_rejected, 1);
    assert_eq!(value(&graph, n, "-x"), None);
    assert!(matches!(
        &manager.errors()[..],
        [CssError::PropertySet { property, .. }] if property == "-x"
    ));
}

#[test]
fn test_scoped_stylesheet() {
    init_tracing();
    let mut manager = StyleManager::new();
    manager.add_scoped_stylesheet(
        ScopeId(1),
        parse_stylesheet("Label { -x: 8; }", Origin::Author, None).unwrap(),
    );

    let mut graph = SceneGraph::new();
    let root = graph.add_node("Pane", None).unwrap();
    let owner = graph.add_node("Pane", Some(root)).unwrap();
    graph.set_style_scope(owner, Some(ScopeId(1))).unwrap();
    let inside = graph.add_node("Label", Some(owner)).unwrap();
    let outside = graph.add_node("Label", Some(root)).unwrap();
    for n in [inside, outside] {
        graph.set_css_meta_data(n, vec![number("-x", 0.0)]).unwrap();
    }

    apply_css(&mut graph, root, &manager).unwrap();
    assert_eq!(value(&graph, inside, "-x"), Some(StyleValue::Number(8.0)));
    assert_eq!(value(&graph, outside, "-x"), None);
}

#[test]
fn test_observer_records_applied_styles() {
    let manager = manager_with("Label { -x: 1; } #st-obs { -x: 2; }", Origin::Author);
    let mut graph = SceneGraph::new();
    let n = graph.add_node("Label", None).unwrap();
    graph.set_id(n, Some("st-obs")).unwrap();
    graph.set_css_meta_data(n, vec![number("-x", 0.0)]).unwrap();
    graph.set_style_observer(n, true).unwrap();

    apply_css(&mut graph, n, &manager).unwrap();
    let styles = graph.get(n).unwrap().applied_styles("-x").unwrap();
    assert_eq!(styles.len(), 1);
    assert_eq!(styles[0].selector().to_string(), "#st-obs");
}

#[test]
fn test_deferred_property_applied_last() {
    init_tracing();
    let config = StyleConfig::new().with_deferred_property("-st-skin");
    let mut manager = StyleManager::with_config(config);
    let css = "Label { -st-skin: plain; -x: 1; }";
    manager.add_stylesheet(parse_stylesheet(css, Origin::Author, None).unwrap());

    let mut graph = SceneGraph::new();
    let n = graph.add_node("Label", None).unwrap();
    let skin = Arc::new(CssMetaData::new("-st-skin", Converter::Ident, StyleValue::Null));
    graph.set_css_meta_data(n, vec![skin, number("-x", 0.0)]).unwrap();

    let node = graph.node(n).unwrap();
    let helper = fos_style::StyleHelper::create(&node, &manager);
    let order: Vec<String> = helper
        .transition_to_state(&node, &manager)
        .unwrap()
        .into_iter()
        .map(|u| u.property)
        .collect();
    assert_eq!(order, vec!["-x".to_string(), "-st-skin".to_string()]);
}

/// Pane > [Group > Label, Group > Label], all carrying `-fx-text-fill`.
fn two_groups(graph: &mut SceneGraph) -> (NodeId, [NodeId; 2], [NodeId; 2]) {
    let root = graph.add_node("Pane", None).unwrap();
    let groups = [
        graph.add_node("Group", Some(root)).unwrap(),
        graph.add_node("Group", Some(root)).unwrap(),
    ];
    let labels = [
        graph.add_node("Label", Some(groups[0])).unwrap(),
        graph.add_node("Label", Some(groups[1])).unwrap(),
    ];
    for n in [root, groups[0], groups[1], labels[0], labels[1]] {
        graph.set_css_meta_data(n, vec![text_fill()]).unwrap();
    }
    (root, groups, labels)
}

#[test]
fn test_inherit_through_user_set_ancestor() {
    let red = StyleValue::Color(Color::rgb(255, 0, 0));
    let blue = StyleValue::Color(Color::rgb(0, 0, 255));
    // Both subtrees share a cache key, so the outcome must not depend on
    // which of them is styled first.
    for marked in 0..2 {
        let manager = manager_with("Pane { -fx-text-fill: red; }", Origin::Author);
        let mut graph = SceneGraph::new();
        let (root, groups, labels) = two_groups(&mut graph);
        graph.set_user_value(groups[marked], "-fx-text-fill", blue.clone()).unwrap();

        apply_css(&mut graph, root, &manager).unwrap();
        assert_eq!(value(&graph, groups[marked], "-fx-text-fill"), Some(blue.clone()));
        assert_eq!(origin(&graph, groups[marked], "-fx-text-fill"), Some(Origin::User));
        assert_eq!(value(&graph, groups[1 - marked], "-fx-text-fill"), Some(red.clone()));
        for label in labels {
            let fill = value(&graph, label, "-fx-text-fill");
            assert_eq!(fill, Some(red.clone()), "user value on group {marked}");
            assert_eq!(origin(&graph, label, "-fx-text-fill"), Some(Origin::Author));
        }
    }
}

#[test]
fn test_inherit_through_bound_ancestor() {
    let manager = manager_with("Pane { -fx-text-fill: red; }", Origin::Author);
    let mut graph = SceneGraph::new();
    let (root, groups, labels) = two_groups(&mut graph);
    graph.bind_property(groups[0], "-fx-text-fill").unwrap();

    apply_css(&mut graph, root, &manager).unwrap();
    assert_eq!(value(&graph, groups[0], "-fx-text-fill"), None);
    for label in labels {
        let fill = value(&graph, label, "-fx-text-fill");
        assert_eq!(fill, Some(StyleValue::Color(Color::rgb(255, 0, 0))));
        assert_eq!(origin(&graph, label, "-fx-text-fill"), Some(Origin::Author));
    }
}

#[test]
fn test_inherited_em_follows_child_font() {
    let manager = manager_with(
        "Pane { -fx-font-size: 20px; -st-gap: 1.5em; } Label { -fx-font-size: 10px; }",
        Origin::Author,
    );
    let mut graph = SceneGraph::new();
    let root = graph.add_node("Pane", None).unwrap();
    let child = graph.add_node("Label", Some(root)).unwrap();
    let gap = Arc::new(
        CssMetaData::new("-st-gap", Converter::Size, StyleValue::Number(0.0)).with_inherits(true),
    );
    for n in [root, child] {
        graph.set_css_meta_data(n, vec![Arc::new(CssMetaData::font()), gap.clone()]).unwrap();
    }

    apply_css(&mut graph, root, &manager).unwrap();
    assert_eq!(value(&graph, root, "-st-gap"), Some(StyleValue::Number(30.0)));
    assert_eq!(value(&graph, child, "-st-gap"), Some(StyleValue::Number(15.0)));
}
