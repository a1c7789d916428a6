//! Style Manager
//!
//! Owns the registered stylesheets and every cache derived from them:
//! - one [`SelectorPartitioning`] per stylesheet container
//! - candidate rule lists and style maps per node shape ([`RuleCache`])
//! - the shared value cache ([`StyleCache`])
//! - parsed inline styles, keyed by their literal text
//!
//! Any change to the stylesheet set clears the derived caches wholesale and
//! starts a new cache generation. Helpers from an older generation report
//! [`StyleError::StaleCache`] and must be recreated.
//!
//! The manager is single-threaded: caches live behind `RefCell`s and a
//! styling pass must not run concurrently with another on the same manager.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::bitset::{PseudoClassSet, StyleClassSet};
use crate::cascade::{CascadingStyle, RuleCache, StyleMap};
use crate::config::StyleConfig;
use crate::error::CssError;
use crate::node::Styleable;
use crate::parser::parse_declarations;
use crate::partition::SelectorPartitioning;
use crate::rule::{Declaration, Origin, Rule, Style, Stylesheet};
use crate::selector::{SimpleSelector, short_type_name};
use crate::style_cache::{Generation, StyleCache};

/// Identifies a set of stylesheets owned by one subtree root
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(pub u32);

/// Inline declarations by property, best first for repeated properties
pub type InlineStyles = HashMap<String, CascadingStyle>;

/// Error type returned by stylesheet loaders
pub type LoadError = Box<dyn std::error::Error + Send + Sync>;

/// Fetches and parses stylesheets by url
pub trait StylesheetLoader {
    fn load(&self, url: &str, origin: Origin) -> Result<Arc<Stylesheet>, LoadError>;
}

impl<F> StylesheetLoader for F
where
    F: Fn(&str, Origin) -> Result<Arc<Stylesheet>, LoadError>,
{
    fn load(&self, url: &str, origin: Origin) -> Result<Arc<Stylesheet>, LoadError> {
        self(url, origin)
    }
}

/// Matching instrumentation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    /// Candidate rule lists built from the partitions
    pub candidate_builds: u64,
    /// Style maps built by sorting matched declarations
    pub style_map_builds: u64,
    /// Style maps served from cache
    pub style_map_hits: u64,
    /// Calculated values served from the shared value cache
    pub value_hits: u64,
    pub value_misses: u64,
}

/// Stylesheets of one container and their partition index
#[derive(Debug, Default)]
struct StylesheetContainer {
    stylesheets: Vec<Arc<Stylesheet>>,
    partitioning: SelectorPartitioning,
}

impl StylesheetContainer {
    fn add(&mut self, sheet: Arc<Stylesheet>) {
        for rule in sheet.rules() {
            self.partitioning.add_rule(rule);
        }
        self.stylesheets.push(sheet);
    }

    fn remove(&mut self, sheet: &Arc<Stylesheet>) -> bool {
        let before = self.stylesheets.len();
        self.stylesheets.retain(|s| !Arc::ptr_eq(s, sheet));
        if self.stylesheets.len() == before {
            return false;
        }
        self.partitioning.reset();
        for sheet in &self.stylesheets {
            for rule in sheet.rules() {
                self.partitioning.add_rule(rule);
            }
        }
        true
    }

    fn match_rules(
        &self,
        id: Option<&str>,
        type_name: &str,
        classes: &StyleClassSet,
        out: &mut Vec<Arc<Rule>>,
    ) {
        out.extend(self.partitioning.match_rules(id, type_name, classes));
    }
}

/// Node shape that determines the candidate rules
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ShapeKey {
    type_name: String,
    id: Option<String>,
    classes: StyleClassSet,
    scopes: SmallVec<[ScopeId; 2]>,
}

/// Stylesheet registry and cache owner
#[derive(Debug)]
pub struct StyleManager {
    config: StyleConfig,
    user_agent: StylesheetContainer,
    author: StylesheetContainer,
    scopes: HashMap<ScopeId, StylesheetContainer>,
    rule_caches: RefCell<HashMap<ShapeKey, RuleCache>>,
    value_cache: RefCell<StyleCache>,
    inline_styles: RefCell<HashMap<String, Option<Arc<InlineStyles>>>>,
    next_style_map_id: Cell<u32>,
    errors: RefCell<Vec<CssError>>,
    stats: Cell<MatchStats>,
}

impl Default for StyleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleManager {
    pub fn new() -> Self {
        Self::with_config(StyleConfig::default())
    }

    pub fn with_config(config: StyleConfig) -> Self {
        Self {
            config,
            user_agent: StylesheetContainer::default(),
            author: StylesheetContainer::default(),
            scopes: HashMap::new(),
            rule_caches: RefCell::new(HashMap::new()),
            value_cache: RefCell::new(StyleCache::new()),
            inline_styles: RefCell::new(HashMap::new()),
            next_style_map_id: Cell::new(StyleMap::EMPTY_ID),
            errors: RefCell::new(Vec::new()),
            stats: Cell::new(MatchStats::default()),
        }
    }

    pub fn config(&self) -> &StyleConfig {
        &self.config
    }

    /// Current cache generation
    pub fn generation(&self) -> Generation {
        self.value_cache.borrow().generation()
    }

    // ------------------------------------------------------------------
    // Stylesheet registration
    // ------------------------------------------------------------------

    /// Register a scene-level stylesheet. User-agent sheets go first in
    /// candidate order, everything else after them in registration order.
    pub fn add_stylesheet(&mut self, sheet: Arc<Stylesheet>) {
        tracing::debug!(
            "Adding {:?} stylesheet {} ({} rules)",
            sheet.origin(),
            sheet.url().unwrap_or("<anonymous>"),
            sheet.rules().len()
        );
        match sheet.origin() {
            Origin::UserAgent => self.user_agent.add(sheet),
            _ => self.author.add(sheet),
        }
        self.clear_cache();
    }

    /// Register a stylesheet that only applies to the subtree owning `scope`
    pub fn add_scoped_stylesheet(&mut self, scope: ScopeId, sheet: Arc<Stylesheet>) {
        tracing::debug!("Adding stylesheet to scope {:?}", scope);
        self.scopes.entry(scope).or_default().add(sheet);
        self.clear_cache();
    }

    /// Unregister a stylesheet wherever it was added
    pub fn remove_stylesheet(&mut self, sheet: &Arc<Stylesheet>) -> bool {
        let mut removed = self.user_agent.remove(sheet) | self.author.remove(sheet);
        for container in self.scopes.values_mut() {
            removed |= container.remove(sheet);
        }
        if removed {
            self.clear_cache();
        }
        removed
    }

    /// Drop every stylesheet of a scope, e.g. when its subtree goes away
    pub fn remove_scope(&mut self, scope: ScopeId) -> bool {
        let removed = self.scopes.remove(&scope).is_some();
        if removed {
            self.clear_cache();
        }
        removed
    }

    /// Load through `loader` and register the result. A failed load is
    /// recorded and registered as an empty stylesheet.
    pub fn load_stylesheet(
        &mut self,
        loader: &dyn StylesheetLoader,
        url: &str,
        origin: Origin,
    ) -> Arc<Stylesheet> {
        let sheet = match loader.load(url, origin) {
            Ok(sheet) => sheet,
            Err(err) => {
                self.report_error(CssError::StylesheetLoad {
                    url: url.to_string(),
                    message: err.to_string(),
                });
                Stylesheet::empty(origin, Some(url.to_string()))
            }
        };
        self.add_stylesheet(sheet.clone());
        sheet
    }

    pub fn stylesheets(&self) -> impl Iterator<Item = &Arc<Stylesheet>> {
        self.user_agent
            .stylesheets
            .iter()
            .chain(self.author.stylesheets.iter())
            .chain(self.scopes.values().flat_map(|c| c.stylesheets.iter()))
    }

    /// Throw away every derived cache and start a new generation
    pub fn clear_cache(&mut self) {
        self.rule_caches.get_mut().clear();
        self.value_cache.get_mut().clear();
    }

    // ------------------------------------------------------------------
    // Matching
    // ------------------------------------------------------------------

    /// Style map for `node`. `triggers` receives, per depth (node first),
    /// the pseudo-classes the applying selectors depend on.
    pub fn find_matching_styles<N: Styleable>(
        &self,
        node: &N,
        triggers: &mut Vec<PseudoClassSet>,
    ) -> Arc<StyleMap> {
        let mut depth = 1;
        let mut scopes: SmallVec<[ScopeId; 2]> = SmallVec::new();
        if let Some(scope) = node.style_scope() {
            scopes.push(scope);
        }
        let mut ancestor = node.parent();
        while let Some(a) = ancestor {
            depth += 1;
            if let Some(scope) = a.style_scope() {
                scopes.push(scope);
            }
            ancestor = a.parent();
        }
        scopes.retain(|s| self.scopes.contains_key(s));
        // outermost scope first
        scopes.reverse();

        triggers.clear();
        triggers.resize(depth, PseudoClassSet::new());

        let key = ShapeKey {
            type_name: short_type_name(node.type_name()).to_string(),
            id: node.id().map(str::to_string),
            classes: node.style_classes().clone(),
            scopes,
        };

        let mut stats = self.stats.get();
        let mut caches = self.rule_caches.borrow_mut();
        let cache = caches.entry(key).or_insert_with_key(|key| {
            stats.candidate_builds += 1;
            RuleCache::new(self.candidate_rules(key))
        });

        let (map, built) = cache.style_map(node, triggers, &mut || self.next_style_map_id());
        if built {
            stats.style_map_builds += 1;
        } else if !map.is_empty() {
            stats.style_map_hits += 1;
        }
        self.stats.set(stats);
        map
    }

    /// User-agent rules, then scene rules, then each scope outermost first
    fn candidate_rules(&self, key: &ShapeKey) -> Vec<Arc<Rule>> {
        let id = key.id.as_deref();
        let mut rules = Vec::new();
        self.user_agent.match_rules(id, &key.type_name, &key.classes, &mut rules);
        self.author.match_rules(id, &key.type_name, &key.classes, &mut rules);
        for scope in &key.scopes {
            if let Some(container) = self.scopes.get(scope) {
                container.match_rules(id, &key.type_name, &key.classes, &mut rules);
            }
        }
        tracing::debug!("{} candidate rules for {}", rules.len(), key.type_name);
        rules
    }

    fn next_style_map_id(&self) -> u32 {
        let id = self.next_style_map_id.get().wrapping_add(1).max(1);
        self.next_style_map_id.set(id);
        id
    }

    /// Parsed inline style of `node`, parsed once per distinct text
    pub fn inline_styles<N: Styleable>(&self, node: &N) -> Option<Arc<InlineStyles>> {
        let text = node.inline_style()?.trim();
        if text.is_empty() {
            return None;
        }
        if let Some(cached) = self.inline_styles.borrow().get(text) {
            return cached.clone();
        }

        let parsed = match parse_declarations(text) {
            Ok(declarations) => Some(Arc::new(build_inline_styles(declarations))),
            Err(err) => {
                self.report_error(CssError::InlineStyleParse {
                    node: node.describe(),
                    style: text.to_string(),
                    message: err.to_string(),
                });
                None
            }
        };
        self.inline_styles
            .borrow_mut()
            .insert(text.to_string(), parsed.clone());
        parsed
    }

    pub(crate) fn value_cache(&self) -> &RefCell<StyleCache> {
        &self.value_cache
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Record a recoverable error
    pub fn report_error(&self, error: CssError) {
        tracing::warn!("{}", error);
        if self.config.collect_errors {
            self.errors.borrow_mut().push(error);
        }
    }

    /// Errors recorded so far
    pub fn errors(&self) -> Vec<CssError> {
        self.errors.borrow().clone()
    }

    /// Errors recorded so far, clearing the list
    pub fn take_errors(&self) -> Vec<CssError> {
        std::mem::take(&mut *self.errors.borrow_mut())
    }

    pub fn stats(&self) -> MatchStats {
        let mut stats = self.stats.get();
        let values = self.value_cache.borrow().stats();
        stats.value_hits = values.hits;
        stats.value_misses = values.misses;
        stats
    }
}

fn build_inline_styles(declarations: Vec<Declaration>) -> InlineStyles {
    let count = declarations.len();
    let rule = Rule::new(vec![SimpleSelector::universal().into()], declarations);
    let sheet = Stylesheet::new(Origin::Inline, None, vec![rule], Vec::new());

    let mut styles = InlineStyles::new();
    let Some(rule) = sheet.rules().first() else {
        return styles;
    };
    for d in 0..count {
        let Some(style) = Style::new(rule.clone(), 0, d) else {
            continue;
        };
        let candidate = CascadingStyle::new(style, PseudoClassSet::new(), 0, d);
        match styles.get(candidate.property()) {
            Some(existing) if existing > &candidate => {}
            _ => {
                styles.insert(candidate.property().to_string(), candidate);
            }
        }
    }
    styles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_stylesheet;
    use crate::testing::MockTree;
    use crate::value::ParsedValue;

    fn sheet(css: &str, origin: Origin) -> Arc<Stylesheet> {
        parse_stylesheet(css, origin, None).unwrap()
    }

    #[test]
    fn test_find_matching_styles_caches_by_shape() {
        let mut manager = StyleManager::new();
        manager.add_stylesheet(sheet("Button { -x: 1; } .mg-a { -x: 2; }", Origin::Author));

        let mut tree = MockTree::new();
        let a = tree.add("Button", None);
        let b = tree.add("Button", None);
        tree.add_class(a, "mg-a");
        tree.add_class(b, "mg-a");

        let mut triggers = Vec::new();
        let first = manager.find_matching_styles(&tree.node(a), &mut triggers);
        let second = manager.find_matching_styles(&tree.node(b), &mut triggers);
        assert!(Arc::ptr_eq(&first, &second));

        let stats = manager.stats();
        assert_eq!(stats.candidate_builds, 1);
        assert_eq!(stats.style_map_builds, 1);
        assert_eq!(stats.style_map_hits, 1);
    }

    #[test]
    fn test_triggers_sized_to_depth() {
        let mut manager = StyleManager::new();
        manager.add_stylesheet(sheet(
            "Pane:mg-hover > Label:mg-focused { -x: 1; }",
            Origin::Author,
        ));

        let mut tree = MockTree::new();
        let root = tree.add("Pane", None);
        let leaf = tree.add("Label", Some(root));

        let mut triggers = Vec::new();
        let map = manager.find_matching_styles(&tree.node(leaf), &mut triggers);
        assert!(map.contains("-x"));
        assert_eq!(triggers.len(), 2);
        assert_eq!(triggers[0].len(), 1);
        assert_eq!(triggers[1].len(), 1);
    }

    #[test]
    fn test_stylesheet_changes_start_new_generation() {
        let mut manager = StyleManager::new();
        let g0 = manager.generation();
        let s = sheet("A { -x: 1; }", Origin::Author);
        manager.add_stylesheet(s.clone());
        let g1 = manager.generation();
        assert_ne!(g0, g1);

        assert!(manager.remove_stylesheet(&s));
        assert_ne!(manager.generation(), g1);
        assert!(!manager.remove_stylesheet(&s));
        assert_eq!(manager.stylesheets().count(), 0);
    }

    #[test]
    fn test_removed_stylesheet_no_longer_matches() {
        let mut manager = StyleManager::new();
        let keep = sheet("A { -x: 1; }", Origin::Author);
        let drop = sheet("A { -y: 1; }", Origin::Author);
        manager.add_stylesheet(keep);
        manager.add_stylesheet(drop.clone());

        let mut tree = MockTree::new();
        let n = tree.add("A", None);
        let mut triggers = Vec::new();
        assert!(manager.find_matching_styles(&tree.node(n), &mut triggers).contains("-y"));

        manager.remove_stylesheet(&drop);
        let map = manager.find_matching_styles(&tree.node(n), &mut triggers);
        assert!(map.contains("-x"));
        assert!(!map.contains("-y"));
    }

    #[test]
    fn test_scoped_stylesheets_apply_to_subtree_only() {
        let mut manager = StyleManager::new();
        manager.add_scoped_stylesheet(ScopeId(7), sheet("Label { -x: 1; }", Origin::Author));

        let mut tree = MockTree::new();
        let scoped_root = tree.add("Pane", None);
        tree.set_scope(scoped_root, ScopeId(7));
        let inside = tree.add("Label", Some(scoped_root));
        let outside = tree.add("Label", None);

        let mut triggers = Vec::new();
        assert!(manager.find_matching_styles(&tree.node(inside), &mut triggers).contains("-x"));
        assert!(!manager.find_matching_styles(&tree.node(outside), &mut triggers).contains("-x"));

        assert!(manager.remove_scope(ScopeId(7)));
        assert!(!manager.find_matching_styles(&tree.node(inside), &mut triggers).contains("-x"));
    }

    #[test]
    fn test_failed_load_registers_empty_sheet() {
        let mut manager = StyleManager::new();
        let loader = |url: &str, _origin: Origin| -> Result<Arc<Stylesheet>, LoadError> {
            Err(format!("{url} not found").into())
        };
        let loaded = manager.load_stylesheet(&loader, "missing.css", Origin::Author);
        assert!(loaded.rules().is_empty());
        assert_eq!(loaded.url(), Some("missing.css"));

        let errors = manager.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], CssError::StylesheetLoad { url, .. } if url == "missing.css"));
        assert!(manager.errors().is_empty());
    }

    #[test]
    fn test_successful_load() {
        let mut manager = StyleManager::new();
        let loader = |url: &str, origin: Origin| -> Result<Arc<Stylesheet>, LoadError> {
            Ok(parse_stylesheet("A { -x: 1; }", origin, Some(url.to_string()))?)
        };
        let loaded = manager.load_stylesheet(&loader, "ok.css", Origin::UserAgent);
        assert_eq!(loaded.rules().len(), 1);
        assert!(manager.errors().is_empty());
    }

    #[test]
    fn test_inline_styles_parsed_once() {
        let manager = StyleManager::new();
        let mut tree = MockTree::new();
        let a = tree.add("A", None);
        let b = tree.add("B", None);
        tree.set_inline(a, "-x: 1; -x: 2");
        tree.set_inline(b, "-x: 1; -x: 2");

        let first = manager.inline_styles(&tree.node(a)).unwrap();
        let second = manager.inline_styles(&tree.node(b)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let style = &first["-x"];
        assert_eq!(style.origin(), Origin::Inline);
        assert_eq!(style.style().declaration().value, ParsedValue::Number(2.0));
    }

    #[test]
    fn test_bad_inline_style_reported_once() {
        let manager = StyleManager::new();
        let mut tree = MockTree::new();
        let a = tree.add("A", None);
        tree.set_inline(a, "-x 1");

        assert!(manager.inline_styles(&tree.node(a)).is_none());
        assert!(manager.inline_styles(&tree.node(a)).is_none());
        assert_eq!(manager.errors().len(), 1);
    }

    #[test]
    fn test_error_collection_can_be_disabled() {
        let manager = StyleManager::with_config(StyleConfig::new().with_collect_errors(false));
        manager.report_error(CssError::StylesheetLoad {
            url: "x.css".into(),
            message: "gone".into(),
        });
        assert!(manager.errors().is_empty());
    }
}
