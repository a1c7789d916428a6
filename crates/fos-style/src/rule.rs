//! Rules, Declarations & Stylesheets
//!
//! A [`Stylesheet`] owns its rules. Each rule points back at its sheet
//! through a weak reference that is set exactly once, when the sheet is
//! built. A [`Style`] names one selector and one declaration of a rule.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::bitset::PseudoClassSet;
use crate::node::Styleable;
use crate::selector::{Match, Selector};
use crate::value::ParsedValue;

/// Precedence tier of a stylesheet, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Origin {
    UserAgent,
    Author,
    User,
    Inline,
}

/// `property: value [!important]`
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: ParsedValue,
    pub important: bool,
}

impl Declaration {
    pub fn new(property: impl Into<String>, value: ParsedValue, important: bool) -> Self {
        Self {
            property: property.into(),
            value,
            important,
        }
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.property, self.value)?;
        if self.important {
            f.write_str(" !important")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct RuleOwner {
    stylesheet: Weak<Stylesheet>,
    origin: Origin,
}

/// Selectors plus the declarations they apply
#[derive(Debug)]
pub struct Rule {
    selectors: Vec<Selector>,
    declarations: Vec<Declaration>,
    owner: OnceLock<RuleOwner>,
}

impl Rule {
    pub fn new(selectors: Vec<Selector>, declarations: Vec<Declaration>) -> Self {
        Self {
            selectors,
            declarations,
            owner: OnceLock::new(),
        }
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// Origin of the owning stylesheet; author until owned
    pub fn origin(&self) -> Origin {
        self.owner.get().map_or(Origin::Author, |o| o.origin)
    }

    pub fn stylesheet(&self) -> Option<Arc<Stylesheet>> {
        self.owner.get()?.stylesheet.upgrade()
    }

    fn set_owner(&self, stylesheet: Weak<Stylesheet>, origin: Origin) -> bool {
        self.owner.set(RuleOwner { stylesheet, origin }).is_ok()
    }

    /// Bit `i` set when selector `i` statically applies to `node`.
    /// Selectors past the 64th share the top bit.
    pub fn applies<N: Styleable>(&self, node: &N, triggers: &mut [PseudoClassSet]) -> u64 {
        let mut mask = 0u64;
        for (i, selector) in self.selectors.iter().enumerate() {
            if selector.applies_with_triggers(node, triggers) {
                mask |= 1u64 << i.min(63);
            }
        }
        mask
    }

    /// Every selector that matches `node`
    pub fn matches<N: Styleable>(&self, node: &N) -> Vec<Match> {
        self.selectors
            .iter()
            .enumerate()
            .filter_map(|(i, selector)| selector.matches(node, i))
            .collect()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, selector) in self.selectors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{selector}")?;
        }
        f.write_str(" { ")?;
        for decl in &self.declarations {
            write!(f, "{decl}; ")?;
        }
        f.write_str("}")
    }
}

/// `@font-face` descriptors, kept for the font loading collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct FontFace {
    pub descriptors: Vec<(String, ParsedValue)>,
}

/// An ordered rule list with an origin
#[derive(Debug)]
pub struct Stylesheet {
    origin: Origin,
    url: Option<String>,
    rules: Vec<Arc<Rule>>,
    font_faces: Vec<FontFace>,
}

impl Stylesheet {
    /// Build a stylesheet, taking ownership of `rules`
    pub fn new(
        origin: Origin,
        url: Option<String>,
        rules: Vec<Rule>,
        font_faces: Vec<FontFace>,
    ) -> Arc<Self> {
        let rules: Vec<Arc<Rule>> = rules.into_iter().map(Arc::new).collect();
        Arc::new_cyclic(|weak| {
            for rule in &rules {
                rule.set_owner(weak.clone(), origin);
            }
            Stylesheet {
                origin,
                url,
                rules,
                font_faces,
            }
        })
    }

    /// A sheet with no rules, standing in for one that failed to load
    pub fn empty(origin: Origin, url: Option<String>) -> Arc<Self> {
        Self::new(origin, url, Vec::new(), Vec::new())
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    pub fn font_faces(&self) -> &[FontFace] {
        &self.font_faces
    }
}

/// One selector and one declaration of a rule
#[derive(Debug, Clone)]
pub struct Style {
    rule: Arc<Rule>,
    selector: usize,
    declaration: usize,
}

impl Style {
    /// `None` if either index is out of range for `rule`
    pub fn new(rule: Arc<Rule>, selector: usize, declaration: usize) -> Option<Self> {
        (selector < rule.selectors.len() && declaration < rule.declarations.len()).then_some(Self {
            rule,
            selector,
            declaration,
        })
    }

    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub fn selector(&self) -> &Selector {
        &self.rule.selectors[self.selector]
    }

    pub fn declaration(&self) -> &Declaration {
        &self.rule.declarations[self.declaration]
    }
}

impl PartialEq for Style {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.rule, &other.rule)
            && self.selector == other.selector
            && self.declaration == other.declaration
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{ {} }}", self.selector(), self.declaration())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::SimpleSelector;
    use crate::testing::MockTree;

    fn rule(selectors: Vec<Selector>) -> Rule {
        Rule::new(selectors, vec![Declaration::new("-fx-x", ParsedValue::Number(1.0), false)])
    }

    #[test]
    fn test_origin_order() {
        assert!(Origin::UserAgent < Origin::Author);
        assert!(Origin::Author < Origin::User);
        assert!(Origin::User < Origin::Inline);
    }

    #[test]
    fn test_owner_back_reference() {
        let sheet = Stylesheet::new(
            Origin::User,
            Some("user.css".into()),
            vec![rule(vec![SimpleSelector::universal().into()])],
            Vec::new(),
        );
        let r = &sheet.rules()[0];
        assert_eq!(r.origin(), Origin::User);
        assert!(Arc::ptr_eq(&r.stylesheet().unwrap(), &sheet));
        // owner is set once
        assert!(!r.set_owner(Weak::new(), Origin::UserAgent));
        assert_eq!(r.origin(), Origin::User);
    }

    #[test]
    fn test_unowned_rule_defaults_to_author() {
        let r = rule(vec![SimpleSelector::universal().into()]);
        assert_eq!(r.origin(), Origin::Author);
        assert!(r.stylesheet().is_none());
    }

    #[test]
    fn test_declaration_equality_ignores_rule() {
        let a = Declaration::new("-fx-x", ParsedValue::Number(1.0), false);
        let r = rule(vec![SimpleSelector::universal().into()]);
        assert_eq!(&a, &r.declarations()[0]);
    }

    #[test]
    fn test_applies_mask() {
        let mut tree = MockTree::new();
        let n = tree.add("Label", None);
        tree.add_class(n, "rule-a");

        let r = rule(vec![
            SimpleSelector::new(Some("Button"), None, &[], &[]).unwrap().into(),
            SimpleSelector::new(None, None, &["rule-a"], &[]).unwrap().into(),
            SimpleSelector::new(Some("Label"), None, &[], &[]).unwrap().into(),
        ]);
        assert_eq!(r.applies(&tree.node(n), &mut []), 0b110);
        let matched: Vec<usize> =
            r.matches(&tree.node(n)).iter().map(|m| m.selector_index).collect();
        assert_eq!(matched, vec![1, 2]);
    }

    #[test]
    fn test_style_bounds_and_equality() {
        let r = Arc::new(rule(vec![SimpleSelector::universal().into()]));
        assert!(Style::new(r.clone(), 1, 0).is_none());
        let a = Style::new(r.clone(), 0, 0).unwrap();
        let b = Style::new(r, 0, 0).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "* { -fx-x: 1 }");
    }
}
