//! Style Helper
//!
//! Per-node value resolution. A helper is created whenever a node is matched
//! against the stylesheets and keeps the node's [`StyleMap`] together with
//! its keys into the shared value cache. Each time the node's pseudo-class
//! state changes, [`StyleHelper::transition_to_state`] produces the values
//! of all of the node's styleable properties.
//!
//! Resolving one property:
//! 1. Pick the best style whose selector matches the current states, unless
//!    the inline declaration outranks it
//! 2. `inherit` defers to the nearest styled ancestor
//! 3. Lookup references resolve against the node, then its ancestors
//! 4. Convert, with relative sizes taken against the node's font
//! 5. With no style at all, inherit, reset to the initial value, or skip
//!
//! Font-relative sizes need the node's font first, which in turn may be
//! relative to the parent's font. That font is computed once per state and
//! kept in the node's [`CacheEntry`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::bitset::PseudoClassSet;
use crate::cascade::{CascadingStyle, StyleMap};
use crate::error::{CssError, StyleError};
use crate::manager::{InlineStyles, StyleManager};
use crate::node::Styleable;
use crate::property::{CssMetaData, FONT, FONT_SIZE};
use crate::pseudo_class::PseudoClass;
use crate::rule::{Origin, Style};
use crate::style_cache::{CacheEntry, CalculatedValue, Generation, StatesKey, StyleCacheKey};
use crate::value::{Converter, Font, ParsedValue, StyleValue};

/// One property value produced by a state transition
#[derive(Debug, Clone, PartialEq)]
pub struct StyleUpdate {
    pub property: String,
    pub value: StyleValue,
    /// `None` when the property is reset to its initial value
    pub origin: Option<Origin>,
    /// Styles that produced the value, for nodes with a style observer
    pub styles: Option<Vec<Style>>,
}

/// Styles consulted while resolving one value, when someone is listening
type Trace = Option<Vec<Style>>;

/// What resolution needs to know about the node being resolved
struct Resolution<'m> {
    manager: &'m StyleManager,
    states: PseudoClassSet,
    inline: Option<Arc<InlineStyles>>,
    /// Font for relative sizes of ordinary properties
    font: Font,
    /// Font for relative sizes of the font properties themselves
    parent_font: Font,
}

impl Resolution<'_> {
    fn font_for(&self, meta: &CssMetaData) -> &Font {
        if meta.is_font_sizing() {
            &self.parent_font
        } else {
            &self.font
        }
    }
}

/// Entry font plus bookkeeping
struct EntryFont {
    value: CalculatedValue,
    /// Derived from an inline or user font somewhere up the tree
    personal: bool,
    /// Computed by this call rather than read from the entry
    fresh: bool,
}

fn is_personal(origin: Option<Origin>) -> bool {
    matches!(origin, Some(Origin::Inline | Origin::User))
}

fn record(trace: &mut Trace, style: &Style) {
    if let Some(styles) = trace {
        styles.push(style.clone());
    }
}

/// Per-node resolution state
#[derive(Debug)]
pub struct StyleHelper {
    style_map: Arc<StyleMap>,
    cache_key: StyleCacheKey,
    /// Relevant pseudo-classes per depth, node first
    masks: Vec<PseudoClassSet>,
    generation: Generation,
    entries: RefCell<HashMap<StatesKey, CacheEntry>>,
}

impl StyleHelper {
    /// Match `node` and build its cache keys. Ancestors are expected to
    /// carry their helpers already; an ancestor without one counts as
    /// unstyled.
    pub fn create<N: Styleable>(node: &N, manager: &StyleManager) -> Self {
        let mut masks = Vec::new();
        let style_map = manager.find_matching_styles(node, &mut masks);

        let mut key: SmallVec<[u32; 4]> = SmallVec::with_capacity(masks.len());
        key.push(style_map.id());

        // The nearest styled ancestor's masks already cover everything
        // above it, so only that one is merged in.
        let mut merged = false;
        let mut depth = 0;
        let mut ancestor = node.parent();
        while let Some(a) = ancestor {
            depth += 1;
            match a.style_helper() {
                Some(helper) => {
                    key.push(helper.style_map.id());
                    if !merged {
                        for (offset, mask) in helper.masks.iter().enumerate() {
                            if let Some(slot) = masks.get_mut(depth + offset) {
                                slot.add_all(mask);
                            }
                        }
                        merged = true;
                    }
                }
                None => key.push(StyleMap::EMPTY_ID),
            }
            ancestor = a.parent();
        }

        tracing::debug!(
            "Created style helper for {} (style map {}, depth {})",
            node.describe(),
            style_map.id(),
            key.len()
        );

        Self {
            style_map,
            cache_key: StyleCacheKey(key),
            masks,
            generation: manager.generation(),
            entries: RefCell::new(HashMap::new()),
        }
    }

    pub fn style_map(&self) -> &Arc<StyleMap> {
        &self.style_map
    }

    pub fn cache_key(&self) -> &StyleCacheKey {
        &self.cache_key
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether a change of `pseudo_class` on the node or an ancestor can
    /// change this node's values
    pub fn is_pseudo_class_used(&self, pseudo_class: PseudoClass) -> bool {
        self.masks.iter().any(|mask| mask.contains(pseudo_class))
    }

    /// Relevant pseudo-classes per depth, node first
    pub fn pseudo_class_masks(&self) -> &[PseudoClassSet] {
        &self.masks
    }

    /// Forget node-local values and fonts
    pub fn clear_local_cache(&self) {
        self.entries.borrow_mut().clear();
    }

    fn check_generation(&self, manager: &StyleManager) -> Result<(), StyleError> {
        if self.generation != manager.generation() {
            return Err(StyleError::StaleCache {
                generation: self.generation.value(),
            });
        }
        Ok(())
    }

    /// Values for every settable property of `node` in its current state.
    /// Properties configured as deferred come last.
    pub fn transition_to_state<N: Styleable>(
        &self,
        node: &N,
        manager: &StyleManager,
    ) -> Result<Vec<StyleUpdate>, StyleError> {
        self.check_generation(manager)?;

        let states_key = self.states_key(node);
        let observed = node.has_style_observer();
        let (cx, font) = self.resolution(node, manager, &states_key);
        let fastpath =
            !observed && cx.inline.is_none() && !(font.fresh && is_personal(font.value.origin()));

        let config = manager.config();
        let metas = node.css_meta_data();
        let ordered = metas
            .iter()
            .filter(|m| !config.is_deferred(m.name()))
            .chain(metas.iter().filter(|m| config.is_deferred(m.name())));

        let mut updates = Vec::new();
        for meta in ordered {
            let property = meta.name();
            if !node.is_settable(property) {
                continue;
            }
            // values computed for a user-set property are not reusable
            let user_set = node.property_origin(property) == Some(Origin::User);
            let cacheable = fastpath && !user_set;
            let mut trace: Trace = observed.then(Vec::new);

            let cached = if cacheable {
                self.cached_value(manager, &states_key, property)
            } else {
                None
            };
            let value = match cached {
                Some(value) => value,
                None => {
                    let value = self.lookup(node, meta, user_set, &cx, &mut trace);
                    if cacheable {
                        self.cache_value(manager, &states_key, property, value.clone());
                    }
                    value
                }
            };

            match value {
                CalculatedValue::Skip => {}
                CalculatedValue::Value {
                    origin: None | Some(Origin::UserAgent),
                    ..
                } if user_set => {}
                CalculatedValue::Value { value, origin, .. } => {
                    let who = node.describe();
                    tracing::trace!("{who} {property} = {value:?} ({origin:?})");
                    updates.push(StyleUpdate {
                        property: property.to_string(),
                        value,
                        origin,
                        styles: trace,
                    });
                }
            }
        }
        Ok(updates)
    }

    /// Resolve one property without touching the value cache. Returns the
    /// value and the styles that produced it, winner first.
    pub fn compute_value<N: Styleable>(
        &self,
        node: &N,
        meta: &CssMetaData,
        manager: &StyleManager,
    ) -> Result<(CalculatedValue, Vec<Style>), StyleError> {
        self.check_generation(manager)?;
        let states_key = self.states_key(node);
        let (cx, _) = self.resolution(node, manager, &states_key);
        let user_set = node.property_origin(meta.name()) == Some(Origin::User);
        let mut trace: Trace = Some(Vec::new());
        let value = self.lookup(node, meta, user_set, &cx, &mut trace);
        Ok((value, trace.unwrap_or_default()))
    }

    // ------------------------------------------------------------------
    // Cache access
    // ------------------------------------------------------------------

    fn states_key<N: Styleable>(&self, node: &N) -> StatesKey {
        let mut states: SmallVec<[PseudoClassSet; 4]> = SmallVec::new();
        states.push(node.pseudo_class_states().clone());
        let mut ancestor = node.parent();
        while let Some(a) = ancestor {
            if states.len() >= self.masks.len() {
                break;
            }
            states.push(a.pseudo_class_states().clone());
            ancestor = a.parent();
        }
        StatesKey::filtered(&states, &self.masks)
    }

    fn cached_value(
        &self,
        manager: &StyleManager,
        states_key: &StatesKey,
        property: &str,
    ) -> Option<CalculatedValue> {
        let entries = self.entries.borrow();
        let mut shared = manager.value_cache().borrow_mut();
        match entries.get(states_key) {
            Some(entry) => entry.get(&mut shared, &self.cache_key, states_key, property),
            None => shared.get(&self.cache_key, states_key, property),
        }
    }

    fn cache_value(
        &self,
        manager: &StyleManager,
        states_key: &StatesKey,
        property: &str,
        value: CalculatedValue,
    ) {
        let mut entries = self.entries.borrow_mut();
        let mut shared = manager.value_cache().borrow_mut();
        entries
            .entry(states_key.clone())
            .or_default()
            .put(&mut shared, &self.cache_key, states_key, property, value);
    }

    // ------------------------------------------------------------------
    // Fonts
    // ------------------------------------------------------------------

    fn resolution<'m, N: Styleable>(
        &self,
        node: &N,
        manager: &'m StyleManager,
        states_key: &StatesKey,
    ) -> (Resolution<'m>, EntryFont) {
        let inline = manager.inline_styles(node);
        let font = self.entry_font(node, manager, states_key, inline.clone());
        let default = &manager.config().default_font;
        let parent_font = self
            .parent_font(node, manager)
            .and_then(|parent| parent.value.font().cloned())
            .unwrap_or_else(|| default.clone());
        let cx = Resolution {
            manager,
            states: node.pseudo_class_states().clone(),
            inline,
            font: font.value.font().cloned().unwrap_or_else(|| default.clone()),
            parent_font,
        };
        (cx, font)
    }

    /// The node's font for `states_key`, computed on first use
    fn entry_font<N: Styleable>(
        &self,
        node: &N,
        manager: &StyleManager,
        states_key: &StatesKey,
        inline: Option<Arc<InlineStyles>>,
    ) -> EntryFont {
        let cached = self
            .entries
            .borrow()
            .get(states_key)
            .and_then(|entry| entry.font.clone().map(|font| (font, entry.font_is_personal)));
        if let Some((value, personal)) = cached {
            return EntryFont {
                value,
                personal,
                fresh: false,
            };
        }

        let (value, personal) = self.font_for_relative_size(node, manager, inline);
        let mut entries = self.entries.borrow_mut();
        let entry = entries.entry(states_key.clone()).or_default();
        entry.font = Some(value.clone());
        entry.font_is_personal = personal;
        EntryFont {
            value,
            personal,
            fresh: true,
        }
    }

    /// Entry font of the nearest styled ancestor in its current state
    fn parent_font<N: Styleable>(&self, node: &N, manager: &StyleManager) -> Option<EntryFont> {
        let mut ancestor = node.parent();
        while let Some(a) = ancestor {
            if let Some(helper) = a.style_helper() {
                let states_key = helper.states_key(&a);
                let inline = manager.inline_styles(&a);
                return Some(helper.entry_font(&a, manager, &states_key, inline));
            }
            ancestor = a.parent();
        }
        None
    }

    /// Font that relative sizes on this node resolve against. In order of
    /// preference: the node's own font styles or user font, the nearest
    /// styled ancestor's font, the configured default.
    fn font_for_relative_size<N: Styleable>(
        &self,
        node: &N,
        manager: &StyleManager,
        inline: Option<Arc<InlineStyles>>,
    ) -> (CalculatedValue, bool) {
        let parent = self.parent_font(node, manager);
        let default = &manager.config().default_font;
        let base = parent
            .as_ref()
            .and_then(|p| p.value.font().cloned())
            .unwrap_or_else(|| default.clone());
        let parent_personal = parent.as_ref().is_some_and(|p| p.personal);

        let cx = Resolution {
            manager,
            states: node.pseudo_class_states().clone(),
            inline,
            font: base.clone(),
            parent_font: base.clone(),
        };
        let mut trace: Trace = None;

        let user_font = node
            .font_property()
            .filter(|(_, origin)| *origin == Some(Origin::User));
        let mut origin = user_font.as_ref().and_then(|(_, o)| *o);
        let mut found: Option<CalculatedValue> = None;

        let shorthand = self.get_style(node, FONT, &cx.states, cx.inline.as_deref());
        if let Some(style) = &shorthand {
            if !style.style().declaration().value.is_inherit() && Some(style.origin()) >= origin {
                let converted = self.calculate_value(
                    node,
                    FONT,
                    &Converter::Font,
                    style,
                    &base,
                    &cx,
                    &mut trace,
                );
                if let Some(value) = converted {
                    if value.font().is_some() {
                        origin = value.origin();
                        found = Some(value);
                    }
                }
            }
        }

        let size = self
            .get_style(node, FONT_SIZE, &cx.states, cx.inline.as_deref())
            .filter(|s| !(user_font.is_some() && s.origin() == Origin::UserAgent))
            .filter(|s| shorthand.as_ref().is_none_or(|sh| s > sh))
            .filter(|s| !s.style().declaration().value.is_inherit() && Some(s.origin()) >= origin);
        if let Some(style) = size {
            let converted = self.calculate_value(
                node,
                FONT_SIZE,
                &Converter::FontSize,
                &style,
                &base,
                &cx,
                &mut trace,
            );
            if let Some(value) = converted {
                if let Some(px) = value.value().and_then(StyleValue::as_number) {
                    let font = found
                        .as_ref()
                        .and_then(CalculatedValue::font)
                        .or(user_font.as_ref().map(|(f, _)| f))
                        .unwrap_or(&base)
                        .clone()
                        .with_size(px);
                    found = Some(CalculatedValue::new(
                        StyleValue::Font(font),
                        value.origin(),
                        value.is_relative(),
                    ));
                }
            }
        }

        if let Some(font) = found {
            let personal = is_personal(font.origin()) || parent_personal;
            return (font, personal);
        }
        if let Some((font, origin)) = user_font {
            return (CalculatedValue::new(StyleValue::Font(font), origin, false), true);
        }
        if let Some(parent) = parent {
            return (parent.value, parent.personal);
        }
        (CalculatedValue::new(StyleValue::Font(default.clone()), None, false), false)
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Best style for `property` in `states`, inline declarations included
    fn get_style<N: Styleable>(
        &self,
        node: &N,
        property: &str,
        states: &PseudoClassSet,
        inline: Option<&InlineStyles>,
    ) -> Option<CascadingStyle> {
        let matched = self.style_map.get(property).and_then(|styles| {
            styles.iter().find(|s| s.style().selector().state_matches(node, states))
        });
        let inline = inline.and_then(|styles| styles.get(property));
        match (matched, inline) {
            (Some(m), Some(i)) => Some(if i > m { i.clone() } else { m.clone() }),
            (m, i) => m.or(i).cloned(),
        }
    }

    fn lookup<N: Styleable>(
        &self,
        node: &N,
        meta: &CssMetaData,
        user_set: bool,
        cx: &Resolution<'_>,
        trace: &mut Trace,
    ) -> CalculatedValue {
        if meta.name() == FONT {
            return self.lookup_font(node, meta, user_set, cx, trace);
        }

        let Some(style) = self.get_style(node, meta.name(), &cx.states, cx.inline.as_deref()) else {
            if meta.is_shorthand() {
                return self.lookup_sub_properties(node, meta, user_set, cx, trace);
            }
            return self.handle_no_style_found(node, meta, user_set, cx, trace);
        };

        if user_set && style.origin() == Origin::UserAgent {
            return CalculatedValue::Skip;
        }
        if style.style().declaration().value.is_inherit() {
            record(trace, style.style());
            return self.inherit(node, meta, cx, trace);
        }

        let font = cx.font_for(meta);
        match self.calculate_value(node, meta.name(), meta.converter(), &style, font, cx, trace) {
            Some(value) => value,
            None => self.handle_no_style_found(node, meta, user_set, cx, trace),
        }
    }

    /// A shorthand with no style of its own, assembled from its parts
    fn lookup_sub_properties<N: Styleable>(
        &self,
        node: &N,
        meta: &CssMetaData,
        user_set: bool,
        cx: &Resolution<'_>,
        trace: &mut Trace,
    ) -> CalculatedValue {
        let mut values = HashMap::new();
        let mut origin = None;
        let mut relative = false;
        for sub in meta.sub_properties() {
            if let CalculatedValue::Value {
                value,
                origin: o,
                relative: r,
            } = self.lookup(node, sub, user_set, cx, trace)
            {
                origin = origin.max(o);
                relative |= r;
                values.insert(sub.name().to_string(), value);
            }
        }
        if values.is_empty() {
            return self.handle_no_style_found(node, meta, user_set, cx, trace);
        }
        self.compose(node, meta, &values, &cx.parent_font, origin, relative, cx)
    }

    /// The font shorthand, combined with any font sub-property styles on
    /// the node that outrank it
    fn lookup_font<N: Styleable>(
        &self,
        node: &N,
        meta: &CssMetaData,
        user_set: bool,
        cx: &Resolution<'_>,
        trace: &mut Trace,
    ) -> CalculatedValue {
        let shorthand = self
            .get_style(node, FONT, &cx.states, cx.inline.as_deref())
            .filter(|s| !(user_set && s.origin() == Origin::UserAgent));

        let mut font: Option<Font> = None;
        let mut origin = None;
        let mut relative = false;
        if let Some(style) = &shorthand {
            if style.style().declaration().value.is_inherit() {
                record(trace, style.style());
                return self.inherit(node, meta, cx, trace);
            }
            let base = &cx.parent_font;
            match self.calculate_value(node, FONT, &Converter::Font, style, base, cx, trace) {
                Some(CalculatedValue::Value {
                    value: StyleValue::Font(f),
                    origin: o,
                    relative: r,
                }) => {
                    font = Some(f);
                    origin = o;
                    relative = r;
                }
                Some(other) => return other,
                None => {}
            }
        }

        let mut parts = HashMap::new();
        for sub in meta.sub_properties() {
            let inline = cx.inline.as_deref();
            let Some(style) = self.get_style(node, sub.name(), &cx.states, inline) else {
                continue;
            };
            if user_set && style.origin() == Origin::UserAgent {
                continue;
            }
            if shorthand.as_ref().is_some_and(|sh| sh > &style) {
                continue;
            }
            let value = if style.style().declaration().value.is_inherit() {
                record(trace, style.style());
                self.inherit(node, sub, cx, trace)
            } else {
                let (name, converter) = (sub.name(), sub.converter());
                self.calculate_value(node, name, converter, &style, &cx.parent_font, cx, trace)
                    .unwrap_or(CalculatedValue::Skip)
            };
            if let CalculatedValue::Value {
                value,
                origin: o,
                relative: r,
            } = value
            {
                origin = origin.max(o);
                relative |= r;
                parts.insert(sub.name().to_string(), value);
            }
        }

        if font.is_none() && parts.is_empty() {
            return self.handle_no_style_found(node, meta, user_set, cx, trace);
        }
        let base = font.unwrap_or_else(|| cx.parent_font.clone());
        self.compose(node, meta, &parts, &base, origin, relative, cx)
    }

    #[allow(clippy::too_many_arguments)]
    fn compose<N: Styleable>(
        &self,
        node: &N,
        meta: &CssMetaData,
        values: &HashMap<String, StyleValue>,
        base: &Font,
        origin: Option<Origin>,
        relative: bool,
        cx: &Resolution<'_>,
    ) -> CalculatedValue {
        match meta.converter().convert_sub_properties(values, base) {
            Ok(value) => CalculatedValue::new(value, origin, relative),
            Err(err) => {
                cx.manager.report_error(CssError::PropertySet {
                    node: node.describe(),
                    property: meta.name().to_string(),
                    message: err.to_string(),
                });
                CalculatedValue::Skip
            }
        }
    }

    fn handle_no_style_found<N: Styleable>(
        &self,
        node: &N,
        meta: &CssMetaData,
        user_set: bool,
        cx: &Resolution<'_>,
        trace: &mut Trace,
    ) -> CalculatedValue {
        if meta.inherits() {
            if user_set {
                return CalculatedValue::Skip;
            }
            return self.inherit(node, meta, cx, trace);
        }
        if user_set {
            return CalculatedValue::Skip;
        }
        // a style applied in some other state; put the property back
        if self.style_map.contains(meta.name()) {
            return CalculatedValue::new(meta.initial_value().clone(), None, false);
        }
        CalculatedValue::Skip
    }

    /// Value of `meta` from the styles of the nearest styled ancestor.
    /// Values the ancestor holds outside of styles are not consulted, so the
    /// result depends only on the cache key. Relative sizes still resolve
    /// against the font of the node that asked, except for the font
    /// properties, which the ancestor resolves against its own parent.
    fn inherit<N: Styleable>(
        &self,
        node: &N,
        meta: &CssMetaData,
        cx: &Resolution<'_>,
        trace: &mut Trace,
    ) -> CalculatedValue {
        let mut ancestor = node.parent();
        while let Some(a) = ancestor {
            if let Some(helper) = a.style_helper() {
                let states_key = helper.states_key(&a);
                let (mut parent_cx, _) = helper.resolution(&a, cx.manager, &states_key);
                parent_cx.font = cx.font.clone();
                return helper.lookup(&a, meta, false, &parent_cx, trace);
            }
            ancestor = a.parent();
        }
        CalculatedValue::Skip
    }

    /// Convert the winning style's value. `None` means a lookup in the
    /// value could not be resolved.
    #[allow(clippy::too_many_arguments)]
    fn calculate_value<N: Styleable>(
        &self,
        node: &N,
        property: &str,
        converter: &Converter,
        style: &CascadingStyle,
        font: &Font,
        cx: &Resolution<'_>,
        trace: &mut Trace,
    ) -> Option<CalculatedValue> {
        record(trace, style.style());
        let declared = &style.style().declaration().value;
        let mut origin = style.origin();
        if matches!(declared, ParsedValue::Null) {
            return Some(CalculatedValue::new(StyleValue::Null, Some(origin), false));
        }

        let resolved = if declared.contains_lookups() {
            let mut chain = Vec::new();
            match self.resolve_lookups(node, declared, cx, trace, &mut chain, &mut origin) {
                Ok(value) => value,
                Err(lookup) => {
                    cx.manager.report_error(CssError::UnresolvedLookup {
                        node: node.describe(),
                        property: property.to_string(),
                        lookup,
                        selector: Some(style.style().selector().to_string()),
                    });
                    return None;
                }
            }
        } else {
            declared.clone()
        };

        match converter.convert(&resolved, font) {
            Ok(value) => Some(CalculatedValue::new(value, Some(origin), resolved.needs_font())),
            Err(err) => {
                cx.manager.report_error(CssError::PropertySet {
                    node: node.describe(),
                    property: property.to_string(),
                    message: format!("{err} in '{}'", style.style()),
                });
                Some(CalculatedValue::Skip)
            }
        }
    }

    /// Replace every lookup in `value`. A value looked up from a
    /// higher-ranked origin raises `origin`. Errs with the lookup that
    /// could not be resolved.
    fn resolve_lookups<N: Styleable>(
        &self,
        node: &N,
        value: &ParsedValue,
        cx: &Resolution<'_>,
        trace: &mut Trace,
        chain: &mut Vec<String>,
        origin: &mut Origin,
    ) -> Result<ParsedValue, String> {
        match value {
            ParsedValue::Lookup(name) => {
                if chain.len() >= cx.manager.config().max_lookup_depth || chain.contains(name) {
                    return Err(name.clone());
                }
                let style = self
                    .resolve_ref(node, name, &cx.states, cx.inline.as_deref(), cx.manager)
                    .ok_or_else(|| name.clone())?;
                record(trace, style.style());
                *origin = (*origin).max(style.origin());

                chain.push(name.clone());
                let value = &style.style().declaration().value;
                let resolved = self.resolve_lookups(node, value, cx, trace, chain, origin);
                chain.pop();
                resolved
            }
            ParsedValue::Sequence(items) => items
                .iter()
                .map(|item| self.resolve_lookups(node, item, cx, trace, chain, origin))
                .collect::<Result<Vec<_>, _>>()
                .map(ParsedValue::Sequence),
            other => Ok(other.clone()),
        }
    }

    /// Find the style defining `name`: on the node in `states`, on the node
    /// with no states, then on the nearest styled ancestor in its own states
    fn resolve_ref<N: Styleable>(
        &self,
        node: &N,
        name: &str,
        states: &PseudoClassSet,
        inline: Option<&InlineStyles>,
        manager: &StyleManager,
    ) -> Option<CascadingStyle> {
        if let Some(style) = self.get_style(node, name, states, inline) {
            return Some(style);
        }
        if !states.is_empty() {
            if let Some(style) = self.get_style(node, name, &PseudoClassSet::new(), inline) {
                return Some(style);
            }
        }

        let mut ancestor = node.parent();
        while let Some(a) = ancestor {
            if let Some(helper) = a.style_helper() {
                let inline = manager.inline_styles(&a);
                let states = a.pseudo_class_states();
                return helper.resolve_ref(&a, name, states, inline.as_deref(), manager);
            }
            ancestor = a.parent();
        }
        None
    }
}
