//! Styleable Property Metadata
//!
//! Each property a node exposes to styling is described by a
//! [`CssMetaData`]: its name, how to convert a parsed value, its initial
//! value, whether it inherits, and the sub-properties of a shorthand.

use std::sync::Arc;

use crate::value::{Converter, Font, StyleValue};

/// Font shorthand
pub const FONT: &str = "-fx-font";
pub const FONT_SIZE: &str = "-fx-font-size";
pub const FONT_FAMILY: &str = "-fx-font-family";
pub const FONT_WEIGHT: &str = "-fx-font-weight";
pub const FONT_STYLE: &str = "-fx-font-style";

/// Description of one styleable property
#[derive(Debug, Clone, PartialEq)]
pub struct CssMetaData {
    name: String,
    converter: Converter,
    initial: StyleValue,
    inherits: bool,
    sub_properties: Vec<Arc<CssMetaData>>,
}

impl CssMetaData {
    pub fn new(name: impl Into<String>, converter: Converter, initial: StyleValue) -> Self {
        Self {
            name: name.into(),
            converter,
            initial,
            inherits: false,
            sub_properties: Vec::new(),
        }
    }

    pub fn with_inherits(mut self, inherits: bool) -> Self {
        self.inherits = inherits;
        self
    }

    pub fn with_sub_properties(mut self, subs: Vec<Arc<CssMetaData>>) -> Self {
        self.sub_properties = subs;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn initial_value(&self) -> &StyleValue {
        &self.initial
    }

    pub fn inherits(&self) -> bool {
        self.inherits
    }

    pub fn sub_properties(&self) -> &[Arc<CssMetaData>] {
        &self.sub_properties
    }

    pub fn is_shorthand(&self) -> bool {
        !self.sub_properties.is_empty()
    }

    /// Properties whose relative sizes resolve against the parent's font
    pub fn is_font_sizing(&self) -> bool {
        self.name == FONT || self.name == FONT_SIZE
    }

    /// The `-fx-font` shorthand with its four sub-properties
    pub fn font() -> Self {
        let default = Font::default();
        let subs = vec![
            Arc::new(
                CssMetaData::new(FONT_SIZE, Converter::FontSize, StyleValue::Number(default.size))
                    .with_inherits(true),
            ),
            Arc::new(
                CssMetaData::new(
                    FONT_FAMILY,
                    Converter::FontFamily,
                    StyleValue::Str(default.family.clone()),
                )
                .with_inherits(true),
            ),
            Arc::new(
                CssMetaData::new(
                    FONT_WEIGHT,
                    Converter::FontWeight,
                    StyleValue::Number(default.weight as f64),
                )
                .with_inherits(true),
            ),
            Arc::new(
                CssMetaData::new(
                    FONT_STYLE,
                    Converter::FontPosture,
                    StyleValue::Ident(default.posture.name().into()),
                )
                .with_inherits(true),
            ),
        ];
        CssMetaData::new(FONT, Converter::Font, StyleValue::Font(default))
            .with_inherits(true)
            .with_sub_properties(subs)
    }
}
