//! Parsed & Computed Values
//!
//! [`ParsedValue`] is the declaration value as the parser produced it,
//! possibly holding lookups and relative sizes. [`Converter`] turns a
//! resolved parsed value into a typed [`StyleValue`] against the font in
//! effect for the node.

use std::collections::HashMap;
use std::fmt;

use crate::error::ConvertError;

const DOTS_PER_INCH: f64 = 96.0;
const POINTS_PER_INCH: f64 = 72.0;

/// Default platform font size in pixels
pub const DEFAULT_FONT_SIZE: f64 = 13.0;

/// Units of a [`Size`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SizeUnit {
    Px,
    Em,
    Ex,
    Percent,
    Pt,
    In,
    Cm,
    Mm,
}

impl SizeUnit {
    /// Relative units need a font or base value to resolve
    pub fn is_relative(self) -> bool {
        matches!(self, SizeUnit::Em | SizeUnit::Ex | SizeUnit::Percent)
    }

    pub fn suffix(self) -> &'static str {
        match self {
            SizeUnit::Px => "px",
            SizeUnit::Em => "em",
            SizeUnit::Ex => "ex",
            SizeUnit::Percent => "%",
            SizeUnit::Pt => "pt",
            SizeUnit::In => "in",
            SizeUnit::Cm => "cm",
            SizeUnit::Mm => "mm",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "px" => SizeUnit::Px,
            "em" => SizeUnit::Em,
            "ex" => SizeUnit::Ex,
            "%" => SizeUnit::Percent,
            "pt" => SizeUnit::Pt,
            "in" => SizeUnit::In,
            "cm" => SizeUnit::Cm,
            "mm" => SizeUnit::Mm,
            _ => return None,
        })
    }
}

/// A length with a unit
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Size {
    pub value: f64,
    pub unit: SizeUnit,
}

impl Size {
    pub const fn new(value: f64, unit: SizeUnit) -> Self {
        Self { value, unit }
    }

    pub const fn px(value: f64) -> Self {
        Self::new(value, SizeUnit::Px)
    }

    pub const fn em(value: f64) -> Self {
        Self::new(value, SizeUnit::Em)
    }

    pub fn is_relative(&self) -> bool {
        self.unit.is_relative()
    }

    /// Size in pixels. Percentages scale `multiplier`; em and ex scale the
    /// font size.
    pub fn pixels(&self, multiplier: f64, font: &Font) -> f64 {
        match self.unit {
            SizeUnit::Px => self.value,
            SizeUnit::Em => self.value * font.size,
            // no x-height metrics; half the em box
            SizeUnit::Ex => self.value * font.size / 2.0,
            SizeUnit::Percent => self.value / 100.0 * multiplier,
            SizeUnit::Pt => self.value * DOTS_PER_INCH / POINTS_PER_INCH,
            SizeUnit::In => self.value * DOTS_PER_INCH,
            SizeUnit::Cm => self.value / 2.54 * DOTS_PER_INCH,
            SizeUnit::Mm => self.value / 25.4 * DOTS_PER_INCH,
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

/// RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `rgb`, `rrggbb` or `rrggbbaa` hex digits (without `#`)
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digit = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
        let pair = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            3 => Some(Self::rgb(digit(0)? * 17, digit(1)? * 17, digit(2)? * 17)),
            6 => Some(Self::rgb(pair(0)?, pair(2)?, pair(4)?)),
            8 => Some(Self::rgba(pair(0)?, pair(2)?, pair(4)?, pair(6)?)),
            _ => None,
        }
    }

    /// Common named colors
    pub fn named(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "transparent" => Self::TRANSPARENT,
            "red" => Self::rgb(255, 0, 0),
            "green" => Self::rgb(0, 128, 0),
            "blue" => Self::rgb(0, 0, 255),
            "yellow" => Self::rgb(255, 255, 0),
            "gray" | "grey" => Self::rgb(128, 128, 128),
            "orange" => Self::rgb(255, 165, 0),
            _ => return None,
        })
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

/// Font slant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FontPosture {
    #[default]
    Regular,
    Italic,
}

impl FontPosture {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "normal" | "regular" => Some(FontPosture::Regular),
            "italic" | "oblique" => Some(FontPosture::Italic),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FontPosture::Regular => "regular",
            FontPosture::Italic => "italic",
        }
    }
}

/// Font weights
pub mod weight {
    pub const NORMAL: u16 = 400;
    pub const BOLD: u16 = 700;

    /// Numeric weight of a weight keyword or number
    pub fn from_name(name: &str) -> Option<u16> {
        match name.to_ascii_lowercase().as_str() {
            "normal" => Some(NORMAL),
            "bold" => Some(BOLD),
            "bolder" => Some(800),
            "lighter" => Some(200),
            other => other.parse::<u16>().ok().filter(|w| (100..=900).contains(w)),
        }
    }
}

/// Font description used for values and relative size conversion
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Font {
    pub family: String,
    pub size: f64,
    pub weight: u16,
    pub posture: FontPosture,
}

impl Default for Font {
    fn default() -> Self {
        Self::new("System", DEFAULT_FONT_SIZE)
    }
}

impl Font {
    pub fn new(family: impl Into<String>, size: f64) -> Self {
        Self {
            family: family.into(),
            size,
            weight: weight::NORMAL,
            posture: FontPosture::Regular,
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }
}

/// Declaration value as produced by the parser
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParsedValue {
    /// The `null` keyword
    Null,
    /// The `inherit` keyword
    Inherit,
    Ident(String),
    Str(String),
    Number(f64),
    Size(Size),
    Color(Color),
    /// Reference to another property's value on this node or an ancestor
    Lookup(String),
    Sequence(Vec<ParsedValue>),
}

impl ParsedValue {
    pub fn is_inherit(&self) -> bool {
        matches!(self, ParsedValue::Inherit)
    }

    pub fn contains_lookups(&self) -> bool {
        match self {
            ParsedValue::Lookup(_) => true,
            ParsedValue::Sequence(items) => items.iter().any(ParsedValue::contains_lookups),
            _ => false,
        }
    }

    /// True if conversion depends on the font in effect
    pub fn needs_font(&self) -> bool {
        match self {
            ParsedValue::Size(size) => size.is_relative(),
            ParsedValue::Sequence(items) => items.iter().any(ParsedValue::needs_font),
            _ => false,
        }
    }

    fn kind(&self) -> String {
        match self {
            ParsedValue::Null => "null".into(),
            ParsedValue::Inherit => "inherit".into(),
            ParsedValue::Ident(s) => format!("identifier '{s}'"),
            ParsedValue::Str(s) => format!("string \"{s}\""),
            ParsedValue::Number(n) => format!("number {n}"),
            ParsedValue::Size(s) => format!("size {s}"),
            ParsedValue::Color(c) => format!("color {c}"),
            ParsedValue::Lookup(name) => format!("lookup '{name}'"),
            ParsedValue::Sequence(items) => format!("sequence of {}", items.len()),
        }
    }
}

impl fmt::Display for ParsedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsedValue::Null => f.write_str("null"),
            ParsedValue::Inherit => f.write_str("inherit"),
            ParsedValue::Ident(s) | ParsedValue::Lookup(s) => f.write_str(s),
            ParsedValue::Str(s) => write!(f, "\"{s}\""),
            ParsedValue::Number(n) => write!(f, "{n}"),
            ParsedValue::Size(s) => write!(f, "{s}"),
            ParsedValue::Color(c) => write!(f, "{c}"),
            ParsedValue::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

/// Typed value applied to a node property
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StyleValue {
    Null,
    Boolean(bool),
    Number(f64),
    Percent(f64),
    Color(Color),
    Ident(String),
    Str(String),
    Font(Font),
    List(Vec<StyleValue>),
}

impl StyleValue {
    /// Variant name, used for type checks by property setters
    pub fn kind(&self) -> &'static str {
        match self {
            StyleValue::Null => "null",
            StyleValue::Boolean(_) => "boolean",
            StyleValue::Number(_) => "number",
            StyleValue::Percent(_) => "percent",
            StyleValue::Color(_) => "color",
            StyleValue::Ident(_) => "identifier",
            StyleValue::Str(_) => "string",
            StyleValue::Font(_) => "font",
            StyleValue::List(_) => "list",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            StyleValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_font(&self) -> Option<&Font> {
        match self {
            StyleValue::Font(font) => Some(font),
            _ => None,
        }
    }
}

/// Conversion from a resolved [`ParsedValue`] to a [`StyleValue`]
#[derive(Debug, Clone, PartialEq)]
pub enum Converter {
    Boolean,
    /// Plain number; absolute sizes convert to pixels
    Number,
    /// Length in pixels; percentages stay percentages
    Size,
    /// Font size in pixels; em and percent are relative to the font size
    FontSize,
    Color,
    Ident,
    String,
    Font,
    FontFamily,
    FontWeight,
    FontPosture,
    Sequence(Box<Converter>),
}

impl Converter {
    /// Convert `value`, resolving relative sizes against `font`
    pub fn convert(&self, value: &ParsedValue, font: &Font) -> Result<StyleValue, ConvertError> {
        match value {
            ParsedValue::Null => return Ok(StyleValue::Null),
            ParsedValue::Lookup(name) => return Err(ConvertError::Unresolved(name.clone())),
            _ => {}
        }

        match self {
            Converter::Boolean => match value {
                ParsedValue::Ident(s) if s.eq_ignore_ascii_case("true") => {
                    Ok(StyleValue::Boolean(true))
                }
                ParsedValue::Ident(s) if s.eq_ignore_ascii_case("false") => {
                    Ok(StyleValue::Boolean(false))
                }
                other => Err(mismatch("boolean", other)),
            },
            Converter::Number => match value {
                ParsedValue::Number(n) => Ok(StyleValue::Number(*n)),
                ParsedValue::Size(size) if size.unit != SizeUnit::Percent => {
                    Ok(StyleValue::Number(size.pixels(1.0, font)))
                }
                other => Err(mismatch("number", other)),
            },
            Converter::Size => match value {
                ParsedValue::Number(n) => Ok(StyleValue::Number(*n)),
                ParsedValue::Size(size) if size.unit == SizeUnit::Percent => {
                    Ok(StyleValue::Percent(size.value))
                }
                ParsedValue::Size(size) => Ok(StyleValue::Number(size.pixels(1.0, font))),
                other => Err(mismatch("size", other)),
            },
            Converter::FontSize => match value {
                ParsedValue::Number(n) => Ok(StyleValue::Number(*n)),
                ParsedValue::Size(size) => Ok(StyleValue::Number(size.pixels(font.size, font))),
                other => Err(mismatch("font size", other)),
            },
            Converter::Color => match value {
                ParsedValue::Color(c) => Ok(StyleValue::Color(*c)),
                ParsedValue::Ident(name) => Color::named(name)
                    .map(StyleValue::Color)
                    .ok_or_else(|| mismatch("color", value)),
                other => Err(mismatch("color", other)),
            },
            Converter::Ident => match value {
                ParsedValue::Ident(s) => Ok(StyleValue::Ident(s.clone())),
                other => Err(mismatch("identifier", other)),
            },
            Converter::String => match value {
                ParsedValue::Str(s) | ParsedValue::Ident(s) => Ok(StyleValue::Str(s.clone())),
                other => Err(mismatch("string", other)),
            },
            Converter::FontFamily => match value {
                ParsedValue::Str(s) | ParsedValue::Ident(s) => Ok(StyleValue::Str(s.clone())),
                ParsedValue::Sequence(items) => {
                    let mut parts = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            ParsedValue::Str(s) | ParsedValue::Ident(s) => parts.push(s.as_str()),
                            other => return Err(mismatch("font family", other)),
                        }
                    }
                    Ok(StyleValue::Str(parts.join(" ")))
                }
                other => Err(mismatch("font family", other)),
            },
            Converter::FontWeight => match value {
                ParsedValue::Ident(s) => weight::from_name(s)
                    .map(|w| StyleValue::Number(w as f64))
                    .ok_or_else(|| mismatch("font weight", value)),
                ParsedValue::Number(n) if (100.0..=900.0).contains(n) => Ok(StyleValue::Number(*n)),
                other => Err(mismatch("font weight", other)),
            },
            Converter::FontPosture => match value {
                ParsedValue::Ident(s) => FontPosture::from_name(s)
                    .map(|p| StyleValue::Ident(p.name().to_string()))
                    .ok_or_else(|| mismatch("font posture", value)),
                other => Err(mismatch("font posture", other)),
            },
            Converter::Font => convert_font_shorthand(value, font).map(StyleValue::Font),
            Converter::Sequence(inner) => match value {
                ParsedValue::Sequence(items) => items
                    .iter()
                    .map(|item| inner.convert(item, font))
                    .collect::<Result<Vec<_>, _>>()
                    .map(StyleValue::List),
                single => Ok(StyleValue::List(vec![inner.convert(single, font)?])),
            },
        }
    }

    /// Compose a shorthand from already converted sub-property values.
    /// Missing components come from `base`.
    pub fn convert_sub_properties(
        &self,
        values: &HashMap<String, StyleValue>,
        base: &Font,
    ) -> Result<StyleValue, ConvertError> {
        match self {
            Converter::Font => {
                let mut font = base.clone();
                for (name, value) in values {
                    match (name.as_str(), value) {
                        (crate::property::FONT_FAMILY, StyleValue::Str(family)) => {
                            font.family = family.clone()
                        }
                        (crate::property::FONT_SIZE, StyleValue::Number(size)) => font.size = *size,
                        (crate::property::FONT_WEIGHT, StyleValue::Number(w)) => {
                            font.weight = *w as u16
                        }
                        (crate::property::FONT_STYLE, StyleValue::Ident(p)) => {
                            font.posture = FontPosture::from_name(p).unwrap_or_default()
                        }
                        (_, StyleValue::Null) => {}
                        (name, other) => {
                            return Err(ConvertError::TypeMismatch {
                                expected: "font component",
                                found: format!("{name}: {}", other.kind()),
                            });
                        }
                    }
                }
                Ok(StyleValue::Font(font))
            }
            Converter::Sequence(_) => {
                let mut names: Vec<&String> = values.keys().collect();
                names.sort();
                Ok(StyleValue::List(names.into_iter().map(|n| values[n].clone()).collect()))
            }
            _ => Err(ConvertError::TypeMismatch {
                expected: "shorthand converter",
                found: format!("{self:?}"),
            }),
        }
    }
}

fn mismatch(expected: &'static str, found: &ParsedValue) -> ConvertError {
    ConvertError::TypeMismatch {
        expected,
        found: found.kind(),
    }
}

/// `[posture] [weight] size family...`, in any order before the size
fn convert_font_shorthand(value: &ParsedValue, font: &Font) -> Result<Font, ConvertError> {
    let items: &[ParsedValue] = match value {
        ParsedValue::Sequence(items) => items,
        single => std::slice::from_ref(single),
    };

    let mut out = font.clone();
    let mut size_seen = false;
    let mut family: Vec<&str> = Vec::new();

    for item in items {
        match item {
            ParsedValue::Size(size) if !size_seen => {
                out.size = size.pixels(font.size, font);
                size_seen = true;
            }
            ParsedValue::Number(n) if !size_seen => {
                out.size = *n;
                size_seen = true;
            }
            ParsedValue::Ident(s) if !size_seen => {
                if let Some(p) = FontPosture::from_name(s) {
                    out.posture = p;
                } else if let Some(w) = weight::from_name(s) {
                    out.weight = w;
                } else {
                    return Err(mismatch("font", item));
                }
            }
            ParsedValue::Ident(s) | ParsedValue::Str(s) if size_seen => family.push(s),
            other => return Err(mismatch("font", other)),
        }
    }

    if !size_seen {
        return Err(ConvertError::TypeMismatch {
            expected: "font size",
            found: value.kind(),
        });
    }
    if !family.is_empty() {
        out.family = family.join(" ");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_pixels() {
        let font = Font::default().with_size(20.0);
        assert_eq!(Size::px(10.0).pixels(1.0, &font), 10.0);
        assert_eq!(Size::em(2.0).pixels(1.0, &font), 40.0);
        assert_eq!(Size::new(50.0, SizeUnit::Percent).pixels(30.0, &font), 15.0);
        assert_eq!(Size::new(72.0, SizeUnit::Pt).pixels(1.0, &font), 96.0);
        assert_eq!(Size::new(1.0, SizeUnit::In).pixels(1.0, &font), 96.0);
    }

    #[test]
    fn test_relative_units() {
        assert!(SizeUnit::Em.is_relative());
        assert!(SizeUnit::Percent.is_relative());
        assert!(!SizeUnit::Px.is_relative());
        let shorthand = ParsedValue::Sequence(vec![
            ParsedValue::Ident("bold".into()),
            ParsedValue::Size(Size::em(1.5)),
        ]);
        assert!(shorthand.needs_font());
    }

    #[test]
    fn test_color_hex() {
        assert_eq!(Color::from_hex("f00"), Some(Color::rgb(255, 0, 0)));
        assert_eq!(Color::from_hex("00ff0080"), Some(Color::rgba(0, 255, 0, 128)));
        assert_eq!(Color::from_hex("zz0000"), None);
        assert_eq!(Color::from_hex("12345"), None);
    }

    #[test]
    fn test_font_size_converter() {
        let font = Font::default().with_size(20.0);
        let value = ParsedValue::Size(Size::em(2.0));
        assert_eq!(Converter::FontSize.convert(&value, &font), Ok(StyleValue::Number(40.0)));

        let pct = ParsedValue::Size(Size::new(150.0, SizeUnit::Percent));
        assert_eq!(Converter::FontSize.convert(&pct, &font), Ok(StyleValue::Number(30.0)));
    }

    #[test]
    fn test_font_shorthand() {
        let base = Font::default();
        let value = ParsedValue::Sequence(vec![
            ParsedValue::Ident("italic".into()),
            ParsedValue::Ident("bold".into()),
            ParsedValue::Size(Size::px(18.0)),
            ParsedValue::Str("Open Sans".into()),
        ]);
        let font = match Converter::Font.convert(&value, &base) {
            Ok(StyleValue::Font(font)) => font,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(font.size, 18.0);
        assert_eq!(font.weight, weight::BOLD);
        assert_eq!(font.posture, FontPosture::Italic);
        assert_eq!(font.family, "Open Sans");
    }

    #[test]
    fn test_font_shorthand_requires_size() {
        let value = ParsedValue::Ident("Arial".into());
        assert!(Converter::Font.convert(&value, &Font::default()).is_err());
    }

    #[test]
    fn test_mismatch_and_lookup_errors() {
        let font = Font::default();
        assert!(matches!(
            Converter::Color.convert(&ParsedValue::Number(1.0), &font),
            Err(ConvertError::TypeMismatch { expected: "color", .. })
        ));
        assert_eq!(
            Converter::Number.convert(&ParsedValue::Lookup("-x".into()), &font),
            Err(ConvertError::Unresolved("-x".into()))
        );
        assert_eq!(Converter::Number.convert(&ParsedValue::Null, &font), Ok(StyleValue::Null));
    }

    #[test]
    fn test_compose_font_from_sub_properties() {
        let mut values = HashMap::new();
        values.insert(crate::property::FONT_SIZE.to_string(), StyleValue::Number(22.0));
        values.insert(crate::property::FONT_FAMILY.to_string(), StyleValue::Str("Serif".into()));
        let composed = Converter::Font.convert_sub_properties(&values, &Font::default()).unwrap();
        let font = composed.as_font().unwrap();
        assert_eq!(font.size, 22.0);
        assert_eq!(font.family, "Serif");
        assert_eq!(font.weight, weight::NORMAL);
    }
}
