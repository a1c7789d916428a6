//! Style Errors
//!
//! Hard failures are returned as [`StyleError`]. Everything the styling pass
//! can recover from is recorded as a [`CssError`] on the [`StyleManager`]
//! and styling carries on with the next property or stylesheet.
//!
//! [`StyleManager`]: crate::StyleManager

/// Errors that stop the current operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StyleError {
    /// An intern table is full; more names would corrupt bit positions
    #[error("{kind} table capacity exceeded (limit {limit})")]
    CapacityExceeded { kind: &'static str, limit: usize },

    /// The value cache this helper was built against has been cleared.
    /// The node has to be restyled from scratch.
    #[error("style cache generation {generation} has been reclaimed")]
    StaleCache { generation: u32 },

    /// Malformed selector or declaration text
    #[error("Parse error at line {line}: {message}")]
    Parse { line: u32, message: String },
}

/// Recoverable diagnostics collected during loading and styling
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CssError {
    /// A stylesheet could not be loaded; it is treated as empty
    #[error("failed to load stylesheet {url}: {message}")]
    StylesheetLoad { url: String, message: String },

    /// A node's inline style string could not be parsed
    #[error("failed to parse inline style \"{style}\" on {node}: {message}")]
    InlineStyleParse {
        node: String,
        style: String,
        message: String,
    },

    /// A value could not be converted or applied to a property
    #[error("cannot set {property} on {node}: {message}")]
    PropertySet {
        node: String,
        property: String,
        message: String,
    },

    /// A lookup reference was not found on the node or any ancestor
    #[error("could not resolve lookup '{lookup}' for {property} on {node}")]
    UnresolvedLookup {
        node: String,
        property: String,
        lookup: String,
        /// Selector of the rule that used the lookup, when known
        selector: Option<String>,
    },
}

/// Converter failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: String },

    #[error("unresolved lookup '{0}'")]
    Unresolved(String),
}
