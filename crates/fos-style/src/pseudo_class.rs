//! Pseudo-class & Style-class Interning
//!
//! Pseudo-class names (`hover`, `focused`) and style-class names (`button`)
//! are interned into process-wide, append-only tables. The index of a name
//! is its bit position in a [`BitSet`](crate::BitSet), so equal names always
//! occupy the same bit.
//!
//! Tables are bounded. Running out of room is a hard error rather than a
//! silent wrap, since a reused index would alias two names onto one bit.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;

use crate::error::StyleError;

/// Maximum number of names in each global table
pub const MAX_INTERNED: usize = 1020;

/// An append-only name table
#[derive(Debug)]
pub struct InternTable {
    kind: &'static str,
    limit: usize,
    names: Vec<Arc<str>>,
    index: HashMap<Arc<str>, u32>,
}

impl InternTable {
    /// Create a table holding at most `limit` names
    pub fn with_limit(kind: &'static str, limit: usize) -> Self {
        Self {
            kind,
            limit,
            names: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Intern a name, returning its stable index
    pub fn intern(&mut self, name: &str) -> Result<u32, StyleError> {
        if let Some(&idx) = self.index.get(name) {
            return Ok(idx);
        }
        if self.names.len() >= self.limit {
            return Err(StyleError::CapacityExceeded {
                kind: self.kind,
                limit: self.limit,
            });
        }

        let idx = self.names.len() as u32;
        let name: Arc<str> = Arc::from(name);
        self.names.push(name.clone());
        self.index.insert(name, idx);
        tracing::trace!("Interned {} '{}' at {}", self.kind, self.names[idx as usize], idx);
        Ok(idx)
    }

    /// Index of an already interned name
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.index.get(name).copied()
    }

    /// Name stored at `index`
    pub fn name(&self, index: u32) -> Option<Arc<str>> {
        self.names.get(index as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

static PSEUDO_CLASSES: LazyLock<RwLock<InternTable>> =
    LazyLock::new(|| RwLock::new(InternTable::with_limit("pseudo-class", MAX_INTERNED)));

static STYLE_CLASSES: LazyLock<RwLock<InternTable>> =
    LazyLock::new(|| RwLock::new(InternTable::with_limit("style-class", MAX_INTERNED)));

/// Items that live at a fixed bit position
pub trait Interned: Copy + Eq + Hash {
    fn index(self) -> usize;
    fn from_index(index: usize) -> Self;
}

macro_rules! interned_handle {
    ($(#[$meta:meta])* $name:ident, $table:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Intern `name`, failing once the global table is full
            pub fn intern(name: &str) -> Result<Self, StyleError> {
                if let Some(idx) = $table.read().lookup(name) {
                    return Ok(Self(idx));
                }
                $table.write().intern(name).map(Self)
            }

            /// Handle for a name that has already been interned
            pub fn lookup(name: &str) -> Option<Self> {
                $table.read().lookup(name).map(Self)
            }

            /// The interned name
            pub fn name(self) -> Arc<str> {
                $table.read().name(self.0).unwrap_or_else(|| Arc::from(""))
            }

            /// Number of names interned so far
            pub fn count() -> usize {
                $table.read().len()
            }
        }

        impl Interned for $name {
            #[inline]
            fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}:{})", stringify!($name), self.0, self.name())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.name())
            }
        }
    };
}

interned_handle!(
    /// A dynamic state predicate such as `hover` or `focused`
    PseudoClass,
    PSEUDO_CLASSES
);

interned_handle!(
    /// A static classification name such as `button`
    StyleClass,
    STYLE_CLASSES
);
