//! fOS Scene Graph
//!
//! Arena-allocated tree of styleable nodes and the pass that applies CSS to
//! it through [`fos_style`].

mod apply;
mod error;
mod graph;

pub use apply::{ApplyStats, apply_css};
pub use error::SceneError;
pub use graph::{NodeRef, PropertyValue, SceneGraph, SceneNode};

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
