//! Scene Errors

use fos_style::StyleError;

use crate::NodeId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SceneError {
    #[error("no node {0} in scene graph")]
    UnknownNode(NodeId),

    #[error(transparent)]
    Style(#[from] StyleError),
}
