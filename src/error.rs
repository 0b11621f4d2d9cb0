//! Errors produced while building, evaluating and drawing expression trees.

use std::path::PathBuf;

use crate::gp::expr::NodeId;

pub type Result<T> = std::result::Result<T, Error>;

/// The ways in which a flat token stream may fail to describe a tree.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    #[error("the expression contains no tokens")]
    Empty,

    #[error("unknown token `{token}` at position {position}")]
    UnknownToken { token: String, position: usize },

    #[error("expression ended while {pending} node(s) still await children")]
    Truncated { pending: usize },

    #[error("trailing token `{token}` at position {position} after the root was complete")]
    TrailingTokens { token: String, position: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("malformed expression: {0}")]
    Structure(#[from] StructureError),

    #[error("expression requires {required} input value(s) but {provided} were given")]
    Argument { required: usize, provided: usize },

    #[error("no render rule matches node {node}")]
    NoMatchingRule { node: NodeId },

    #[error("primitive `{name}` failed")]
    Primitive {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("a primitive named `{0}` is already registered")]
    DuplicatePrimitive(String),

    #[error("no argument named `{0}` is registered")]
    UnknownArgument(String),

    #[error("node {0} has not been evaluated")]
    NotEvaluated(NodeId),

    #[error("the value of node {0} has no image representation")]
    NotAnImage(NodeId),

    #[error("value `{0}` has no image representation")]
    NoImage(String),

    #[error("cannot generate an expression: {0}")]
    Generation(String),

    #[error("layout program `{program}` failed to render {path}: {status}")]
    Layout {
        program: String,
        path: PathBuf,
        status: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl Error {
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }
}
