//! Error types for the model core
//!
//! Errors split into two families: usage errors (programmer error, surfaced
//! immediately to the caller, never retried) and view errors (cast failures
//! carrying enough context to self-diagnose without a debugger). Recoverable
//! absence — `find`, `has`, and friends — is modeled as `Option`, never as
//! an error.

use thiserror::Error;

/// Errors that can occur in the model core
#[derive(Error, Debug)]
pub enum ModelError {
    /// A required component is absent from a node
    #[error("no component of type '{component}' on node '{node}'")]
    ComponentNotFound {
        /// Display name of the node
        node: String,
        /// Requested component type name
        component: &'static str,
    },

    /// No projection on the node satisfies the requested view type
    #[error("node '{node}' cannot be viewed as '{requested}' (viewable as: {available})")]
    IncompatibleView {
        /// Display name of the node
        node: String,
        /// Requested view type name
        requested: &'static str,
        /// Comma-separated list of currently viewable type names
        available: String,
    },

    /// Attempted to advance a node already in its terminal state
    #[error("node '{node}' is already realized")]
    AlreadyRealized {
        /// Display name of the node
        node: String,
    },

    /// Non-optional lookup of a path with no registered node
    #[error("no node registered at path '{path}'")]
    PathNotFound {
        /// The looked-up path
        path: String,
    },

    /// A node id that no registry knows about
    #[error("unknown node id {id}")]
    UnknownNode {
        /// The raw node id
        id: u64,
    },

    /// Registration targeting an already-occupied path
    #[error("a node is already registered at path '{path}'")]
    DuplicatePath {
        /// The contested path
        path: String,
    },

    /// A child name that parent derivation could not reproduce
    #[error("invalid path segment '{name}'")]
    MalformedName {
        /// The rejected segment
        name: String,
    },
}

/// Result type for model core operations
pub type Result<T> = std::result::Result<T, ModelError>;
