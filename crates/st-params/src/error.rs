// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use thiserror::Error;

/// Result alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Error type covering graph construction and parameter resolution.
#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    /// A sibling parameter or module already uses the requested name.
    #[error("name `{name}` already taken on module `{module}`")]
    NameCollision { module: String, name: String },
    /// The requested edge would make the ownership graph cyclic.
    #[error("linking `{child}` under `{parent}` would create a cycle")]
    Cycle { parent: String, child: String },
    /// A dynamic parameter was read without a value in the active context.
    #[error("dynamic parameter `{path}` has no value in this context")]
    UnresolvedParameter { path: String },
    /// A supplied value does not match the parameter's locked shape.
    #[error("value for `{path}` has shape {got:?}, expected {expected:?}")]
    ShapeMismatch {
        path: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    /// A flat input does not carry exactly the packed element count.
    #[error("flat input carries {got} elements, packed view requires {expected}")]
    LengthMismatch { expected: usize, got: usize },
    /// A mapping addressed a path that names no dynamic parameter.
    #[error("no parameter at `{path}`")]
    UnknownParameter { path: String },
    /// A mapping tried to feed a value into a static parameter.
    #[error("parameter `{path}` is static; assign it directly instead of packing a value")]
    StaticParameterOverride { path: String },
    /// The graph changed since the packed view was derived.
    #[error("packed view is stale; the graph changed since it was derived")]
    StalePackedView,
    /// Parameters must be declared before any child module is attached.
    #[error("module `{module}` already has children; declare parameter `{name}` first")]
    DeclarationOrder { module: String, name: String },
    /// An id from another graph (or a removed node) was presented.
    #[error("module id {index} is not part of this graph")]
    UnknownModule { index: usize },
}
