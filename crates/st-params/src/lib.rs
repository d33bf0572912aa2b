// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Parameter resolution graph.
//!
//! Physical models declare their inputs as named parameters on module nodes.
//! A parameter is either *dynamic* (supplied at call time) or *static*
//! (fixed at configuration time). Modules compose into a DAG — one node may
//! be shared by several parents — and the packer walks that DAG in a stable
//! pre-order to convert between a flat numeric vector (or a name-keyed
//! mapping) and a fully-resolved context handed to computations.

mod error;
mod module;
mod packer;
mod param;
mod view;

pub use error::{GraphError, GraphResult};
pub use module::{ModuleGraph, ModuleId, ModuleNode, ParamId};
pub use packer::{PackedEntry, PackedView, Resolved, ValueMap};
pub use param::{scalar_value, ParamState, Parameter, Scalar, Value};
pub use view::{GraphNode, GraphView, ParamView};
