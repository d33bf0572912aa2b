// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Diagnostic structural view of a module graph. Purely descriptive: nothing
//! here participates in packing or computation.

use core::fmt;
use std::collections::HashSet;

use crate::error::GraphResult;
use crate::module::{ModuleGraph, ModuleId};

/// One parameter row in the diagnostic view.
#[derive(Clone, Debug)]
pub struct ParamView {
    pub name: String,
    pub dynamic: bool,
    pub shape: Option<Vec<usize>>,
}

/// One module node in the diagnostic view. A node shared by several parents
/// renders in full once; later encounters become [`GraphNode::Shared`]
/// references.
#[derive(Clone, Debug)]
pub enum GraphNode {
    Module {
        name: String,
        params: Vec<ParamView>,
        children: Vec<GraphNode>,
    },
    Shared {
        name: String,
    },
}

/// Structural snapshot produced by [`ModuleGraph::graph_view`].
#[derive(Clone, Debug)]
pub struct GraphView {
    root: GraphNode,
}

impl ModuleGraph {
    /// Produces a diagnostic tree of modules and their parameters.
    /// `include_dynamic` / `include_static` filter which parameters appear.
    pub fn graph_view(
        &self,
        root: ModuleId,
        include_dynamic: bool,
        include_static: bool,
    ) -> GraphResult<GraphView> {
        let mut seen = HashSet::new();
        let root = self.view_node(root, include_dynamic, include_static, &mut seen)?;
        Ok(GraphView { root })
    }

    fn view_node(
        &self,
        id: ModuleId,
        include_dynamic: bool,
        include_static: bool,
        seen: &mut HashSet<ModuleId>,
    ) -> GraphResult<GraphNode> {
        let node = self.node(id)?;
        if !seen.insert(id) {
            return Ok(GraphNode::Shared {
                name: node.name().to_string(),
            });
        }
        let params = node
            .params()
            .iter()
            .filter(|param| {
                if param.is_dynamic() {
                    include_dynamic
                } else {
                    include_static
                }
            })
            .map(|param| ParamView {
                name: param.name().to_string(),
                dynamic: param.is_dynamic(),
                shape: param.shape().map(<[usize]>::to_vec),
            })
            .collect();
        let children = node
            .children()
            .iter()
            .map(|&child| self.view_node(child, include_dynamic, include_static, seen))
            .collect::<GraphResult<Vec<_>>>()?;
        Ok(GraphNode::Module {
            name: node.name().to_string(),
            params,
            children,
        })
    }
}

impl GraphView {
    pub fn root(&self) -> &GraphNode {
        &self.root
    }
}

fn write_node(f: &mut fmt::Formatter<'_>, node: &GraphNode, depth: usize) -> fmt::Result {
    let pad = "  ".repeat(depth);
    match node {
        GraphNode::Shared { name } => writeln!(f, "{pad}{name} (shared)"),
        GraphNode::Module {
            name,
            params,
            children,
        } => {
            writeln!(f, "{pad}{name}")?;
            for param in params {
                let kind = if param.dynamic { "dynamic" } else { "static" };
                match &param.shape {
                    Some(shape) if !shape.is_empty() => {
                        writeln!(f, "{pad}  .{} [{kind}, shape {:?}]", param.name, shape)?
                    }
                    _ => writeln!(f, "{pad}  .{} [{kind}]", param.name)?,
                }
            }
            for child in children {
                write_node(f, child, depth + 1)?;
            }
            Ok(())
        }
    }
}

impl fmt::Display for GraphView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(f, &self.root, 0)
    }
}
