// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Arena of named module nodes. Ownership edges are stored as ids so a node
//! can be shared by several parents without duplicating it; acyclicity is
//! enforced by a reachability check on edge insertion rather than by any
//! lifetime discipline.

use std::collections::HashSet;

use crate::error::{GraphError, GraphResult};
use crate::param::{Parameter, Value};

/// Stable identifier of a module node inside one [`ModuleGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub(crate) usize);

impl ModuleId {
    /// Raw arena index, for diagnostics.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Stable identifier of a parameter slot on a module node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParamId {
    pub(crate) module: ModuleId,
    pub(crate) slot: usize,
}

impl ParamId {
    /// Module owning this parameter.
    pub fn module(self) -> ModuleId {
        self.module
    }
}

/// One node of the module graph: a name, its parameters in declaration
/// order, and its children in declaration order.
#[derive(Clone, Debug)]
pub struct ModuleNode {
    name: String,
    params: Vec<Parameter>,
    children: Vec<ModuleId>,
}

impl ModuleNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn children(&self) -> &[ModuleId] {
        &self.children
    }
}

/// Arena of module nodes forming a DAG rooted at a caller-chosen node.
///
/// Every structural mutation and every dynamic/static flip bumps an internal
/// generation counter; packed views remember the generation they were derived
/// at and refuse to resolve against a graph that moved on.
#[derive(Clone, Debug, Default)]
pub struct ModuleGraph {
    nodes: Vec<ModuleNode>,
    generation: u64,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation counter, bumped on every mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Creates a detached module node.
    pub fn add_module(&mut self, name: impl Into<String>) -> ModuleId {
        let id = ModuleId(self.nodes.len());
        self.nodes.push(ModuleNode {
            name: name.into(),
            params: Vec::new(),
            children: Vec::new(),
        });
        self.generation += 1;
        id
    }

    pub fn node(&self, id: ModuleId) -> GraphResult<&ModuleNode> {
        self.nodes
            .get(id.0)
            .ok_or(GraphError::UnknownModule { index: id.0 })
    }

    fn node_mut(&mut self, id: ModuleId) -> GraphResult<&mut ModuleNode> {
        self.nodes
            .get_mut(id.0)
            .ok_or(GraphError::UnknownModule { index: id.0 })
    }

    /// Declares a parameter on `module`. Parameters must be declared before
    /// any child is attached so the packing order stays intuitive.
    pub fn add_parameter(
        &mut self,
        module: ModuleId,
        name: impl Into<String>,
        initial: Option<Value>,
    ) -> GraphResult<ParamId> {
        let name = name.into();
        let node = self.node(module)?;
        if !node.children.is_empty() {
            return Err(GraphError::DeclarationOrder {
                module: node.name.clone(),
                name,
            });
        }
        if node.params.iter().any(|param| param.name() == name) {
            return Err(GraphError::NameCollision {
                module: node.name.clone(),
                name,
            });
        }
        let node = self.node_mut(module)?;
        let slot = node.params.len();
        node.params.push(Parameter::new(name, initial));
        self.generation += 1;
        Ok(ParamId { module, slot })
    }

    /// Attaches `child` under `parent`. Fails with [`GraphError::Cycle`] when
    /// `parent` is reachable from `child`; sibling name collisions are
    /// resolved by deterministically suffixing the child's name (`name_1`,
    /// `name_2`, ...) so anonymously constructed nodes compose without fuss.
    pub fn add_child(&mut self, parent: ModuleId, child: ModuleId) -> GraphResult<()> {
        self.node(parent)?;
        self.node(child)?;
        if parent == child || self.reaches(child, parent) {
            return Err(GraphError::Cycle {
                parent: self.nodes[parent.0].name.clone(),
                child: self.nodes[child.0].name.clone(),
            });
        }
        if self.nodes[parent.0].children.contains(&child) {
            return Err(GraphError::NameCollision {
                module: self.nodes[parent.0].name.clone(),
                name: self.nodes[child.0].name.clone(),
            });
        }
        let taken = self.sibling_names(child, Some(parent));
        if taken.contains(&self.nodes[child.0].name) {
            let base = self.nodes[child.0].name.clone();
            let mut suffix = 1usize;
            loop {
                let candidate = format!("{base}_{suffix}");
                if !taken.contains(&candidate) {
                    self.nodes[child.0].name = candidate;
                    break;
                }
                suffix += 1;
            }
        }
        self.nodes[parent.0].children.push(child);
        self.generation += 1;
        Ok(())
    }

    /// Renames a node. Unlike [`ModuleGraph::add_child`] this never
    /// auto-suffixes: an explicit rename that would collide with a sibling
    /// under any parent is an error.
    pub fn rename(&mut self, module: ModuleId, new_name: impl Into<String>) -> GraphResult<()> {
        let new_name = new_name.into();
        self.node(module)?;
        if self.nodes[module.0].name == new_name {
            return Ok(());
        }
        let taken = self.sibling_names(module, None);
        if taken.contains(&new_name) {
            return Err(GraphError::NameCollision {
                module: self.nodes[module.0].name.clone(),
                name: new_name,
            });
        }
        self.nodes[module.0].name = new_name;
        self.generation += 1;
        Ok(())
    }

    /// Assigns a concrete value (making the parameter static) or clears it
    /// back to dynamic with `None`.
    pub fn set(&mut self, param: ParamId, value: Option<Value>) -> GraphResult<()> {
        let path = self.param_display(param);
        let node = self.node_mut(param.module)?;
        let slot = node
            .params
            .get_mut(param.slot)
            .ok_or(GraphError::UnknownParameter { path: path.clone() })?;
        slot.set(value)
            .map_err(|(expected, got)| GraphError::ShapeMismatch {
                path,
                expected,
                got,
            })?;
        self.generation += 1;
        Ok(())
    }

    /// Convenience wrapper for scalar assignment.
    pub fn set_scalar(&mut self, param: ParamId, value: crate::param::Scalar) -> GraphResult<()> {
        self.set(param, Some(crate::param::scalar_value(value)))
    }

    pub fn parameter(&self, param: ParamId) -> GraphResult<&Parameter> {
        let node = self.node(param.module)?;
        node.params
            .get(param.slot)
            .ok_or_else(|| GraphError::UnknownParameter {
                path: self.param_display(param),
            })
    }

    /// `module.param` label used in error messages when no traversal root is
    /// at hand.
    pub(crate) fn param_display(&self, param: ParamId) -> String {
        let module = self
            .nodes
            .get(param.module.0)
            .map(|node| node.name.as_str())
            .unwrap_or("?");
        let name = self
            .nodes
            .get(param.module.0)
            .and_then(|node| node.params.get(param.slot))
            .map(|slot| slot.name())
            .unwrap_or("?");
        format!("{module}.{name}")
    }

    /// True when `target` is reachable from `from` along child edges.
    fn reaches(&self, from: ModuleId, target: ModuleId) -> bool {
        if from == target {
            return true;
        }
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            for &child in &self.nodes[current.0].children {
                if child == target {
                    return true;
                }
                stack.push(child);
            }
        }
        false
    }

    /// Names already taken among the siblings of `node` under every current
    /// parent, plus the children of `extra_parent` when an attachment is in
    /// flight.
    fn sibling_names(&self, node: ModuleId, extra_parent: Option<ModuleId>) -> HashSet<String> {
        let mut taken = HashSet::new();
        for (index, candidate) in self.nodes.iter().enumerate() {
            let is_parent =
                candidate.children.contains(&node) || extra_parent == Some(ModuleId(index));
            if !is_parent {
                continue;
            }
            for &sibling in &candidate.children {
                if sibling != node {
                    taken.insert(self.nodes[sibling.0].name.clone());
                }
            }
        }
        taken
    }

    /// Pre-order walk from `root`: each reachable node once, paired with its
    /// dot-joined qualified path. Shared nodes keep their first-visit path.
    pub(crate) fn walk(&self, root: ModuleId) -> GraphResult<Vec<(ModuleId, String)>> {
        self.node(root)?;
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        self.walk_into(root, self.nodes[root.0].name.clone(), &mut seen, &mut order);
        Ok(order)
    }

    fn walk_into(
        &self,
        node: ModuleId,
        path: String,
        seen: &mut HashSet<ModuleId>,
        order: &mut Vec<(ModuleId, String)>,
    ) {
        if !seen.insert(node) {
            return;
        }
        order.push((node, path.clone()));
        for &child in &self.nodes[node.0].children {
            let child_path = format!("{path}.{}", self.nodes[child.0].name);
            self.walk_into(child, child_path, seen, order);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::scalar_value;

    #[test]
    fn parameter_name_collision_is_rejected() {
        let mut graph = ModuleGraph::new();
        let lens = graph.add_module("lens");
        graph.add_parameter(lens, "q", None).unwrap();
        let err = graph.add_parameter(lens, "q", None).unwrap_err();
        assert!(matches!(err, GraphError::NameCollision { .. }));
    }

    #[test]
    fn parameters_must_precede_children() {
        let mut graph = ModuleGraph::new();
        let sim = graph.add_module("sim");
        let lens = graph.add_module("lens");
        graph.add_child(sim, lens).unwrap();
        let err = graph.add_parameter(sim, "z_s", None).unwrap_err();
        assert!(matches!(err, GraphError::DeclarationOrder { .. }));
    }

    #[test]
    fn cycle_is_rejected() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module("a");
        let b = graph.add_module("b");
        let c = graph.add_module("c");
        graph.add_child(a, b).unwrap();
        graph.add_child(b, c).unwrap();
        let err = graph.add_child(c, a).unwrap_err();
        assert!(matches!(err, GraphError::Cycle { .. }));
        let err = graph.add_child(a, a).unwrap_err();
        assert!(matches!(err, GraphError::Cycle { .. }));
    }

    #[test]
    fn sibling_collisions_auto_suffix_deterministically() {
        let mut graph = ModuleGraph::new();
        let sim = graph.add_module("sim");
        let first = graph.add_module("lens");
        let second = graph.add_module("lens");
        let third = graph.add_module("lens");
        graph.add_child(sim, first).unwrap();
        graph.add_child(sim, second).unwrap();
        graph.add_child(sim, third).unwrap();
        assert_eq!(graph.node(first).unwrap().name(), "lens");
        assert_eq!(graph.node(second).unwrap().name(), "lens_1");
        assert_eq!(graph.node(third).unwrap().name(), "lens_2");
    }

    #[test]
    fn explicit_rename_collision_fails() {
        let mut graph = ModuleGraph::new();
        let sim = graph.add_module("sim");
        let lens = graph.add_module("lens");
        let source = graph.add_module("source");
        graph.add_child(sim, lens).unwrap();
        graph.add_child(sim, source).unwrap();
        let err = graph.rename(source, "lens").unwrap_err();
        assert!(matches!(err, GraphError::NameCollision { .. }));
        graph.rename(source, "sersic").unwrap();
        assert_eq!(graph.node(source).unwrap().name(), "sersic");
    }

    #[test]
    fn shared_child_appears_once_in_walk() {
        let mut graph = ModuleGraph::new();
        let sim = graph.add_module("sim");
        let cosmo = graph.add_module("cosmology");
        let lens = graph.add_module("lens");
        graph.add_child(sim, cosmo).unwrap();
        graph.add_child(sim, lens).unwrap();
        graph.add_child(lens, cosmo).unwrap();
        let order = graph.walk(sim).unwrap();
        let names: Vec<&str> = order.iter().map(|(_, path)| path.as_str()).collect();
        assert_eq!(names, vec!["sim", "sim.cosmology", "sim.lens"]);
    }

    #[test]
    fn set_flips_state_and_bumps_generation() {
        let mut graph = ModuleGraph::new();
        let lens = graph.add_module("lens");
        let q = graph.add_parameter(lens, "q", Some(scalar_value(0.5))).unwrap();
        let before = graph.generation();
        graph.set(q, None).unwrap();
        assert!(graph.parameter(q).unwrap().is_dynamic());
        assert!(graph.generation() > before);
    }
}
