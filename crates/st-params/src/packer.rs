// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Packing and resolution: converts between the tree's currently-dynamic
//! parameters and a flat ordered vector, an ordered sequence of tensors, or
//! a nested name-keyed mapping. Structure derivation is a single graph walk;
//! value substitution reuses the derived [`PackedView`] across a batch.

use std::collections::HashMap;

use ndarray::{ArrayView2, IxDyn};

use crate::error::{GraphError, GraphResult};
use crate::module::{ModuleGraph, ModuleId, ParamId};
use crate::param::{ParamState, Scalar, Value};

/// One dynamic parameter slot in packing order.
#[derive(Clone, Debug)]
pub struct PackedEntry {
    pub(crate) param: ParamId,
    path: String,
    name: String,
    shape: Option<Vec<usize>>,
    count: usize,
}

impl PackedEntry {
    pub fn param(&self) -> ParamId {
        self.param
    }

    /// Dot-joined path of the owning module, from the traversal root.
    pub fn module_path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully qualified `module.path.param` name.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.path, self.name)
    }

    /// Locked shape; `None` packs as a single scalar element.
    pub fn shape(&self) -> Option<&[usize]> {
        self.shape.as_deref()
    }

    pub fn element_count(&self) -> usize {
        self.count
    }
}

/// Point-in-time, read-only resolution of the tree's dynamic parameters.
///
/// The view remembers the graph generation it was derived at; resolving
/// against a graph that has mutated since fails with
/// [`GraphError::StalePackedView`].
#[derive(Clone, Debug)]
pub struct PackedView {
    generation: u64,
    entries: Vec<PackedEntry>,
    total: usize,
}

impl PackedView {
    pub fn entries(&self) -> &[PackedEntry] {
        &self.entries
    }

    /// Number of dynamic parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total flat element count across all dynamic parameters.
    pub fn total_elements(&self) -> usize {
        self.total
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Nested mapping input: module path, then parameter name, then value.
pub type ValueMap = HashMap<String, HashMap<String, Value>>;

/// Fully-resolved, immutable context for one computation. Borrowing the
/// graph keeps the tree structurally frozen for the context's lifetime.
#[derive(Clone, Debug)]
pub struct Resolved<'g> {
    graph: &'g ModuleGraph,
    values: HashMap<ParamId, Value>,
}

impl<'g> Resolved<'g> {
    /// Reads a parameter: supplied value for dynamics, stored value for
    /// statics. A dynamic parameter absent from this context fails here, at
    /// read time, not at resolve time.
    pub fn value(&self, param: ParamId) -> GraphResult<&Value> {
        if let Some(value) = self.values.get(&param) {
            return Ok(value);
        }
        match self.graph.parameter(param)?.state() {
            ParamState::Static(value) => Ok(value),
            ParamState::Dynamic => Err(GraphError::UnresolvedParameter {
                path: self.graph.param_display(param),
            }),
        }
    }

    /// Reads a parameter as a scalar. Non-scalar shapes are a shape error.
    pub fn scalar(&self, param: ParamId) -> GraphResult<Scalar> {
        let value = self.value(param)?;
        if value.len() != 1 {
            return Err(GraphError::ShapeMismatch {
                path: self.graph.param_display(param),
                expected: Vec::new(),
                got: value.shape().to_vec(),
            });
        }
        Ok(*value.iter().next().expect("len checked"))
    }

    pub fn graph(&self) -> &'g ModuleGraph {
        self.graph
    }
}

impl ModuleGraph {
    /// Derives the packed view of all currently-dynamic parameters under
    /// `root`: stable pre-order, a module's own parameters in declaration
    /// order before its children, shared nodes visited once.
    pub fn pack(&self, root: ModuleId) -> GraphResult<PackedView> {
        let mut entries = Vec::new();
        let mut total = 0usize;
        for (module, path) in self.walk(root)? {
            let node = self.node(module)?;
            for (slot, param) in node.params().iter().enumerate() {
                if !param.is_dynamic() {
                    continue;
                }
                let count = param.element_count();
                entries.push(PackedEntry {
                    param: ParamId { module, slot },
                    path: path.clone(),
                    name: param.name().to_string(),
                    shape: param.shape().map(<[usize]>::to_vec),
                    count,
                });
                total += count;
            }
        }
        Ok(PackedView {
            generation: self.generation(),
            entries,
            total,
        })
    }

    /// Resolves an ordered flat vector against a packed view. The input must
    /// carry exactly the view's total element count.
    pub fn resolve_flat<'g>(
        &'g self,
        view: &PackedView,
        values: &[Scalar],
    ) -> GraphResult<Resolved<'g>> {
        self.check_view(view)?;
        if values.len() != view.total {
            return Err(GraphError::LengthMismatch {
                expected: view.total,
                got: values.len(),
            });
        }
        self.consume_flat(view, values.iter().copied())
    }

    /// Resolves an ordered sequence of tensors, one per dynamic parameter,
    /// checking each against the parameter's locked shape.
    pub fn resolve_values<'g>(
        &'g self,
        view: &PackedView,
        values: &[Value],
    ) -> GraphResult<Resolved<'g>> {
        self.check_view(view)?;
        if values.len() != view.entries.len() {
            return Err(GraphError::LengthMismatch {
                expected: view.entries.len(),
                got: values.len(),
            });
        }
        let mut resolved = HashMap::with_capacity(values.len());
        for (entry, value) in view.entries.iter().zip(values) {
            if let Some(shape) = entry.shape() {
                if shape != value.shape() {
                    return Err(GraphError::ShapeMismatch {
                        path: entry.qualified(),
                        expected: shape.to_vec(),
                        got: value.shape().to_vec(),
                    });
                }
            }
            resolved.insert(entry.param, value.clone());
        }
        Ok(Resolved {
            graph: self,
            values: resolved,
        })
    }

    /// Resolves a nested mapping. The mapping may cover a strict subset of
    /// the dynamic parameters; the ones it leaves out fail lazily when read.
    /// Unknown paths or names, and paths naming static parameters, fail
    /// eagerly.
    pub fn resolve_map<'g>(&'g self, root: ModuleId, mapping: &ValueMap) -> GraphResult<Resolved<'g>> {
        let mut by_path: HashMap<&str, ModuleId> = HashMap::new();
        let order = self.walk(root)?;
        for (module, path) in &order {
            by_path.insert(path.as_str(), *module);
        }

        let mut resolved = HashMap::new();
        let mut module_paths: Vec<&String> = mapping.keys().collect();
        module_paths.sort();
        for module_path in module_paths {
            let Some(&module) = by_path.get(module_path.as_str()) else {
                return Err(GraphError::UnknownParameter {
                    path: module_path.clone(),
                });
            };
            let node = self.node(module)?;
            let params = &mapping[module_path];
            let mut names: Vec<&String> = params.keys().collect();
            names.sort();
            for name in names {
                let qualified = format!("{module_path}.{name}");
                let Some(slot) = node.params().iter().position(|p| p.name() == name.as_str())
                else {
                    return Err(GraphError::UnknownParameter { path: qualified });
                };
                let param = &node.params()[slot];
                if !param.is_dynamic() {
                    return Err(GraphError::StaticParameterOverride { path: qualified });
                }
                let value = &params[name];
                if let Some(shape) = param.shape() {
                    if shape != value.shape() {
                        return Err(GraphError::ShapeMismatch {
                            path: qualified,
                            expected: shape.to_vec(),
                            got: value.shape().to_vec(),
                        });
                    }
                }
                resolved.insert(ParamId { module, slot }, value.clone());
            }
        }
        Ok(Resolved {
            graph: self,
            values: resolved,
        })
    }

    /// Resolves a whole batch of flat parameter rows against one derived
    /// view. Structure work is done once; each row only substitutes values.
    pub fn resolve_flat_batch<'g>(
        &'g self,
        view: &PackedView,
        rows: ArrayView2<'_, Scalar>,
    ) -> GraphResult<Vec<Resolved<'g>>> {
        self.check_view(view)?;
        if rows.ncols() != view.total {
            return Err(GraphError::LengthMismatch {
                expected: view.total,
                got: rows.ncols(),
            });
        }
        rows.rows()
            .into_iter()
            .map(|row| self.consume_flat(view, row.iter().copied()))
            .collect()
    }

    fn check_view(&self, view: &PackedView) -> GraphResult<()> {
        if view.generation != self.generation() {
            return Err(GraphError::StalePackedView);
        }
        Ok(())
    }

    fn consume_flat<'g, I>(&'g self, view: &PackedView, mut values: I) -> GraphResult<Resolved<'g>>
    where
        I: Iterator<Item = Scalar>,
    {
        let mut resolved = HashMap::with_capacity(view.entries.len());
        for entry in &view.entries {
            let chunk: Vec<Scalar> = values.by_ref().take(entry.count).collect();
            debug_assert_eq!(chunk.len(), entry.count);
            let shape = entry.shape.clone().unwrap_or_default();
            let value =
                Value::from_shape_vec(IxDyn(&shape), chunk).expect("entry count matches shape");
            resolved.insert(entry.param, value);
        }
        Ok(Resolved {
            graph: self,
            values: resolved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::scalar_value;

    fn lens_tree(graph: &mut ModuleGraph) -> (ModuleId, ParamId, ParamId, ParamId) {
        let sim = graph.add_module("sim");
        let z_s = graph.add_parameter(sim, "z_s", None).unwrap();
        let lens = graph.add_module("lens");
        let q = graph.add_parameter(lens, "q", None).unwrap();
        let b = graph.add_parameter(lens, "b", Some(scalar_value(1.2))).unwrap();
        graph.add_child(sim, lens).unwrap();
        (sim, z_s, q, b)
    }

    #[test]
    fn pack_orders_params_before_children() {
        let mut graph = ModuleGraph::new();
        let (sim, ..) = lens_tree(&mut graph);
        let view = graph.pack(sim).unwrap();
        let names: Vec<String> = view.entries().iter().map(|e| e.qualified()).collect();
        assert_eq!(names, vec!["sim.z_s", "sim.lens.q"]);
        assert_eq!(view.total_elements(), 2);
    }

    #[test]
    fn flat_roundtrip_reproduces_values() {
        let mut graph = ModuleGraph::new();
        let (sim, z_s, q, _) = lens_tree(&mut graph);
        let view = graph.pack(sim).unwrap();
        let ctx = graph.resolve_flat(&view, &[1.5, 0.7]).unwrap();
        assert_eq!(ctx.scalar(z_s).unwrap(), 1.5);
        assert_eq!(ctx.scalar(q).unwrap(), 0.7);
    }

    #[test]
    fn static_values_read_through_without_packing() {
        let mut graph = ModuleGraph::new();
        let (sim, _, _, b) = lens_tree(&mut graph);
        let view = graph.pack(sim).unwrap();
        let ctx = graph.resolve_flat(&view, &[1.5, 0.7]).unwrap();
        assert_eq!(ctx.scalar(b).unwrap(), 1.2);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let mut graph = ModuleGraph::new();
        let (sim, ..) = lens_tree(&mut graph);
        let view = graph.pack(sim).unwrap();
        let err = graph.resolve_flat(&view, &[1.0]).unwrap_err();
        assert_eq!(err, GraphError::LengthMismatch { expected: 2, got: 1 });
    }

    #[test]
    fn tensor_sequence_checks_shapes() {
        let mut graph = ModuleGraph::new();
        let lens = graph.add_module("lens");
        let grid = graph
            .add_parameter(lens, "grid", Some(Value::zeros(IxDyn(&[2, 3]))))
            .unwrap();
        graph.set(grid, None).unwrap();
        let view = graph.pack(lens).unwrap();
        assert_eq!(view.total_elements(), 6);
        let err = graph
            .resolve_values(&view, &[scalar_value(1.0)])
            .unwrap_err();
        assert!(matches!(err, GraphError::ShapeMismatch { .. }));
        let ctx = graph
            .resolve_values(&view, &[Value::zeros(IxDyn(&[2, 3]))])
            .unwrap();
        assert_eq!(ctx.value(grid).unwrap().len(), 6);
    }

    #[test]
    fn mapping_resolution_is_lazy_about_missing_dynamics() {
        let mut graph = ModuleGraph::new();
        let (sim, z_s, q, _) = lens_tree(&mut graph);
        let mut mapping = ValueMap::new();
        mapping.insert(
            "sim".to_string(),
            HashMap::from([("z_s".to_string(), scalar_value(2.0))]),
        );
        let ctx = graph.resolve_map(sim, &mapping).unwrap();
        assert_eq!(ctx.scalar(z_s).unwrap(), 2.0);
        let err = ctx.scalar(q).unwrap_err();
        assert!(matches!(err, GraphError::UnresolvedParameter { .. }));
    }

    #[test]
    fn mapping_rejects_unknown_and_static_targets() {
        let mut graph = ModuleGraph::new();
        let (sim, ..) = lens_tree(&mut graph);
        let mut mapping = ValueMap::new();
        mapping.insert(
            "sim.lens".to_string(),
            HashMap::from([("nope".to_string(), scalar_value(1.0))]),
        );
        let err = graph.resolve_map(sim, &mapping).unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownParameter {
                path: "sim.lens.nope".to_string()
            }
        );

        let mut mapping = ValueMap::new();
        mapping.insert(
            "sim.lens".to_string(),
            HashMap::from([("b".to_string(), scalar_value(1.0))]),
        );
        let err = graph.resolve_map(sim, &mapping).unwrap_err();
        assert_eq!(
            err,
            GraphError::StaticParameterOverride {
                path: "sim.lens.b".to_string()
            }
        );
    }

    #[test]
    fn mutation_invalidates_cached_views() {
        let mut graph = ModuleGraph::new();
        let (sim, z_s, ..) = lens_tree(&mut graph);
        let view = graph.pack(sim).unwrap();
        graph.set(z_s, Some(scalar_value(1.0))).unwrap();
        let err = graph.resolve_flat(&view, &[0.7]).unwrap_err();
        assert_eq!(err, GraphError::StalePackedView);
    }

    #[test]
    fn state_flip_keeps_relative_order() {
        let mut graph = ModuleGraph::new();
        let (sim, z_s, q, _) = lens_tree(&mut graph);
        let before: Vec<String> = graph
            .pack(sim)
            .unwrap()
            .entries()
            .iter()
            .map(|e| e.qualified())
            .collect();
        graph.set(q, Some(scalar_value(0.5))).unwrap();
        graph.set(q, None).unwrap();
        let after: Vec<String> = graph
            .pack(sim)
            .unwrap()
            .entries()
            .iter()
            .map(|e| e.qualified())
            .collect();
        assert_eq!(before, after);
        let _ = z_s;
    }

    #[test]
    fn empty_dynamic_set_packs_to_length_zero() {
        let mut graph = ModuleGraph::new();
        let lens = graph.add_module("lens");
        graph
            .add_parameter(lens, "b", Some(scalar_value(1.0)))
            .unwrap();
        let view = graph.pack(lens).unwrap();
        assert!(view.is_empty());
        assert_eq!(view.total_elements(), 0);
        let ctx = graph.resolve_flat(&view, &[]).unwrap();
        drop(ctx);
    }

    #[test]
    fn batch_rows_share_one_structure_derivation() {
        let mut graph = ModuleGraph::new();
        let (sim, z_s, q, _) = lens_tree(&mut graph);
        let view = graph.pack(sim).unwrap();
        let rows = ndarray::arr2(&[[1.0, 0.5], [2.0, 0.8], [3.0, 0.9]]);
        let contexts = graph.resolve_flat_batch(&view, rows.view()).unwrap();
        assert_eq!(contexts.len(), 3);
        assert_eq!(contexts[1].scalar(z_s).unwrap(), 2.0);
        assert_eq!(contexts[2].scalar(q).unwrap(), 0.9);
    }
}
