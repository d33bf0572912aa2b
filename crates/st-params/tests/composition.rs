// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Whole-tree composition: a simulator-shaped DAG with a shared cosmology
//! node, packed and resolved through every input form.

use std::collections::HashMap;

use st_params::{scalar_value, GraphError, ModuleGraph, ValueMap};

#[test]
fn simulator_shaped_tree_packs_and_resolves_consistently() {
    let mut graph = ModuleGraph::new();

    let sim = graph.add_module("sim");
    let z_s = graph.add_parameter(sim, "z_s", None).unwrap();

    let cosmology = graph.add_module("cosmology");
    let h0 = graph
        .add_parameter(cosmology, "h0", Some(scalar_value(67.66)))
        .unwrap();

    let lens = graph.add_module("lens");
    let q = graph.add_parameter(lens, "q", None).unwrap();
    let b = graph.add_parameter(lens, "b", None).unwrap();

    let source = graph.add_module("source");
    let ie = graph.add_parameter(source, "ie", None).unwrap();

    graph.add_child(sim, cosmology).unwrap();
    graph.add_child(sim, lens).unwrap();
    graph.add_child(sim, source).unwrap();
    // The lens shares the cosmology node; it must not repack.
    graph.add_child(lens, cosmology).unwrap();

    let view = graph.pack(sim).unwrap();
    let qualified: Vec<String> = view.entries().iter().map(|e| e.qualified()).collect();
    assert_eq!(
        qualified,
        vec!["sim.z_s", "sim.lens.q", "sim.lens.b", "sim.source.ie"]
    );

    // Flat resolution.
    let ctx = graph.resolve_flat(&view, &[1.5, 0.7, 1.1, 2.0]).unwrap();
    assert_eq!(ctx.scalar(z_s).unwrap(), 1.5);
    assert_eq!(ctx.scalar(q).unwrap(), 0.7);
    assert_eq!(ctx.scalar(b).unwrap(), 1.1);
    assert_eq!(ctx.scalar(ie).unwrap(), 2.0);
    assert_eq!(ctx.scalar(h0).unwrap(), 67.66);

    // Mapping resolution covering a subset.
    let mut mapping = ValueMap::new();
    mapping.insert(
        "sim.lens".to_string(),
        HashMap::from([
            ("q".to_string(), scalar_value(0.6)),
            ("b".to_string(), scalar_value(0.9)),
        ]),
    );
    let ctx = graph.resolve_map(sim, &mapping).unwrap();
    assert_eq!(ctx.scalar(q).unwrap(), 0.6);
    assert!(matches!(
        ctx.scalar(z_s).unwrap_err(),
        GraphError::UnresolvedParameter { .. }
    ));

    // Flipping dynamic state changes the packed length, not the relative
    // order of what remains dynamic.
    graph.set(q, Some(scalar_value(0.7))).unwrap();
    let view = graph.pack(sim).unwrap();
    let qualified: Vec<String> = view.entries().iter().map(|e| e.qualified()).collect();
    assert_eq!(qualified, vec!["sim.z_s", "sim.lens.b", "sim.source.ie"]);

    graph.set(q, None).unwrap();
    let view = graph.pack(sim).unwrap();
    let qualified: Vec<String> = view.entries().iter().map(|e| e.qualified()).collect();
    assert_eq!(
        qualified,
        vec!["sim.z_s", "sim.lens.q", "sim.lens.b", "sim.source.ie"]
    );
}

#[test]
fn diagnostic_view_reflects_the_tree() {
    let mut graph = ModuleGraph::new();
    let sim = graph.add_module("sim");
    let lens = graph.add_module("lens");
    graph.add_parameter(lens, "q", None).unwrap();
    graph.add_child(sim, lens).unwrap();
    let rendered = graph.graph_view(sim, true, true).unwrap().to_string();
    assert!(rendered.starts_with("sim\n"));
    assert!(rendered.contains("  lens\n"));
    assert!(rendered.contains(".q [dynamic]"));
}
