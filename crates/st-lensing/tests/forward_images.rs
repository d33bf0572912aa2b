// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! End-to-end image search on an elliptical lens: a source behind the
//! center of an SIE must form a cross of images, each of which traces back
//! onto the source.

use std::sync::Arc;

use st_lensing::profiles::{MassProfile, Sie, SieInit};
use st_lensing::{Cosmology, FlatLambdaCdm, ForwardOptions, LensPlane, Multiplane};
use st_params::ModuleGraph;

fn elliptical_chain(graph: &mut ModuleGraph) -> (st_params::ModuleId, Multiplane) {
    let cosmology = Arc::new(FlatLambdaCdm::new(graph, "cosmology").unwrap());
    let lens: Arc<dyn MassProfile> = Arc::new(
        Sie::new(
            graph,
            "lens",
            SieInit {
                z_l: Some(0.5),
                x0: Some(0.0),
                y0: Some(0.0),
                q: Some(0.7),
                phi: Some(0.0),
                b: Some(1.0),
            },
        )
        .unwrap(),
    );
    let root = graph.add_module("system");
    graph.add_child(root, cosmology.module()).unwrap();
    graph.add_child(root, lens.module()).unwrap();
    let chain = Multiplane::new(cosmology, vec![LensPlane::single("plane", lens)]);
    (root, chain)
}

#[test]
fn central_source_forms_a_cross_of_images() {
    let mut graph = ModuleGraph::new();
    let (root, chain) = elliptical_chain(&mut graph);
    let view = graph.pack(root).unwrap();
    let ctx = graph.resolve_flat(&view, &[]).unwrap();
    let z_s = 1.5;

    let options = ForwardOptions {
        n_init: 256,
        fov_radius: 2.5,
        ..ForwardOptions::default()
    };
    let images = chain
        .forward_raytrace(&ctx, 0.0, 0.0, z_s, &options)
        .unwrap();

    assert!(
        (2..=4).contains(&images.len()),
        "expected 2-4 images, found {}: {images:?}",
        images.len()
    );

    for &(tx, ty) in &images {
        // Every image lies in the strong-lensing region around the
        // Einstein radius.
        let radius = (tx * tx + ty * ty).sqrt();
        assert!(radius > 0.2 && radius < 2.0, "image at radius {radius}");

        // And traces back onto the source within the stated tolerance.
        let (bx, by) = chain.raytrace(&ctx, tx, ty, z_s).unwrap();
        let miss = (bx * bx + by * by).sqrt();
        assert!(miss < 1e-3, "image ({tx}, {ty}) misses the source by {miss}");
    }
}

#[test]
fn offset_source_images_straddle_the_lens_center() {
    let mut graph = ModuleGraph::new();
    let (root, chain) = elliptical_chain(&mut graph);
    let view = graph.pack(root).unwrap();
    let ctx = graph.resolve_flat(&view, &[]).unwrap();
    let z_s = 1.5;

    let images = chain
        .forward_raytrace(&ctx, 0.12, 0.05, z_s, &ForwardOptions::default())
        .unwrap();
    assert!(images.len() >= 2, "found {images:?}");

    // Images of an off-center source cannot all sit on one side.
    let min_x = images.iter().map(|i| i.0).fold(f64::INFINITY, f64::min);
    let max_x = images.iter().map(|i| i.0).fold(f64::NEG_INFINITY, f64::max);
    assert!(min_x < 0.0 && max_x > 0.0, "images {images:?}");
}
