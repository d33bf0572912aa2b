// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Lens-equation inversion. There is no closed form for the image-plane
//! positions of a given source point, so the search seeds a batch of
//! candidate angles over the caller's field of view, runs an independent
//! damped Newton iteration from each seed in parallel, and deduplicates the
//! survivors. Seeds that fail to converge inside the iteration budget are
//! dropped silently: under-coverage is the accuracy/cost trade-off
//! controlled by `n_init`, not an error.

use nalgebra::{Matrix2, Vector2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use st_params::{Resolved, Scalar};
use tracing::debug;

use crate::error::LensingResult;
use crate::multiplane::{Multiplane, DEFAULT_FD_STEP};

/// Options for [`Multiplane::forward_raytrace`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ForwardOptions {
    /// Number of candidate seeds.
    pub n_init: usize,
    /// Center of the seeded field of view [arcsec].
    pub fov_center: (Scalar, Scalar),
    /// Half-width of the seeded field of view [arcsec].
    pub fov_radius: Scalar,
    /// Absolute source-plane tolerance for accepting a root [arcsec].
    pub tolerance: Scalar,
    /// Newton iteration budget per seed.
    pub max_iter: usize,
    /// RNG seed for the candidate sampling; identical seeds give identical
    /// results.
    pub seed: u64,
    /// Finite-difference step for the Jacobian [arcsec].
    pub fd_step: Scalar,
    /// Roots closer than this are treated as one image [arcsec].
    pub dedup_radius: Scalar,
}

impl Default for ForwardOptions {
    fn default() -> Self {
        Self {
            n_init: 128,
            fov_center: (0.0, 0.0),
            fov_radius: 2.5,
            tolerance: 1e-8,
            max_iter: 50,
            seed: 0,
            fd_step: DEFAULT_FD_STEP,
            dedup_radius: 1e-3,
        }
    }
}

impl Multiplane {
    /// Finds image-plane angles that map onto the requested source-plane
    /// point within tolerance. Returns the surviving distinct roots sorted
    /// lexicographically; an empty list (never an error) when no seed
    /// converges.
    pub fn forward_raytrace(
        &self,
        ctx: &Resolved<'_>,
        beta_x: Scalar,
        beta_y: Scalar,
        z_s: Scalar,
        options: &ForwardOptions,
    ) -> LensingResult<Vec<(Scalar, Scalar)>> {
        // Validate the chain before fanning out so configuration errors
        // surface instead of reading as universal non-convergence.
        self.raytrace(ctx, options.fov_center.0, options.fov_center.1, z_s)?;

        let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
        let seeds: Vec<(Scalar, Scalar)> = (0..options.n_init)
            .map(|_| {
                let x = options.fov_center.0 + rng.gen_range(-1.0..1.0) * options.fov_radius;
                let y = options.fov_center.1 + rng.gen_range(-1.0..1.0) * options.fov_radius;
                (x, y)
            })
            .collect();

        let target = Vector2::new(beta_x, beta_y);
        let mut roots: Vec<(Scalar, Scalar)> = seeds
            .par_iter()
            .filter_map(|&seed| self.newton_root(ctx, seed, target, z_s, options))
            .collect();

        roots.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        let mut distinct: Vec<(Scalar, Scalar)> = Vec::new();
        for root in roots {
            let duplicate = distinct.iter().any(|kept| {
                let dx = kept.0 - root.0;
                let dy = kept.1 - root.1;
                (dx * dx + dy * dy).sqrt() < options.dedup_radius
            });
            if !duplicate {
                distinct.push(root);
            }
        }
        debug!(
            images = distinct.len(),
            seeds = options.n_init,
            "forward raytrace finished"
        );
        Ok(distinct)
    }

    /// One damped Newton run. Non-convergence (budget exhausted, singular
    /// and undampable Jacobian, non-finite iterate) returns `None`.
    fn newton_root(
        &self,
        ctx: &Resolved<'_>,
        seed: (Scalar, Scalar),
        target: Vector2<Scalar>,
        z_s: Scalar,
        options: &ForwardOptions,
    ) -> Option<(Scalar, Scalar)> {
        let mut theta = Vector2::new(seed.0, seed.1);
        for _ in 0..options.max_iter {
            let (bx, by) = self.raytrace(ctx, theta.x, theta.y, z_s).ok()?;
            let residual = Vector2::new(bx, by) - target;
            if !(residual.x.is_finite() && residual.y.is_finite()) {
                return None;
            }
            if residual.norm() < options.tolerance {
                return Some((theta.x, theta.y));
            }
            let jacobian = self
                .jacobian_lens_equation(ctx, theta.x, theta.y, z_s, options.fd_step)
                .ok()?;
            let step = match jacobian.lu().solve(&residual) {
                Some(step) => step,
                None => {
                    // Levenberg-style diagonal damping when the Jacobian is
                    // singular at a critical curve.
                    let damped = jacobian.transpose() * jacobian
                        + Matrix2::identity() * 1e-6;
                    damped.lu().solve(&(jacobian.transpose() * residual))?
                }
            };
            if !(step.x.is_finite() && step.y.is_finite()) {
                return None;
            }
            // Cap the step so a near-critical Jacobian cannot fling the
            // iterate out of the field of view.
            let max_step = options.fov_radius.max(1.0);
            let step = if step.norm() > max_step {
                step * (max_step / step.norm())
            } else {
                step
            };
            theta -= step;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmology::{Cosmology, FlatLambdaCdm};
    use crate::plane::LensPlane;
    use crate::profiles::{MassProfile, Sie, SieInit};
    use st_params::{ModuleGraph, ModuleId};
    use std::sync::Arc;

    fn sie_chain(graph: &mut ModuleGraph) -> (ModuleId, Multiplane) {
        let cosmology = Arc::new(FlatLambdaCdm::new(graph, "cosmology").unwrap());
        let sie: Arc<dyn MassProfile> = Arc::new(
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
        graph.add_child(root, sie.module()).unwrap();
        let chain = Multiplane::new(cosmology, vec![LensPlane::single("plane", sie)]);
        (root, chain)
    }

    #[test]
    fn zero_seeds_yield_an_empty_image_list() {
        let mut graph = ModuleGraph::new();
        let (root, chain) = sie_chain(&mut graph);
        let view = graph.pack(root).unwrap();
        let ctx = graph.resolve_flat(&view, &[]).unwrap();
        let options = ForwardOptions {
            n_init: 0,
            ..ForwardOptions::default()
        };
        let images = chain
            .forward_raytrace(&ctx, 0.0, 0.0, 1.5, &options)
            .unwrap();
        assert!(images.is_empty());
    }

    #[test]
    fn roundtrip_recovers_the_image_position() {
        let mut graph = ModuleGraph::new();
        let (root, chain) = sie_chain(&mut graph);
        let view = graph.pack(root).unwrap();
        let ctx = graph.resolve_flat(&view, &[]).unwrap();
        let (tx, ty) = (0.9, 0.4);
        let (bx, by) = chain.raytrace(&ctx, tx, ty, 1.5).unwrap();
        let images = chain
            .forward_raytrace(&ctx, bx, by, 1.5, &ForwardOptions::default())
            .unwrap();
        assert!(!images.is_empty());
        let hit = images.iter().any(|&(ix, iy)| {
            ((ix - tx).powi(2) + (iy - ty).powi(2)).sqrt() < 1e-3
        });
        assert!(hit, "no recovered image near the input: {images:?}");
    }

    #[test]
    fn search_is_deterministic_for_a_fixed_seed() {
        let mut graph = ModuleGraph::new();
        let (root, chain) = sie_chain(&mut graph);
        let view = graph.pack(root).unwrap();
        let ctx = graph.resolve_flat(&view, &[]).unwrap();
        let options = ForwardOptions {
            n_init: 64,
            seed: 42,
            ..ForwardOptions::default()
        };
        let first = chain
            .forward_raytrace(&ctx, 0.05, -0.02, 1.5, &options)
            .unwrap();
        let second = chain
            .forward_raytrace(&ctx, 0.05, -0.02, 1.5, &options)
            .unwrap();
        assert_eq!(first, second);
    }
}
