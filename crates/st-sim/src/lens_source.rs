// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Straightforward simulator for a lensed image of a background source:
//! build a sampling grid, trace every (optionally upsampled) pixel through
//! the multiplane chain, evaluate the source brightness at the arrival
//! angles, add the deflector's own light, and integrate back down to the
//! requested resolution.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use st_lensing::light::LightProfile;
use st_lensing::profiles::MassProfile;
use st_lensing::{Cosmology, LensingResult, Multiplane};
use st_params::{ModuleGraph, ModuleId, ParamId, Resolved, Scalar};

use std::sync::Arc;

use crate::grid::{mean_pool, meshgrid};

/// Sampling configuration for [`LensSource`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LensSourceConfig {
    /// Pixel scale of the output grid [arcsec/px].
    pub pixelscale: Scalar,
    pub pixels_x: usize,
    /// Defaults to `pixels_x` when absent.
    pub pixels_y: Option<usize>,
    /// Sampling refinement: the model is evaluated at `upsample_factor`
    /// times the output resolution and mean-pooled back down.
    pub upsample_factor: usize,
    /// Source redshift; `None` leaves it dynamic.
    pub z_s: Option<Scalar>,
}

impl Default for LensSourceConfig {
    fn default() -> Self {
        Self {
            pixelscale: 0.05,
            pixels_x: 100,
            pixels_y: None,
            upsample_factor: 1,
            z_s: None,
        }
    }
}

/// Lens image of a source. The simulator is itself a module in the
/// parameter graph: it owns the `z_s` parameter and is wired as a parent of
/// the cosmology, every lens profile and the light profiles, so one `pack`
/// at the simulator root covers the whole model.
pub struct LensSource {
    module: ModuleId,
    z_s: ParamId,
    lens: Multiplane,
    source: Arc<dyn LightProfile>,
    lens_light: Option<Arc<dyn LightProfile>>,
    pixelscale: Scalar,
    pixels: (usize, usize),
    upsample_factor: usize,
}

impl LensSource {
    pub fn new(
        graph: &mut ModuleGraph,
        name: &str,
        lens: Multiplane,
        source: Arc<dyn LightProfile>,
        lens_light: Option<Arc<dyn LightProfile>>,
        config: LensSourceConfig,
    ) -> LensingResult<Self> {
        let module = graph.add_module(name);
        let z_s = graph.add_parameter(
            module,
            "z_s",
            config.z_s.map(st_params::scalar_value),
        )?;

        graph.add_child(module, lens.cosmology().module())?;
        for plane in lens.planes() {
            for profile in plane.profiles() {
                graph.add_child(module, profile.module())?;
            }
        }
        graph.add_child(module, source.module())?;
        if let Some(light) = &lens_light {
            graph.add_child(module, light.module())?;
        }

        let pixels_y = config.pixels_y.unwrap_or(config.pixels_x);
        Ok(Self {
            module,
            z_s,
            lens,
            source,
            lens_light,
            pixelscale: config.pixelscale,
            pixels: (config.pixels_x, pixels_y),
            upsample_factor: config.upsample_factor.max(1),
        })
    }

    /// Simulator root in the parameter graph.
    pub fn module(&self) -> ModuleId {
        self.module
    }

    pub fn z_s(&self) -> ParamId {
        self.z_s
    }

    pub fn lens(&self) -> &Multiplane {
        &self.lens
    }

    /// Renders the lensed scene for one resolved context.
    pub fn render(&self, ctx: &Resolved<'_>) -> LensingResult<Array2<Scalar>> {
        let z_s = ctx.scalar(self.z_s)?;
        let up = self.upsample_factor;
        let (x, y) = meshgrid(
            self.pixelscale / up as Scalar,
            self.pixels.0 * up,
            self.pixels.1 * up,
        );

        let (beta_x, beta_y) = self.lens.raytrace_grid(ctx, x.view(), y.view(), z_s)?;

        let mut image = Array2::zeros(x.raw_dim());
        for ((row, col), pixel) in image.indexed_iter_mut() {
            let mut flux = self
                .source
                .brightness(ctx, beta_x[(row, col)], beta_y[(row, col)])?;
            if let Some(light) = &self.lens_light {
                flux += light.brightness(ctx, x[(row, col)], y[(row, col)])?;
            }
            *pixel = flux;
        }

        Ok(mean_pool(&image, up))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use st_lensing::light::{Sersic, SersicInit};
    use st_lensing::profiles::{MassProfile, Sis, SisInit};
    use st_lensing::{FlatLambdaCdm, LensPlane};

    fn sersic(graph: &mut ModuleGraph, name: &str) -> Arc<dyn LightProfile> {
        Arc::new(
            Sersic::new(
                graph,
                name,
                SersicInit {
                    x0: Some(0.0),
                    y0: Some(0.0),
                    q: Some(0.8),
                    phi: Some(0.2),
                    n: Some(1.5),
                    re: Some(0.4),
                    ie: Some(1.0),
                },
            )
            .unwrap(),
        )
    }

    fn simulator(graph: &mut ModuleGraph, with_lens: bool) -> LensSource {
        let cosmology = Arc::new(FlatLambdaCdm::new(graph, "cosmology").unwrap());
        let planes = if with_lens {
            let sis: Arc<dyn MassProfile> = Arc::new(
                Sis::new(
                    graph,
                    "lens",
                    SisInit {
                        z_l: Some(0.5),
                        x0: Some(0.0),
                        y0: Some(0.0),
                        b: Some(1.0),
                    },
                )
                .unwrap(),
            );
            vec![LensPlane::single("plane", sis)]
        } else {
            Vec::new()
        };
        let source = sersic(graph, "source");
        LensSource::new(
            graph,
            "sim",
            Multiplane::new(cosmology, planes),
            source,
            None,
            LensSourceConfig {
                pixelscale: 0.1,
                pixels_x: 32,
                pixels_y: None,
                upsample_factor: 2,
                z_s: Some(1.5),
            },
        )
        .unwrap()
    }

    #[test]
    fn renders_a_finite_positive_image() {
        let mut graph = ModuleGraph::new();
        let sim = simulator(&mut graph, true);
        let view = graph.pack(sim.module()).unwrap();
        let ctx = graph.resolve_flat(&view, &[]).unwrap();
        let image = sim.render(&ctx).unwrap();
        assert_eq!(image.dim(), (32, 32));
        assert!(image.iter().all(|v| v.is_finite() && *v >= 0.0));
        assert!(image.sum() > 0.0);
    }

    #[test]
    fn empty_chain_renders_the_unlensed_source() {
        let mut graph = ModuleGraph::new();
        let sim = simulator(&mut graph, false);
        let view = graph.pack(sim.module()).unwrap();
        let ctx = graph.resolve_flat(&view, &[]).unwrap();
        let image = sim.render(&ctx).unwrap();
        // Unlensed, the brightest pixels sit at the center of the frame.
        let (mut best, mut best_val) = ((0, 0), f64::NEG_INFINITY);
        for ((row, col), &value) in image.indexed_iter() {
            if value > best_val {
                best = (row, col);
                best_val = value;
            }
        }
        assert!((15..=16).contains(&best.0), "peak row {}", best.0);
        assert!((15..=16).contains(&best.1), "peak col {}", best.1);
    }

    #[test]
    fn lensing_spreads_the_central_flux_into_a_ring() {
        let mut graph = ModuleGraph::new();
        let sim = simulator(&mut graph, true);
        let view = graph.pack(sim.module()).unwrap();
        let ctx = graph.resolve_flat(&view, &[]).unwrap();
        let image = sim.render(&ctx).unwrap();
        // An isothermal sphere throws a centered source onto its Einstein
        // ring at 1": pixels near radius 10 px outshine the very center.
        let center = image[(16, 16)];
        let ring = image[(16, 26)];
        assert!(ring > center, "ring={ring} center={center}");
    }

    #[test]
    fn dynamic_source_redshift_packs_at_the_simulator_root() {
        let mut graph = ModuleGraph::new();
        let cosmology = Arc::new(FlatLambdaCdm::new(&mut graph, "cosmology").unwrap());
        let source = sersic(&mut graph, "source");
        let sim = LensSource::new(
            &mut graph,
            "sim",
            Multiplane::new(cosmology, Vec::new()),
            source,
            None,
            LensSourceConfig {
                pixels_x: 8,
                upsample_factor: 1,
                z_s: None,
                ..LensSourceConfig::default()
            },
        )
        .unwrap();
        let view = graph.pack(sim.module()).unwrap();
        let qualified: Vec<String> = view.entries().iter().map(|e| e.qualified()).collect();
        assert_eq!(qualified, vec!["sim.z_s"]);
        let ctx = graph.resolve_flat(&view, &[1.2]).unwrap();
        let image = sim.render(&ctx).unwrap();
        assert_eq!(image.dim(), (8, 8));
    }
}
