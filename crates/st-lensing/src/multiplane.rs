// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Multiplane ray tracing.
//!
//! A ray leaving the observer at image-plane angle theta is propagated
//! backward through the ordered lens planes. In a flat background the
//! angular position of the ray at comoving distance chi obeys
//!
//! ```text
//! theta(chi) = theta_0 - sum_i ahat_i + sum_i chi_i * ahat_i / chi
//! ```
//!
//! where `ahat_i` is the physical deflection picked up at plane `i`
//! (crossed at comoving distance `chi_i`). Two running sums therefore carry
//! the whole recursion; evaluating the expression at the source's comoving
//! distance yields the arrival angle beta. No single deflection angle
//! exists independently of the source redshift, so the effective reduced
//! deflection is derived as `theta - beta` per call.

use nalgebra::Matrix2;
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use st_params::{Resolved, Scalar};

use crate::constants::MPC_ARCSEC2_TO_DAYS;
use crate::cosmology::Cosmology;
use crate::error::{LensingError, LensingResult};
use crate::plane::LensPlane;

use std::sync::Arc;

/// Comoving distances this close to the observer skip the chi division.
const CHI_TOL: Scalar = 1e-12;

/// Finite-difference step [arcsec] for the lens-equation Jacobian.
pub const DEFAULT_FD_STEP: Scalar = 1e-5;

/// Ray state at one plane crossing.
#[derive(Clone, Copy, Debug)]
struct Crossing {
    z: Scalar,
    theta: (Scalar, Scalar),
    plane: usize,
}

/// Ordered chain of lens planes sharing one cosmology.
pub struct Multiplane {
    cosmology: Arc<dyn Cosmology>,
    planes: Vec<LensPlane>,
}

impl Multiplane {
    pub fn new(cosmology: Arc<dyn Cosmology>, planes: Vec<LensPlane>) -> Self {
        Self { cosmology, planes }
    }

    pub fn cosmology(&self) -> &Arc<dyn Cosmology> {
        &self.cosmology
    }

    pub fn planes(&self) -> &[LensPlane] {
        &self.planes
    }

    /// Planes strictly in front of the source, sorted by ascending
    /// redshift. Lensing only occurs between observer and source, so planes
    /// at or beyond `z_s` drop out of the call.
    fn active_planes(
        &self,
        ctx: &Resolved<'_>,
        z_s: Scalar,
    ) -> LensingResult<Vec<(Scalar, usize)>> {
        if !(z_s.is_finite() && z_s > 0.0) {
            return Err(LensingError::InvalidRedshift { z: z_s });
        }
        let mut active = Vec::with_capacity(self.planes.len());
        for (index, plane) in self.planes.iter().enumerate() {
            let z = plane.redshift(ctx)?;
            if !(z.is_finite() && z >= 0.0) {
                return Err(LensingError::InvalidRedshift { z });
            }
            if z < z_s {
                active.push((z, index));
            }
        }
        active.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        Ok(active)
    }

    /// Runs the recursion, recording the ray's angular position at every
    /// plane crossing and the arrival angle at the source plane.
    fn trajectory(
        &self,
        ctx: &Resolved<'_>,
        theta_x: Scalar,
        theta_y: Scalar,
        z_s: Scalar,
    ) -> LensingResult<(Vec<Crossing>, (Scalar, Scalar))> {
        let active = self.active_planes(ctx, z_s)?;
        let cosmology = self.cosmology.as_ref();
        let chi_s = cosmology.comoving_distance(ctx, z_s)?;

        let mut ahat_sum = (0.0, 0.0);
        let mut ahat_chi_sum = (0.0, 0.0);
        let mut crossings = Vec::with_capacity(active.len());

        let position = |ahat_sum: (Scalar, Scalar), ahat_chi_sum: (Scalar, Scalar), chi: Scalar| {
            if chi <= CHI_TOL {
                (theta_x - ahat_sum.0, theta_y - ahat_sum.1)
            } else {
                (
                    theta_x - ahat_sum.0 + ahat_chi_sum.0 / chi,
                    theta_y - ahat_sum.1 + ahat_chi_sum.1 / chi,
                )
            }
        };

        for (z, index) in active {
            let chi = cosmology.comoving_distance(ctx, z)?;
            let theta = position(ahat_sum, ahat_chi_sum, chi);
            let (ax, ay) = self.planes[index]
                .physical_deflection_angle(ctx, cosmology, theta.0, theta.1, z_s)?;
            ahat_sum.0 += ax;
            ahat_sum.1 += ay;
            ahat_chi_sum.0 += chi * ax;
            ahat_chi_sum.1 += chi * ay;
            crossings.push(Crossing {
                z,
                theta,
                plane: index,
            });
        }

        let beta = position(ahat_sum, ahat_chi_sum, chi_s);
        Ok((crossings, beta))
    }

    /// Traces an image-plane angle back to its source-plane arrival angle
    /// [arcsec]. An empty active chain is the identity map.
    pub fn raytrace(
        &self,
        ctx: &Resolved<'_>,
        theta_x: Scalar,
        theta_y: Scalar,
        z_s: Scalar,
    ) -> LensingResult<(Scalar, Scalar)> {
        Ok(self.trajectory(ctx, theta_x, theta_y, z_s)?.1)
    }

    /// Traces a whole coordinate grid in parallel.
    pub fn raytrace_grid(
        &self,
        ctx: &Resolved<'_>,
        x: ArrayView2<'_, Scalar>,
        y: ArrayView2<'_, Scalar>,
        z_s: Scalar,
    ) -> LensingResult<(Array2<Scalar>, Array2<Scalar>)> {
        let dim = x.raw_dim();
        let points: Vec<(Scalar, Scalar)> = x.iter().zip(y.iter()).map(|(&a, &b)| (a, b)).collect();
        let traced: Vec<LensingResult<(Scalar, Scalar)>> = points
            .par_iter()
            .map(|&(px, py)| self.raytrace(ctx, px, py, z_s))
            .collect();
        let mut bx = Vec::with_capacity(points.len());
        let mut by = Vec::with_capacity(points.len());
        for result in traced {
            let (px, py) = result?;
            bx.push(px);
            by.push(py);
        }
        Ok((
            Array2::from_shape_vec(dim, bx).expect("grid size preserved"),
            Array2::from_shape_vec(dim, by).expect("grid size preserved"),
        ))
    }

    /// Effective reduced deflection angle `theta - beta` [arcsec].
    pub fn effective_reduced_deflection_angle(
        &self,
        ctx: &Resolved<'_>,
        theta_x: Scalar,
        theta_y: Scalar,
        z_s: Scalar,
    ) -> LensingResult<(Scalar, Scalar)> {
        let (bx, by) = self.raytrace(ctx, theta_x, theta_y, z_s)?;
        Ok((theta_x - bx, theta_y - by))
    }

    /// Jacobian of the lens equation, `A = d beta / d theta`, by central
    /// finite differences.
    pub fn jacobian_lens_equation(
        &self,
        ctx: &Resolved<'_>,
        theta_x: Scalar,
        theta_y: Scalar,
        z_s: Scalar,
        fd_step: Scalar,
    ) -> LensingResult<Matrix2<Scalar>> {
        let h = fd_step;
        let (xp_x, xp_y) = self.raytrace(ctx, theta_x + h, theta_y, z_s)?;
        let (xm_x, xm_y) = self.raytrace(ctx, theta_x - h, theta_y, z_s)?;
        let (yp_x, yp_y) = self.raytrace(ctx, theta_x, theta_y + h, z_s)?;
        let (ym_x, ym_y) = self.raytrace(ctx, theta_x, theta_y - h, z_s)?;
        let inv = 1.0 / (2.0 * h);
        Ok(Matrix2::new(
            (xp_x - xm_x) * inv,
            (yp_x - ym_x) * inv,
            (xp_y - xm_y) * inv,
            (yp_y - ym_y) * inv,
        ))
    }

    /// Divergence half of the effective deflection Jacobian: the multiplane
    /// analogue of convergence.
    pub fn effective_convergence_div(
        &self,
        ctx: &Resolved<'_>,
        theta_x: Scalar,
        theta_y: Scalar,
        z_s: Scalar,
        fd_step: Scalar,
    ) -> LensingResult<Scalar> {
        let a = self.jacobian_lens_equation(ctx, theta_x, theta_y, z_s, fd_step)?;
        let j = Matrix2::identity() - a;
        Ok(0.5 * (j[(0, 0)] + j[(1, 1)]))
    }

    /// Curl half of the effective deflection Jacobian. Physically consistent
    /// chains keep this near zero; it is exposed as a numerical-sanity
    /// diagnostic.
    pub fn effective_convergence_curl(
        &self,
        ctx: &Resolved<'_>,
        theta_x: Scalar,
        theta_y: Scalar,
        z_s: Scalar,
        fd_step: Scalar,
    ) -> LensingResult<Scalar> {
        let a = self.jacobian_lens_equation(ctx, theta_x, theta_y, z_s, fd_step)?;
        let j = Matrix2::identity() - a;
        Ok(0.5 * (j[(1, 0)] - j[(0, 1)]))
    }

    /// Point magnification, the inverse Jacobian determinant.
    pub fn magnification(
        &self,
        ctx: &Resolved<'_>,
        theta_x: Scalar,
        theta_y: Scalar,
        z_s: Scalar,
        fd_step: Scalar,
    ) -> LensingResult<Scalar> {
        let a = self.jacobian_lens_equation(ctx, theta_x, theta_y, z_s, fd_step)?;
        Ok(1.0 / a.determinant())
    }

    /// Arrival-time delay [days] relative to the unlensed ray: per plane, a
    /// geometric term from the bend between consecutive crossings and a
    /// Shapiro term from the plane's potential, both scaled by
    /// angular-diameter-distance ratios and summed along the chain. For a
    /// single plane this is the usual Fermat potential times the time-delay
    /// distance.
    pub fn time_delay(
        &self,
        ctx: &Resolved<'_>,
        theta_x: Scalar,
        theta_y: Scalar,
        z_s: Scalar,
    ) -> LensingResult<Scalar> {
        let (crossings, beta) = self.trajectory(ctx, theta_x, theta_y, z_s)?;
        let cosmology = self.cosmology.as_ref();
        let d_s = cosmology.angular_diameter_distance(ctx, z_s)?;

        let mut delay = 0.0;
        for (index, crossing) in crossings.iter().enumerate() {
            let (z_next, theta_next) = match crossings.get(index + 1) {
                Some(next) => (next.z, next.theta),
                None => (z_s, beta),
            };
            let d_l = cosmology.angular_diameter_distance(ctx, crossing.z)?;
            let d_next = cosmology.angular_diameter_distance(ctx, z_next)?;
            let d_between =
                cosmology.angular_diameter_distance_between(ctx, crossing.z, z_next)?;
            let d_ls = cosmology.angular_diameter_distance_between(ctx, crossing.z, z_s)?;

            let dx = crossing.theta.0 - theta_next.0;
            let dy = crossing.theta.1 - theta_next.1;
            let geometric = d_l * d_next / d_between * 0.5 * (dx * dx + dy * dy);

            let plane = &self.planes[crossing.plane];
            let psi = plane.potential(ctx, crossing.theta.0, crossing.theta.1, z_s)?;
            let shapiro = d_l * d_s / d_ls * psi;

            delay += (1.0 + crossing.z) * (geometric - shapiro) * MPC_ARCSEC2_TO_DAYS;
        }
        Ok(delay)
    }
}
