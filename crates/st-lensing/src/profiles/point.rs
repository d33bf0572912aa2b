// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use serde::{Deserialize, Serialize};
use st_params::{ModuleGraph, ModuleId, ParamId, Resolved, Scalar};

use super::{opt_value, MassProfile};
use crate::constants::ARCSEC_TO_RAD;
use crate::cosmology::Cosmology;
use crate::error::LensingResult;

/// Initial values for [`PointMass`]; `None` leaves the parameter dynamic.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct PointMassInit {
    pub z_l: Option<Scalar>,
    pub x0: Option<Scalar>,
    pub y0: Option<Scalar>,
    /// Einstein radius [arcsec].
    pub rein: Option<Scalar>,
}

/// Point mass lens. The convergence is a delta function at the center and
/// reads as zero everywhere this profile can be evaluated.
pub struct PointMass {
    module: ModuleId,
    z_l: ParamId,
    x0: ParamId,
    y0: ParamId,
    rein: ParamId,
    /// Softening length [arcsec].
    s: Scalar,
}

impl PointMass {
    pub fn new(graph: &mut ModuleGraph, name: &str, init: PointMassInit) -> LensingResult<Self> {
        let module = graph.add_module(name);
        let z_l = graph.add_parameter(module, "z_l", opt_value(init.z_l))?;
        let x0 = graph.add_parameter(module, "x0", opt_value(init.x0))?;
        let y0 = graph.add_parameter(module, "y0", opt_value(init.y0))?;
        let rein = graph.add_parameter(module, "rein", opt_value(init.rein))?;
        Ok(Self {
            module,
            z_l,
            x0,
            y0,
            rein,
            s: 0.0,
        })
    }

    pub fn with_softening(mut self, s: Scalar) -> Self {
        self.s = s;
        self
    }

    pub fn rein(&self) -> ParamId {
        self.rein
    }

    /// Mass enclosed by the Einstein radius [Msun], from the critical
    /// surface density at the given source redshift.
    pub fn mass(
        &self,
        ctx: &Resolved<'_>,
        cosmology: &dyn Cosmology,
        z_s: Scalar,
    ) -> LensingResult<Scalar> {
        let z_l = ctx.scalar(self.z_l)?;
        let rein = ctx.scalar(self.rein)?;
        let sigma_cr = cosmology.critical_surface_density(ctx, z_l, z_s)?;
        let d_l = cosmology.angular_diameter_distance(ctx, z_l)?;
        let rein_mpc = rein * ARCSEC_TO_RAD * d_l;
        Ok(core::f64::consts::PI * rein_mpc * rein_mpc * sigma_cr)
    }
}

impl MassProfile for PointMass {
    fn module(&self) -> ModuleId {
        self.module
    }

    fn lens_redshift(&self, ctx: &Resolved<'_>) -> LensingResult<Scalar> {
        Ok(ctx.scalar(self.z_l)?)
    }

    fn reduced_deflection_angle(
        &self,
        ctx: &Resolved<'_>,
        x: Scalar,
        y: Scalar,
        _z_s: Scalar,
    ) -> LensingResult<(Scalar, Scalar)> {
        let rein = ctx.scalar(self.rein)?;
        let dx = x - ctx.scalar(self.x0)?;
        let dy = y - ctx.scalar(self.y0)?;
        let r2 = dx * dx + dy * dy + self.s * self.s;
        Ok((rein * rein * dx / r2, rein * rein * dy / r2))
    }

    fn potential(
        &self,
        ctx: &Resolved<'_>,
        x: Scalar,
        y: Scalar,
        _z_s: Scalar,
    ) -> LensingResult<Scalar> {
        let rein = ctx.scalar(self.rein)?;
        let dx = x - ctx.scalar(self.x0)?;
        let dy = y - ctx.scalar(self.y0)?;
        let r2 = dx * dx + dy * dy + self.s * self.s;
        Ok(0.5 * rein * rein * r2.ln())
    }

    fn convergence(
        &self,
        _ctx: &Resolved<'_>,
        _x: Scalar,
        _y: Scalar,
        _z_s: Scalar,
    ) -> LensingResult<Scalar> {
        Ok(0.0)
    }
}
