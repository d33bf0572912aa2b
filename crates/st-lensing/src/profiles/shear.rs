// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use serde::{Deserialize, Serialize};
use st_params::{ModuleGraph, ModuleId, ParamId, Resolved, Scalar};

use super::{opt_value, MassProfile};
use crate::error::LensingResult;

/// Initial values for [`ExternalShear`]; `None` leaves the parameter
/// dynamic.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ExternalShearInit {
    pub z_l: Option<Scalar>,
    pub x0: Option<Scalar>,
    pub y0: Option<Scalar>,
    pub gamma_1: Option<Scalar>,
    pub gamma_2: Option<Scalar>,
}

/// Uniform external shear field. Massless: the convergence vanishes
/// identically, only the tidal distortion remains.
pub struct ExternalShear {
    module: ModuleId,
    z_l: ParamId,
    x0: ParamId,
    y0: ParamId,
    gamma_1: ParamId,
    gamma_2: ParamId,
}

impl ExternalShear {
    pub fn new(
        graph: &mut ModuleGraph,
        name: &str,
        init: ExternalShearInit,
    ) -> LensingResult<Self> {
        let module = graph.add_module(name);
        let z_l = graph.add_parameter(module, "z_l", opt_value(init.z_l))?;
        let x0 = graph.add_parameter(module, "x0", opt_value(init.x0))?;
        let y0 = graph.add_parameter(module, "y0", opt_value(init.y0))?;
        let gamma_1 = graph.add_parameter(module, "gamma_1", opt_value(init.gamma_1))?;
        let gamma_2 = graph.add_parameter(module, "gamma_2", opt_value(init.gamma_2))?;
        Ok(Self {
            module,
            z_l,
            x0,
            y0,
            gamma_1,
            gamma_2,
        })
    }

    fn offsets(&self, ctx: &Resolved<'_>, x: Scalar, y: Scalar) -> LensingResult<(Scalar, Scalar)> {
        Ok((x - ctx.scalar(self.x0)?, y - ctx.scalar(self.y0)?))
    }
}

impl MassProfile for ExternalShear {
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
        let (dx, dy) = self.offsets(ctx, x, y)?;
        let g1 = ctx.scalar(self.gamma_1)?;
        let g2 = ctx.scalar(self.gamma_2)?;
        Ok((g1 * dx + g2 * dy, g2 * dx - g1 * dy))
    }

    fn potential(
        &self,
        ctx: &Resolved<'_>,
        x: Scalar,
        y: Scalar,
        _z_s: Scalar,
    ) -> LensingResult<Scalar> {
        let (dx, dy) = self.offsets(ctx, x, y)?;
        let g1 = ctx.scalar(self.gamma_1)?;
        let g2 = ctx.scalar(self.gamma_2)?;
        Ok(0.5 * g1 * (dx * dx - dy * dy) + g2 * dx * dy)
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
