// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use serde::{Deserialize, Serialize};
use st_params::{ModuleGraph, ModuleId, ParamId, Resolved, Scalar};

use super::{opt_value, MassProfile};
use crate::error::LensingResult;

/// Initial values for [`Sis`]; `None` leaves the parameter dynamic.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SisInit {
    pub z_l: Option<Scalar>,
    pub x0: Option<Scalar>,
    pub y0: Option<Scalar>,
    /// Einstein radius [arcsec].
    pub b: Option<Scalar>,
}

/// Singular isothermal sphere.
pub struct Sis {
    module: ModuleId,
    z_l: ParamId,
    x0: ParamId,
    y0: ParamId,
    b: ParamId,
    /// Softening length [arcsec] added to the radial coordinate.
    s: Scalar,
}

impl Sis {
    pub fn new(graph: &mut ModuleGraph, name: &str, init: SisInit) -> LensingResult<Self> {
        let module = graph.add_module(name);
        let z_l = graph.add_parameter(module, "z_l", opt_value(init.z_l))?;
        let x0 = graph.add_parameter(module, "x0", opt_value(init.x0))?;
        let y0 = graph.add_parameter(module, "y0", opt_value(init.y0))?;
        let b = graph.add_parameter(module, "b", opt_value(init.b))?;
        Ok(Self {
            module,
            z_l,
            x0,
            y0,
            b,
            s: 0.0,
        })
    }

    pub fn with_softening(mut self, s: Scalar) -> Self {
        self.s = s;
        self
    }

    pub fn b(&self) -> ParamId {
        self.b
    }

    pub fn z_l(&self) -> ParamId {
        self.z_l
    }

    fn radius(&self, ctx: &Resolved<'_>, x: Scalar, y: Scalar) -> LensingResult<(Scalar, Scalar, Scalar)> {
        let dx = x - ctx.scalar(self.x0)?;
        let dy = y - ctx.scalar(self.y0)?;
        let r = (dx * dx + dy * dy).sqrt() + self.s;
        Ok((dx, dy, r))
    }
}

impl MassProfile for Sis {
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
        let b = ctx.scalar(self.b)?;
        let (dx, dy, r) = self.radius(ctx, x, y)?;
        Ok((b * dx / r, b * dy / r))
    }

    fn potential(
        &self,
        ctx: &Resolved<'_>,
        x: Scalar,
        y: Scalar,
        _z_s: Scalar,
    ) -> LensingResult<Scalar> {
        let b = ctx.scalar(self.b)?;
        let (_, _, r) = self.radius(ctx, x, y)?;
        Ok(b * r)
    }

    fn convergence(
        &self,
        ctx: &Resolved<'_>,
        x: Scalar,
        y: Scalar,
        _z_s: Scalar,
    ) -> LensingResult<Scalar> {
        let b = ctx.scalar(self.b)?;
        let (_, _, r) = self.radius(ctx, x, y)?;
        Ok(0.5 * b / r)
    }
}
