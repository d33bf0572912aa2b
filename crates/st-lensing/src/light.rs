// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Light-distribution capabilities: surface brightness as a pure function
//! of sky coordinates and the profile's resolved parameters.

use serde::{Deserialize, Serialize};
use st_params::{ModuleGraph, ModuleId, ParamId, Resolved, Scalar};

use crate::error::{LensingError, LensingResult};
use crate::profiles::{opt_value, translate_rotate};

/// Background or foreground light distribution.
pub trait LightProfile: Send + Sync {
    /// Graph node owning the profile's parameters.
    fn module(&self) -> ModuleId;

    /// Surface brightness at the given sky position [arbitrary flux units].
    fn brightness(&self, ctx: &Resolved<'_>, x: Scalar, y: Scalar) -> LensingResult<Scalar>;
}

/// Initial values for [`Sersic`]; `None` leaves the parameter dynamic.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SersicInit {
    pub x0: Option<Scalar>,
    pub y0: Option<Scalar>,
    /// Axis ratio, 0 < q <= 1.
    pub q: Option<Scalar>,
    /// Position angle [radians].
    pub phi: Option<Scalar>,
    /// Sersic index.
    pub n: Option<Scalar>,
    /// Effective (half-light) radius [arcsec].
    pub re: Option<Scalar>,
    /// Brightness at the effective radius.
    pub ie: Option<Scalar>,
}

/// Sersic surface-brightness profile.
pub struct Sersic {
    module: ModuleId,
    x0: ParamId,
    y0: ParamId,
    q: ParamId,
    phi: ParamId,
    n: ParamId,
    re: ParamId,
    ie: ParamId,
}

impl Sersic {
    pub fn new(graph: &mut ModuleGraph, name: &str, init: SersicInit) -> LensingResult<Self> {
        let module = graph.add_module(name);
        let x0 = graph.add_parameter(module, "x0", opt_value(init.x0))?;
        let y0 = graph.add_parameter(module, "y0", opt_value(init.y0))?;
        let q = graph.add_parameter(module, "q", opt_value(init.q))?;
        let phi = graph.add_parameter(module, "phi", opt_value(init.phi))?;
        let n = graph.add_parameter(module, "n", opt_value(init.n))?;
        let re = graph.add_parameter(module, "re", opt_value(init.re))?;
        let ie = graph.add_parameter(module, "ie", opt_value(init.ie))?;
        Ok(Self {
            module,
            x0,
            y0,
            q,
            phi,
            n,
            re,
            ie,
        })
    }

    /// Series approximation of the Sersic normalization constant b_n.
    fn k_sersic(n: Scalar) -> Scalar {
        2.0 * n - 1.0 / 3.0 + 4.0 / (405.0 * n) + 46.0 / (25515.0 * n * n)
            + 131.0 / (1_148_175.0 * n * n * n)
    }
}

impl LightProfile for Sersic {
    fn module(&self) -> ModuleId {
        self.module
    }

    fn brightness(&self, ctx: &Resolved<'_>, x: Scalar, y: Scalar) -> LensingResult<Scalar> {
        let q = ctx.scalar(self.q)?;
        if !(q > 0.0 && q <= 1.0) {
            return Err(LensingError::InvalidParameter { name: "q", value: q });
        }
        let n = ctx.scalar(self.n)?;
        if !(n > 0.0) {
            return Err(LensingError::InvalidParameter { name: "n", value: n });
        }
        let (xr, yr) = translate_rotate(
            x,
            y,
            ctx.scalar(self.x0)?,
            ctx.scalar(self.y0)?,
            ctx.scalar(self.phi)?,
        );
        let rho = (xr * xr + (yr / q) * (yr / q)).sqrt();
        let re = ctx.scalar(self.re)?;
        let ie = ctx.scalar(self.ie)?;
        let k = Self::k_sersic(n);
        Ok(ie * (-k * ((rho / re).powf(1.0 / n) - 1.0)).exp())
    }
}
