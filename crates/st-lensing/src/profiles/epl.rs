// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Elliptical power-law profile. The deflection follows the angular series
//! of Tessore & Metcalf (2015); the series is truncated after `n_iter`
//! terms, which converges geometrically in the ellipticity factor
//! `(1 - q) / (1 + q)`.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use st_params::{ModuleGraph, ModuleId, ParamId, Resolved, Scalar};

use super::{derotate, opt_value, translate_rotate, MassProfile};
use crate::error::{LensingError, LensingResult};

/// Initial values for [`Epl`]; `None` leaves the parameter dynamic.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct EplInit {
    pub z_l: Option<Scalar>,
    pub x0: Option<Scalar>,
    pub y0: Option<Scalar>,
    /// Axis ratio, 0 < q < 1.
    pub q: Option<Scalar>,
    /// Position angle [radians].
    pub phi: Option<Scalar>,
    /// Einstein radius [arcsec].
    pub rein: Option<Scalar>,
    /// Power-law slope minus one, 0 < t < 2 (t = 1 is isothermal).
    pub t: Option<Scalar>,
}

/// Elliptical power-law (singular power-law ellipsoid).
pub struct Epl {
    module: ModuleId,
    z_l: ParamId,
    x0: ParamId,
    y0: ParamId,
    q: ParamId,
    phi: ParamId,
    rein: ParamId,
    t: ParamId,
    /// Softening length [arcsec].
    s: Scalar,
    /// Series truncation for the angular part of the deflection.
    n_iter: usize,
}

impl Epl {
    pub fn new(graph: &mut ModuleGraph, name: &str, init: EplInit) -> LensingResult<Self> {
        let module = graph.add_module(name);
        let z_l = graph.add_parameter(module, "z_l", opt_value(init.z_l))?;
        let x0 = graph.add_parameter(module, "x0", opt_value(init.x0))?;
        let y0 = graph.add_parameter(module, "y0", opt_value(init.y0))?;
        let q = graph.add_parameter(module, "q", opt_value(init.q))?;
        let phi = graph.add_parameter(module, "phi", opt_value(init.phi))?;
        let rein = graph.add_parameter(module, "rein", opt_value(init.rein))?;
        let t = graph.add_parameter(module, "t", opt_value(init.t))?;
        Ok(Self {
            module,
            z_l,
            x0,
            y0,
            q,
            phi,
            rein,
            t,
            s: 0.0,
            n_iter: 18,
        })
    }

    pub fn with_softening(mut self, s: Scalar) -> Self {
        self.s = s;
        self
    }

    pub fn with_series_terms(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter.max(1);
        self
    }

    pub fn t(&self) -> ParamId {
        self.t
    }

    fn checked_q_t(&self, ctx: &Resolved<'_>) -> LensingResult<(Scalar, Scalar)> {
        let q = ctx.scalar(self.q)?;
        if !(q > 0.0 && q < 1.0) {
            return Err(LensingError::InvalidParameter { name: "q", value: q });
        }
        let t = ctx.scalar(self.t)?;
        if !(t > 0.0 && t < 2.0) {
            return Err(LensingError::InvalidParameter { name: "t", value: t });
        }
        Ok((q, t))
    }

    /// `R * omega(phi)` series, eq. 23 of Tessore & Metcalf (2015).
    fn r_omega(&self, z: Complex64, t: Scalar, q: Scalar) -> Complex64 {
        let f = (1.0 - q) / (1.0 + q);
        let phase = z / z.conj();
        let mut omega = z;
        let mut part_sum = omega;
        for i in 1..self.n_iter {
            let i = i as Scalar;
            let factor = (2.0 * i - (2.0 - t)) / (2.0 * i + (2.0 - t));
            omega = phase * omega * (-f * factor);
            part_sum += omega;
        }
        part_sum
    }
}

/// Mirrors the reference treatment of the central singularity: NaNs become
/// zero, infinities are clipped to +-10 arcsec.
fn clip_nonfinite(value: Scalar) -> Scalar {
    if value.is_nan() {
        0.0
    } else if value.is_infinite() {
        10.0_f64.copysign(value)
    } else {
        value
    }
}

impl MassProfile for Epl {
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
        let (q, t) = self.checked_q_t(ctx)?;
        let phi = ctx.scalar(self.phi)?;
        let rein = ctx.scalar(self.rein)?;
        let (xr, yr) = translate_rotate(x, y, ctx.scalar(self.x0)?, ctx.scalar(self.y0)?, phi);
        let z = Complex64::new(q * xr, yr);
        let r = z.norm();
        let b = rein * q.sqrt();
        let alpha = self.r_omega(z, t, q) * (2.0 / (1.0 + q)) * (b / r).powf(t);
        let (ax, ay) = (clip_nonfinite(alpha.re), clip_nonfinite(alpha.im));
        Ok(derotate(ax, ay, phi))
    }

    fn potential(
        &self,
        ctx: &Resolved<'_>,
        x: Scalar,
        y: Scalar,
        z_s: Scalar,
    ) -> LensingResult<Scalar> {
        let (_, t) = self.checked_q_t(ctx)?;
        let (ax, ay) = self.reduced_deflection_angle(ctx, x, y, z_s)?;
        let dx = x - ctx.scalar(self.x0)?;
        let dy = y - ctx.scalar(self.y0)?;
        Ok((dx * ax + dy * ay) / (2.0 - t))
    }

    fn convergence(
        &self,
        ctx: &Resolved<'_>,
        x: Scalar,
        y: Scalar,
        _z_s: Scalar,
    ) -> LensingResult<Scalar> {
        let (q, t) = self.checked_q_t(ctx)?;
        let rein = ctx.scalar(self.rein)?;
        let (xr, yr) = translate_rotate(
            x,
            y,
            ctx.scalar(self.x0)?,
            ctx.scalar(self.y0)?,
            ctx.scalar(self.phi)?,
        );
        let psi = (q * q * (xr * xr + self.s * self.s) + yr * yr).sqrt();
        Ok((2.0 - t) / 2.0 * (rein * q.sqrt() / psi).powf(t))
    }
}
