// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use serde::{Deserialize, Serialize};
use st_params::{ModuleGraph, ModuleId, ParamId, Resolved, Scalar};

use super::{derotate, opt_value, translate_rotate, MassProfile};
use crate::error::{LensingError, LensingResult};

/// Initial values for [`Sie`]; `None` leaves the parameter dynamic.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SieInit {
    pub z_l: Option<Scalar>,
    pub x0: Option<Scalar>,
    pub y0: Option<Scalar>,
    /// Axis ratio, 0 < q < 1.
    pub q: Option<Scalar>,
    /// Position angle [radians].
    pub phi: Option<Scalar>,
    /// Einstein radius scale [arcsec].
    pub b: Option<Scalar>,
}

/// Singular isothermal ellipsoid (Kormann parameterization).
pub struct Sie {
    module: ModuleId,
    z_l: ParamId,
    x0: ParamId,
    y0: ParamId,
    q: ParamId,
    phi: ParamId,
    b: ParamId,
    /// Softening length [arcsec].
    s: Scalar,
}

struct Frame {
    x: Scalar,
    y: Scalar,
    q: Scalar,
    phi: Scalar,
    b: Scalar,
}

impl Sie {
    pub fn new(graph: &mut ModuleGraph, name: &str, init: SieInit) -> LensingResult<Self> {
        let module = graph.add_module(name);
        let z_l = graph.add_parameter(module, "z_l", opt_value(init.z_l))?;
        let x0 = graph.add_parameter(module, "x0", opt_value(init.x0))?;
        let y0 = graph.add_parameter(module, "y0", opt_value(init.y0))?;
        let q = graph.add_parameter(module, "q", opt_value(init.q))?;
        let phi = graph.add_parameter(module, "phi", opt_value(init.phi))?;
        let b = graph.add_parameter(module, "b", opt_value(init.b))?;
        Ok(Self {
            module,
            z_l,
            x0,
            y0,
            q,
            phi,
            b,
            s: 0.0,
        })
    }

    pub fn with_softening(mut self, s: Scalar) -> Self {
        self.s = s;
        self
    }

    pub fn q(&self) -> ParamId {
        self.q
    }

    pub fn b(&self) -> ParamId {
        self.b
    }

    fn frame(&self, ctx: &Resolved<'_>, x: Scalar, y: Scalar) -> LensingResult<Frame> {
        let q = ctx.scalar(self.q)?;
        if !(q > 0.0 && q < 1.0) {
            return Err(LensingError::InvalidParameter { name: "q", value: q });
        }
        let phi = ctx.scalar(self.phi)?;
        let (xr, yr) = translate_rotate(x, y, ctx.scalar(self.x0)?, ctx.scalar(self.y0)?, phi);
        Ok(Frame {
            x: xr,
            y: yr,
            q,
            phi,
            b: ctx.scalar(self.b)?,
        })
    }

    /// Profile-frame deflection, before derotation.
    fn frame_deflection(&self, frame: &Frame) -> (Scalar, Scalar) {
        let psi = (frame.q * frame.q * (frame.x * frame.x + self.s * self.s)
            + frame.y * frame.y)
            .sqrt();
        let f = (1.0 - frame.q * frame.q).sqrt();
        let scale = frame.b * frame.q.sqrt() / f;
        let ax = scale * (f * frame.x / (psi + self.s)).atan();
        let ay = scale * (f * frame.y / (psi + frame.q * frame.q * self.s)).atanh();
        (ax, ay)
    }
}

impl MassProfile for Sie {
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
        let frame = self.frame(ctx, x, y)?;
        let (ax, ay) = self.frame_deflection(&frame);
        Ok(derotate(ax, ay, frame.phi))
    }

    fn potential(
        &self,
        ctx: &Resolved<'_>,
        x: Scalar,
        y: Scalar,
        _z_s: Scalar,
    ) -> LensingResult<Scalar> {
        let frame = self.frame(ctx, x, y)?;
        let (ax, ay) = self.frame_deflection(&frame);
        Ok(frame.x * ax + frame.y * ay)
    }

    fn convergence(
        &self,
        ctx: &Resolved<'_>,
        x: Scalar,
        y: Scalar,
        _z_s: Scalar,
    ) -> LensingResult<Scalar> {
        let frame = self.frame(ctx, x, y)?;
        let psi = (frame.q * frame.q * (frame.x * frame.x + self.s * self.s)
            + frame.y * frame.y)
            .sqrt();
        Ok(0.5 * frame.q.sqrt() * frame.b / psi)
    }
}
