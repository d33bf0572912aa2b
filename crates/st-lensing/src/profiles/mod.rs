// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Mass-distribution capabilities. Each profile owns a module in the graph;
//! every physical quantity is a parameter there (dynamic when unset at
//! construction) and gets read back through the resolved context at call
//! time. All angular inputs and outputs are arcsec.

mod epl;
mod point;
mod shear;
mod sie;
mod sis;

pub use epl::{Epl, EplInit};
pub use point::{PointMass, PointMassInit};
pub use shear::{ExternalShear, ExternalShearInit};
pub use sie::{Sie, SieInit};
pub use sis::{Sis, SisInit};

use st_params::{ModuleId, Resolved, Scalar, Value};

use crate::error::LensingResult;

/// Thin-lens mass distribution evaluated at its own plane.
///
/// `reduced_deflection_angle`, `potential`, and `convergence` are pure in
/// the coordinates and in the profile's resolved parameters. `z_s` is the
/// source redshift the reduced quantities refer to; profiles parameterized
/// directly by an Einstein radius ignore it.
pub trait MassProfile: Send + Sync {
    /// Graph node owning the profile's parameters.
    fn module(&self) -> ModuleId;

    /// Redshift of the plane this distribution lives on.
    fn lens_redshift(&self, ctx: &Resolved<'_>) -> LensingResult<Scalar>;

    /// Reduced deflection angle [arcsec].
    fn reduced_deflection_angle(
        &self,
        ctx: &Resolved<'_>,
        x: Scalar,
        y: Scalar,
        z_s: Scalar,
    ) -> LensingResult<(Scalar, Scalar)>;

    /// Reduced lensing potential [arcsec^2].
    fn potential(&self, ctx: &Resolved<'_>, x: Scalar, y: Scalar, z_s: Scalar)
        -> LensingResult<Scalar>;

    /// Dimensionless projected density.
    fn convergence(
        &self,
        ctx: &Resolved<'_>,
        x: Scalar,
        y: Scalar,
        z_s: Scalar,
    ) -> LensingResult<Scalar>;
}

pub(crate) fn opt_value(value: Option<Scalar>) -> Option<Value> {
    value.map(st_params::scalar_value)
}

/// Shifts into the profile frame and rotates by the position angle.
pub(crate) fn translate_rotate(
    x: Scalar,
    y: Scalar,
    x0: Scalar,
    y0: Scalar,
    phi: Scalar,
) -> (Scalar, Scalar) {
    let dx = x - x0;
    let dy = y - y0;
    let (sin, cos) = phi.sin_cos();
    (dx * cos + dy * sin, -dx * sin + dy * cos)
}

/// Rotates a profile-frame vector back into the sky frame.
pub(crate) fn derotate(vx: Scalar, vy: Scalar, phi: Scalar) -> (Scalar, Scalar) {
    let (sin, cos) = phi.sin_cos();
    (vx * cos - vy * sin, vx * sin + vy * cos)
}
