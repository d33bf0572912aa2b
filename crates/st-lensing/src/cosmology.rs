// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Cosmological distance capability. The lensing core only ever talks to
//! the [`Cosmology`] trait; [`FlatLambdaCdm`] is the stock implementation
//! with its background parameters living in the module graph.

use st_params::{ModuleGraph, ModuleId, ParamId, Resolved, Scalar};

use crate::constants::{C_KM_S, G_MPC_MSUN};
use crate::error::{LensingError, LensingResult};

/// Planck 2018 Hubble constant [km/s/Mpc].
pub const H0_DEFAULT: Scalar = 67.66;
/// Planck 2018 total matter density.
pub const OMEGA_M_DEFAULT: Scalar = 0.3097;

/// Distance capability consumed by planes and the raytracer.
///
/// All distances are in Mpc. Implementations must be monotonic in redshift
/// and defined for `z >= 0`; the two-redshift form returns the physically
/// signed value when `z1 > z2` (negative, mirroring the comoving-distance
/// difference) so callers can rely on one consistent convention.
pub trait Cosmology: Send + Sync {
    /// Graph node carrying the background parameters.
    fn module(&self) -> ModuleId;

    /// Line-of-sight comoving distance from the observer to `z`.
    fn comoving_distance(&self, ctx: &Resolved<'_>, z: Scalar) -> LensingResult<Scalar>;

    /// Angular diameter distance from the observer to `z`.
    fn angular_diameter_distance(&self, ctx: &Resolved<'_>, z: Scalar) -> LensingResult<Scalar> {
        Ok(self.comoving_distance(ctx, z)? / (1.0 + z))
    }

    /// Angular diameter distance between two redshifts, assuming a flat
    /// geometry. Signed: negative when `z1 > z2`.
    fn angular_diameter_distance_between(
        &self,
        ctx: &Resolved<'_>,
        z1: Scalar,
        z2: Scalar,
    ) -> LensingResult<Scalar> {
        let chi1 = self.comoving_distance(ctx, z1)?;
        let chi2 = self.comoving_distance(ctx, z2)?;
        Ok((chi2 - chi1) / (1.0 + z2))
    }

    /// Critical surface density for a lens at `z_l` and a source at `z_s`
    /// [Msun / Mpc^2]. Inherits the sign convention of the two-redshift
    /// distance.
    fn critical_surface_density(
        &self,
        ctx: &Resolved<'_>,
        z_l: Scalar,
        z_s: Scalar,
    ) -> LensingResult<Scalar> {
        let d_l = self.angular_diameter_distance(ctx, z_l)?;
        let d_s = self.angular_diameter_distance(ctx, z_s)?;
        let d_ls = self.angular_diameter_distance_between(ctx, z_l, z_s)?;
        let prefactor = C_KM_S * C_KM_S / (4.0 * core::f64::consts::PI * G_MPC_MSUN);
        Ok(prefactor * d_s / (d_l * d_ls))
    }
}

/// Flat Lambda-CDM background. `h0` and `omega_m` are graph parameters,
/// static by default and flippable to dynamic through the graph like any
/// other parameter.
#[derive(Debug)]
pub struct FlatLambdaCdm {
    module: ModuleId,
    h0: ParamId,
    omega_m: ParamId,
}

impl FlatLambdaCdm {
    /// Registers a cosmology module with the Planck 2018 defaults.
    pub fn new(graph: &mut ModuleGraph, name: &str) -> LensingResult<Self> {
        Self::with_values(graph, name, H0_DEFAULT, OMEGA_M_DEFAULT)
    }

    /// Registers a cosmology module with explicit background values.
    pub fn with_values(
        graph: &mut ModuleGraph,
        name: &str,
        h0: Scalar,
        omega_m: Scalar,
    ) -> LensingResult<Self> {
        if !(h0.is_finite() && h0 > 0.0) {
            return Err(LensingError::InvalidParameter {
                name: "h0",
                value: h0,
            });
        }
        if !(omega_m.is_finite() && (0.0..=1.0).contains(&omega_m)) {
            return Err(LensingError::InvalidParameter {
                name: "omega_m",
                value: omega_m,
            });
        }
        let module = graph.add_module(name);
        let h0 = graph.add_parameter(module, "h0", Some(st_params::scalar_value(h0)))?;
        let omega_m =
            graph.add_parameter(module, "omega_m", Some(st_params::scalar_value(omega_m)))?;
        Ok(Self { module, h0, omega_m })
    }

    pub fn h0(&self) -> ParamId {
        self.h0
    }

    pub fn omega_m(&self) -> ParamId {
        self.omega_m
    }

    /// Hubble distance c/H0 [Mpc].
    pub fn hubble_distance(&self, ctx: &Resolved<'_>) -> LensingResult<Scalar> {
        Ok(C_KM_S / ctx.scalar(self.h0)?)
    }

    /// Dimensionless Hubble function E(z) for a flat background.
    fn efunc(omega_m: Scalar, z: Scalar) -> Scalar {
        let a = 1.0 + z;
        (omega_m * a * a * a + (1.0 - omega_m)).sqrt()
    }
}

/// Composite Simpson integration over `[a, b]` with `n` (even) panels.
fn simpson(mut f: impl FnMut(Scalar) -> Scalar, a: Scalar, b: Scalar, n: usize) -> Scalar {
    let n = n.max(2) + n % 2;
    let h = (b - a) / n as Scalar;
    let mut acc = f(a) + f(b);
    for i in 1..n {
        let weight = if i % 2 == 0 { 2.0 } else { 4.0 };
        acc += weight * f(a + i as Scalar * h);
    }
    acc * h / 3.0
}

impl Cosmology for FlatLambdaCdm {
    fn module(&self) -> ModuleId {
        self.module
    }

    fn comoving_distance(&self, ctx: &Resolved<'_>, z: Scalar) -> LensingResult<Scalar> {
        if !(z.is_finite() && z >= 0.0) {
            return Err(LensingError::InvalidRedshift { z });
        }
        if z == 0.0 {
            return Ok(0.0);
        }
        let omega_m = ctx.scalar(self.omega_m)?;
        // Panel count scales with the integration range; always enough for
        // sub-kpc accuracy at lensing redshifts.
        let panels = ((z * 128.0).ceil() as usize).clamp(64, 4096);
        let integral = simpson(|zp| 1.0 / Self::efunc(omega_m, zp), 0.0, z, panels);
        Ok(self.hubble_distance(ctx)? * integral)
    }
}
