// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! A lens plane: one redshift slice aggregating the mass distributions that
//! live there. Under the thin-lens approximation convergence, potential and
//! deflection superpose linearly, so a plane simply sums its profiles.

use std::sync::Arc;

use st_params::{Resolved, Scalar};

use crate::cosmology::Cosmology;
use crate::error::{LensingError, LensingResult};
use crate::profiles::MassProfile;

/// Redshift agreement tolerance between co-plane distributions.
const Z_TOL: Scalar = 1e-9;

/// One redshift slice of a multiplane chain.
pub struct LensPlane {
    name: String,
    profiles: Vec<Arc<dyn MassProfile>>,
}

impl std::fmt::Debug for LensPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LensPlane")
            .field("name", &self.name)
            .field("profiles", &self.profiles.len())
            .finish()
    }
}

impl LensPlane {
    pub fn new(
        name: impl Into<String>,
        profiles: Vec<Arc<dyn MassProfile>>,
    ) -> LensingResult<Self> {
        let name = name.into();
        if profiles.is_empty() {
            return Err(LensingError::EmptyPlane { plane: name });
        }
        Ok(Self { name, profiles })
    }

    /// Convenience constructor for a plane holding a single distribution.
    pub fn single(name: impl Into<String>, profile: Arc<dyn MassProfile>) -> Self {
        Self {
            name: name.into(),
            profiles: vec![profile],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profiles(&self) -> &[Arc<dyn MassProfile>] {
        &self.profiles
    }

    /// Plane redshift, read from the resolved context. Every distribution
    /// on the plane must agree.
    pub fn redshift(&self, ctx: &Resolved<'_>) -> LensingResult<Scalar> {
        let expected = self.profiles[0].lens_redshift(ctx)?;
        for profile in &self.profiles[1..] {
            let got = profile.lens_redshift(ctx)?;
            if (got - expected).abs() > Z_TOL {
                return Err(LensingError::MixedPlaneRedshift {
                    plane: self.name.clone(),
                    expected,
                    got,
                });
            }
        }
        Ok(expected)
    }

    /// Combined reduced deflection angle [arcsec].
    pub fn reduced_deflection_angle(
        &self,
        ctx: &Resolved<'_>,
        x: Scalar,
        y: Scalar,
        z_s: Scalar,
    ) -> LensingResult<(Scalar, Scalar)> {
        let mut ax = 0.0;
        let mut ay = 0.0;
        for profile in &self.profiles {
            let (px, py) = profile.reduced_deflection_angle(ctx, x, y, z_s)?;
            ax += px;
            ay += py;
        }
        Ok((ax, ay))
    }

    /// Combined physical deflection angle [arcsec]: the reduced angle
    /// rescaled by D_s / D_ls.
    pub fn physical_deflection_angle(
        &self,
        ctx: &Resolved<'_>,
        cosmology: &dyn Cosmology,
        x: Scalar,
        y: Scalar,
        z_s: Scalar,
    ) -> LensingResult<(Scalar, Scalar)> {
        let z_l = self.redshift(ctx)?;
        let d_s = cosmology.angular_diameter_distance(ctx, z_s)?;
        let d_ls = cosmology.angular_diameter_distance_between(ctx, z_l, z_s)?;
        let (ax, ay) = self.reduced_deflection_angle(ctx, x, y, z_s)?;
        let scale = d_s / d_ls;
        Ok((ax * scale, ay * scale))
    }

    /// Combined reduced potential [arcsec^2].
    pub fn potential(
        &self,
        ctx: &Resolved<'_>,
        x: Scalar,
        y: Scalar,
        z_s: Scalar,
    ) -> LensingResult<Scalar> {
        let mut total = 0.0;
        for profile in &self.profiles {
            total += profile.potential(ctx, x, y, z_s)?;
        }
        Ok(total)
    }

    /// Combined convergence.
    pub fn convergence(
        &self,
        ctx: &Resolved<'_>,
        x: Scalar,
        y: Scalar,
        z_s: Scalar,
    ) -> LensingResult<Scalar> {
        let mut total = 0.0;
        for profile in &self.profiles {
            total += profile.convergence(ctx, x, y, z_s)?;
        }
        Ok(total)
    }
}
