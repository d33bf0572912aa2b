// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Unit conventions: angles in arcsec, distances in Mpc, masses in solar
//! masses, time delays in days.

use st_params::Scalar;

/// Speed of light [km/s].
pub const C_KM_S: Scalar = 299_792.458;
/// Gravitational constant [Mpc Msun^-1 (km/s)^2].
pub const G_MPC_MSUN: Scalar = 4.300_917_27e-9;
/// One megaparsec [km].
pub const KM_PER_MPC: Scalar = 3.085_677_581_491_367e19;
pub const ARCSEC_TO_RAD: Scalar = core::f64::consts::PI / 648_000.0;
pub const RAD_TO_ARCSEC: Scalar = 648_000.0 / core::f64::consts::PI;
pub const SEC_PER_DAY: Scalar = 86_400.0;

/// Converts `(1+z) * D [Mpc] * angle^2 [arcsec^2] / c` accumulations into
/// days.
pub const MPC_ARCSEC2_TO_DAYS: Scalar =
    ARCSEC_TO_RAD * ARCSEC_TO_RAD * KM_PER_MPC / (C_KM_S * SEC_PER_DAY);
