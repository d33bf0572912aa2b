// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Gravitational lensing core.
//!
//! Cosmology, mass and light distributions are capabilities whose physical
//! parameters live in the `st-params` module graph; every computation is a
//! pure function of coordinates and a resolved context, so batching and
//! differentiation wrappers can sit entirely outside. The centerpiece is
//! [`Multiplane`]: exact backward ray tracing through an ordered chain of
//! lens planes, plus the seeded root-finding search that inverts it.

pub mod constants;
mod cosmology;
mod error;
pub mod light;
mod multiplane;
mod plane;
pub mod profiles;
mod solver;

pub use cosmology::{Cosmology, FlatLambdaCdm, H0_DEFAULT, OMEGA_M_DEFAULT};
pub use error::{LensingError, LensingResult};
pub use light::{LightProfile, Sersic, SersicInit};
pub use multiplane::{Multiplane, DEFAULT_FD_STEP};
pub use plane::LensPlane;
pub use solver::ForwardOptions;
