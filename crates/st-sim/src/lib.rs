// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Synthetic lensed-image simulation on top of the multiplane raytracer.

pub mod grid;
mod lens_source;

pub use lens_source::{LensSource, LensSourceConfig};
