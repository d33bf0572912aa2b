// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use st_params::{GraphError, Scalar};
use thiserror::Error;

/// Result alias for lensing computations.
pub type LensingResult<T> = Result<T, LensingError>;

/// Error type covering cosmology, profiles, planes, and the raytracer.
#[derive(Debug, Error, PartialEq)]
pub enum LensingError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// A redshift outside the supported range was supplied.
    #[error("redshift {z} is outside the supported range")]
    InvalidRedshift { z: Scalar },
    /// A physical parameter landed outside its valid range.
    #[error("parameter `{name}`={value} is outside its valid range")]
    InvalidParameter { name: &'static str, value: Scalar },
    /// A plane was built without any mass distribution.
    #[error("plane `{plane}` holds no mass distributions")]
    EmptyPlane { plane: String },
    /// Distributions grouped into one plane disagree on their redshift.
    #[error("plane `{plane}` mixes redshifts {expected} and {got}")]
    MixedPlaneRedshift {
        plane: String,
        expected: Scalar,
        got: Scalar,
    },
}
