// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use ndarray::Array2;
use st_params::Scalar;

/// Builds a pixel-centered sampling grid [arcsec], centered on the origin.
/// Row index walks y, column index walks x, matching image conventions.
pub fn meshgrid(pixelscale: Scalar, pixels_x: usize, pixels_y: usize) -> (Array2<Scalar>, Array2<Scalar>) {
    let offset_x = (pixels_x as Scalar - 1.0) / 2.0;
    let offset_y = (pixels_y as Scalar - 1.0) / 2.0;
    let x = Array2::from_shape_fn((pixels_y, pixels_x), |(_, col)| {
        (col as Scalar - offset_x) * pixelscale
    });
    let y = Array2::from_shape_fn((pixels_y, pixels_x), |(row, _)| {
        (row as Scalar - offset_y) * pixelscale
    });
    (x, y)
}

/// Mean-pools `factor x factor` blocks, preserving surface brightness.
pub fn mean_pool(image: &Array2<Scalar>, factor: usize) -> Array2<Scalar> {
    if factor <= 1 {
        return image.clone();
    }
    let (rows, cols) = image.dim();
    let (out_rows, out_cols) = (rows / factor, cols / factor);
    let norm = (factor * factor) as Scalar;
    Array2::from_shape_fn((out_rows, out_cols), |(row, col)| {
        let mut acc = 0.0;
        for dr in 0..factor {
            for dc in 0..factor {
                acc += image[(row * factor + dr, col * factor + dc)];
            }
        }
        acc / norm
    })
}
