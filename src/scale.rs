//! Conversion of grid-unit displacement vectors into physical distances.
//!
//! Each output voxel is `sqrt(sum_i (v[i] * s[i])^2)` for the voxel's displacement vector `v`
//! and the scale vector `s`. Voxels are independent, so the parallel variant gives results
//! identical to the sequential one.
use ndarray::{ArrayView1, Axis, Zip};
use snafu::{ensure, Snafu};

use crate::field::{ScalarField, ScaleVector, VectorField};

#[derive(Debug, Snafu, PartialEq)]
pub enum ScaleError {
    #[snafu(display(
        "scale vector has {} components but vectors have dimensionality {}",
        actual,
        expected
    ))]
    DimensionMismatch { expected: usize, actual: usize },
}

fn check_dimensionality(expected: usize, scale: &ScaleVector) -> Result<(), ScaleError> {
    ensure!(
        scale.len() == expected,
        DimensionMismatchSnafu {
            expected,
            actual: scale.len()
        }
    );
    Ok(())
}

// Lengths are checked by the callers
fn norm(vector: ArrayView1<'_, f32>, scale: &[f64]) -> f32 {
    vector
        .iter()
        .zip(scale)
        .map(|(&component, &factor)| {
            let scaled = component as f64 * factor;
            scaled * scaled
        })
        .sum::<f64>()
        .sqrt() as f32
}

/// Euclidean norm of the element-wise product of a single vector and the scale vector.
pub fn scaled_norm(vector: &[f32], scale: &ScaleVector) -> Result<f32, ScaleError> {
    check_dimensionality(vector.len(), scale)?;
    Ok(norm(ArrayView1::from(vector), scale.as_slice()))
}

/// Scale every displacement vector in `field` and reduce it to its Euclidean norm.
///
/// Fails with [`ScaleError::DimensionMismatch`] if the scale vector length differs
/// from the field's dimensionality.
pub fn scale_vector_field(
    field: &VectorField,
    scale: &ScaleVector,
) -> Result<ScalarField, ScaleError> {
    check_dimensionality(field.dimensionality(), scale)?;
    let scale = scale.as_slice();
    let data = Zip::from(field.data().lanes(Axis(3))).map_collect(|vector| norm(vector, scale));
    Ok(ScalarField::new(data))
}

/// Like [`scale_vector_field`], but voxels are distributed across the rayon thread pool.
pub fn par_scale_vector_field(
    field: &VectorField,
    scale: &ScaleVector,
) -> Result<ScalarField, ScaleError> {
    check_dimensionality(field.dimensionality(), scale)?;
    let scale = scale.as_slice();
    let data =
        Zip::from(field.data().lanes(Axis(3))).par_map_collect(|vector| norm(vector, scale));
    Ok(ScalarField::new(data))
}
