//! Value types exchanged between the distance transforms, the vector scaler and the writer.
//!
//! Grids are indexed `(depth, height, width)`. Per-axis quantities (vector components,
//! scale factors, spacing) are ordered `(x, y, z)`, i.e. column, row, slice.
use ndarray::{Array3, Array4, ArrayView1, Axis};

use crate::metadata::Spacing;

/// Number of spatial axes handled by this crate
pub const DIMENSION: usize = 3;

/// A grid of displacement vectors, one per voxel, pointing at the nearest feature voxel.
///
/// Stored channel-last as `(depth, height, width, components)`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorField {
    data: Array4<f32>,
}

impl VectorField {
    pub fn new(data: Array4<f32>) -> Self {
        Self { data }
    }

    /// A field of zero vectors with the given grid shape and `DIMENSION` components
    pub fn zeros((depth, height, width): (usize, usize, usize)) -> Self {
        Self {
            data: Array4::zeros((depth, height, width, DIMENSION)),
        }
    }

    /// Number of components held by each voxel
    pub fn dimensionality(&self) -> usize {
        self.data.len_of(Axis(3))
    }

    /// Grid shape as `(depth, height, width)`
    pub fn shape(&self) -> (usize, usize, usize) {
        let shape = self.data.shape();
        (shape[0], shape[1], shape[2])
    }

    pub fn vector(&self, (z, y, x): (usize, usize, usize)) -> ArrayView1<'_, f32> {
        self.data.slice(ndarray::s![z, y, x, ..])
    }

    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }
}

/// Per-axis multipliers applied to each displacement vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleVector(Vec<f64>);

impl ScaleVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// All ones, which leaves vectors unchanged
    pub fn identity(len: usize) -> Self {
        Self(vec![1.0; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Copy of the stored factors
    pub fn to_vec(&self) -> Vec<f64> {
        self.0.clone()
    }
}

impl From<&Spacing> for ScaleVector {
    fn from(spacing: &Spacing) -> Self {
        Self(vec![spacing.x, spacing.y, spacing.z])
    }
}

impl From<[f64; DIMENSION]> for ScaleVector {
    fn from(values: [f64; DIMENSION]) -> Self {
        Self(values.to_vec())
    }
}

/// A grid holding one distance per voxel.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    data: Array3<f32>,
}

impl ScalarField {
    pub fn new(data: Array3<f32>) -> Self {
        Self { data }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Slices along the depth axis, each in row-major order
    pub fn frames(&self) -> impl Iterator<Item = Vec<f32>> + '_ {
        self.data
            .axis_iter(Axis(0))
            .map(|frame| frame.iter().copied().collect())
    }
}
