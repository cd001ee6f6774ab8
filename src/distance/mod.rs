//! Euclidean distance transforms over binary volumes.
//!
//! Two variants are provided:
//!
//! - [`danielsson`] propagates displacement vectors in grid units and knows nothing about
//!   voxel spacing. Physical distances are obtained by scaling its vector map with
//!   [`crate::scale::scale_vector_field`].
//! - [`parabolic`] computes exact squared distances with per-axis spacing weights and
//!   yields physical distances directly.
//!
//! Distances are measured from every voxel to the nearest feature voxel, which is selected
//! with [`FeatureLabel`].
use ndarray::Array3;
use snafu::{ensure, Snafu};
use std::fmt;

use crate::scale::ScaleError;

pub mod danielsson;
pub mod parabolic;

pub use danielsson::{danielsson_distance_map, danielsson_vector_map};
pub use parabolic::parabolic_distance_map;

#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum DistanceError {
    #[snafu(display("cannot compute a distance map over an empty volume of shape {:?}", shape))]
    EmptyVolume { shape: (usize, usize, usize) },

    #[snafu(display("volume has no feature voxels to measure distances to"))]
    NoFeatureVoxels,

    #[snafu(display("error converting vector map to distances: {}", source))]
    Magnitude { source: ScaleError },
}

/// Which voxels of the input are treated as features
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FeatureLabel {
    /// Distances to the nearest non-zero voxel
    #[default]
    NonZero,
    /// Distances to the nearest zero-valued voxel
    Zero,
}

impl fmt::Display for FeatureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label_str = match self {
            FeatureLabel::NonZero => "non-zero",
            FeatureLabel::Zero => "zero",
        };
        write!(f, "{label_str}")
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DistanceAlgorithm {
    /// Vector propagation in grid units, spacing applied afterwards by scaling the vectors
    #[default]
    Danielsson,
    /// Exact separable transform with built-in spacing support
    Parabolic,
}

impl fmt::Display for DistanceAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let algorithm_str = match self {
            DistanceAlgorithm::Danielsson => "danielsson",
            DistanceAlgorithm::Parabolic => "parabolic",
        };
        write!(f, "{algorithm_str}")
    }
}

/// Reject masks that have no voxels, or nothing to measure distances to
pub(crate) fn validate_mask(mask: &Array3<bool>) -> Result<(), DistanceError> {
    let shape = mask.dim();
    ensure!(!mask.is_empty(), EmptyVolumeSnafu { shape });
    ensure!(mask.iter().any(|&v| v), NoFeatureVoxelsSnafu);
    Ok(())
}
