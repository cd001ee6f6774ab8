use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu};
use tracing::{debug, info};

use crate::distance::{
    danielsson_distance_map, danielsson_vector_map, parabolic_distance_map, DistanceAlgorithm,
    DistanceError, FeatureLabel,
};
use crate::field::{ScalarField, ScaleVector};
use crate::load::{load_volume, LoadError};
use crate::metadata::Spacing;
use crate::save::{SaveError, TiffSaver};
use crate::scale::{par_scale_vector_field, ScaleError};
use crate::volume::Volume;

#[derive(Debug, Snafu)]
pub enum PipelineError {
    #[snafu(display("error loading {}: {}", path.display(), source))]
    Load {
        path: PathBuf,
        #[snafu(source(from(LoadError, Box::new)))]
        source: Box<LoadError>,
    },
    #[snafu(display("error computing distance map: {}", source))]
    Distance { source: DistanceError },
    #[snafu(display("error scaling vector map to physical units: {}", source))]
    Scale { source: ScaleError },
    #[snafu(display("error saving {}: {}", path.display(), source))]
    Save {
        path: PathBuf,
        #[snafu(source(from(SaveError, Box::new)))]
        source: Box<SaveError>,
    },
}

// Responsible for turning a volume into a distance map
#[derive(Debug, Clone, Copy, Default)]
pub struct DistanceMapper {
    pub algorithm: DistanceAlgorithm,
    /// Measure distances in millimetres using the voxel spacing instead of voxel units
    pub physical: bool,
    pub feature: FeatureLabel,
}

impl DistanceMapper {
    /// Distance from every voxel of `volume` to the nearest feature voxel
    pub fn compute(&self, volume: &Volume) -> Result<ScalarField, PipelineError> {
        let mask = volume.feature_mask(self.feature);
        let spacing = volume.spacing();
        debug!(
            "Computing {} distance map over {} volume of shape {:?}",
            self.algorithm,
            volume.component_type(),
            volume.shape()
        );

        match (self.algorithm, self.physical) {
            (DistanceAlgorithm::Danielsson, true) => {
                let vectors = danielsson_vector_map(&mask).context(DistanceSnafu)?;
                let scale = ScaleVector::from(&spacing);
                info!(
                    "original scale = ({}, {}, {})",
                    spacing.x, spacing.y, spacing.z
                );
                par_scale_vector_field(&vectors, &scale).context(ScaleSnafu)
            }
            (DistanceAlgorithm::Danielsson, false) => {
                danielsson_distance_map(&mask).context(DistanceSnafu)
            }
            (DistanceAlgorithm::Parabolic, true) => {
                parabolic_distance_map(&mask, &spacing).context(DistanceSnafu)
            }
            (DistanceAlgorithm::Parabolic, false) => {
                parabolic_distance_map(&mask, &Spacing::default()).context(DistanceSnafu)
            }
        }
    }

    /// Load `source`, compute its distance map and write it to `dest` with `saver`.
    pub fn process<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        source: P,
        dest: Q,
        saver: &TiffSaver,
    ) -> Result<(), PipelineError> {
        let (source, dest) = (source.as_ref(), dest.as_ref());
        let volume = load_volume(source).context(LoadSnafu { path: source })?;
        let distances = self.compute(&volume)?;
        saver
            .save(dest, &distances, volume.spacing())
            .context(SaveSnafu { path: dest })?;
        info!("Wrote distance map {}", dest.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use rstest::rstest;

    /// Single feature voxel at the origin of a (1, 5, 4) volume
    fn corner_volume(spacing: Spacing) -> Volume {
        let mut data = Array3::<u8>::zeros((1, 5, 4));
        data[[0, 0, 0]] = 1;
        Volume::new(data, spacing)
    }

    #[rstest]
    #[case::danielsson_voxels(DistanceAlgorithm::Danielsson, false, 5.0)]
    #[case::parabolic_voxels(DistanceAlgorithm::Parabolic, false, 5.0)]
    #[case::danielsson_physical(DistanceAlgorithm::Danielsson, true, 52.0f32.sqrt())]
    #[case::parabolic_physical(DistanceAlgorithm::Parabolic, true, 52.0f32.sqrt())]
    fn test_compute(
        #[case] algorithm: DistanceAlgorithm,
        #[case] physical: bool,
        #[case] expected: f32,
    ) {
        // Voxel (x=3, y=4) with x spacing doubled
        let volume = corner_volume(Spacing::new(2.0, 1.0, 7.0));
        let mapper = DistanceMapper {
            algorithm,
            physical,
            ..Default::default()
        };
        let distances = mapper.compute(&volume).unwrap();
        assert_eq!(distances.shape(), (1, 5, 4));
        assert!((distances.data()[[0, 4, 3]] - expected).abs() < 1e-4);
        assert_eq!(distances.data()[[0, 0, 0]], 0.0);
    }

    #[test]
    fn test_compute_zero_feature() {
        // Zero voxels are the features, so the lone non-zero voxel is one voxel away
        let volume = corner_volume(Spacing::default());
        let mapper = DistanceMapper {
            feature: FeatureLabel::Zero,
            ..Default::default()
        };
        let distances = mapper.compute(&volume).unwrap();
        assert_eq!(distances.data()[[0, 0, 0]], 1.0);
        assert_eq!(distances.data()[[0, 2, 2]], 0.0);
    }

    #[test]
    fn test_compute_no_features() {
        let volume = Volume::new(Array3::<i16>::zeros((2, 3, 3)), Spacing::default());
        let result = DistanceMapper::default().compute(&volume);
        assert!(matches!(
            result,
            Err(PipelineError::Distance {
                source: DistanceError::NoFeatureVoxels
            })
        ));
    }

    #[test]
    fn test_process() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("mask.tiff");
        let dest = temp_dir.path().join("distance.tiff");
        let spacing = Spacing::new(0.5, 0.5, 2.0);

        // Feature slice at z=0, two more slices above it
        let mut data = Array3::<f32>::zeros((3, 2, 2));
        data.slice_mut(ndarray::s![0, .., ..]).fill(1.0);
        TiffSaver::default()
            .save(&source, &ScalarField::new(data), spacing)
            .unwrap();

        let mapper = DistanceMapper {
            physical: true,
            ..Default::default()
        };
        mapper
            .process(&source, &dest, &TiffSaver::default())
            .unwrap();

        let output = load_volume(&dest).unwrap();
        assert_eq!(output.shape(), (3, 2, 2));
        match output.data() {
            crate::volume::VolumeData::F32(array) => {
                assert_eq!(array[[0, 1, 1]], 0.0);
                assert!((array[[2, 0, 0]] - 4.0).abs() < 1e-6);
            }
            other => panic!("unexpected data {:?}", other.component_type()),
        }
    }

    #[test]
    fn test_process_missing_source() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = DistanceMapper::default().process(
            temp_dir.path().join("missing.tiff"),
            temp_dir.path().join("out.tiff"),
            &TiffSaver::default(),
        );
        assert!(matches!(result, Err(PipelineError::Load { .. })));
    }
}
