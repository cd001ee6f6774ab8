pub mod distance;
pub mod errors;
pub mod field;
pub mod file;
pub mod load;
pub mod metadata;
pub mod pipeline;
pub mod save;
pub mod scale;
pub mod volume;

pub use distance::{DistanceAlgorithm, DistanceError, FeatureLabel};
pub use field::{ScalarField, ScaleVector, VectorField};
pub use load::{load_volume, LoadError};
pub use metadata::*;
pub use pipeline::{DistanceMapper, PipelineError};
pub use save::{SaveError, TiffSaver};
pub use scale::{par_scale_vector_field, scale_vector_field, scaled_norm, ScaleError};
pub use volume::{ComponentType, Volume, VolumeData};
