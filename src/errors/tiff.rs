use snafu::Snafu;
use std::path::PathBuf;
use tiff::ColorType;
use tiff::TiffError as BaseTiffError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TiffError {
    #[snafu(display("IO error on TIFF file {}", path.display()))]
    IOError {
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
        path: PathBuf,
    },

    #[snafu(display("error reading TIFF file {}", path.display()))]
    ReadError {
        path: PathBuf,
        #[snafu(source(from(BaseTiffError, Box::new)))]
        source: Box<BaseTiffError>,
    },

    #[snafu(display("unsupported color type: {:?}", color_type))]
    UnsupportedColorType { color_type: ColorType },

    #[snafu(display(
        "frame {} of {} does not match the first frame: {}",
        frame,
        path.display(),
        reason
    ))]
    InconsistentFrame {
        path: PathBuf,
        frame: usize,
        reason: String,
    },
}
