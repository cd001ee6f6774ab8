use dicom::core::value::CastValueError;
use dicom::object::ReadError;
use dicom::pixeldata::PhotometricInterpretation;
use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DicomError {
    #[snafu(display("error reading DICOM file {}: {:?}", path.display(), source))]
    ReadError {
        path: PathBuf,
        #[snafu(source(from(ReadError, Box::new)))]
        source: Box<ReadError>,
    },

    #[snafu(display("missing DICOM property: {}", name))]
    MissingPropertyError { name: &'static str },

    #[snafu(display("unable to cast DICOM property value '{}': {:?}", name, source))]
    CastValueError {
        name: &'static str,
        #[snafu(source(from(CastValueError, Box::new)))]
        source: Box<CastValueError>,
    },

    #[snafu(display("error processing DICOM pixel data: {:?}", source))]
    PixelDataError {
        #[snafu(source(from(dicom::pixeldata::Error, Box::new)))]
        source: Box<dicom::pixeldata::Error>,
    },

    #[snafu(display(
        "Unsupported pixel format: BitsAllocated={}, PixelRepresentation={}, PhotometricInterpretation={}",
        bits_allocated,
        pixel_representation,
        photometric_interpretation
    ))]
    UnsupportedPixelFormat {
        bits_allocated: u16,
        pixel_representation: u16,
        photometric_interpretation: PhotometricInterpretation,
    },

    #[snafu(display(
        "pixel data has {} samples, expected {} frames of {}x{}",
        actual,
        frames,
        rows,
        columns
    ))]
    PixelCountError {
        actual: usize,
        frames: usize,
        rows: usize,
        columns: usize,
    },
}
