pub mod dicom;
pub mod tiff;

pub use self::dicom::DicomError;
pub use self::tiff::TiffError;
