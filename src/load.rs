//! Readers turning TIFF, DICOM and common raster files into a [`Volume`].
use dicom::dictionary_std::tags;
use dicom::object::{open_file, FileDicomObject, InMemDicomObject};
use dicom::pixeldata::{ConvertOptions, ModalityLutOption, PhotometricInterpretation, PixelDecoder};
use ndarray::Array3;
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::ColorType;
use tracing::{debug, warn};

use crate::errors::dicom::{
    CastValueSnafu, MissingPropertySnafu, PixelCountSnafu, PixelDataSnafu, ReadSnafu,
    UnsupportedPixelFormatSnafu,
};
use crate::errors::tiff::{
    IOSnafu, InconsistentFrameSnafu, ReadSnafu as TiffReadSnafu, UnsupportedColorTypeSnafu,
};
use crate::errors::{DicomError, TiffError};
use crate::file::{DicomFileOperations, TiffFileOperations, VolumeFileOperations};
use crate::metadata::Spacing;
use crate::volume::{Volume, VolumeData};

#[derive(Debug, Snafu)]
pub enum LoadError {
    #[snafu(display("error loading TIFF volume: {}", source))]
    LoadTiff {
        #[snafu(source(from(TiffError, Box::new)))]
        source: Box<TiffError>,
    },

    #[snafu(display("error loading DICOM volume: {}", source))]
    LoadDicom {
        #[snafu(source(from(DicomError, Box::new)))]
        source: Box<DicomError>,
    },

    #[snafu(display("error loading image {}: {}", path.display(), source))]
    LoadImage {
        path: PathBuf,
        #[snafu(source(from(image::ImageError, Box::new)))]
        source: Box<image::ImageError>,
    },

    #[snafu(display("unsupported volume file: {}", path.display()))]
    UnsupportedFile { path: PathBuf },
}

/// Read a volume from any of the supported file formats.
///
/// TIFF and DICOM files may hold several frames, which become the depth axis. Other raster
/// formats are read as a single grayscale slice with unit spacing.
pub fn load_volume<P: AsRef<Path>>(path: P) -> Result<Volume, LoadError> {
    let path = path.as_ref();
    if path.has_tiff_extension() {
        load_tiff(path).context(LoadTiffSnafu)
    } else if path.has_dicom_extension() || path.is_dicom_file_or(false) {
        load_dicom(path).context(LoadDicomSnafu)
    } else if path.has_image_extension() {
        load_image(path)
    } else {
        UnsupportedFileSnafu { path }.fail()
    }
}

/// Frames decoded from a TIFF, grouped by sample type
enum TiffFrames {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    U64(Vec<u64>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl TiffFrames {
    fn new(result: DecodingResult) -> Self {
        match result {
            DecodingResult::U8(v) => TiffFrames::U8(v),
            DecodingResult::I8(v) => TiffFrames::I8(v),
            DecodingResult::U16(v) => TiffFrames::U16(v),
            DecodingResult::I16(v) => TiffFrames::I16(v),
            DecodingResult::U32(v) => TiffFrames::U32(v),
            DecodingResult::I32(v) => TiffFrames::I32(v),
            DecodingResult::U64(v) => TiffFrames::U64(v),
            DecodingResult::I64(v) => TiffFrames::I64(v),
            DecodingResult::F32(v) => TiffFrames::F32(v),
            DecodingResult::F64(v) => TiffFrames::F64(v),
        }
    }

    /// Append a frame, returning `false` if its sample type differs from the first frame
    fn extend(&mut self, result: DecodingResult) -> bool {
        match (self, result) {
            (TiffFrames::U8(a), DecodingResult::U8(b)) => a.extend(b),
            (TiffFrames::I8(a), DecodingResult::I8(b)) => a.extend(b),
            (TiffFrames::U16(a), DecodingResult::U16(b)) => a.extend(b),
            (TiffFrames::I16(a), DecodingResult::I16(b)) => a.extend(b),
            (TiffFrames::U32(a), DecodingResult::U32(b)) => a.extend(b),
            (TiffFrames::I32(a), DecodingResult::I32(b)) => a.extend(b),
            (TiffFrames::U64(a), DecodingResult::U64(b)) => a.extend(b),
            (TiffFrames::I64(a), DecodingResult::I64(b)) => a.extend(b),
            (TiffFrames::F32(a), DecodingResult::F32(b)) => a.extend(b),
            (TiffFrames::F64(a), DecodingResult::F64(b)) => a.extend(b),
            _ => return false,
        }
        true
    }

    fn into_volume_data(self, shape: (usize, usize, usize)) -> Option<VolumeData> {
        let data: VolumeData = match self {
            TiffFrames::U8(v) => Array3::from_shape_vec(shape, v).ok()?.into(),
            TiffFrames::I8(v) => Array3::from_shape_vec(shape, v).ok()?.into(),
            TiffFrames::U16(v) => Array3::from_shape_vec(shape, v).ok()?.into(),
            TiffFrames::I16(v) => Array3::from_shape_vec(shape, v).ok()?.into(),
            TiffFrames::U32(v) => Array3::from_shape_vec(shape, v).ok()?.into(),
            TiffFrames::I32(v) => Array3::from_shape_vec(shape, v).ok()?.into(),
            TiffFrames::U64(v) => Array3::from_shape_vec(shape, v).ok()?.into(),
            TiffFrames::I64(v) => Array3::from_shape_vec(shape, v).ok()?.into(),
            TiffFrames::F32(v) => Array3::from_shape_vec(shape, v).ok()?.into(),
            TiffFrames::F64(v) => Array3::from_shape_vec(shape, v).ok()?.into(),
        };
        Some(data)
    }
}

fn read_tiff_volume<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
) -> Result<Volume, TiffError> {
    let spacing = Spacing::try_from(&mut *decoder).unwrap_or_else(|e| {
        warn!("Falling back to unit spacing for {}: {}", path.display(), e);
        Spacing::default()
    });

    let color_type = decoder.colortype().context(TiffReadSnafu { path })?;
    ensure!(
        matches!(color_type, ColorType::Gray(_)),
        UnsupportedColorTypeSnafu { color_type }
    );
    let (width, height) = decoder.dimensions().context(TiffReadSnafu { path })?;

    let first = decoder.read_image().context(TiffReadSnafu { path })?;
    let mut frames = TiffFrames::new(first);
    let mut depth = 1;
    while decoder.more_images() {
        decoder.next_image().context(TiffReadSnafu { path })?;
        let dimensions = decoder.dimensions().context(TiffReadSnafu { path })?;
        ensure!(
            dimensions == (width, height),
            InconsistentFrameSnafu {
                path,
                frame: depth,
                reason: format!(
                    "dimensions {:?} differ from {:?}",
                    dimensions,
                    (width, height)
                ),
            }
        );
        let frame = decoder.read_image().context(TiffReadSnafu { path })?;
        ensure!(
            frames.extend(frame),
            InconsistentFrameSnafu {
                path,
                frame: depth,
                reason: "sample type differs",
            }
        );
        depth += 1;
    }

    let shape = (depth, height as usize, width as usize);
    let data = frames
        .into_volume_data(shape)
        .context(InconsistentFrameSnafu {
            path,
            frame: depth - 1,
            reason: "sample count does not match the frame dimensions",
        })?;
    debug!("Read TIFF volume {} with shape {:?}", path.display(), shape);
    Ok(Volume::new(data, spacing))
}

fn load_tiff(path: &Path) -> Result<Volume, TiffError> {
    let file = File::open(path).context(IOSnafu { path })?;
    let mut decoder = Decoder::new(BufReader::new(file)).context(TiffReadSnafu { path })?;
    read_tiff_volume(&mut decoder, path)
}

fn read_u16_property(
    file: &FileDicomObject<InMemDicomObject>,
    tag: dicom::core::Tag,
    name: &'static str,
) -> Result<u16, DicomError> {
    file.get(tag)
        .context(MissingPropertySnafu { name })?
        .value()
        .uint16()
        .context(CastValueSnafu { name })
}

/// Build a volume from a decoded DICOM object without applying any value transforms
pub fn read_dicom_volume(file: &FileDicomObject<InMemDicomObject>) -> Result<Volume, DicomError> {
    let bits_allocated = read_u16_property(file, tags::BITS_ALLOCATED, "Bits Allocated")?;
    let pixel_representation =
        read_u16_property(file, tags::PIXEL_REPRESENTATION, "Pixel Representation")?;
    let photometric_interpretation = file
        .get(tags::PHOTOMETRIC_INTERPRETATION)
        .context(MissingPropertySnafu {
            name: "Photometric Interpretation",
        })?
        .value()
        .string()
        .context(CastValueSnafu {
            name: "Photometric Interpretation",
        })?;
    let photometric_interpretation =
        PhotometricInterpretation::from(photometric_interpretation.trim());

    let spacing = Spacing::try_from(file).unwrap_or_else(|e| {
        warn!("Falling back to unit spacing: {}", e);
        Spacing::default()
    });

    let decoded = file.decode_pixel_data().context(PixelDataSnafu)?;
    let frames = decoded.number_of_frames() as usize;
    let rows = decoded.rows() as usize;
    let columns = decoded.columns() as usize;
    let shape = (frames, rows, columns);
    let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::None);

    macro_rules! to_array {
        ($t:ty) => {{
            let values = decoded
                .to_vec_with_options::<$t>(&options)
                .context(PixelDataSnafu)?;
            let actual = values.len();
            Array3::from_shape_vec(shape, values)
                .ok()
                .context(PixelCountSnafu {
                    actual,
                    frames,
                    rows,
                    columns,
                })?
                .into()
        }};
    }

    let data: VolumeData = match (
        bits_allocated,
        pixel_representation,
        &photometric_interpretation,
    ) {
        (8, 0, PhotometricInterpretation::Monochrome1 | PhotometricInterpretation::Monochrome2) => {
            to_array!(u8)
        }
        (8, 1, PhotometricInterpretation::Monochrome1 | PhotometricInterpretation::Monochrome2) => {
            to_array!(i8)
        }
        (16, 0, PhotometricInterpretation::Monochrome1 | PhotometricInterpretation::Monochrome2) => {
            to_array!(u16)
        }
        (16, 1, PhotometricInterpretation::Monochrome1 | PhotometricInterpretation::Monochrome2) => {
            to_array!(i16)
        }
        (32, 0, PhotometricInterpretation::Monochrome1 | PhotometricInterpretation::Monochrome2) => {
            to_array!(u32)
        }
        (32, 1, PhotometricInterpretation::Monochrome1 | PhotometricInterpretation::Monochrome2) => {
            to_array!(i32)
        }
        _ => {
            return UnsupportedPixelFormatSnafu {
                bits_allocated,
                pixel_representation,
                photometric_interpretation,
            }
            .fail()
        }
    };

    Ok(Volume::new(data, spacing))
}

fn load_dicom(path: &Path) -> Result<Volume, DicomError> {
    let file = open_file(path).context(ReadSnafu { path })?;
    let volume = read_dicom_volume(&file)?;
    debug!(
        "Read DICOM volume {} with shape {:?}",
        path.display(),
        volume.shape()
    );
    Ok(volume)
}

fn load_image(path: &Path) -> Result<Volume, LoadError> {
    let image = image::open(path).context(LoadImageSnafu { path })?;
    let shape = (1, image.height() as usize, image.width() as usize);
    let data: Option<VolumeData> = match image {
        image::DynamicImage::ImageLuma8(luma) => Array3::from_shape_vec(shape, luma.into_raw())
            .ok()
            .map(Into::into),
        image::DynamicImage::ImageLuma16(luma) => Array3::from_shape_vec(shape, luma.into_raw())
            .ok()
            .map(Into::into),
        // Color and alpha images are collapsed to luminance
        other => Array3::from_shape_vec(shape, other.to_luma16().into_raw())
            .ok()
            .map(Into::into),
    };
    let data = data.context(UnsupportedFileSnafu { path })?;
    Ok(Volume::new(data, Spacing::default()))
}
