use std::io::{Read, Seek, Write};
use tiff::decoder::Decoder;
use tiff::encoder::colortype::ColorType;
use tiff::encoder::compression::Compression;
use tiff::encoder::{ImageEncoder, Rational, TiffKind};
use tiff::tags::{ResolutionUnit, Tag};
use tiff::TiffError;

use dicom::dictionary_std::tags;
use dicom::object::{FileDicomObject, InMemDicomObject};
use snafu::{OptionExt, ResultExt, Snafu};

use crate::metadata::WriteTags;

const MM_PER_CM: f64 = 10.0;
const MM_PER_INCH: f64 = 25.4;

/// Denominator used when encoding resolution rationals
const RESOLUTION_DENOMINATOR: u32 = 1000;

/// Private tag holding the distance between slices in millimetres
pub const SLICE_SPACING: u16 = 50721;

/// Private tag holding the exact in-plane spacing `[x, y]` in millimetres
pub const PIXEL_SPACING: u16 = 50722;

#[derive(Debug, Snafu)]
pub enum SpacingError {
    MissingProperty {
        name: &'static str,
    },
    InvalidPropertyValue {
        name: &'static str,
        #[snafu(source(from(dicom::core::value::ConvertValueError, Box::new)))]
        source: Box<dicom::core::value::ConvertValueError>,
    },
    ParseSpacing {
        name: &'static str,
        #[snafu(source(from(std::num::ParseFloatError, Box::new)))]
        source: Box<std::num::ParseFloatError>,
    },
    ReadTags {
        name: &'static str,
        #[snafu(source(from(TiffError, Box::new)))]
        source: Box<TiffError>,
    },
}

/// Physical size of a voxel along each axis, in millimetres
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spacing {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Spacing {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

impl Spacing {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

fn to_resolution(spacing_mm: f64) -> Rational {
    let pixels_per_cm = MM_PER_CM / spacing_mm;
    Rational {
        n: (pixels_per_cm * RESOLUTION_DENOMINATOR as f64).round() as u32,
        d: RESOLUTION_DENOMINATOR,
    }
}

fn from_resolution(rational: &[u32], mm_per_unit: f64) -> Option<f64> {
    match rational {
        [n, d] if *n > 0 && *d > 0 => Some(mm_per_unit * *d as f64 / *n as f64),
        _ => None,
    }
}

impl WriteTags for Spacing {
    fn write_tags<W, C, K, D>(&self, tiff: &mut ImageEncoder<W, C, K, D>) -> Result<(), TiffError>
    where
        W: Write + Seek,
        C: ColorType,
        K: TiffKind,
        D: Compression,
    {
        tiff.x_resolution(to_resolution(self.x));
        tiff.y_resolution(to_resolution(self.y));
        tiff.resolution_unit(ResolutionUnit::Centimeter);
        tiff.encoder()
            .write_tag(Tag::Unknown(PIXEL_SPACING), &[self.x, self.y][..])?;
        tiff.encoder()
            .write_tag(Tag::Unknown(SLICE_SPACING), self.z)?;
        Ok(())
    }
}

impl<T> TryFrom<&mut Decoder<T>> for Spacing
where
    T: Read + Seek,
{
    type Error = SpacingError;

    /// Read the spacing from the private spacing tags, then from resolution tags.
    /// Missing or unusable tags fall back to 1mm.
    fn try_from(decoder: &mut Decoder<T>) -> Result<Self, Self::Error> {
        let z = decoder
            .get_tag(Tag::Unknown(SLICE_SPACING))
            .ok()
            .and_then(|v| v.into_f64().ok())
            .unwrap_or(Spacing::default().z);

        // Resolution rationals round, so the exact in-plane spacing wins when present
        let exact = decoder
            .get_tag(Tag::Unknown(PIXEL_SPACING))
            .ok()
            .and_then(|v| v.into_f64_vec().ok());
        if let Some([x, y]) = exact.as_deref() {
            return Ok(Spacing::new(*x, *y, z));
        }

        let unit = decoder
            .get_tag(Tag::ResolutionUnit)
            .ok()
            .and_then(|v| v.into_u16().ok())
            .and_then(ResolutionUnit::from_u16);
        let mm_per_unit = match unit {
            Some(ResolutionUnit::Centimeter) => Some(MM_PER_CM),
            Some(ResolutionUnit::Inch) => Some(MM_PER_INCH),
            _ => None,
        };

        let mut read_axis = |tag: Tag, name: &'static str| -> Result<Option<f64>, SpacingError> {
            let Some(mm_per_unit) = mm_per_unit else {
                return Ok(None);
            };
            match decoder.get_tag(tag) {
                Ok(value) => {
                    let rational = value.into_u32_vec().context(ReadTagsSnafu { name })?;
                    Ok(from_resolution(&rational, mm_per_unit))
                }
                Err(_) => Ok(None),
            }
        };
        let x = read_axis(Tag::XResolution, "XResolution")?;
        let y = read_axis(Tag::YResolution, "YResolution")?;

        let default = Spacing::default();
        Ok(Spacing {
            x: x.unwrap_or(default.x),
            y: y.unwrap_or(default.y),
            z,
        })
    }
}

fn parse_decimal(value: &str, name: &'static str) -> Result<f64, SpacingError> {
    value.trim().parse::<f64>().context(ParseSpacingSnafu { name })
}

fn read_dicom_float(
    file: &FileDicomObject<InMemDicomObject>,
    tag: dicom::core::Tag,
    name: &'static str,
) -> Result<Option<f64>, SpacingError> {
    match file.get(tag) {
        Some(element) => {
            let value = element
                .value()
                .to_str()
                .context(InvalidPropertyValueSnafu { name })?;
            Ok(Some(parse_decimal(&value, name)?))
        }
        None => Ok(None),
    }
}

impl TryFrom<&FileDicomObject<InMemDicomObject>> for Spacing {
    type Error = SpacingError;

    fn try_from(file: &FileDicomObject<InMemDicomObject>) -> Result<Self, Self::Error> {
        // Read the spacing, first from the Pixel Spacing tag, then from the Imager Pixel Spacing tag.
        let spacing = file
            .get(tags::PIXEL_SPACING)
            .or_else(|| file.get(tags::IMAGER_PIXEL_SPACING))
            .context(MissingPropertySnafu {
                name: "Pixel Spacing",
            })?
            .value()
            .to_str()
            .context(InvalidPropertyValueSnafu {
                name: "Pixel Spacing",
            })?;

        // First value is row spacing (y)
        let mut spacing_iter = spacing.split('\\');
        let y = parse_decimal(
            spacing_iter.next().context(MissingPropertySnafu {
                name: "Pixel Spacing",
            })?,
            "Pixel Spacing",
        )?;
        let x = parse_decimal(
            spacing_iter.next().context(MissingPropertySnafu {
                name: "Pixel Spacing",
            })?,
            "Pixel Spacing",
        )?;

        let z = match read_dicom_float(file, tags::SPACING_BETWEEN_SLICES, "Spacing Between Slices")? {
            Some(z) => Some(z),
            None => read_dicom_float(file, tags::SLICE_THICKNESS, "Slice Thickness")?,
        };

        Ok(Spacing {
            x,
            y,
            z: z.unwrap_or(Spacing::default().z),
        })
    }
}
