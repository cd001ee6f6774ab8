use std::io::{Seek, Write};
use tiff::encoder::colortype::ColorType;
use tiff::encoder::compression::Compression;
use tiff::encoder::{ImageEncoder, TiffKind};
use tiff::TiffError;

pub mod spacing;
pub use spacing::*;

pub mod output;
pub use output::*;

pub trait WriteTags {
    /// Write tags describing the volume to a TIFF encoder.
    fn write_tags<W, C, K, D>(&self, tiff: &mut ImageEncoder<W, C, K, D>) -> Result<(), TiffError>
    where
        W: Write + Seek,
        C: ColorType,
        K: TiffKind,
        D: Compression;
}
