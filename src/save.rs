use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;
use std::path::PathBuf;
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::compression::{Compression, Compressor, Deflate, Lzw, Packbits, Uncompressed};
use tiff::encoder::TiffEncoder;
use tiff::TiffError;

use snafu::{ResultExt, Snafu};

use crate::field::ScalarField;
use crate::metadata::{DistanceMapMetadata, Spacing, WriteTags};

#[derive(Debug, Snafu)]
pub enum SaveError {
    #[snafu(display("could not create TIFF file {}", path.display()))]
    CreateFile {
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
        path: PathBuf,
    },
    #[snafu(display("could not open TIFF encoder for {}", path.display()))]
    OpenTiff {
        #[snafu(source(from(TiffError, Box::new)))]
        source: Box<TiffError>,
        path: PathBuf,
    },
    #[snafu(display("error writing frame {} to TIFF: {}", frame, source))]
    WriteToTiff {
        frame: usize,
        #[snafu(source(from(TiffError, Box::new)))]
        source: Box<TiffError>,
    },
    #[snafu(display("error writing tags to frame {}: {}", frame, source))]
    WriteTags {
        frame: usize,
        #[snafu(source(from(TiffError, Box::new)))]
        source: Box<TiffError>,
    },
}

// Trait for writing a distance map to a TIFF encoder under a given compression
pub trait SaveToTiff<D>
where
    D: Compression + Clone,
{
    fn save_frames<W: Write + Seek>(
        &self,
        encoder: &mut TiffEncoder<W>,
        field: &ScalarField,
        metadata: &DistanceMapMetadata,
        compression: D,
    ) -> Result<(), SaveError>;
}

/// Writes distance maps as multi-page 32-bit float TIFFs, one page per slice
pub struct TiffSaver {
    compressor: Compressor,
}

/// Implement saving for each supported compression
macro_rules! impl_save_frames {
    ($compression:ty) => {
        impl SaveToTiff<$compression> for TiffSaver {
            fn save_frames<W: Write + Seek>(
                &self,
                encoder: &mut TiffEncoder<W>,
                field: &ScalarField,
                metadata: &DistanceMapMetadata,
                compression: $compression,
            ) -> Result<(), SaveError> {
                let (_, rows, columns) = field.shape();
                for (frame, data) in field.frames().enumerate() {
                    let mut tiff = encoder
                        .new_image_with_compression::<Gray32Float, _>(
                            columns as u32,
                            rows as u32,
                            compression.clone(),
                        )
                        .context(WriteToTiffSnafu { frame })?;
                    metadata
                        .write_tags(&mut tiff)
                        .context(WriteTagsSnafu { frame })?;
                    tiff.write_data(data.as_slice())
                        .context(WriteToTiffSnafu { frame })?;
                }
                Ok(())
            }
        }
    };
}

impl_save_frames!(Uncompressed);
impl_save_frames!(Packbits);
impl_save_frames!(Lzw);
impl_save_frames!(Deflate);

impl Default for TiffSaver {
    fn default() -> Self {
        Self::new(Compressor::Packbits(Packbits))
    }
}

impl TiffSaver {
    pub fn new(compressor: Compressor) -> Self {
        Self { compressor }
    }

    /// Write every slice of `field` to `encoder`, tagging each page with `spacing`.
    pub fn write<W: Write + Seek>(
        &self,
        encoder: &mut TiffEncoder<W>,
        field: &ScalarField,
        spacing: Spacing,
    ) -> Result<(), SaveError> {
        let (depth, _, _) = field.shape();
        let metadata = DistanceMapMetadata {
            spacing: Some(spacing),
            num_frames: depth.into(),
        };
        match &self.compressor {
            Compressor::Uncompressed(c) => {
                <TiffSaver as SaveToTiff<Uncompressed>>::save_frames(
                    self, encoder, field, &metadata, *c,
                )
            }
            Compressor::Packbits(c) => {
                <TiffSaver as SaveToTiff<Packbits>>::save_frames(self, encoder, field, &metadata, *c)
            }
            Compressor::Lzw(c) => {
                <TiffSaver as SaveToTiff<Lzw>>::save_frames(self, encoder, field, &metadata, *c)
            }
            Compressor::Deflate(c) => {
                <TiffSaver as SaveToTiff<Deflate>>::save_frames(self, encoder, field, &metadata, *c)
            }
        }
    }

    /// Create `path` and write the distance map to it.
    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
        field: &ScalarField,
        spacing: Spacing,
    ) -> Result<(), SaveError> {
        let path = path.as_ref();
        let file = File::create(path).context(CreateFileSnafu { path })?;
        let mut encoder = TiffEncoder::new(file).context(OpenTiffSnafu { path })?;
        self.write(&mut encoder, field, spacing)
    }
}
