use std::io::{Read, Seek, Write};
use tiff::decoder::Decoder;
use tiff::encoder::colortype::ColorType;
use tiff::encoder::compression::Compression;
use tiff::encoder::{ImageEncoder, TiffKind};
use tiff::tags::Tag;
use tiff::TiffError;
use tracing::warn;

use crate::metadata::{Spacing, WriteTags};

const VERSION: &str = concat!("distance-map==", env!("CARGO_PKG_VERSION"));

#[derive(Debug, PartialEq)]
pub struct Version(String);

impl Version {
    const TAG: Tag = Tag::Software;
}

impl Default for Version {
    fn default() -> Self {
        Self(VERSION.to_string())
    }
}

impl WriteTags for Version {
    fn write_tags<W, C, K, D>(&self, tiff: &mut ImageEncoder<W, C, K, D>) -> Result<(), TiffError>
    where
        W: Write + Seek,
        C: ColorType,
        K: TiffKind,
        D: Compression,
    {
        tiff.encoder().write_tag(Self::TAG, self.0.as_str())?;
        Ok(())
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.0
    }
}

impl<T> TryFrom<&mut Decoder<T>> for Version
where
    T: Read + Seek,
{
    type Error = TiffError;

    fn try_from(decoder: &mut Decoder<T>) -> Result<Self, Self::Error> {
        let software = decoder.get_tag(Self::TAG)?.into_string()?;
        Ok(Version(software))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameCount(u16);

impl FrameCount {
    // PageNumber
    const TAG: Tag = Tag::Unknown(297);
}

impl From<FrameCount> for u16 {
    fn from(frame_count: FrameCount) -> Self {
        frame_count.0
    }
}

impl From<u16> for FrameCount {
    fn from(num_frames: u16) -> Self {
        Self(num_frames)
    }
}

impl From<usize> for FrameCount {
    /// Saturates at `u16::MAX`, the largest count PageNumber can hold
    fn from(num_frames: usize) -> Self {
        Self(u16::try_from(num_frames).unwrap_or_else(|_| {
            warn!(
                "Frame count {} exceeds PageNumber range, recording {}",
                num_frames,
                u16::MAX
            );
            u16::MAX
        }))
    }
}

impl From<FrameCount> for usize {
    fn from(frame_count: FrameCount) -> Self {
        frame_count.0 as usize
    }
}

impl<T> TryFrom<&mut Decoder<T>> for FrameCount
where
    T: Read + Seek,
{
    type Error = TiffError;

    fn try_from(decoder: &mut Decoder<T>) -> Result<Self, Self::Error> {
        // PageNumber is (page, total), we only care about the total
        let page_info = decoder.get_tag(Self::TAG).ok().and_then(|v| v.into_u16_vec().ok());
        if let Some(page_info) = page_info {
            if let [_, total] = page_info.as_slice() {
                return Ok(FrameCount(*total));
            }
        }

        // Otherwise, we scan the file for the number of frames
        let mut num_frames = 0;
        while decoder.seek_to_image(num_frames).is_ok() {
            num_frames += 1;
        }
        decoder.seek_to_image(0)?;
        Ok(num_frames.into())
    }
}

impl WriteTags for FrameCount {
    fn write_tags<W, C, K, D>(&self, tiff: &mut ImageEncoder<W, C, K, D>) -> Result<(), TiffError>
    where
        W: Write + Seek,
        C: ColorType,
        K: TiffKind,
        D: Compression,
    {
        let page_info = vec![0, self.0];
        tiff.encoder().write_tag(Self::TAG, page_info.as_slice())?;
        Ok(())
    }
}

/// Metadata written alongside every slice of a distance map
#[derive(Debug, PartialEq)]
pub struct DistanceMapMetadata {
    pub spacing: Option<Spacing>,
    pub num_frames: FrameCount,
}

impl WriteTags for DistanceMapMetadata {
    fn write_tags<W, C, K, D>(&self, tiff: &mut ImageEncoder<W, C, K, D>) -> Result<(), TiffError>
    where
        W: Write + Seek,
        C: ColorType,
        K: TiffKind,
        D: Compression,
    {
        if let Some(spacing) = &self.spacing {
            spacing.write_tags(tiff)?;
        }
        Version::default().write_tags(tiff)?;
        self.num_frames.write_tags(tiff)?;
        Ok(())
    }
}

impl<T> TryFrom<&mut Decoder<T>> for DistanceMapMetadata
where
    T: Read + Seek,
{
    type Error = TiffError;

    fn try_from(decoder: &mut Decoder<T>) -> Result<Self, Self::Error> {
        let spacing = Spacing::try_from(&mut *decoder).ok();
        let num_frames = FrameCount::try_from(&mut *decoder)?;
        Ok(Self {
            spacing,
            num_frames,
        })
    }
}
