//! In-memory 3D scalar volumes as produced by the readers in [`crate::load`].
use ndarray::Array3;
use num::Zero;
use std::fmt;

use crate::distance::FeatureLabel;
use crate::metadata::Spacing;

/// The voxel component types a volume may be stored as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentType::U8 => "u8",
            ComponentType::I8 => "i8",
            ComponentType::U16 => "u16",
            ComponentType::I16 => "i16",
            ComponentType::U32 => "u32",
            ComponentType::I32 => "i32",
            ComponentType::U64 => "u64",
            ComponentType::I64 => "i64",
            ComponentType::F32 => "f32",
            ComponentType::F64 => "f64",
        };
        write!(f, "{name}")
    }
}

/// Voxel data of shape `(depth, height, width)`, typed by component
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeData {
    U8(Array3<u8>),
    I8(Array3<i8>),
    U16(Array3<u16>),
    I16(Array3<i16>),
    U32(Array3<u32>),
    I32(Array3<i32>),
    U64(Array3<u64>),
    I64(Array3<i64>),
    F32(Array3<f32>),
    F64(Array3<f64>),
}

/// Apply an expression to the array held by any variant
macro_rules! dispatch {
    ($data:expr, $array:ident => $body:expr) => {
        match $data {
            VolumeData::U8($array) => $body,
            VolumeData::I8($array) => $body,
            VolumeData::U16($array) => $body,
            VolumeData::I16($array) => $body,
            VolumeData::U32($array) => $body,
            VolumeData::I32($array) => $body,
            VolumeData::U64($array) => $body,
            VolumeData::I64($array) => $body,
            VolumeData::F32($array) => $body,
            VolumeData::F64($array) => $body,
        }
    };
}

macro_rules! impl_from_array {
    ($t:ty, $variant:ident) => {
        impl From<Array3<$t>> for VolumeData {
            fn from(array: Array3<$t>) -> Self {
                VolumeData::$variant(array)
            }
        }
    };
}

impl_from_array!(u8, U8);
impl_from_array!(i8, I8);
impl_from_array!(u16, U16);
impl_from_array!(i16, I16);
impl_from_array!(u32, U32);
impl_from_array!(i32, I32);
impl_from_array!(u64, U64);
impl_from_array!(i64, I64);
impl_from_array!(f32, F32);
impl_from_array!(f64, F64);

fn feature_mask<T: Zero + PartialEq>(array: &Array3<T>, label: FeatureLabel) -> Array3<bool> {
    let zero = T::zero();
    match label {
        FeatureLabel::NonZero => array.map(|v| *v != zero),
        FeatureLabel::Zero => array.map(|v| *v == zero),
    }
}

impl VolumeData {
    pub fn component_type(&self) -> ComponentType {
        match self {
            VolumeData::U8(_) => ComponentType::U8,
            VolumeData::I8(_) => ComponentType::I8,
            VolumeData::U16(_) => ComponentType::U16,
            VolumeData::I16(_) => ComponentType::I16,
            VolumeData::U32(_) => ComponentType::U32,
            VolumeData::I32(_) => ComponentType::I32,
            VolumeData::U64(_) => ComponentType::U64,
            VolumeData::I64(_) => ComponentType::I64,
            VolumeData::F32(_) => ComponentType::F32,
            VolumeData::F64(_) => ComponentType::F64,
        }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        dispatch!(self, array => array.dim())
    }

    /// Binarize the volume, marking voxels that distances are measured to
    pub fn feature_mask(&self, label: FeatureLabel) -> Array3<bool> {
        dispatch!(self, array => feature_mask(array, label))
    }
}

/// A 3D scalar image with physical voxel spacing
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    data: VolumeData,
    spacing: Spacing,
}

impl Volume {
    pub fn new(data: impl Into<VolumeData>, spacing: Spacing) -> Self {
        Self {
            data: data.into(),
            spacing,
        }
    }

    pub fn data(&self) -> &VolumeData {
        &self.data
    }

    pub fn spacing(&self) -> Spacing {
        self.spacing
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.shape()
    }

    pub fn component_type(&self) -> ComponentType {
        self.data.component_type()
    }

    pub fn feature_mask(&self, label: FeatureLabel) -> Array3<bool> {
        self.data.feature_mask(label)
    }
}
