use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::sh::SH_REST_COEFFS;

/// Encoding of one attribute group.
#[derive(
    Default,
    ValueEnum,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
    Debug,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum DataFormat {
    #[default]
    Float32 = 0,
    Float16 = 1,
    /// 11.10.11 bits normalized against the chunk range.
    Norm11 = 2,
    /// 6.5.5 bits normalized against the chunk range.
    Norm6 = 3,
    /// 8 bits per channel normalized against the chunk range.
    Norm8 = 4,
}

impl DataFormat {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Float32,
            1 => Self::Float16,
            2 => Self::Norm11,
            3 => Self::Norm6,
            4 => Self::Norm8,
            _ => return None,
        })
    }

    /// Whether values are stored relative to a chunk (or asset) range.
    pub fn is_normalized(self) -> bool {
        matches!(self, Self::Norm11 | Self::Norm6 | Self::Norm8)
    }

    /// Bytes for a three component vector in this format.
    pub const fn vector_stride(self) -> usize {
        match self {
            Self::Float32 => 12,
            Self::Float16 => 6,
            Self::Norm11 => 4,
            Self::Norm6 => 2,
            Self::Norm8 => 3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Unknown data format tag {0}")]
    UnknownFormat(u8),
    #[error("Color can't be stored as {0:?}")]
    UnsupportedColorFormat(DataFormat),
    #[error("Encoded {group} group is {found} bytes, expected at least {needed}")]
    Truncated {
        group: &'static str,
        needed: usize,
        found: usize,
    },
}

/// Formats of the four attribute groups, packed into a single `u32` descriptor
/// with one byte per group: position, other (rotation + scale), SH, color.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub pos: DataFormat,
    pub other: DataFormat,
    pub sh: DataFormat,
    pub color: DataFormat,
}

impl FormatDescriptor {
    pub const FULL_PRECISION: Self = Self {
        pos: DataFormat::Float32,
        other: DataFormat::Float32,
        sh: DataFormat::Float32,
        color: DataFormat::Float32,
    };

    pub fn new(
        pos: DataFormat,
        other: DataFormat,
        sh: DataFormat,
        color: DataFormat,
    ) -> Result<Self, CodecError> {
        let formats = Self {
            pos,
            other,
            sh,
            color,
        };
        formats.validate()?;
        Ok(formats)
    }

    pub fn validate(&self) -> Result<(), CodecError> {
        match self.color {
            DataFormat::Norm11 | DataFormat::Norm6 => {
                Err(CodecError::UnsupportedColorFormat(self.color))
            }
            _ => Ok(()),
        }
    }

    pub fn pack(&self) -> u32 {
        (self.pos as u32)
            | ((self.other as u32) << 8)
            | ((self.sh as u32) << 16)
            | ((self.color as u32) << 24)
    }

    pub fn unpack(descriptor: u32) -> Result<Self, CodecError> {
        let group = |shift: u32| {
            let tag = ((descriptor >> shift) & 0xFF) as u8;
            DataFormat::from_u8(tag).ok_or(CodecError::UnknownFormat(tag))
        };
        let formats = Self {
            pos: group(0)?,
            other: group(8)?,
            sh: group(16)?,
            color: group(24)?,
        };
        formats.validate()?;
        Ok(formats)
    }

    /// All groups are stored as 32-bit floats.
    pub fn is_full_precision(&self) -> bool {
        *self == Self::FULL_PRECISION
    }

    pub fn any_normalized(&self) -> bool {
        [self.pos, self.other, self.sh, self.color]
            .iter()
            .any(|f| f.is_normalized())
    }

    pub fn pos_stride(&self) -> usize {
        self.pos.vector_stride()
    }

    pub fn other_stride(&self) -> usize {
        match self.other {
            // Quaternion xyzw + scale, both as plain floats.
            DataFormat::Float32 => 28,
            // Smallest three quaternion + scale vector.
            other => 4 + other.vector_stride(),
        }
    }

    pub fn sh_stride(&self) -> usize {
        SH_REST_COEFFS * self.sh.vector_stride()
    }

    pub fn color_stride(&self) -> usize {
        match self.color {
            DataFormat::Float32 => 16,
            DataFormat::Float16 => 8,
            DataFormat::Norm8 => 4,
            // Rejected by `validate`.
            DataFormat::Norm11 | DataFormat::Norm6 => 0,
        }
    }
}
