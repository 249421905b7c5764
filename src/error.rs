use std::string::FromUtf8Error;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that may occur while resolving a pattern, encoding data into a
/// raster or recovering data from one.
#[derive(Error, Debug)]
pub enum Error {
    #[error("required parameter \"{0}\" missing")]
    RequiredParameterMissing(&'static str),

    #[error("unsupported value for parameter \"{parameter}\": got {value}, expected {expected}")]
    UnsupportedValueForParameter {
        parameter: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("no image loaded, use load_image() or pass a raster to the call")]
    NoImageLoaded,

    #[error("no pattern loaded, use load_pattern() or pass a pattern to the call")]
    NoPatternLoaded,

    #[error("unsupported image format, please use a supported format (PNG, BMP, PGM, PPM)")]
    UnsupportedImageFormat,

    #[error("invalid image channels (empty)")]
    NoImageChannels,

    #[error("invalid channel(s) for image: {channels:?} (initial value: {initial:?}) for image channels {image_channels:?}")]
    InvalidChannels {
        channels: String,
        initial: String,
        image_channels: String,
    },

    #[error("invalid header channel(s) for image: {header_channels:?} for image channels {image_channels:?}")]
    InvalidHeaderChannels {
        header_channels: String,
        image_channels: String,
    },

    #[error("data size exceeds available capacity ({size}/{max} bytes), try using a different pattern or increasing compression rate if possible")]
    DataSizeTooLarge { size: usize, max: usize },

    #[error("compression pattern {0:?} not implemented")]
    CompressionNotImplemented(String),

    #[error("invalid repetitive redundancy mode {0:?}")]
    InvalidRepetitiveRedundancyMode(String),

    #[error("invalid advanced redundancy pattern {0:?}")]
    InvalidAdvancedRedundancyMode(String),

    #[error("advanced redundancy pattern {0:?} not implemented")]
    AdvancedRedundancyNotImplemented(&'static str),

    #[error("invalid hash algorithm {0:?}")]
    InvalidHashAlgorithm(String),

    #[error("should not compute hash for this pattern, as it is disabled")]
    ShouldNotComputeHash,

    #[error("data integrity check failed, the data may be corrupted or the pattern may be incorrect")]
    DataIntegrityCheckFailed,

    #[error("invalid data type {0} encountered during decoding")]
    InvalidDataTypeEncountered(u8),

    #[error("reed-solomon decoding failed, corrupted symbols exceed the correction capacity")]
    RsDecodeFailed,

    #[error(transparent)]
    InvalidString(#[from] FromUtf8Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
