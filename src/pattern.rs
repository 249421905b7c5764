//! Pattern values and the pattern resolver.
//!
//! A [`Pattern`] carries every knob of the hiding scheme in raw form; the
//! resolver materializes `auto`/`all` selections against a concrete channel
//! layout and validates every invariant, producing a [`ResolvedPattern`] that
//! all downstream code matches on. Resolution happens exactly once per
//! encode/decode call.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use crate::bits::SlotParams;
use crate::error::{Error, Result};

/// Active channel selection for the data or the header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelSelection {
    /// Use every channel of the image layout.
    All,
    /// Let the resolver pick (for the header this depends on discoverability).
    Auto,
    /// Use exactly these channel letters, e.g. `"RGB"` or `"A"`.
    Explicit(String),
}

impl ChannelSelection {
    /// Explicit selection from channel letters, uppercased.
    pub fn explicit(channels: &str) -> Self {
        ChannelSelection::Explicit(channels.to_uppercase())
    }
}

impl FromStr for ChannelSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(ChannelSelection::All),
            "auto" => Ok(ChannelSelection::Auto),
            other => Ok(ChannelSelection::Explicit(other.to_uppercase())),
        }
    }
}

impl fmt::Display for ChannelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelSelection::All => f.write_str("all"),
            ChannelSelection::Auto => f.write_str("auto"),
            ChannelSelection::Explicit(channels) => f.write_str(channels),
        }
    }
}

/// Payload compression applied before redundancy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    /// Deflate at the given strength, `1..=9`.
    Zlib { strength: u8 },
}

/// Deflate strength used when none is given, matching the zlib default.
pub const DEFAULT_COMPRESSION_STRENGTH: u8 = 6;

impl FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "no" => Ok(Compression::None),
            "zlib" => Ok(Compression::Zlib {
                strength: DEFAULT_COMPRESSION_STRENGTH,
            }),
            other => Err(Error::CompressionNotImplemented(other.to_string())),
        }
    }
}

/// Error-correcting layer applied to the payload (and, separately, to the
/// header) before repetition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AdvancedRedundancy {
    None,
    /// RS(255, k) over GF(256); `correction_factor` is the overhead ratio,
    /// producing `ceil(2 * factor * n)` redundant symbols for `n` data bytes.
    ReedSolomon { correction_factor: f64 },
    /// Recognized but not implemented.
    Hamming,
}

/// Default RS overhead ratio.
pub const DEFAULT_CORRECTION_FACTOR: f64 = 0.1;

impl FromStr for AdvancedRedundancy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "reed_solomon" | "rs" => Ok(AdvancedRedundancy::ReedSolomon {
                correction_factor: DEFAULT_CORRECTION_FACTOR,
            }),
            "hamming" | "ham" => Ok(AdvancedRedundancy::Hamming),
            "" | "none" | "no" => Ok(AdvancedRedundancy::None),
            other => Err(Error::InvalidAdvancedRedundancyMode(other.to_string())),
        }
    }
}

/// Layout of the repetition layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepetitiveRedundancyMode {
    /// Every byte is written `k` times in a row.
    BytePerByte,
    /// The whole buffer is written `k` times in a row.
    Block,
}

impl FromStr for RepetitiveRedundancyMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "byte_per_byte" => Ok(RepetitiveRedundancyMode::BytePerByte),
            "block" => Ok(RepetitiveRedundancyMode::Block),
            other => Err(Error::InvalidRepetitiveRedundancyMode(other.to_string())),
        }
    }
}

/// Digest algorithm for the integrity layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Digest size in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha224 => 28,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// Computes the digest of `data`.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha224 => Sha224::digest(data).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sha224" | "sha-224" => Ok(HashAlgorithm::Sha224),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "sha384" | "sha-384" => Ok(HashAlgorithm::Sha384),
            "sha512" | "sha-512" => Ok(HashAlgorithm::Sha512),
            other => Err(Error::InvalidHashAlgorithm(other.to_string())),
        }
    }
}

/// Integrity-check setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashCheck {
    Disabled,
    Algorithm(HashAlgorithm),
}

impl HashCheck {
    /// Computes the digest of `data` with the configured algorithm.
    ///
    /// Returns `Err(Error::ShouldNotComputeHash)` when hashing is disabled.
    pub fn digest(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            HashCheck::Disabled => Err(Error::ShouldNotComputeHash),
            HashCheck::Algorithm(algorithm) => Ok(algorithm.digest(data)),
        }
    }
}

impl FromStr for HashCheck {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "no" | "false" => Ok(HashCheck::Disabled),
            other => Ok(HashCheck::Algorithm(other.parse()?)),
        }
    }
}

/// Where the header is bit-packed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderPosition {
    Auto,
    ImageStart,
    BeforeData,
}

impl FromStr for HeaderPosition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(HeaderPosition::Auto),
            "image_start" => Ok(HeaderPosition::ImageStart),
            "before_data" => Ok(HeaderPosition::BeforeData),
            other => Err(Error::UnsupportedValueForParameter {
                parameter: "header_position",
                value: other.to_string(),
                expected: "one of auto, image_start, before_data",
            }),
        }
    }
}

/// Redundancy knobs shared by the data and header pipelines.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RedundancyParams {
    pub repetitive: usize,
    pub mode: RepetitiveRedundancyMode,
    pub advanced: AdvancedRedundancy,
}

/// Header framing options.
///
/// The header is enabled by default but only carries the payload length. The
/// remaining knobs exist to tune how discoverable the header is; their
/// defaults favor robustness over stealth.
#[derive(Clone, Debug, PartialEq)]
pub struct HeaderOptions {
    pub enabled: bool,
    pub write_data_size: bool,
    /// Reserved: the flag byte is emitted and recognized, the pattern body is
    /// not.
    pub write_pattern: bool,
    pub channels: ChannelSelection,
    pub position: HeaderPosition,
    pub bit_frequency: u8,
    pub byte_spacing: usize,
    pub repetitive_redundancy: usize,
    pub advanced_redundancy: AdvancedRedundancy,
}

impl Default for HeaderOptions {
    fn default() -> Self {
        HeaderOptions {
            enabled: true,
            write_data_size: true,
            write_pattern: false,
            channels: ChannelSelection::Auto,
            position: HeaderPosition::Auto,
            bit_frequency: 1,
            byte_spacing: 1,
            repetitive_redundancy: 5,
            advanced_redundancy: AdvancedRedundancy::ReedSolomon {
                correction_factor: DEFAULT_CORRECTION_FACTOR,
            },
        }
    }
}

/// The full hiding scheme in raw form.
///
/// All fields are public plain data; construct with struct-update syntax over
/// [`Pattern::default`]. Call [`Pattern::resolve`] against an image layout to
/// obtain the concrete plan driving encode and decode.
#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    /// Starting pixel index for the payload (header included when placed
    /// before the data).
    pub offset: usize,
    pub channels: ChannelSelection,
    /// LSBs replaced per write slot, `1..=8`.
    pub bit_frequency: u8,
    /// Eligible-channel stride between write slots, `>= 1`.
    pub byte_spacing: usize,
    pub hash_check: HashCheck,
    pub compression: Compression,
    pub advanced_redundancy: AdvancedRedundancy,
    /// Repetition factor, `1` = off.
    pub repetitive_redundancy: usize,
    pub repetitive_redundancy_mode: RepetitiveRedundancyMode,
    pub header: HeaderOptions,
}

impl Default for Pattern {
    fn default() -> Self {
        Pattern {
            offset: 0,
            channels: ChannelSelection::Explicit("RGBA".to_string()),
            bit_frequency: 1,
            byte_spacing: 1,
            hash_check: HashCheck::Algorithm(HashAlgorithm::Sha256),
            compression: Compression::None,
            advanced_redundancy: AdvancedRedundancy::ReedSolomon {
                correction_factor: DEFAULT_CORRECTION_FACTOR,
            },
            repetitive_redundancy: 1,
            repetitive_redundancy_mode: RepetitiveRedundancyMode::BytePerByte,
            header: HeaderOptions::default(),
        }
    }
}

impl Pattern {
    /// Resolves the pattern against a concrete channel layout.
    pub fn resolve(&self, image_channels: &str) -> Result<ResolvedPattern> {
        ResolvedPattern::resolve(self, image_channels)
    }

    /// Computes the digest of `data` with the pattern's hash setting.
    ///
    /// Returns `Err(Error::ShouldNotComputeHash)` when hashing is disabled.
    pub fn compute_hash(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.hash_check.digest(data)
    }

    /// Maximum payload size storable in an image of the given dimensions and
    /// layout with this pattern.
    pub fn max_data_size(&self, width: u32, height: u32, image_channels: &str) -> Result<usize> {
        let resolved = self.resolve(image_channels)?;
        Ok(resolved.max_data_size(width as usize * height as usize))
    }

    fn validate(&self) -> Result<()> {
        check_bit_frequency("bit_frequency", self.bit_frequency)?;
        check_bit_frequency("header_bit_frequency", self.header.bit_frequency)?;
        check_nonzero("byte_spacing", self.byte_spacing)?;
        check_nonzero("header_byte_spacing", self.header.byte_spacing)?;
        check_nonzero("repetitive_redundancy", self.repetitive_redundancy)?;
        check_nonzero(
            "header_repetitive_redundancy",
            self.header.repetitive_redundancy,
        )?;
        check_advanced(
            "advanced_redundancy_correction_factor",
            &self.advanced_redundancy,
        )?;
        check_advanced(
            "header_advanced_redundancy_correction_factor",
            &self.header.advanced_redundancy,
        )?;

        if let Compression::Zlib { strength } = self.compression {
            if !(1..=9).contains(&strength) {
                return Err(Error::UnsupportedValueForParameter {
                    parameter: "compression_strength",
                    value: strength.to_string(),
                    expected: "an integer in 1..=9",
                });
            }
        }

        Ok(())
    }
}

fn check_bit_frequency(parameter: &'static str, value: u8) -> Result<()> {
    if (1..=8).contains(&value) {
        Ok(())
    } else {
        Err(Error::UnsupportedValueForParameter {
            parameter,
            value: value.to_string(),
            expected: "an integer in 1..=8",
        })
    }
}

fn check_nonzero(parameter: &'static str, value: usize) -> Result<()> {
    if value >= 1 {
        Ok(())
    } else {
        Err(Error::UnsupportedValueForParameter {
            parameter,
            value: value.to_string(),
            expected: "an integer >= 1",
        })
    }
}

fn check_advanced(parameter: &'static str, advanced: &AdvancedRedundancy) -> Result<()> {
    if let AdvancedRedundancy::ReedSolomon { correction_factor } = advanced {
        if !(*correction_factor > 0.0 && *correction_factor <= 1.0) {
            return Err(Error::UnsupportedValueForParameter {
                parameter,
                value: correction_factor.to_string(),
                expected: "a float in (0, 1]",
            });
        }
    }
    Ok(())
}

/// Concrete header placement after resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvedHeaderPosition {
    ImageStart,
    BeforeData,
}

/// A [`Pattern`] with all `auto`/`all` selections materialized against a
/// concrete channel layout. Everything downstream of the resolver works on
/// this value only.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedPattern {
    pub offset: usize,
    /// Active data channels, a non-empty subset of `image_channels`.
    pub channels: String,
    pub bit_frequency: u8,
    pub byte_spacing: usize,
    pub hash_check: HashCheck,
    pub compression: Compression,
    pub advanced_redundancy: AdvancedRedundancy,
    pub repetitive_redundancy: usize,
    pub repetitive_redundancy_mode: RepetitiveRedundancyMode,
    pub header_enabled: bool,
    pub header_write_data_size: bool,
    pub header_write_pattern: bool,
    /// Concrete header channels, a non-empty subset of `image_channels`.
    pub header_channels: String,
    pub header_position: ResolvedHeaderPosition,
    pub header_bit_frequency: u8,
    pub header_byte_spacing: usize,
    pub header_repetitive_redundancy: usize,
    pub header_advanced_redundancy: AdvancedRedundancy,
    /// The image channel layout this pattern was resolved against.
    pub image_channels: String,
}

impl ResolvedPattern {
    fn resolve(pattern: &Pattern, image_channels: &str) -> Result<Self> {
        let image_channels = image_channels.trim().to_uppercase();
        if image_channels.is_empty() {
            return Err(Error::NoImageChannels);
        }

        pattern.validate()?;

        let channels = match &pattern.channels {
            ChannelSelection::All | ChannelSelection::Auto => image_channels.clone(),
            ChannelSelection::Explicit(requested) => {
                let requested = requested.to_uppercase();
                let filtered: String = requested
                    .chars()
                    .filter(|c| image_channels.contains(*c))
                    .collect();
                if filtered.is_empty() {
                    return Err(Error::InvalidChannels {
                        channels: requested,
                        initial: pattern.channels.to_string(),
                        image_channels,
                    });
                }
                filtered
            }
        };

        // Discoverability is judged on the raw options: a header meant to be
        // found must carry the data size and either embed the pattern or sit
        // at the very start of the image.
        let discoverable = pattern.header.enabled
            && pattern.header.write_data_size
            && (pattern.header.write_pattern
                || pattern.header.position == HeaderPosition::ImageStart);

        let header_channels = match &pattern.header.channels {
            ChannelSelection::Auto => {
                if discoverable {
                    if image_channels.contains('A') {
                        "A".to_string()
                    } else if image_channels.contains('B') {
                        "B".to_string()
                    } else {
                        image_channels[..1].to_string()
                    }
                } else {
                    channels.clone()
                }
            }
            ChannelSelection::All => image_channels.clone(),
            ChannelSelection::Explicit(requested) => {
                let requested = requested.to_uppercase();
                let filtered: String = requested
                    .chars()
                    .filter(|c| image_channels.contains(*c))
                    .collect();
                if filtered.is_empty() {
                    return Err(Error::InvalidHeaderChannels {
                        header_channels: requested,
                        image_channels,
                    });
                }
                filtered
            }
        };

        let header_position = match pattern.header.position {
            HeaderPosition::ImageStart => ResolvedHeaderPosition::ImageStart,
            HeaderPosition::BeforeData => ResolvedHeaderPosition::BeforeData,
            HeaderPosition::Auto => {
                if pattern.header.enabled
                    && pattern.header.write_data_size
                    && pattern.header.write_pattern
                {
                    ResolvedHeaderPosition::ImageStart
                } else {
                    ResolvedHeaderPosition::BeforeData
                }
            }
        };

        Ok(ResolvedPattern {
            offset: pattern.offset,
            channels,
            bit_frequency: pattern.bit_frequency,
            byte_spacing: pattern.byte_spacing,
            hash_check: pattern.hash_check,
            compression: pattern.compression,
            advanced_redundancy: pattern.advanced_redundancy,
            repetitive_redundancy: pattern.repetitive_redundancy,
            repetitive_redundancy_mode: pattern.repetitive_redundancy_mode,
            header_enabled: pattern.header.enabled,
            header_write_data_size: pattern.header.write_data_size,
            header_write_pattern: pattern.header.write_pattern,
            header_channels,
            header_position,
            header_bit_frequency: pattern.header.bit_frequency,
            header_byte_spacing: pattern.header.byte_spacing,
            header_repetitive_redundancy: pattern.header.repetitive_redundancy,
            header_advanced_redundancy: pattern.header.advanced_redundancy,
            image_channels,
        })
    }

    /// Whether a header is actually framed: enabled and carrying at least one
    /// field.
    pub fn header_active(&self) -> bool {
        self.header_enabled && (self.header_write_data_size || self.header_write_pattern)
    }

    /// First pixel index of the header region.
    pub fn header_start(&self) -> usize {
        match self.header_position {
            ResolvedHeaderPosition::ImageStart => 0,
            ResolvedHeaderPosition::BeforeData => self.offset,
        }
    }

    /// Redundancy parameters of the data pipeline.
    pub fn data_redundancy(&self) -> RedundancyParams {
        RedundancyParams {
            repetitive: self.repetitive_redundancy,
            mode: self.repetitive_redundancy_mode,
            advanced: self.advanced_redundancy,
        }
    }

    /// Redundancy parameters of the header pipeline. Header repetition is
    /// always applied byte-wise.
    pub fn header_redundancy(&self) -> RedundancyParams {
        RedundancyParams {
            repetitive: self.header_repetitive_redundancy,
            mode: RepetitiveRedundancyMode::BytePerByte,
            advanced: self.header_advanced_redundancy,
        }
    }

    pub(crate) fn data_slots(&self) -> SlotParams<'_> {
        SlotParams {
            channels: &self.channels,
            bit_frequency: self.bit_frequency,
            byte_spacing: self.byte_spacing,
        }
    }

    pub(crate) fn header_slots(&self) -> SlotParams<'_> {
        SlotParams {
            channels: &self.header_channels,
            bit_frequency: self.header_bit_frequency,
            byte_spacing: self.header_byte_spacing,
        }
    }

    /// Maximum payload size storable in `pixels` pixels with this pattern.
    ///
    /// The estimate accounts for byte spacing, the Reed-Solomon overhead and
    /// the repetition factor, but not for the header span or the compression
    /// gain, both of which depend on the payload itself.
    pub fn max_data_size(&self, pixels: usize) -> usize {
        let bits_per_pixel = self.channels.len() * self.bit_frequency as usize;
        let mut usable = pixels * bits_per_pixel / (8 * self.byte_spacing);

        if let AdvancedRedundancy::ReedSolomon { correction_factor } = self.advanced_redundancy {
            let redundant = (2.0 * correction_factor * usable as f64).ceil() as usize;
            usable = usable.saturating_sub(redundant);
        }

        if self.repetitive_redundancy > 1 {
            usable /= self.repetitive_redundancy;
        }

        usable
    }

    /// Rebuilds a raw [`Pattern`] whose resolution against the same layout is
    /// this value again.
    pub fn to_pattern(&self) -> Pattern {
        Pattern {
            offset: self.offset,
            channels: ChannelSelection::Explicit(self.channels.clone()),
            bit_frequency: self.bit_frequency,
            byte_spacing: self.byte_spacing,
            hash_check: self.hash_check,
            compression: self.compression,
            advanced_redundancy: self.advanced_redundancy,
            repetitive_redundancy: self.repetitive_redundancy,
            repetitive_redundancy_mode: self.repetitive_redundancy_mode,
            header: HeaderOptions {
                enabled: self.header_enabled,
                write_data_size: self.header_write_data_size,
                write_pattern: self.header_write_pattern,
                channels: ChannelSelection::Explicit(self.header_channels.clone()),
                position: match self.header_position {
                    ResolvedHeaderPosition::ImageStart => HeaderPosition::ImageStart,
                    ResolvedHeaderPosition::BeforeData => HeaderPosition::BeforeData,
                },
                bit_frequency: self.header_bit_frequency,
                byte_spacing: self.header_byte_spacing,
                repetitive_redundancy: self.header_repetitive_redundancy,
                advanced_redundancy: self.header_advanced_redundancy,
            },
        }
    }
}
