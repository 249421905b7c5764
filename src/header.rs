//! Header framing: a small fixed-structure record carrying the embedded data
//! length and flags, run through its own redundancy pipeline.
//!
//! The header's encoded size is a pure function of the header options, so the
//! decoder knows how many bytes to pull from the slot stream before it has
//! parsed anything.

use crate::error::{Error, Result};
use crate::pattern::{ResolvedHeaderPosition, ResolvedPattern};
use crate::redundancy;

const DATA_SIZE_LEN: usize = 4;

/// Parsed header record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Header {
    /// In-pixel byte count of the data region, when the header carries it.
    pub data_len: Option<u32>,
    /// Reserved flag; recognized but no pattern body follows it.
    pub pattern_embedded: bool,
}

/// Plaintext header size: 4-byte length plus flag byte, or the flag alone.
pub(crate) fn plain_len(resolved: &ResolvedPattern) -> usize {
    if resolved.header_write_data_size {
        DATA_SIZE_LEN + 1
    } else {
        1
    }
}

/// Encoded header size after the header redundancy pipeline.
pub(crate) fn encoded_len(resolved: &ResolvedPattern) -> Result<usize> {
    redundancy::encoded_len(plain_len(resolved), &resolved.header_redundancy())
}

/// Builds the redundancy-encoded header for a data region of `data_len`
/// in-pixel bytes.
pub(crate) fn build(resolved: &ResolvedPattern, data_len: usize) -> Result<Vec<u8>> {
    let mut plain = Vec::with_capacity(plain_len(resolved));

    if resolved.header_write_data_size {
        let data_len = u32::try_from(data_len).map_err(|_| Error::DataSizeTooLarge {
            size: data_len,
            max: u32::MAX as usize,
        })?;
        plain.extend_from_slice(&data_len.to_be_bytes());
    }

    plain.push(resolved.header_write_pattern as u8);

    redundancy::apply(&plain, &resolved.header_redundancy())
}

/// Reverses the header redundancy pipeline and parses the record.
pub(crate) fn parse(resolved: &ResolvedPattern, bytes: &[u8]) -> Result<Header> {
    let plain = redundancy::reconstruct(bytes, &resolved.header_redundancy())?;
    if plain.len() < plain_len(resolved) {
        return Err(Error::RsDecodeFailed);
    }

    let (data_len, flag) = if resolved.header_write_data_size {
        let mut len_bytes = [0u8; DATA_SIZE_LEN];
        len_bytes.copy_from_slice(&plain[..DATA_SIZE_LEN]);
        (Some(u32::from_be_bytes(len_bytes)), plain[DATA_SIZE_LEN])
    } else {
        (None, plain[0])
    };

    Ok(Header {
        data_len,
        pattern_embedded: flag == 1,
    })
}

/// First pixel of the data region, given the header's pixel span (number of
/// pixels from the header start through its last touched pixel).
///
/// A header placed before the data always pushes the data past itself; a
/// header at the image start only does so when it reaches the nominal offset.
pub(crate) fn data_start(resolved: &ResolvedPattern, header_span: usize) -> usize {
    match resolved.header_position {
        ResolvedHeaderPosition::BeforeData => resolved.offset + header_span,
        ResolvedHeaderPosition::ImageStart => {
            if resolved.offset < header_span {
                resolved.offset + header_span
            } else {
                resolved.offset
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Pattern;

    #[test]
    fn plain_len_depends_on_data_size_field() {
        let resolved = Pattern::default().resolve("RGBA").unwrap();
        assert_eq!(plain_len(&resolved), 5);

        let mut pattern = Pattern::default();
        pattern.header.write_data_size = false;
        pattern.header.write_pattern = true;
        let resolved = pattern.resolve("RGBA").unwrap();
        assert_eq!(plain_len(&resolved), 1);
    }

    #[test]
    fn build_parse_roundtrip_with_default_redundancy() {
        let resolved = Pattern::default().resolve("RGBA").unwrap();
        let encoded = build(&resolved, 1234).unwrap();
        assert_eq!(encoded.len(), encoded_len(&resolved).unwrap());

        let header = parse(&resolved, &encoded).unwrap();
        assert_eq!(header.data_len, Some(1234));
        assert!(!header.pattern_embedded);
    }

    #[test]
    fn header_survives_corruption_through_repetition() {
        let resolved = Pattern::default().resolve("RGBA").unwrap();
        let mut encoded = build(&resolved, 77).unwrap();

        // One of the five copies of every byte corrupted.
        let groups = encoded.len() / 5;
        for group in 0..groups {
            encoded[group * 5] ^= 0x0f;
        }

        let header = parse(&resolved, &encoded).unwrap();
        assert_eq!(header.data_len, Some(77));
    }

    #[test]
    fn flag_only_header() {
        let mut pattern = Pattern::default();
        pattern.header.write_data_size = false;
        pattern.header.write_pattern = true;
        let resolved = pattern.resolve("RGBA").unwrap();

        let encoded = build(&resolved, 999).unwrap();
        let header = parse(&resolved, &encoded).unwrap();
        assert_eq!(header.data_len, None);
        assert!(header.pattern_embedded);
    }

    #[test]
    fn data_start_placement() {
        let mut pattern = Pattern {
            offset: 10,
            ..Pattern::default()
        };
        let resolved = pattern.resolve("RGBA").unwrap();
        // Default header position resolves to before_data.
        assert_eq!(data_start(&resolved, 25), 35);
        assert_eq!(data_start(&resolved, 0), 10);

        pattern.header.position = crate::pattern::HeaderPosition::ImageStart;
        let resolved = pattern.resolve("RGBA").unwrap();
        assert_eq!(data_start(&resolved, 8), 10);
        assert_eq!(data_start(&resolved, 25), 35);
    }
}
