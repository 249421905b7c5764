//! Decode orchestrator: recovers the embedded byte stream and reverses the
//! transformation pipeline.

use log::debug;

use crate::bits;
use crate::compress;
use crate::error::{Error, Result};
use crate::header;
use crate::pattern::{HashCheck, Pattern};
use crate::payload::Payload;
use crate::redundancy;
use crate::Raster;

/// Recovers a payload from a raster according to a pattern.
///
/// The data length is taken from the header; patterns without an active
/// size-carrying header must go through [`decode_bytes`] with an explicit
/// length.
///
/// On success this function returns `Ok(payload)` with the recovered data in
/// its original shape.\
/// On failure this function returns `Err(err)` with `err` describing cause of
/// the error.
pub fn decode(raster: &Raster, pattern: &Pattern) -> Result<Payload> {
    Payload::from_bytes(&decode_bytes(raster, pattern, None)?)
}

/// Recovers the raw byte stream, skipping the type-tag framing.
///
/// `data_len` is the in-pixel byte count of the data region (the length the
/// header would carry). When given it overrides the header value; it is
/// required when no active header carries the size.
pub fn decode_bytes(
    raster: &Raster,
    pattern: &Pattern,
    data_len: Option<usize>,
) -> Result<Vec<u8>> {
    let resolved = pattern.resolve(raster.layout())?;

    let (encoded_len, data_start) = if resolved.header_active() {
        let header_len = header::encoded_len(&resolved)?;
        let start = resolved.header_start();
        let (header_bytes, last) =
            bits::extract_bytes(raster, header_len, &resolved.header_slots(), start)?;
        let record = header::parse(&resolved, &header_bytes)?;
        debug!("parsed header: {:?}", record);

        let len = data_len
            .or(record.data_len.map(|len| len as usize))
            .ok_or(Error::RequiredParameterMissing("data_length"))?;
        (len, header::data_start(&resolved, last - start + 1))
    } else {
        let len = data_len.ok_or(Error::RequiredParameterMissing("data_length"))?;
        (len, resolved.offset)
    };

    let (data, _) = bits::extract_bytes(raster, encoded_len, &resolved.data_slots(), data_start)?;
    let data = redundancy::reconstruct(&data, &resolved.data_redundancy())?;
    let data = compress::decompress(&data, &resolved.compression)?;

    if let HashCheck::Algorithm(algorithm) = resolved.hash_check {
        let digest_len = algorithm.digest_len();
        if data.len() < digest_len {
            return Err(Error::DataIntegrityCheckFailed);
        }
        let (body, digest) = data.split_at(data.len() - digest_len);
        if algorithm.digest(body) != digest {
            return Err(Error::DataIntegrityCheckFailed);
        }
        return Ok(body.to_vec());
    }

    Ok(data)
}

/// Stateful decode orchestrator holding a loaded image and pattern.
#[derive(Debug, Default)]
pub struct Decoder {
    image: Option<Raster>,
    pattern: Option<Pattern>,
}

impl Decoder {
    pub fn new() -> Self {
        Decoder::default()
    }

    pub fn load_image(&mut self, raster: Raster) {
        self.image = Some(raster);
    }

    /// Releases the loaded image, returning it to the caller.
    pub fn unload_image(&mut self) -> Option<Raster> {
        self.image.take()
    }

    pub fn load_pattern(&mut self, pattern: Pattern) {
        self.pattern = Some(pattern);
    }

    /// Decodes a payload from the loaded image with the loaded pattern.
    ///
    /// Returns `Err(Error::NoImageLoaded)` / `Err(Error::NoPatternLoaded)`
    /// when a prerequisite is missing.
    pub fn decode(&self) -> Result<Payload> {
        let image = self.image.as_ref().ok_or(Error::NoImageLoaded)?;
        let pattern = self.pattern.as_ref().ok_or(Error::NoPatternLoaded)?;
        decode(image, pattern)
    }

    /// Decodes the raw byte stream, skipping the type-tag framing.
    pub fn decode_bytes(&self, data_len: Option<usize>) -> Result<Vec<u8>> {
        let image = self.image.as_ref().ok_or(Error::NoImageLoaded)?;
        let pattern = self.pattern.as_ref().ok_or(Error::NoPatternLoaded)?;
        decode_bytes(image, pattern, data_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode;
    use crate::pattern::{AdvancedRedundancy, ChannelSelection, HashCheck};

    fn raster(width: u32, height: u32, layout: &str) -> Raster {
        let len = width as usize * height as usize * layout.len();
        let pixels = (0..len).map(|i| (i * 13 % 256) as u8).collect();
        Raster::new(width, height, layout, pixels).unwrap()
    }

    #[test]
    fn decoder_requires_image_and_pattern() {
        let mut decoder = Decoder::new();
        assert!(matches!(decoder.decode(), Err(Error::NoImageLoaded)));

        decoder.load_image(raster(4, 4, "RGBA"));
        assert!(matches!(decoder.decode(), Err(Error::NoPatternLoaded)));
    }

    #[test]
    fn missing_length_without_header_is_reported() {
        let mut pattern = Pattern::default();
        pattern.header.enabled = false;
        assert!(matches!(
            decode_bytes(&raster(8, 8, "RGBA"), &pattern, None),
            Err(Error::RequiredParameterMissing("data_length"))
        ));
    }

    #[test]
    fn tampering_fails_the_integrity_check() {
        let image = raster(32, 32, "RGBA");
        let mut pattern = Pattern {
            channels: ChannelSelection::All,
            advanced_redundancy: AdvancedRedundancy::None,
            ..Pattern::default()
        };
        pattern.header.advanced_redundancy = AdvancedRedundancy::None;

        let mut encoded = encode(&image, &Payload::Raw(b"secret".to_vec()), &pattern).unwrap();

        // The 25-byte header spans pixels 0..50, the payload follows from
        // pixel 50; flip slot bits inside the payload region only.
        let mut tampered = encoded.pixels().to_vec();
        for value in tampered.iter_mut().skip(300).take(64) {
            *value ^= 1;
        }
        encoded = Raster::new(32, 32, "RGBA", tampered).unwrap();

        assert!(matches!(
            decode(&encoded, &pattern),
            Err(Error::DataIntegrityCheckFailed)
        ));
    }

    #[test]
    fn provided_length_overrides_header() {
        let image = raster(16, 16, "RGBA");
        let mut pattern = Pattern {
            channels: ChannelSelection::All,
            hash_check: HashCheck::Disabled,
            advanced_redundancy: AdvancedRedundancy::None,
            ..Pattern::default()
        };
        pattern.header.advanced_redundancy = AdvancedRedundancy::None;

        let encoded = encode(&image, &Payload::Raw(b"abcdef".to_vec()), &pattern).unwrap();

        // Tag byte plus payload is 7 in-pixel bytes; asking for the first 3
        // returns the tag and the first two payload bytes.
        let bytes = decode_bytes(&encoded, &pattern, Some(3)).unwrap();
        assert_eq!(bytes, vec![2, b'a', b'b']);
    }
}
