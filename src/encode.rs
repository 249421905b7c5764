//! Encode orchestrator: runs the payload through the transformation pipeline
//! and drives the bit codec.

use log::info;

use crate::bits;
use crate::compress;
use crate::error::{Error, Result};
use crate::header;
use crate::pattern::{HashCheck, Pattern};
use crate::payload::Payload;
use crate::redundancy;
use crate::Raster;

/// Hides a payload inside a raster according to a pattern.
///
/// The payload is framed with its type tag, then hashed, compressed and
/// redundancy-encoded as the pattern demands; the header (when enabled) is
/// framed from the final length and bit-packed first.
///
/// On success this function returns `Ok(raster)` with a freshly allocated
/// raster carrying the embedded bits.\
/// On failure this function returns `Err(err)` with `err` describing cause of
/// the error; the input raster is never modified.
pub fn encode(raster: &Raster, payload: &Payload, pattern: &Pattern) -> Result<Raster> {
    encode_bytes(raster, &payload.to_bytes()?, pattern)
}

/// Hides raw bytes inside a raster, skipping the type-tag framing.
///
/// The bytes still travel through the full hash/compression/redundancy
/// pipeline; use this when the caller has its own framing on top.
pub fn encode_bytes(raster: &Raster, data: &[u8], pattern: &Pattern) -> Result<Raster> {
    let resolved = pattern.resolve(raster.layout())?;

    let mut data = data.to_vec();
    if let HashCheck::Algorithm(algorithm) = resolved.hash_check {
        let digest = algorithm.digest(&data);
        data.extend_from_slice(&digest);
    }
    let data = compress::compress(&data, &resolved.compression)?;
    let data = redundancy::apply(&data, &resolved.data_redundancy())?;

    let mut out = raster.clone();

    let mut header_span = 0;
    if resolved.header_active() {
        let header_bytes = header::build(&resolved, data.len())?;
        let start = resolved.header_start();
        let last = bits::embed_bytes(&mut out, &header_bytes, &resolved.header_slots(), start)?;
        header_span = last - start + 1;
    }

    let data_start = header::data_start(&resolved, header_span);
    let remaining = out.pixel_count().saturating_sub(data_start);
    let max = bits::raw_capacity(remaining, &resolved.data_slots());
    if data.len() > max {
        return Err(Error::DataSizeTooLarge {
            size: data.len(),
            max,
        });
    }

    let last = bits::embed_bytes(&mut out, &data, &resolved.data_slots(), data_start)?;
    info!(
        "encoded {} bytes into pixels {}..={} ({} header pixels)",
        data.len(),
        data_start,
        last,
        header_span
    );

    Ok(out)
}

/// Stateful encode orchestrator holding a loaded image and pattern.
///
/// A thin convenience over [`encode`] for callers that load once and encode
/// several payloads; the pure functions remain the primary API.
#[derive(Debug, Default)]
pub struct Encoder {
    image: Option<Raster>,
    pattern: Option<Pattern>,
}

impl Encoder {
    pub fn new() -> Self {
        Encoder::default()
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

    pub fn image(&self) -> Option<&Raster> {
        self.image.as_ref()
    }

    /// Encodes a payload into the loaded image with the loaded pattern.
    ///
    /// Returns `Err(Error::NoImageLoaded)` / `Err(Error::NoPatternLoaded)`
    /// when a prerequisite is missing.
    pub fn encode(&self, payload: &Payload) -> Result<Raster> {
        let image = self.image.as_ref().ok_or(Error::NoImageLoaded)?;
        let pattern = self.pattern.as_ref().ok_or(Error::NoPatternLoaded)?;
        encode(image, payload, pattern)
    }

    /// Encodes raw bytes, skipping the type-tag framing.
    pub fn encode_bytes(&self, data: &[u8]) -> Result<Raster> {
        let image = self.image.as_ref().ok_or(Error::NoImageLoaded)?;
        let pattern = self.pattern.as_ref().ok_or(Error::NoPatternLoaded)?;
        encode_bytes(image, data, pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{AdvancedRedundancy, ChannelSelection, HashCheck};

    fn raster(width: u32, height: u32, layout: &str) -> Raster {
        let len = width as usize * height as usize * layout.len();
        let pixels = (0..len).map(|i| (i * 13 % 256) as u8).collect();
        Raster::new(width, height, layout, pixels).unwrap()
    }

    fn bare_pattern() -> Pattern {
        let mut pattern = Pattern {
            channels: ChannelSelection::All,
            hash_check: HashCheck::Disabled,
            advanced_redundancy: AdvancedRedundancy::None,
            ..Pattern::default()
        };
        pattern.header.enabled = false;
        pattern
    }

    #[test]
    fn encoder_requires_image_and_pattern() {
        let mut encoder = Encoder::new();
        let payload = Payload::Raw(vec![1]);

        assert!(matches!(
            encoder.encode(&payload),
            Err(Error::NoImageLoaded)
        ));

        encoder.load_image(raster(4, 4, "RGBA"));
        assert!(matches!(
            encoder.encode(&payload),
            Err(Error::NoPatternLoaded)
        ));

        encoder.load_pattern(Pattern::default());
        assert!(encoder.encode(&payload).is_ok());

        assert!(encoder.unload_image().is_some());
        assert!(matches!(
            encoder.encode(&payload),
            Err(Error::NoImageLoaded)
        ));
    }

    #[test]
    fn input_raster_is_not_modified() {
        let original = raster(8, 8, "RGBA");
        let reference = original.clone();
        encode_bytes(&original, b"payload", &bare_pattern()).unwrap();
        assert_eq!(original, reference);
    }

    #[test]
    fn capacity_boundary_is_exact() {
        // 16 pixels * 4 channels * 1 bit / 8 = 8 bytes.
        let image = raster(4, 4, "RGBA");
        let pattern = bare_pattern();

        assert!(encode_bytes(&image, &[0xab; 8], &pattern).is_ok());
        assert!(matches!(
            encode_bytes(&image, &[0xab; 9], &pattern),
            Err(Error::DataSizeTooLarge { size: 9, max: 8 })
        ));
    }
}
