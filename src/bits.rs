//! Bit codec: streams a byte sequence through the sparse pattern of
//! (pixel, channel) write slots.
//!
//! Both directions walk the exact same slot sequence, so the encoder and the
//! decoder agree bit-for-bit by construction. Payload bytes are serialized
//! MSB-first; each write slot carries the low `bit_frequency` bits of its
//! channel value.

use crate::error::{Error, Result};
use crate::Raster;

/// Slot selection knobs, shared by the data and header regions.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SlotParams<'a> {
    /// Active channel letters.
    pub channels: &'a str,
    pub bit_frequency: u8,
    pub byte_spacing: usize,
}

impl SlotParams<'_> {
    #[inline]
    fn mask(&self) -> u8 {
        ((1u16 << self.bit_frequency) - 1) as u8
    }
}

/// Bytes storable in `pixels` pixels under the given slot parameters.
pub(crate) fn raw_capacity(pixels: usize, params: &SlotParams<'_>) -> usize {
    pixels * params.channels.len() * params.bit_frequency as usize / (8 * params.byte_spacing)
}

/// Writes `data` into the raster's write slots starting at pixel `start`.
///
/// Returns the index of the last pixel touched. Pixels before `start` and
/// after the returned index are left bit-identical, as are non-slot channels.
pub(crate) fn embed_bytes(
    raster: &mut Raster,
    data: &[u8],
    params: &SlotParams<'_>,
    start: usize,
) -> Result<usize> {
    let total_bits = data.len() * 8;
    if total_bits == 0 {
        return Ok(start);
    }

    let layout = raster.layout().as_bytes().to_vec();
    let mask = params.mask();
    let bit_frequency = params.bit_frequency as usize;
    let mut counters = vec![0usize; layout.len()];
    let mut bit_pos = 0;

    for pixel in start..raster.pixel_count() {
        for (channel, &letter) in layout.iter().enumerate() {
            if !params.channels.contains(letter as char) {
                continue;
            }

            if counters[channel] % params.byte_spacing == 0 {
                let mut window = 0u8;
                for i in 0..bit_frequency {
                    window <<= 1;
                    let index = bit_pos + i;
                    if index < total_bits {
                        window |= (data[index / 8] >> (7 - index % 8)) & 1;
                    }
                }

                let value = raster.channel(pixel, channel);
                raster.set_channel(pixel, channel, (value & !mask) | window);

                bit_pos += bit_frequency;
                if bit_pos >= total_bits {
                    return Ok(pixel);
                }
            }
            counters[channel] += 1;
        }
    }

    Err(Error::DataSizeTooLarge {
        size: data.len(),
        max: raw_capacity(raster.pixel_count().saturating_sub(start), params),
    })
}

/// Reads `len` bytes back from the raster's write slots starting at pixel
/// `start`.
///
/// Returns the decoded bytes together with the index of the last pixel
/// touched, so callers can compute where a following region begins.
pub(crate) fn extract_bytes(
    raster: &Raster,
    len: usize,
    params: &SlotParams<'_>,
    start: usize,
) -> Result<(Vec<u8>, usize)> {
    let needed = len * 8;
    if needed == 0 {
        return Ok((Vec::new(), start));
    }

    let layout = raster.layout().as_bytes();
    let mask = params.mask();
    let bit_frequency = params.bit_frequency;
    let mut counters = vec![0usize; layout.len()];
    let mut writer = BitWriter::new();
    let mut collected = 0;
    let mut last = None;

    'pixels: for pixel in start..raster.pixel_count() {
        for (channel, &letter) in layout.iter().enumerate() {
            if !params.channels.contains(letter as char) {
                continue;
            }

            if counters[channel] % params.byte_spacing == 0 {
                writer.write_bits(raster.channel(pixel, channel) & mask, bit_frequency);
                collected += bit_frequency as usize;
                if collected >= needed {
                    last = Some(pixel);
                    break 'pixels;
                }
            }
            counters[channel] += 1;
        }
    }

    match last {
        Some(pixel) => {
            let mut bytes = writer.finish();
            bytes.truncate(len);
            Ok((bytes, pixel))
        }
        None => Err(Error::DataSizeTooLarge {
            size: len,
            max: raw_capacity(raster.pixel_count().saturating_sub(start), params),
        }),
    }
}

/// MSB-first bit accumulator.
struct BitWriter {
    bytes: Vec<u8>,
    current: u8,
    count: u8,
}

impl BitWriter {
    fn new() -> Self {
        BitWriter {
            bytes: Vec::new(),
            current: 0,
            count: 0,
        }
    }

    /// Appends the low `num_bits` of `value`, MSB first. `num_bits <= 8`.
    fn write_bits(&mut self, value: u8, num_bits: u8) {
        for i in (0..num_bits).rev() {
            self.current = (self.current << 1) | ((value >> i) & 1);
            self.count += 1;
            if self.count == 8 {
                self.bytes.push(self.current);
                self.current = 0;
                self.count = 0;
            }
        }
    }

    /// Flushes the trailing partial byte, zero-padded on the right.
    fn finish(mut self) -> Vec<u8> {
        if self.count > 0 {
            self.current <<= 8 - self.count;
            self.bytes.push(self.current);
        }
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32, layout: &str) -> Raster {
        let len = width as usize * height as usize * layout.len();
        let pixels = (0..len).map(|i| (i * 7 % 256) as u8).collect();
        Raster::new(width, height, layout, pixels).unwrap()
    }

    #[test]
    fn bit_writer_roundtrip() {
        let mut writer = BitWriter::new();
        for chunk in [0b10u8, 0b11, 0b01, 0b00, 0b11, 0b10, 0b00, 0b01] {
            writer.write_bits(chunk, 2);
        }
        assert_eq!(writer.finish(), vec![0b10110100, 0b11100001]);
    }

    #[test]
    fn embed_extract_roundtrip_alpha_only() {
        let mut raster = gradient(8, 8, "RGBA");
        let params = SlotParams {
            channels: "A",
            bit_frequency: 1,
            byte_spacing: 1,
        };

        let last = embed_bytes(&mut raster, b"hi", &params, 0).unwrap();
        assert_eq!(last, 15);

        let (bytes, span_end) = extract_bytes(&raster, 2, &params, 0).unwrap();
        assert_eq!(bytes, b"hi");
        assert_eq!(span_end, last);
    }

    #[test]
    fn embed_touches_only_active_channels() {
        let original = gradient(8, 8, "RGBA");
        let mut encoded = original.clone();
        let params = SlotParams {
            channels: "A",
            bit_frequency: 1,
            byte_spacing: 1,
        };
        embed_bytes(&mut encoded, b"\xff\xff", &params, 0).unwrap();

        for pixel in 0..original.pixel_count() {
            for channel in 0..3 {
                assert_eq!(
                    original.channel(pixel, channel),
                    encoded.channel(pixel, channel),
                    "inactive channel modified at pixel {pixel}"
                );
            }
            assert_eq!(
                original.channel(pixel, 3) & !1,
                encoded.channel(pixel, 3) & !1,
                "bits above the window modified at pixel {pixel}"
            );
        }
    }

    #[test]
    fn pixels_outside_span_untouched() {
        let original = gradient(8, 8, "RGBA");
        let mut encoded = original.clone();
        let params = SlotParams {
            channels: "RGBA",
            bit_frequency: 2,
            byte_spacing: 1,
        };

        let start = 5;
        let last = embed_bytes(&mut encoded, b"abc", &params, start).unwrap();

        for pixel in (0..start).chain(last + 1..original.pixel_count()) {
            for channel in 0..4 {
                assert_eq!(
                    original.channel(pixel, channel),
                    encoded.channel(pixel, channel)
                );
            }
        }
    }

    #[test]
    fn byte_spacing_skips_slots() {
        let mut raster = gradient(16, 16, "RGBA");
        let params = SlotParams {
            channels: "RG",
            bit_frequency: 2,
            byte_spacing: 3,
        };

        embed_bytes(&mut raster, b"stride", &params, 2).unwrap();
        let (bytes, _) = extract_bytes(&raster, 6, &params, 2).unwrap();
        assert_eq!(bytes, b"stride");
    }

    #[test]
    fn wide_windows_roundtrip() {
        for bit_frequency in 1..=8 {
            let mut raster = gradient(16, 16, "RGB");
            let params = SlotParams {
                channels: "RGB",
                bit_frequency,
                byte_spacing: 1,
            };
            embed_bytes(&mut raster, b"window", &params, 0).unwrap();
            let (bytes, _) = extract_bytes(&raster, 6, &params, 0).unwrap();
            assert_eq!(bytes, b"window", "bit_frequency {bit_frequency}");
        }
    }

    #[test]
    fn capacity_overflow_reported() {
        let mut raster = gradient(2, 2, "RGBA");
        let params = SlotParams {
            channels: "A",
            bit_frequency: 1,
            byte_spacing: 1,
        };

        // 4 alpha slots hold half a byte.
        let err = embed_bytes(&mut raster, b"toolarge", &params, 0).unwrap_err();
        assert!(matches!(err, Error::DataSizeTooLarge { max: 0, .. }));

        let err = extract_bytes(&raster, 8, &params, 0).unwrap_err();
        assert!(matches!(err, Error::DataSizeTooLarge { .. }));
    }

    #[test]
    fn raw_capacity_formula() {
        let params = SlotParams {
            channels: "RGBA",
            bit_frequency: 1,
            byte_spacing: 1,
        };
        assert_eq!(raw_capacity(16, &params), 8);

        let params = SlotParams {
            channels: "RG",
            bit_frequency: 4,
            byte_spacing: 2,
        };
        assert_eq!(raw_capacity(100, &params), 50);
    }
}
