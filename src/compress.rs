//! Optional deflate layer with an explicit used/unused flag byte.
//!
//! The flag is ASCII: `b'1'` means the remainder is compressed, `b'0'` means
//! it is verbatim. With `Compression::None` the layer is a no-op and emits no
//! flag byte at all.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use log::{debug, info};

use crate::error::Result;
use crate::pattern::Compression;

const COMPRESSED: u8 = b'1';
const UNCOMPRESSED: u8 = b'0';

pub(crate) fn compress(data: &[u8], compression: &Compression) -> Result<Vec<u8>> {
    let strength = match compression {
        Compression::None => return Ok(data.to_vec()),
        Compression::Zlib { strength } => *strength,
    };

    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(data.len() + 1),
        flate2::Compression::new(strength as u32),
    );
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;

    let mut out;
    if compressed.len() < data.len() {
        debug!(
            "compression reduced data size, using compressed data ({}/{} bytes)",
            compressed.len(),
            data.len()
        );
        out = Vec::with_capacity(compressed.len() + 1);
        out.push(COMPRESSED);
        out.extend_from_slice(&compressed);
    } else {
        info!(
            "compression did not reduce data size, skipping compression ({}/{} bytes)",
            compressed.len(),
            data.len()
        );
        out = Vec::with_capacity(data.len() + 1);
        out.push(UNCOMPRESSED);
        out.extend_from_slice(data);
    }

    Ok(out)
}

pub(crate) fn decompress(data: &[u8], compression: &Compression) -> Result<Vec<u8>> {
    if let Compression::None = compression {
        return Ok(data.to_vec());
    }

    match data.split_first() {
        Some((&COMPRESSED, rest)) => {
            let mut out = Vec::with_capacity(rest.len() * 2);
            ZlibDecoder::new(rest).read_to_end(&mut out)?;
            Ok(out)
        }
        Some((_, rest)) => Ok(rest.to_vec()),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_a_passthrough() {
        let data = b"plain".to_vec();
        assert_eq!(compress(&data, &Compression::None).unwrap(), data);
        assert_eq!(decompress(&data, &Compression::None).unwrap(), data);
    }

    #[test]
    fn compressible_data_is_flagged_and_shrinks() {
        let data = vec![0x41u8; 1024];
        let zlib = Compression::Zlib { strength: 6 };
        let compressed = compress(&data, &zlib).unwrap();

        assert_eq!(compressed[0], b'1');
        assert!(compressed.len() < data.len());
        assert_eq!(decompress(&compressed, &zlib).unwrap(), data);
    }

    #[test]
    fn incompressible_data_is_kept_verbatim() {
        // Short high-entropy input only grows under deflate.
        let data: Vec<u8> = (0..32u16).map(|i| (i * 97 % 256) as u8).collect();
        let zlib = Compression::Zlib { strength: 9 };
        let compressed = compress(&data, &zlib).unwrap();

        assert_eq!(compressed[0], b'0');
        assert_eq!(&compressed[1..], &data[..]);
        assert_eq!(decompress(&compressed, &zlib).unwrap(), data);
    }
}
