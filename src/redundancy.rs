//! Redundancy pipeline: Reed-Solomon coding over fixed-size chunks plus
//! repetitive duplication with majority voting.
//!
//! Encode order is RS first, then repetition; reconstruction reverses. The
//! chunk walk is derived from the ciphertext length and the correction factor
//! alone, so the decoder needs no side information.

use reed_solomon::{Decoder as RsDecoder, Encoder as RsEncoder};

use crate::error::{Error, Result};
use crate::pattern::{AdvancedRedundancy, RedundancyParams, RepetitiveRedundancyMode};

/// Applies the advanced layer, then the repetition layer.
pub(crate) fn apply(data: &[u8], params: &RedundancyParams) -> Result<Vec<u8>> {
    let data = match params.advanced {
        AdvancedRedundancy::ReedSolomon { correction_factor } => rs_encode(data, correction_factor),
        AdvancedRedundancy::Hamming => {
            return Err(Error::AdvancedRedundancyNotImplemented("hamming"))
        }
        AdvancedRedundancy::None => data.to_vec(),
    };

    Ok(repeat(&data, params.repetitive, params.mode))
}

/// Reconstructs the repetition layer by majority vote, then RS-decodes.
pub(crate) fn reconstruct(data: &[u8], params: &RedundancyParams) -> Result<Vec<u8>> {
    let data = vote(data, params.repetitive, params.mode);

    match params.advanced {
        AdvancedRedundancy::ReedSolomon { correction_factor } => {
            rs_decode(&data, correction_factor)
        }
        AdvancedRedundancy::Hamming => Err(Error::AdvancedRedundancyNotImplemented("hamming")),
        AdvancedRedundancy::None => Ok(data),
    }
}

/// Size of `apply`'s output for a `len`-byte input, without touching data.
///
/// The header decoder leans on this to know how many bytes to pull from the
/// slot stream before it can parse anything.
pub(crate) fn encoded_len(len: usize, params: &RedundancyParams) -> Result<usize> {
    let len = match params.advanced {
        AdvancedRedundancy::ReedSolomon { correction_factor } => {
            rs_encoded_len(len, correction_factor)
        }
        AdvancedRedundancy::Hamming => {
            return Err(Error::AdvancedRedundancyNotImplemented("hamming"))
        }
        AdvancedRedundancy::None => len,
    };

    Ok(len * params.repetitive.max(1))
}

/// Data symbols per RS chunk; keeps every chunk within 255 total symbols.
fn chunk_capacity(correction_factor: f64) -> usize {
    (255.0 / (1.0 + 2.0 * correction_factor)).floor() as usize
}

/// Redundant symbols for a chunk of `data_symbols` data bytes.
fn parity_len(data_symbols: usize, correction_factor: f64) -> usize {
    (2.0 * correction_factor * data_symbols as f64).ceil() as usize
}

fn rs_encode(data: &[u8], correction_factor: f64) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }

    let capacity = chunk_capacity(correction_factor);
    let mut out = Vec::with_capacity(rs_encoded_len(data.len(), correction_factor));

    for chunk in data.chunks(capacity) {
        let encoder = RsEncoder::new(parity_len(chunk.len(), correction_factor));
        out.extend_from_slice(&encoder.encode(chunk));
    }

    out
}

fn rs_encoded_len(len: usize, correction_factor: f64) -> usize {
    let capacity = chunk_capacity(correction_factor);
    let mut total = 0;
    let mut remaining = len;

    while remaining > 0 {
        let data_symbols = remaining.min(capacity);
        total += data_symbols + parity_len(data_symbols, correction_factor);
        remaining -= data_symbols;
    }

    total
}

fn rs_decode(data: &[u8], correction_factor: f64) -> Result<Vec<u8>> {
    let capacity = chunk_capacity(correction_factor);
    let full = capacity + parity_len(capacity, correction_factor);
    let mut out = Vec::new();
    let mut rest = data;

    while !rest.is_empty() {
        let (chunk, data_symbols) = if rest.len() >= full {
            (&rest[..full], capacity)
        } else {
            (rest, remainder_data_symbols(rest.len(), correction_factor)?)
        };

        let decoder = RsDecoder::new(chunk.len() - data_symbols);
        let recovered = decoder
            .correct(chunk, None)
            .map_err(|_| Error::RsDecodeFailed)?;
        out.extend_from_slice(recovered.data());

        rest = &rest[chunk.len()..];
    }

    Ok(out)
}

/// Recovers the data symbol count of a trailing partial chunk from its
/// encoded size. `d + ceil(2 * f * d)` is strictly increasing in `d`, so the
/// solution is unique when it exists.
fn remainder_data_symbols(encoded: usize, correction_factor: f64) -> Result<usize> {
    (1..=chunk_capacity(correction_factor))
        .find(|&d| d + parity_len(d, correction_factor) == encoded)
        .ok_or(Error::RsDecodeFailed)
}

fn repeat(data: &[u8], k: usize, mode: RepetitiveRedundancyMode) -> Vec<u8> {
    if k <= 1 {
        return data.to_vec();
    }

    match mode {
        RepetitiveRedundancyMode::BytePerByte => {
            let mut out = Vec::with_capacity(data.len() * k);
            for &byte in data {
                out.extend(std::iter::repeat(byte).take(k));
            }
            out
        }
        RepetitiveRedundancyMode::Block => data.repeat(k),
    }
}

fn vote(data: &[u8], k: usize, mode: RepetitiveRedundancyMode) -> Vec<u8> {
    if k <= 1 {
        return data.to_vec();
    }

    match mode {
        RepetitiveRedundancyMode::BytePerByte => vote_groups(data, k),
        RepetitiveRedundancyMode::Block => vote_groups(&transpose(data, k), k),
    }
}

/// Re-lays `k` concatenated copies into byte-per-byte order by strided
/// indexing: output byte `j * k + r` is input byte `r * (n / k) + j`.
fn transpose(data: &[u8], k: usize) -> Vec<u8> {
    let chunk = data.len() / k;
    let mut out = Vec::with_capacity(chunk * k);

    for j in 0..chunk {
        for r in 0..k {
            out.push(data[r * chunk + j]);
        }
    }

    out
}

/// Reduces each group of `k` bytes to one by majority vote; ties fall back to
/// L1 distance against the neighbor set.
fn vote_groups(data: &[u8], k: usize) -> Vec<u8> {
    let groups: Vec<&[u8]> = data.chunks(k).collect();
    let full_groups = data.len() / k;
    let mut out = Vec::with_capacity(groups.len());

    for (index, group) in groups.iter().enumerate() {
        let candidates = majority_candidates(group);
        let byte = if candidates.len() == 1 {
            candidates[0]
        } else {
            let mut neighbors = Vec::with_capacity(2);
            if let Some(&previous) = out.last() {
                neighbors.push(previous);
            }
            if index + 1 < full_groups {
                if let Some(next) = strict_majority(groups[index + 1]) {
                    neighbors.push(next);
                }
            }

            let mut best = candidates[0];
            let mut best_distance = byte_distance(best, &neighbors);
            for &candidate in &candidates[1..] {
                let distance = byte_distance(candidate, &neighbors);
                if distance < best_distance {
                    best = candidate;
                    best_distance = distance;
                }
            }
            best
        };

        out.push(byte);
    }

    out
}

/// Bytes sharing the maximum occurrence count, in first-seen order.
fn majority_candidates(group: &[u8]) -> Vec<u8> {
    let mut counts: Vec<(u8, usize)> = Vec::new();
    for &byte in group {
        match counts.iter_mut().find(|(value, _)| *value == byte) {
            Some((_, count)) => *count += 1,
            None => counts.push((byte, 1)),
        }
    }

    let max = counts.iter().map(|&(_, count)| count).max().unwrap_or(0);
    counts
        .into_iter()
        .filter(|&(_, count)| count == max)
        .map(|(byte, _)| byte)
        .collect()
}

fn strict_majority(group: &[u8]) -> Option<u8> {
    let candidates = majority_candidates(group);
    match candidates.as_slice() {
        [byte] => Some(*byte),
        _ => None,
    }
}

fn byte_distance(byte: u8, neighbors: &[u8]) -> u32 {
    neighbors
        .iter()
        .map(|&n| (byte as i32 - n as i32).unsigned_abs())
        .sum()
}
