//! CRILAYLA encoder
//!
//! Greedy LZ matcher over the payload in decode order (last byte first),
//! using hash chains keyed on three-byte prefixes.

use super::bits::{BitWriter, MIN_MATCH};
use super::error::{CrilaylaError, CrilaylaResult};
use super::{CRILAYLA_MAGIC, DISTANCE_BITS, HEADER_SIZE, PREFIX_SIZE};
use std::collections::HashMap;
use tracing::debug;

/// Largest distance the 13-bit field can express
const MAX_DISTANCE: usize = (1 << DISTANCE_BITS) - 1 + MIN_MATCH;

/// Candidates examined per position
const MAX_CHAIN: usize = 256;

const NO_POSITION: usize = usize::MAX;

struct MatchFinder<'a> {
    data: &'a [u8],
    head: HashMap<[u8; 3], usize>,
    prev: Vec<usize>,
}

impl<'a> MatchFinder<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            head: HashMap::new(),
            prev: vec![NO_POSITION; data.len()],
        }
    }

    fn key(&self, pos: usize) -> Option<[u8; 3]> {
        self.data
            .get(pos..pos + 3)
            .map(|bytes| [bytes[0], bytes[1], bytes[2]])
    }

    fn insert(&mut self, pos: usize) {
        if let Some(key) = self.key(pos) {
            self.prev[pos] = self.head.insert(key, pos).unwrap_or(NO_POSITION);
        }
    }

    /// Longest earlier match for `pos` as `(distance, length)`
    fn longest(&self, pos: usize) -> Option<(usize, usize)> {
        let key = self.key(pos)?;
        let mut candidate = self.head.get(&key).copied().unwrap_or(NO_POSITION);
        let mut best: Option<(usize, usize)> = None;

        for _ in 0..MAX_CHAIN {
            if candidate == NO_POSITION {
                break;
            }
            let distance = pos - candidate;
            if distance > MAX_DISTANCE {
                break;
            }

            if distance >= MIN_MATCH {
                let length = self.data[pos..]
                    .iter()
                    .zip(&self.data[candidate..])
                    .take_while(|(a, b)| a == b)
                    .count();
                if length >= MIN_MATCH && best.is_none_or(|(_, l)| length > l) {
                    best = Some((distance, length));
                }
            }

            candidate = self.prev[candidate];
        }

        best
    }
}

/// Encode `payload` behind a verbatim 256-byte `prefix`
///
/// The output decodes with [`super::decompress`] to `prefix ++ payload`.
pub fn compress(prefix: &[u8; PREFIX_SIZE], payload: &[u8]) -> CrilaylaResult<Vec<u8>> {
    let size = u32::try_from(payload.len()).map_err(|_| CrilaylaError::TooLarge(payload.len()))?;

    let reversed: Vec<u8> = payload.iter().rev().copied().collect();
    let mut finder = MatchFinder::new(&reversed);
    let mut writer = BitWriter::new();
    let mut pos = 0;
    let mut references = 0usize;

    while pos < reversed.len() {
        if let Some((distance, length)) = finder.longest(pos) {
            writer.write(1, 1);
            writer.write((distance - MIN_MATCH) as u16, DISTANCE_BITS);
            writer.write_run_length(length);
            for p in pos..pos + length {
                finder.insert(p);
            }
            pos += length;
            references += 1;
        } else {
            writer.write(0, 1);
            writer.write(u16::from(reversed[pos]), 8);
            finder.insert(pos);
            pos += 1;
        }
    }

    let stream = writer.finish();
    let stream_len =
        u32::try_from(stream.len()).map_err(|_| CrilaylaError::TooLarge(payload.len()))?;

    let mut out = Vec::with_capacity(HEADER_SIZE + stream.len() + PREFIX_SIZE);
    out.extend_from_slice(&CRILAYLA_MAGIC);
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&stream_len.to_le_bytes());
    out.extend_from_slice(&stream);
    out.extend_from_slice(prefix);

    debug!(
        payload = payload.len(),
        compressed = out.len(),
        references,
        "encoded CRILAYLA buffer"
    );
    Ok(out)
}
