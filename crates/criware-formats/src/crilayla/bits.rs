//! Backward bit stream used by CRILAYLA
//!
//! The compressed stream is consumed from its last byte towards its first,
//! taking bits from the most significant end of each byte.

use super::error::{CrilaylaError, CrilaylaResult};

/// Field widths of the back-reference length code
pub const LENGTH_WIDTHS: [u32; 4] = [2, 3, 5, 8];

/// Shortest back-reference
pub const MIN_MATCH: usize = 3;

/// Reads bits from `data[floor..end]`, starting at `end - 1`
pub struct BitReader<'a> {
    data: &'a [u8],
    floor: usize,
    /// Index one past the next byte to load
    cursor: usize,
    pool: u8,
    remaining: u32,
}

impl<'a> BitReader<'a> {
    /// Create a reader over `data[floor..end]`
    pub fn new(data: &'a [u8], floor: usize, end: usize) -> Self {
        Self {
            data,
            floor,
            cursor: end.min(data.len()),
            pool: 0,
            remaining: 0,
        }
    }

    /// Read an `n`-bit field, `n <= 16`
    pub fn read(&mut self, n: u32) -> CrilaylaResult<u16> {
        let mut out: u16 = 0;
        let mut produced = 0;

        while produced < n {
            if self.remaining == 0 {
                if self.cursor <= self.floor {
                    return Err(CrilaylaError::InputExhausted);
                }
                self.cursor -= 1;
                self.pool = self.data[self.cursor];
                self.remaining = 8;
            }

            let take = self.remaining.min(n - produced);
            let bits = u16::from(self.pool >> (self.remaining - take)) & ((1u16 << take) - 1);
            out = (out << take) | bits;

            self.remaining -= take;
            produced += take;
        }

        Ok(out)
    }

    /// Read a back-reference length, including the minimum of 3
    pub fn read_run_length(&mut self) -> CrilaylaResult<usize> {
        let mut length = MIN_MATCH;

        for width in LENGTH_WIDTHS {
            let value = self.read(width)?;
            length += usize::from(value);
            if value != (1u16 << width) - 1 {
                return Ok(length);
            }
        }

        loop {
            let value = self.read(8)?;
            length += usize::from(value);
            if value != 0xFF {
                return Ok(length);
            }
        }
    }
}

/// Packs bits MSB-first in the order the reader will consume them
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    current: u8,
    filled: u32,
}

impl BitWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `n` bits of `value`, most significant first
    pub fn write(&mut self, value: u16, n: u32) {
        for shift in (0..n).rev() {
            let bit = ((value >> shift) & 1) as u8;
            self.current = (self.current << 1) | bit;
            self.filled += 1;
            if self.filled == 8 {
                self.bytes.push(self.current);
                self.current = 0;
                self.filled = 0;
            }
        }
    }

    /// Append a back-reference length (at least 3)
    pub fn write_run_length(&mut self, length: usize) {
        let mut rest = length.saturating_sub(MIN_MATCH);

        for width in LENGTH_WIDTHS {
            let max = (1usize << width) - 1;
            if rest < max {
                self.write(rest as u16, width);
                return;
            }
            self.write(max as u16, width);
            rest -= max;
        }

        while rest >= 0xFF {
            self.write(0xFF, 8);
            rest -= 0xFF;
        }
        self.write(rest as u16, 8);
    }

    /// Finish the stream and return it in storage order
    ///
    /// The first byte written ends up last, where the reader starts.
    pub fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.bytes.push(self.current << (8 - self.filled));
        }
        self.bytes.reverse();
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reads_backwards_msb_first() {
        // Last byte is read first
        let data = [0x00, 0xFF, 0b1011_0010];
        let mut reader = BitReader::new(&data, 0, data.len());

        assert_eq!(reader.read(1).expect("bit"), 1);
        assert_eq!(reader.read(3).expect("bits"), 0b011);
        // Spans into the previous byte
        assert_eq!(reader.read(8).expect("bits"), 0b0010_1111);
        assert_eq!(reader.read(4).expect("bits"), 0b1111);
        assert_eq!(reader.read(8).expect("bits"), 0);
        assert!(matches!(reader.read(1), Err(CrilaylaError::InputExhausted)));
    }

    #[test]
    fn test_floor_is_respected() {
        let data = [0xAA, 0xBB];
        let mut reader = BitReader::new(&data, 1, 2);

        assert_eq!(reader.read(8).expect("byte"), 0xBB);
        assert!(matches!(reader.read(1), Err(CrilaylaError::InputExhausted)));
    }

    #[test]
    fn test_saturated_length_fields() {
        // Fields 3, 7, 31 saturate; the 8-bit field chain is 255 then 9
        let mut writer = BitWriter::new();
        writer.write(3, 2);
        writer.write(7, 3);
        writer.write(31, 5);
        writer.write(255, 8);
        writer.write(9, 8);
        let stream = writer.finish();

        let mut reader = BitReader::new(&stream, 0, stream.len());
        assert_eq!(reader.read_run_length().expect("length"), 308);
    }

    #[test]
    fn test_short_length_field() {
        let mut writer = BitWriter::new();
        writer.write(2, 2);
        let stream = writer.finish();

        let mut reader = BitReader::new(&stream, 0, stream.len());
        assert_eq!(reader.read_run_length().expect("length"), 5);
    }

    #[test]
    fn test_run_length_encoding_matches_reader() {
        for length in [3, 4, 5, 6, 12, 13, 44, 45, 299, 300, 554, 555, 1000] {
            let mut writer = BitWriter::new();
            writer.write_run_length(length);
            let stream = writer.finish();

            let mut reader = BitReader::new(&stream, 0, stream.len());
            assert_eq!(
                reader.read_run_length().expect("length"),
                length,
                "length {length}"
            );
        }
    }
}
