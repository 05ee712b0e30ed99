//! CRILAYLA compression
//!
//! CRILAYLA is the LZ-style codec CRIWare applies to individual CPK entries.
//! A compressed buffer looks like:
//!
//! ```text
//! 0x00  "CRILAYLA"
//! 0x08  payload size S        (u32 LE)
//! 0x0C  stream length H       (u32 LE)
//! 0x10  compressed stream     (H bytes, read backwards)
//! H+16  raw prefix            (256 bytes, stored verbatim)
//! ```
//!
//! Decoding fills the payload from its last byte towards its first. Each
//! step is either a literal byte or a back-reference to bytes already
//! produced at higher indices.

mod bits;
mod builder;
mod error;

pub use bits::{BitReader, BitWriter, LENGTH_WIDTHS, MIN_MATCH};
pub use builder::compress;
pub use error::{CrilaylaError, CrilaylaResult};

use tracing::trace;

/// CRILAYLA magic bytes
pub const CRILAYLA_MAGIC: [u8; 8] = *b"CRILAYLA";

/// Size of the fixed header
pub const HEADER_SIZE: usize = 0x10;

/// Size of the verbatim prefix stored after the stream
pub const PREFIX_SIZE: usize = 0x100;

/// Width of the back-reference distance field
pub const DISTANCE_BITS: u32 = 13;

/// Output of a successful decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decompressed {
    /// The 256 bytes stored verbatim after the stream
    pub prefix: Vec<u8>,
    /// The `S` decoded payload bytes
    pub payload: Vec<u8>,
}

/// Check whether a buffer starts with the CRILAYLA magic
pub fn is_crilayla(data: &[u8]) -> bool {
    data.starts_with(&CRILAYLA_MAGIC)
}

/// Payload size declared in the header, if the buffer has one
pub fn declared_size(data: &[u8]) -> Option<u32> {
    if !is_crilayla(data) || data.len() < HEADER_SIZE {
        return None;
    }
    Some(read_u32_le(data, 8))
}

/// Decode a buffer into `prefix ++ payload` (`S + 256` bytes)
pub fn decompress(data: &[u8]) -> CrilaylaResult<Vec<u8>> {
    let (size, stream_len) = check_header(data)?;
    let stream_end = HEADER_SIZE + stream_len;
    let output_end = PREFIX_SIZE + size - 1;

    let mut output = vec![0u8; PREFIX_SIZE + size];
    output[..PREFIX_SIZE].copy_from_slice(&data[stream_end..stream_end + PREFIX_SIZE]);

    // The stream ends where the header says, so bytes after the prefix are ignored
    let mut reader = BitReader::new(data, HEADER_SIZE, stream_end);
    let mut written = 0usize;

    while written < size {
        let position = output_end - written;

        if reader.read(1)? == 1 {
            let source = position + usize::from(reader.read(DISTANCE_BITS)?) + MIN_MATCH;
            if source > output_end {
                return Err(CrilaylaError::BackReferenceOutOfRange {
                    position,
                    origin: source,
                });
            }

            let length = reader.read_run_length()?;
            if length > size - written {
                return Err(CrilaylaError::OutputOverrun(length - (size - written)));
            }

            for i in 0..length {
                output[position - i] = output[source - i];
            }
            written += length;
        } else {
            output[position] = reader.read(8)? as u8;
            written += 1;
        }
    }

    trace!(size, stream_len, "decoded CRILAYLA buffer");
    Ok(output)
}

/// Decode a buffer and split the result into prefix and payload
pub fn decompress_parts(data: &[u8]) -> CrilaylaResult<Decompressed> {
    let mut output = decompress(data)?;
    let payload = output.split_off(PREFIX_SIZE);
    Ok(Decompressed {
        prefix: output,
        payload,
    })
}

/// Validate the header and return `(S, H)`
fn check_header(data: &[u8]) -> CrilaylaResult<(usize, usize)> {
    if data.len() < HEADER_SIZE {
        return Err(CrilaylaError::Truncated(data.len()));
    }

    let mut magic = [0u8; 8];
    magic.copy_from_slice(&data[..8]);
    if magic != CRILAYLA_MAGIC {
        return Err(CrilaylaError::InvalidMagic(magic));
    }

    if data.len() < HEADER_SIZE + PREFIX_SIZE {
        return Err(CrilaylaError::Truncated(data.len()));
    }

    let size = read_u32_le(data, 8);
    let stream_len = read_u32_le(data, 12);

    if HEADER_SIZE as u64 + u64::from(stream_len) + PREFIX_SIZE as u64 > data.len() as u64 {
        return Err(CrilaylaError::PrefixOutOfRange {
            offset: stream_len,
            len: data.len(),
        });
    }

    // Each stream bit expands to at most 32 output bytes
    if u64::from(size) > u64::from(stream_len) * 256 + 512 {
        return Err(CrilaylaError::ImplausibleSize {
            size,
            stream: stream_len,
        });
    }

    Ok((size as usize, stream_len as usize))
}

fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Assemble a buffer from a hand-built bit stream
    fn assemble(size: u32, writer: BitWriter, prefix: &[u8; PREFIX_SIZE]) -> Vec<u8> {
        let stream = writer.finish();
        let mut data = CRILAYLA_MAGIC.to_vec();
        data.extend_from_slice(&size.to_le_bytes());
        data.extend_from_slice(&(stream.len() as u32).to_le_bytes());
        data.extend_from_slice(&stream);
        data.extend_from_slice(prefix);
        data
    }

    #[test]
    fn test_literals_fill_from_the_end() {
        let mut writer = BitWriter::new();
        // First literal decoded lands on the last payload byte
        for byte in [b'c', b'b', b'a'] {
            writer.write(0, 1);
            writer.write(u16::from(byte), 8);
        }
        let data = assemble(3, writer, &[0x11; PREFIX_SIZE]);

        let parts = decompress_parts(&data).expect("Test operation should succeed");
        assert_eq!(parts.payload, b"abc");
        assert_eq!(parts.prefix, vec![0x11; PREFIX_SIZE]);
    }

    #[test]
    fn test_overlapping_back_reference() {
        let mut writer = BitWriter::new();
        for byte in [b'z', b'y', b'x'] {
            writer.write(0, 1);
            writer.write(u16::from(byte), 8);
        }
        // Copy from three bytes above, six times over
        writer.write(1, 1);
        writer.write(0, DISTANCE_BITS);
        writer.write_run_length(6);
        let data = assemble(9, writer, &[0; PREFIX_SIZE]);

        let output = decompress(&data).expect("Test operation should succeed");
        assert_eq!(output.len(), PREFIX_SIZE + 9);
        assert_eq!(&output[PREFIX_SIZE..], b"xyzxyzxyz");
    }

    #[test]
    fn test_trailing_bytes_after_prefix() {
        let mut writer = BitWriter::new();
        for byte in [b'c', b'b', b'a'] {
            writer.write(0, 1);
            writer.write(u16::from(byte), 8);
        }
        let mut data = assemble(3, writer, &[0x22; PREFIX_SIZE]);
        // Stored ranges may be padded past the prefix
        data.extend_from_slice(&[0xEE; 11]);

        let parts = decompress_parts(&data).expect("Test operation should succeed");
        assert_eq!(parts.payload, b"abc");
        assert_eq!(parts.prefix, vec![0x22; PREFIX_SIZE]);
    }

    #[test]
    fn test_empty_payload() {
        let data = assemble(0, BitWriter::new(), &[7; PREFIX_SIZE]);
        let parts = decompress_parts(&data).expect("Test operation should succeed");
        assert!(parts.payload.is_empty());
        assert_eq!(parts.prefix.len(), PREFIX_SIZE);
    }

    #[test]
    fn test_back_reference_beyond_output() {
        let mut writer = BitWriter::new();
        writer.write(0, 1);
        writer.write(0x41, 8);
        // Distance reaches above the last payload byte
        writer.write(1, 1);
        writer.write(5, DISTANCE_BITS);
        writer.write_run_length(3);
        let data = assemble(4, writer, &[0; PREFIX_SIZE]);

        assert!(matches!(
            decompress(&data),
            Err(CrilaylaError::BackReferenceOutOfRange { .. })
        ));
    }

    #[test]
    fn test_overrun_is_rejected() {
        let mut writer = BitWriter::new();
        for _ in 0..3 {
            writer.write(0, 1);
            writer.write(0x41, 8);
        }
        writer.write(1, 1);
        writer.write(0, DISTANCE_BITS);
        writer.write_run_length(10);
        let data = assemble(5, writer, &[0; PREFIX_SIZE]);

        assert!(matches!(
            decompress(&data),
            Err(CrilaylaError::OutputOverrun(8))
        ));
    }

    #[test]
    fn test_exhausted_stream() {
        let mut writer = BitWriter::new();
        writer.write(0, 1);
        writer.write(0x41, 8);
        let data = assemble(4, writer, &[0; PREFIX_SIZE]);

        assert!(matches!(
            decompress(&data),
            Err(CrilaylaError::InputExhausted)
        ));
    }

    #[test]
    fn test_header_validation() {
        assert!(matches!(
            decompress(b"CRILAY"),
            Err(CrilaylaError::Truncated(6))
        ));

        let mut bad_magic = vec![0u8; HEADER_SIZE + PREFIX_SIZE];
        bad_magic[..8].copy_from_slice(b"CRILAYLB");
        assert!(matches!(
            decompress(&bad_magic),
            Err(CrilaylaError::InvalidMagic(_))
        ));

        let mut bad_offset = assemble(0, BitWriter::new(), &[0; PREFIX_SIZE]);
        bad_offset[12..16].copy_from_slice(&0x1000u32.to_le_bytes());
        assert!(matches!(
            decompress(&bad_offset),
            Err(CrilaylaError::PrefixOutOfRange { offset: 0x1000, .. })
        ));

        let mut huge = assemble(0, BitWriter::new(), &[0; PREFIX_SIZE]);
        huge[8..12].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            decompress(&huge),
            Err(CrilaylaError::ImplausibleSize { .. })
        ));
    }

    #[test]
    fn test_declared_size() {
        let data = assemble(3, BitWriter::new(), &[0; PREFIX_SIZE]);
        assert_eq!(declared_size(&data), Some(3));
        assert_eq!(declared_size(b"plain data"), None);
    }
}
