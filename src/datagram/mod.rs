pub mod error;

use std::convert::TryInto;

use crate::clock::now_seconds;
use crate::crc32;
use crate::datagram::error::Error;
use crate::error::Result;

/// Datagram:
///     2        4     4      8      4          4     - field size
/// *-------*-----*------*------*-----*--  --*-------*
/// | proto | src | dest | time | len | data | crc32 |
/// *-------*-----*------*------*-----*--  --*-------*
///
/// `time` is the timestamp at which the datagram was last (re)transmitted
/// by a router, refreshed on every hop.
pub const FIXED_OVERHEAD: usize = 26;

/// The unit exchanged between routers on the wire.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub protocol: u16,
    pub src: u32,
    pub dest: u32,
    pub time: f64,
    pub data: Vec<u8>,
}

impl Datagram {
    /// Builds a datagram stamped with the current wall-clock time.
    pub fn new(protocol: u16, src: u32, dest: u32, data: Vec<u8>) -> Self {
        Self {
            protocol,
            src,
            dest,
            time: now_seconds(),
            data,
        }
    }

    /// Returns a copy of this datagram with `time` reset to now, as done on
    /// every router hop.
    pub fn retimestamped(&self) -> Self {
        Self {
            time: now_seconds(),
            ..self.clone()
        }
    }

    /// Serializes the datagram into the canonical little-endian wire format,
    /// computing and embedding the trailing CRC-32.
    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(FIXED_OVERHEAD + self.data.len());
        buffer.extend_from_slice(&self.protocol.to_le_bytes());
        buffer.extend_from_slice(&self.src.to_le_bytes());
        buffer.extend_from_slice(&self.dest.to_le_bytes());
        buffer.extend_from_slice(&self.time.to_le_bytes());
        buffer.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        buffer.extend_from_slice(&self.data);
        buffer.extend_from_slice(&0u32.to_le_bytes());

        let crc = crc32::checksum(&buffer);
        let crc_at = buffer.len() - 4;
        buffer[crc_at..].copy_from_slice(&crc.to_le_bytes());

        buffer
    }

    /// Parses a raw frame into a `Datagram`, rejecting malformed input.
    pub fn decode(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < FIXED_OVERHEAD {
            return Err(Error::TooShort { len: buffer.len() }.into());
        }

        let protocol = u16::from_le_bytes(buffer[0..2].try_into().unwrap());
        let src = u32::from_le_bytes(buffer[2..6].try_into().unwrap());
        let dest = u32::from_le_bytes(buffer[6..10].try_into().unwrap());
        let time = f64::from_le_bytes(buffer[10..18].try_into().unwrap());
        let embedded_len = u32::from_le_bytes(buffer[18..22].try_into().unwrap());

        let data_len = buffer.len() - FIXED_OVERHEAD;
        if embedded_len as usize != data_len {
            return Err(Error::LengthMismatch {
                embedded: embedded_len,
                expected: data_len as u32,
            }
            .into());
        }

        let data = buffer[22..22 + data_len].to_vec();
        let embedded_crc = u32::from_le_bytes(buffer[buffer.len() - 4..].try_into().unwrap());

        let mut zeroed = buffer.to_vec();
        let crc_at = zeroed.len() - 4;
        zeroed[crc_at..].copy_from_slice(&0u32.to_le_bytes());
        let expected_crc = crc32::checksum(&zeroed);

        if embedded_crc != expected_crc {
            return Err(Error::ChecksumMismatch {
                embedded: embedded_crc,
                expected: expected_crc,
            }
            .into());
        }

        Ok(Datagram {
            protocol,
            src,
            dest,
            time,
            data,
        })
    }
}

/// Identity ignores `time`: a timestamp refreshed on every hop is not part
/// of what makes two datagrams "the same" in the test scenarios.
impl PartialEq for Datagram {
    fn eq(&self, other: &Self) -> bool {
        self.protocol == other.protocol && self.src == other.src && self.dest == other.dest && self.data == other.data
    }
}

#[cfg(test)]
mod tests {
    use super::Datagram;

    fn sample(data: &[u8]) -> Datagram {
        Datagram::new(13, 100, 200, data.to_vec())
    }

    #[test]
    fn round_trip() {
        let dg = sample(b"Some test data for Datagram (12334567890).");
        let encoded = dg.encode();
        let decoded = Datagram::decode(&encoded).expect("valid datagram");
        assert_eq!(dg, decoded);
    }

    #[test]
    fn round_trip_empty_payload() {
        let dg = sample(b"");
        let encoded = dg.encode();
        let decoded = Datagram::decode(&encoded).expect("valid datagram");
        assert_eq!(dg, decoded);
    }

    #[test]
    fn decode_rejects_short_buffer() {
        let err = Datagram::decode(&[0u8; 10]).unwrap_err();
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn decode_rejects_length_mismatch() {
        let mut encoded = sample(b"test").encode();
        encoded.push(0xff); // trailing garbage byte, len field now disagrees
        assert!(Datagram::decode(&encoded).is_err());
    }

    #[test]
    fn decode_rejects_single_bit_flip() {
        let mut encoded = sample(b"test").encode();
        encoded[0] ^= 0x01;
        let err = Datagram::decode(&encoded).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn decode_rejects_truncation() {
        let mut encoded = sample(b"test").encode();
        encoded.pop();
        assert!(Datagram::decode(&encoded).is_err());
    }
}
